// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-bin
//!
//! Binary entry point for the FERRY service: CLI parsing, logging
//! bootstrap, runtime wiring and graceful shutdown coordination.

#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;
