// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-tests
//!
//! Shared fixtures, mocks and wiring helpers for the FERRY integration
//! test suite. The actual tests live under `tests/`.

#![deny(unsafe_code)]

pub mod common;
