// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `version` command.

use crate::error::BinResult;

/// Prints component versions.
pub fn execute() -> BinResult<()> {
    println!("ferry {}", ferry_core::VERSION);
    println!("  ferry-core    {}", ferry_core::VERSION);
    println!("  ferry-buffer  {}", ferry_buffer::VERSION);
    println!("  ferry-storage {}", ferry_storage::VERSION);
    println!("  ferry-config  {}", ferry_config::VERSION);
    println!("  ferry-api     {}", ferry_api::VERSION);
    Ok(())
}
