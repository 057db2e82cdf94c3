// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![no_std]

// For testing use the std crate.
#[cfg(test)]
#[macro_use]
extern crate std;

/// `log` backend writing to the system console.
pub mod logger;
/// System console and the `print!`/`println!` macros.
pub mod print;
