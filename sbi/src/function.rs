// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

/// A Trait for an SbiFunction. Implementers use this trait to specify how to serialize into the
/// a0-a6 registers used to make SBI calls.
pub trait SbiFunction {
    /// Returns the `u64` value that should be stored in register a6 before making the ecall for
    /// this function.
    fn a6(&self) -> u64 {
        0
    }
    /// Register a4.
    fn a4(&self) -> u64 {
        0
    }
    /// Register a3.
    fn a3(&self) -> u64 {
        0
    }
    /// Register a2.
    fn a2(&self) -> u64 {
        0
    }
    /// Register a1.
    fn a1(&self) -> u64 {
        0
    }
    /// Register a0.
    fn a0(&self) -> u64 {
        0
    }
}
