// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! # Hardware drivers

#![no_std]

// For testing use the std crate.
#[cfg(test)]
#[macro_use]
extern crate std;

/// Provides the driver for the core-local interruptor (software and timer interrupts).
pub mod clint;
/// Logical CPU identifiers and CPU sets.
pub mod cpu;
/// Interface implemented by platform-level interrupt controllers.
pub mod irqchip;
/// Provides the driver for the platform-level interrupt controller.
pub mod plic;
/// Provides the driver for the console UART.
pub mod uart;

pub use clint::{Clint, CLINT_DISABLE_TIMER};
pub use cpu::{CpuId, CpuMask, MAX_CPUS};
pub use irqchip::IrqChip;
pub use plic::Plic;
pub use uart::UartDriver;
