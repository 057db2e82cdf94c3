// Copyright (c) 2021 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![no_std]
#![allow(missing_docs)]

//! Crate for handling RV64 registers.
//! regs - RV64 General Purpose Registers (GPRs), 0-31.
//! csrs - M/S/VS-mode CSRs touched by the hypervisor and their numbers.
//! fence - memory ordering for MMIO.
//! tlb - address-translation and instruction cache maintenance.

mod csrs;
mod fence;
mod regs;
mod tlb;

pub use csrs::*;
pub use fence::*;
pub use regs::*;
pub use tlb::*;
