// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Guest-interaction core of a small RISC-V type-1 hypervisor: SBI call handling, cross-core
//! notification, host interrupt dispatch, trap routing, CSR interception and the VM lifecycle.

#![no_std]

// For testing use the std crate.
#[cfg(test)]
#[macro_use]
extern crate std;

/// The physical machine backing `Platform`.
pub mod board;
/// Static VM configuration and board constants.
pub mod config;
/// SBI calls made by guests.
pub mod ecall;
/// The top-level hypervisor context.
pub mod hypervisor;
/// Host interrupt descriptors and dispatch.
pub mod irq;
/// Synchronous cross-core function calls.
pub mod notify;
/// Interfaces to the hardware and guest collaborators.
pub mod platform;
/// Interrupt routing tables.
pub mod trap;
/// Guest CSR interception and emulation.
pub mod vcsr;
/// VM lifecycle.
pub mod vm;
/// Virtual CPUs.
pub mod vm_cpu;

#[cfg(test)]
mod test_utils;

pub use hypervisor::Hypervisor;
pub use platform::{GuestServices, HartOps, Platform};
pub use vm::{Vm, VmId, VmState};
