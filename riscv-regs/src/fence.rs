// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Memory fence instructions used around MMIO accesses.

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
use core::arch::asm;

// Safety: The `fence` instruction itself does not access memory; it's only side-effect is to
// enforce ordering of surrounding load/store instructions with respect to the `fence`.

/// Orders preceeding memory stores with respect to succeeding IO stores.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub fn mmio_wmb() {
    unsafe { asm!("fence w,o") };
}

// Make fence instructions a no-op for testing.
#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
pub fn mmio_wmb() {}
