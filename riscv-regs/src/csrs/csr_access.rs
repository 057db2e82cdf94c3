// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `ReadWriteRiscvCsr` type for RISC-V CSRs.

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
use core::arch::asm;
use core::marker::PhantomData;

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::RegisterLongName;

/// Read/Write registers.
#[derive(Copy, Clone)]
pub struct ReadWriteRiscvCsr<R: RegisterLongName, const V: u16> {
    associated_register: PhantomData<R>,
}

impl<R: RegisterLongName, const V: u16> ReadWriteRiscvCsr<R, V> {
    pub const fn new() -> Self {
        ReadWriteRiscvCsr {
            associated_register: PhantomData,
        }
    }

    /// Atomically read a CSR and clear the bits in `bitmask` (`CSRRC`).
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    #[inline]
    pub fn read_and_clear_bits(&self, bitmask: u64) -> u64 {
        let r: u64;
        // Safety: CSRRC on a CSR accessible at the current privilege level has no side effects
        // beyond the CSR update.
        unsafe {
            asm!("csrrc {rd}, {csr}, {rs1}",
                 rd = out(reg) r,
                 csr = const V,
                 rs1 = in(reg) bitmask);
        }
        r
    }

    // Mock implementation for host tests.
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    pub fn read_and_clear_bits(&self, bitmask: u64) -> u64 {
        unimplemented!("clearing bits {:#x} in RISC-V CSR {:#x}", bitmask, V)
    }
}

impl<R: RegisterLongName, const V: u16> Readable for ReadWriteRiscvCsr<R, V> {
    type T = u64;
    type R = R;

    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    #[inline]
    fn get(&self) -> u64 {
        let r: u64;
        // Safety: reading a CSR has no side effects for the CSRs defined in `CSR`.
        unsafe {
            asm!("csrr {rd}, {csr}", rd = out(reg) r, csr = const V);
        }
        r
    }

    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    fn get(&self) -> u64 {
        unimplemented!("reading RISC-V CSR {:#x}", V)
    }
}

impl<R: RegisterLongName, const V: u16> Writeable for ReadWriteRiscvCsr<R, V> {
    type T = u64;
    type R = R;

    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    #[inline]
    fn set(&self, val_to_set: u64) {
        // Safety: the caller owns the state controlled by this CSR.
        unsafe {
            asm!("csrw {csr}, {rs}", rs = in(reg) val_to_set, csr = const V);
        }
    }

    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    fn set(&self, _val_to_set: u64) {
        unimplemented!("writing RISC-V CSR {:#x}", V)
    }
}
