// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Low-level TLB and instruction cache maintenance for the current hart.

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
use core::arch::asm;

/// Executes an HFENCE.VVMA instruction, invalidating VS-stage translations of the guest that is
/// currently loaded in `hgatp`. A `vaddr` or `asid` narrows the flush to that address or ASID.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub fn hfence_vvma(vaddr: Option<u64>, asid: Option<u64>) {
    // HFENCE.VVMA encoding: 0010001 rs2[4:0] rs1[4:0] 000 00000 1110011
    match (vaddr, asid) {
        // Safety: HFENCE.VVMA only invalidates address translation caches.
        (Some(addr), Some(id)) => unsafe {
            // hfence.vvma a0, a1
            asm!(".word 0x22b50073", in("a0") addr, in("a1") id);
        },
        (Some(addr), None) => unsafe {
            // hfence.vvma a0, zero
            asm!(".word 0x22050073", in("a0") addr);
        },
        (None, Some(id)) => unsafe {
            // hfence.vvma zero, a0
            asm!(".word 0x22a00073", in("a0") id);
        },
        (None, None) => unsafe {
            // hfence.vvma zero, zero
            asm!(".word 0x22000073");
        },
    }
}

/// Executes FENCE.I, synchronizing the local instruction stream with prior stores.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub fn fence_i() {
    // Safety: FENCE.I only flushes the local instruction fetch pipeline.
    unsafe { asm!("fence.i") };
}

// There is no translation cache to maintain when running host tests.
#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
pub fn hfence_vvma(_vaddr: Option<u64>, _asid: Option<u64>) {}
#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
pub fn fence_i() {}
