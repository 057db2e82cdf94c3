// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use core::ptr::NonNull;

use crate::CpuId;

const MSIP_OFFSET: usize = 0x0;
const MTIMECMP_OFFSET: usize = 0x4000;
const MTIME_OFFSET: usize = 0xbff8;

/// Size of the CLINT register window.
pub const CLINT_SIZE: usize = 0x1_0000;

/// Comparator value that never fires.
pub const CLINT_DISABLE_TIMER: u64 = u64::MAX;

/// Driver for the core-local interruptor: one software-interrupt doorbell and one timer
/// comparator per hart.
pub struct Clint {
    base: NonNull<u8>,
}

impl Clint {
    /// Creates a driver for the CLINT mapped at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to `CLINT_SIZE` bytes of CLINT registers (or memory standing in for them)
    /// that remain valid for the lifetime of the driver.
    pub unsafe fn new(base: NonNull<u8>) -> Self {
        Self { base }
    }

    /// Returns the address of the register at `offset`.
    fn reg<T>(&self, offset: usize) -> *mut T {
        debug_assert!(offset + core::mem::size_of::<T>() <= CLINT_SIZE);
        // Safety: offsets computed by this driver stay within the register window.
        unsafe { self.base.as_ptr().add(offset) as *mut T }
    }

    fn read32(&self, offset: usize) -> u32 {
        // Safety: `reg` points at a valid, aligned CLINT register.
        unsafe { core::ptr::read_volatile(self.reg::<u32>(offset)) }
    }

    fn write32(&self, offset: usize, val: u32) {
        // Safety: `reg` points at a valid, aligned CLINT register.
        unsafe { core::ptr::write_volatile(self.reg::<u32>(offset), val) }
    }

    /// Rings the software-interrupt doorbell of `cpu`.
    pub fn set_msip(&self, cpu: CpuId) {
        self.write32(MSIP_OFFSET + 4 * cpu.raw(), 1);
    }

    /// Acknowledges the software interrupt of `cpu`.
    pub fn clear_msip(&self, cpu: CpuId) {
        self.write32(MSIP_OFFSET + 4 * cpu.raw(), 0);
    }

    /// Returns true if the doorbell of `cpu` is ringing.
    pub fn msip_pending(&self, cpu: CpuId) -> bool {
        self.read32(MSIP_OFFSET + 4 * cpu.raw()) & 1 != 0
    }

    /// Programs the timer comparator of `cpu`.
    pub fn set_mtimecmp(&self, cpu: CpuId, deadline: u64) {
        // Safety: `reg` points at a valid, aligned CLINT register.
        unsafe {
            core::ptr::write_volatile(
                self.reg::<u64>(MTIMECMP_OFFSET + 8 * cpu.raw()),
                deadline,
            )
        }
    }

    /// Returns the timer comparator of `cpu`.
    pub fn mtimecmp(&self, cpu: CpuId) -> u64 {
        // Safety: `reg` points at a valid, aligned CLINT register.
        unsafe { core::ptr::read_volatile(self.reg::<u64>(MTIMECMP_OFFSET + 8 * cpu.raw())) }
    }

    /// Pushes the timer comparator of `cpu` out so it never fires.
    pub fn disable_timer(&self, cpu: CpuId) {
        self.set_mtimecmp(cpu, CLINT_DISABLE_TIMER);
    }

    /// Returns the free-running machine timer.
    pub fn mtime(&self) -> u64 {
        // Safety: `reg` points at a valid, aligned CLINT register.
        unsafe { core::ptr::read_volatile(self.reg::<u64>(MTIME_OFFSET)) }
    }
}

// Safety: the CLINT registers are per-hart words that may be accessed concurrently; each
// operation is a single volatile access.
unsafe impl Send for Clint {}
unsafe impl Sync for Clint {}
