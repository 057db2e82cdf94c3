// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use static_assertions::const_assert;

/// The maximum number of CPUs we can support.
pub const MAX_CPUS: usize = 64;

// A `CpuMask` holds one bit per CPU in a u64.
const_assert!(MAX_CPUS <= u64::BITS as usize);

/// Logical CPU number. The hypervisor runs with hart ID == logical CPU ID.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub struct CpuId(usize);

impl CpuId {
    /// Creates a `CpuId` from the raw index.
    pub const fn new(raw: usize) -> Self {
        CpuId(raw)
    }

    /// Returns the raw value of the CPU ID.
    pub const fn raw(&self) -> usize {
        self.0
    }
}

/// A fixed-width set of CPU indices. Also used for sets of virtual harts, where bit `n` names
/// the n-th vCPU of a VM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuMask(u64);

impl CpuMask {
    /// Returns the empty set.
    pub const fn empty() -> Self {
        CpuMask(0)
    }

    /// Creates a set from its raw bit representation.
    pub const fn from_raw(bits: u64) -> Self {
        CpuMask(bits)
    }

    /// Returns the raw bit representation.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Adds `cpu` to the set. Indices past `MAX_CPUS` are ignored.
    pub fn set(&mut self, cpu: CpuId) {
        if cpu.raw() < MAX_CPUS {
            self.0 |= 1 << cpu.raw();
        }
    }

    /// Removes `cpu` from the set.
    pub fn clear(&mut self, cpu: CpuId) {
        if cpu.raw() < MAX_CPUS {
            self.0 &= !(1 << cpu.raw());
        }
    }

    /// Returns true if `cpu` is in the set.
    pub fn contains(&self, cpu: CpuId) -> bool {
        cpu.raw() < MAX_CPUS && self.0 & (1 << cpu.raw()) != 0
    }

    /// Returns the lowest-numbered CPU in the set.
    pub fn lowest_set(&self) -> Option<CpuId> {
        if self.0 == 0 {
            None
        } else {
            Some(CpuId::new(self.0.trailing_zeros() as usize))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns the number of CPUs in the set.
    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the CPUs in the set in ascending order.
    pub fn iter(&self) -> CpuMaskIter {
        CpuMaskIter(*self)
    }
}

/// Ascending iterator over the members of a `CpuMask`.
pub struct CpuMaskIter(CpuMask);

impl Iterator for CpuMaskIter {
    type Item = CpuId;

    fn next(&mut self) -> Option<CpuId> {
        let cpu = self.0.lowest_set()?;
        self.0.clear(cpu);
        Some(cpu)
    }
}

impl FromIterator<CpuId> for CpuMask {
    fn from_iter<I: IntoIterator<Item = CpuId>>(iter: I) -> Self {
        let mut mask = CpuMask::empty();
        for cpu in iter {
            mask.set(cpu);
        }
        mask
    }
}
