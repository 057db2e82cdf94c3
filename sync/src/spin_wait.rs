// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

/// Busy-wait state for polling a condition published by another hart.
///
/// Waiting never sleeps or allocates, so it is usable from trap context. The condition being
/// waited on must be released within `STALL_SPINS` polls: every lock and broadcast in this
/// workspace is held for at most a few MMIO accesses or one remote TLB/icache flush. Past that
/// bound `stalled` returns true so the waiter can report it; the wait itself continues.
pub struct SpinWait {
    spins: u64,
}

impl SpinWait {
    /// Number of polls after which a wait is considered stalled.
    pub const STALL_SPINS: u64 = 1 << 24;

    pub const fn new() -> Self {
        Self { spins: 0 }
    }

    /// Yields the pipeline for one iteration of a busy-wait loop.
    pub fn relax(&mut self) {
        self.spins = self.spins.saturating_add(1);
        core::hint::spin_loop();
    }

    /// Returns true once this wait has polled `STALL_SPINS` times.
    pub fn stalled(&self) -> bool {
        self.spins >= Self::STALL_SPINS
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new()
    }
}
