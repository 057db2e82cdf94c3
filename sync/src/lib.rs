// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! # Synchronization primitives.
//!
//! Synchronization primitves like mutexes and read/write-locks that are
//! usable in bare-metal environments, re-exported from the `spin` crate,
//! plus `SpinWait` for waiting on state published by another hart.
#![no_std]

#[cfg(test)]
extern crate std;

mod spin_wait;

pub use spin::{Mutex, MutexGuard, Once, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use spin_wait::SpinWait;
