// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

// Extension constants
pub const EXT_BASE: u64 = 0x10;
pub const EXT_TIMER: u64 = 0x54494D45;
pub const EXT_IPI: u64 = 0x735049;
pub const EXT_RFENCE: u64 = 0x52464E43;
pub const EXT_HART_STATE: u64 = 0x48534D;
pub const EXT_RESET: u64 = 0x53525354;
pub const EXT_PMU: u64 = 0x504D55;
pub const EXT_MPXY: u64 = 0x4D505859;
pub const EXT_VENDOR_START: u64 = 0x0900_0000;

// Error constants from the sbi [spec](https://github.com/riscv-non-isa/riscv-sbi-doc/releases)
pub const SBI_SUCCESS: i64 = 0;
pub const SBI_ERR_FAILED: i64 = -1;
pub const SBI_ERR_NOT_SUPPORTED: i64 = -2;
pub const SBI_ERR_INVALID_PARAM: i64 = -3;
pub const SBI_ERR_DENIED: i64 = -4;
pub const SBI_ERR_INVALID_ADDRESS: i64 = -5;
pub const SBI_ERR_ALREADY_AVAILABLE: i64 = -6;
pub const SBI_ERR_ALREADY_STARTED: i64 = -7;
pub const SBI_ERR_ALREADY_STOPPED: i64 = -8;
pub const SBI_ERR_NO_SHMEM: i64 = -9;

/// Size argument of a remote fence that means "the whole address space".
pub const RFENCE_FLUSH_ALL: u64 = u64::MAX;
