// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use crate::consts::*;

/// Errors passed over the SBI protocol.
///
/// Constants from the SBI [spec](https://github.com/riscv-non-isa/riscv-sbi-doc/releases).
#[repr(i64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Generic failure in execution of the SBI call.
    Failed = SBI_ERR_FAILED,
    /// Extension or function is not supported.
    NotSupported = SBI_ERR_NOT_SUPPORTED,
    /// Parameter passed isn't valid.
    InvalidParam = SBI_ERR_INVALID_PARAM,
    /// Permission denied.
    Denied = SBI_ERR_DENIED,
    /// Address passed is invalid.
    InvalidAddress = SBI_ERR_INVALID_ADDRESS,
    /// The given hart has already been started.
    AlreadyAvailable = SBI_ERR_ALREADY_AVAILABLE,
    /// Some of the given counters have already been started.
    AlreadyStarted = SBI_ERR_ALREADY_STARTED,
    /// Some of the given counters have already been stopped.
    AlreadyStopped = SBI_ERR_ALREADY_STOPPED,
    /// Shared memory hasn't been set up for the calling hart.
    NoShmem = SBI_ERR_NO_SHMEM,
}

impl Error {
    /// Parse the given error code to an `Error` enum.
    pub fn from_code(e: i64) -> Self {
        use Error::*;
        match e {
            SBI_ERR_NOT_SUPPORTED => NotSupported,
            SBI_ERR_INVALID_PARAM => InvalidParam,
            SBI_ERR_DENIED => Denied,
            SBI_ERR_INVALID_ADDRESS => InvalidAddress,
            SBI_ERR_ALREADY_AVAILABLE => AlreadyAvailable,
            SBI_ERR_ALREADY_STARTED => AlreadyStarted,
            SBI_ERR_ALREADY_STOPPED => AlreadyStopped,
            SBI_ERR_NO_SHMEM => NoShmem,
            _ => Failed,
        }
    }

    /// Convert `Self` to a 64bit error code to be returned over SBI.
    pub fn to_code(self) -> i64 {
        self as i64
    }
}

/// Holds the result of an SBI call.
pub type Result<T> = core::result::Result<T, Error>;
