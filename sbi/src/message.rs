// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use crate::*;

/// SBI Message used to invoke the specified SBI extension in the firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SbiMessage {
    /// The base SBI extension functions.
    Base(BaseFunction),
    /// The timer extension.
    Timer(TimerFunction),
    /// The inter-processor interrupt extension.
    Ipi(IpiFunction),
    /// The remote fence extension.
    RemoteFence(RfenceFunction),
    /// The hart state management extension; carries the raw function ID.
    HartState(u64),
    /// The system reset extension; carries the raw function ID.
    Reset(u64),
    /// The performance monitoring extension; carries the raw function ID.
    Pmu(u64),
    /// The message proxy extension.
    Mpxy(MpxyFunction),
}

impl SbiMessage {
    /// Creates an SbiMessage struct from the given GPRs a0-a7. Intended for use from the ECALL
    /// handler and passed the saved register state from the calling hart. Extensions that aren't
    /// recognized fail with `Error::NotSupported`.
    pub fn from_regs(args: &[u64]) -> Result<Self> {
        match args[7] {
            EXT_BASE => BaseFunction::from_regs(args).map(SbiMessage::Base),
            EXT_TIMER => TimerFunction::from_regs(args).map(SbiMessage::Timer),
            EXT_IPI => IpiFunction::from_regs(args).map(SbiMessage::Ipi),
            EXT_RFENCE => RfenceFunction::from_regs(args).map(SbiMessage::RemoteFence),
            EXT_HART_STATE => Ok(SbiMessage::HartState(args[6])),
            EXT_RESET => Ok(SbiMessage::Reset(args[6])),
            EXT_PMU => Ok(SbiMessage::Pmu(args[6])),
            EXT_MPXY => MpxyFunction::from_regs(args).map(SbiMessage::Mpxy),
            _ => Err(Error::NotSupported),
        }
    }

    /// Returns the register value for the extension ID (a7).
    pub fn a7(&self) -> u64 {
        use SbiMessage::*;
        match self {
            Base(_) => EXT_BASE,
            Timer(_) => EXT_TIMER,
            Ipi(_) => EXT_IPI,
            RemoteFence(_) => EXT_RFENCE,
            HartState(_) => EXT_HART_STATE,
            Reset(_) => EXT_RESET,
            Pmu(_) => EXT_PMU,
            Mpxy(_) => EXT_MPXY,
        }
    }

    /// Serializes the message into the a0-a7 values a caller places in registers before the
    /// ecall.
    pub fn to_regs(&self) -> [u64; 8] {
        use SbiMessage::*;
        let function: &dyn SbiFunction = match self {
            Base(f) => f,
            Timer(f) => f,
            Ipi(f) => f,
            RemoteFence(f) => f,
            Mpxy(f) => f,
            HartState(fid) | Reset(fid) | Pmu(fid) => {
                return [0, 0, 0, 0, 0, 0, *fid, self.a7()];
            }
        };
        [
            function.a0(),
            function.a1(),
            function.a2(),
            function.a3(),
            function.a4(),
            0,
            function.a6(),
            self.a7(),
        ]
    }
}

/// Result from an SBI call as placed in a0 and a1. A call that produces no value leaves a1 as
/// the guest set it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SbiReturn {
    /// The error code (0 for success).
    pub error_code: i64,
    /// The return value if the operation produced one.
    pub return_value: Option<u64>,
}

impl SbiReturn {
    /// Returns a successful result that leaves a1 untouched.
    pub fn success() -> Self {
        Self {
            error_code: SBI_SUCCESS,
            return_value: None,
        }
    }

    /// Returns a successful result carrying `value` in a1.
    pub fn value(value: u64) -> Self {
        Self {
            error_code: SBI_SUCCESS,
            return_value: Some(value),
        }
    }
}

impl From<Error> for SbiReturn {
    fn from(error: Error) -> Self {
        SbiReturn {
            error_code: error.to_code(),
            return_value: None,
        }
    }
}

impl From<Result<u64>> for SbiReturn {
    fn from(result: Result<u64>) -> SbiReturn {
        match result {
            Ok(rv) => Self::value(rv),
            Err(e) => Self::from(e),
        }
    }
}

impl From<Result<()>> for SbiReturn {
    fn from(result: Result<()>) -> SbiReturn {
        match result {
            Ok(()) => Self::success(),
            Err(e) => Self::from(e),
        }
    }
}
