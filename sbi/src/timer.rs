// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::*;
use crate::function::*;

/// Functions defined for the Timer extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerFunction {
    /// Programs the clock for the next event after `stime_value` time.
    SetTimer(u64),
}

impl TimerFunction {
    /// Attempts to parse `Self` from the passed in `a0-a7`.
    pub(crate) fn from_regs(args: &[u64]) -> Result<Self> {
        match args[6] {
            0 => Ok(TimerFunction::SetTimer(args[0])),
            _ => Err(Error::NotSupported),
        }
    }
}

impl SbiFunction for TimerFunction {
    fn a0(&self) -> u64 {
        let TimerFunction::SetTimer(deadline) = self;
        *deadline
    }
}
