// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::*;
use crate::function::*;

/// Functions defined for the IPI extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpiFunction {
    /// Sends a supervisor software interrupt to the harts in `hart_mask`, offset by
    /// `hart_mask_base`.
    SendIpi {
        /// a0 - bit `n` selects hart `hart_mask_base + n`.
        hart_mask: u64,
        /// a1 - the hart ID bit 0 of `hart_mask` refers to.
        hart_mask_base: u64,
    },
}

impl IpiFunction {
    /// Attempts to parse `Self` from the passed in `a0-a7`.
    pub(crate) fn from_regs(args: &[u64]) -> Result<Self> {
        match args[6] {
            0 => Ok(IpiFunction::SendIpi {
                hart_mask: args[0],
                hart_mask_base: args[1],
            }),
            _ => Err(Error::NotSupported),
        }
    }
}

impl SbiFunction for IpiFunction {
    fn a0(&self) -> u64 {
        let IpiFunction::SendIpi { hart_mask, .. } = self;
        *hart_mask
    }

    fn a1(&self) -> u64 {
        let IpiFunction::SendIpi { hart_mask_base, .. } = self;
        *hart_mask_base
    }
}
