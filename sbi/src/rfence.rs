// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::*;
use crate::function::*;

/// Set of harts targeted by a remote fence, in the same encoding as `IpiFunction::SendIpi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HartMask {
    /// Bit `n` selects hart `base + n`.
    pub mask: u64,
    /// The hart ID bit 0 of `mask` refers to.
    pub base: u64,
}

/// Functions defined for the RFENCE extension. The hypervisor-fence functions (4-6) aren't
/// offered to guests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RfenceFunction {
    /// Instructs the remote harts to execute FENCE.I.
    FenceI(HartMask),
    /// Instructs the remote harts to execute SFENCE.VMA covering `[start, start + size)`.
    SfenceVma {
        harts: HartMask,
        start: u64,
        size: u64,
    },
    /// Same as `SfenceVma`, restricted to translations tagged with `asid`.
    SfenceVmaAsid {
        harts: HartMask,
        start: u64,
        size: u64,
        asid: u64,
    },
}

impl RfenceFunction {
    /// Attempts to parse `Self` from the passed in `a0-a7`.
    pub(crate) fn from_regs(args: &[u64]) -> Result<Self> {
        use RfenceFunction::*;
        let harts = HartMask {
            mask: args[0],
            base: args[1],
        };
        match args[6] {
            0 => Ok(FenceI(harts)),
            1 => Ok(SfenceVma {
                harts,
                start: args[2],
                size: args[3],
            }),
            2 => Ok(SfenceVmaAsid {
                harts,
                start: args[2],
                size: args[3],
                asid: args[4],
            }),
            _ => Err(Error::NotSupported),
        }
    }

    /// Returns the harts this fence targets.
    pub fn harts(&self) -> HartMask {
        use RfenceFunction::*;
        match *self {
            FenceI(harts) => harts,
            SfenceVma { harts, .. } => harts,
            SfenceVmaAsid { harts, .. } => harts,
        }
    }
}

impl SbiFunction for RfenceFunction {
    fn a6(&self) -> u64 {
        use RfenceFunction::*;
        match self {
            FenceI(_) => 0,
            SfenceVma { .. } => 1,
            SfenceVmaAsid { .. } => 2,
        }
    }

    fn a0(&self) -> u64 {
        self.harts().mask
    }

    fn a1(&self) -> u64 {
        self.harts().base
    }

    fn a2(&self) -> u64 {
        use RfenceFunction::*;
        match self {
            FenceI(_) => 0,
            SfenceVma { start, .. } => *start,
            SfenceVmaAsid { start, .. } => *start,
        }
    }

    fn a3(&self) -> u64 {
        use RfenceFunction::*;
        match self {
            FenceI(_) => 0,
            SfenceVma { size, .. } => *size,
            SfenceVmaAsid { size, .. } => *size,
        }
    }

    fn a4(&self) -> u64 {
        match self {
            RfenceFunction::SfenceVmaAsid { asid, .. } => *asid,
            _ => 0,
        }
    }
}
