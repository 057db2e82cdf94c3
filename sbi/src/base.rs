// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use crate::error::*;
use crate::function::*;

/// Functions defined for the Base extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseFunction {
    /// Returns the implemented version of the SBI standard.
    GetSpecificationVersion,
    /// Returns the ID of the SBI implementation.
    GetImplementationId,
    /// Returns the version of this SBI implementation.
    GetImplementationVersion,
    /// Checks if the given SBI extension is supported.
    ProbeSbiExtension(u64),
    /// Returns the vendor that produced this machine (`mvendorid`).
    GetMachineVendorId,
    /// Returns the architecture implementation ID of this machine (`marchid`).
    GetMachineArchitectureId,
    /// Returns the implementation ID of this machine (`mimpid`).
    GetMachineImplementationId,
}

impl BaseFunction {
    /// Attempts to parse `Self` from the passed in `a0-a7`.
    pub(crate) fn from_regs(args: &[u64]) -> Result<Self> {
        use BaseFunction::*;

        match args[6] {
            0 => Ok(GetSpecificationVersion),
            1 => Ok(GetImplementationId),
            2 => Ok(GetImplementationVersion),
            3 => Ok(ProbeSbiExtension(args[0])),
            4 => Ok(GetMachineVendorId),
            5 => Ok(GetMachineArchitectureId),
            6 => Ok(GetMachineImplementationId),
            _ => Err(Error::NotSupported),
        }
    }
}

impl SbiFunction for BaseFunction {
    fn a6(&self) -> u64 {
        use BaseFunction::*;
        match self {
            GetSpecificationVersion => 0,
            GetImplementationId => 1,
            GetImplementationVersion => 2,
            ProbeSbiExtension(_) => 3,
            GetMachineVendorId => 4,
            GetMachineArchitectureId => 5,
            GetMachineImplementationId => 6,
        }
    }

    fn a0(&self) -> u64 {
        match self {
            BaseFunction::ProbeSbiExtension(ext) => *ext,
            _ => 0,
        }
    }
}
