// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use crate::cause;
use tock_registers::LocalRegisterCopy;

/// Errors as a result of converting cause values to Trap enums.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Unknown cause value in CSR.
    UnknownCause(u64),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Trap causes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    Interrupt(Interrupt),
    Exception(Exception),
}

impl Trap {
    /// Returns the Trap corresponding to the raw mcause/scause value.
    pub fn from_cause(csr: u64) -> Result<Self> {
        let val = LocalRegisterCopy::<u64, cause::Register>::new(csr);
        let code = val.read(cause::code);
        if val.is_set(cause::is_interrupt) {
            Ok(Trap::Interrupt(Interrupt::from_code(code)?))
        } else {
            Ok(Trap::Exception(Exception::from_code(code)?))
        }
    }
}

/// Interrupt causes.
#[repr(u64)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interrupt {
    UserSoft = 0,
    SupervisorSoft = 1,
    VirtualSupervisorSoft = 2,
    MachineSoft = 3,
    UserTimer = 4,
    SupervisorTimer = 5,
    VirtualSupervisorTimer = 6,
    MachineTimer = 7,
    UserExternal = 8,
    SupervisorExternal = 9,
    VirtualSupervisorExternal = 10,
    MachineExternal = 11,
    SupervisorGuestExternal = 12,
}

/// Exception causes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Exception {
    InstructionMisaligned,
    InstructionFault,
    IllegalInstruction,
    Breakpoint,
    LoadMisaligned,
    LoadFault,
    StoreMisaligned,
    StoreFault,
    UserEnvCall,
    SupervisorEnvCall,
    VirtualSupervisorEnvCall,
    MachineEnvCall,
    InstructionPageFault,
    LoadPageFault,
    StorePageFault,
    GuestInstructionPageFault,
    GuestLoadPageFault,
    VirtualInstruction,
    GuestStorePageFault,
}

impl Interrupt {
    pub fn from_code(code: u64) -> Result<Self> {
        use Interrupt::*;
        match code {
            0 => Ok(UserSoft),
            1 => Ok(SupervisorSoft),
            2 => Ok(VirtualSupervisorSoft),
            3 => Ok(MachineSoft),
            4 => Ok(UserTimer),
            5 => Ok(SupervisorTimer),
            6 => Ok(VirtualSupervisorTimer),
            7 => Ok(MachineTimer),
            8 => Ok(UserExternal),
            9 => Ok(SupervisorExternal),
            10 => Ok(VirtualSupervisorExternal),
            11 => Ok(MachineExternal),
            12 => Ok(SupervisorGuestExternal),
            v => Err(Error::UnknownCause(v)),
        }
    }

    /// Returns the cause code, which is also the bit index in the pending/enable CSRs.
    pub fn code(self) -> u64 {
        self as u64
    }
}

impl Exception {
    pub fn from_code(code: u64) -> Result<Self> {
        use Exception::*;
        match code {
            0 => Ok(InstructionMisaligned),
            1 => Ok(InstructionFault),
            2 => Ok(IllegalInstruction),
            3 => Ok(Breakpoint),
            4 => Ok(LoadMisaligned),
            5 => Ok(LoadFault),
            6 => Ok(StoreMisaligned),
            7 => Ok(StoreFault),
            8 => Ok(UserEnvCall),
            9 => Ok(SupervisorEnvCall),
            10 => Ok(VirtualSupervisorEnvCall),
            11 => Ok(MachineEnvCall),
            12 => Ok(InstructionPageFault),
            13 => Ok(LoadPageFault),
            15 => Ok(StorePageFault),
            20 => Ok(GuestInstructionPageFault),
            21 => Ok(GuestLoadPageFault),
            22 => Ok(VirtualInstruction),
            23 => Ok(GuestStorePageFault),
            v => Err(Error::UnknownCause(v)),
        }
    }
}
