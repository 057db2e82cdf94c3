// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Tock Register interface for the CSRs the hypervisor reads and writes.

pub mod csr_access;
pub mod defs;
pub mod traps;

pub use tock_registers::interfaces::ReadWriteable;
pub use tock_registers::interfaces::Readable;
pub use tock_registers::interfaces::Writeable;
pub use tock_registers::LocalRegisterCopy;

pub use defs::*;
pub use traps::*;

use csr_access::ReadWriteRiscvCsr;

// CSR numbers.
pub const CSR_SSCRATCH: u16 = 0x140;
pub const CSR_STIMECMP: u16 = 0x14d;
pub const CSR_MENVCFG: u16 = 0x30a;
pub const CSR_MIP: u16 = 0x344;
pub const CSR_MVENDORID: u16 = 0xf11;
pub const CSR_MARCHID: u16 = 0xf12;
pub const CSR_MIMPID: u16 = 0xf13;

pub struct CSR {
    pub sscratch: ReadWriteRiscvCsr<sscratch::Register, CSR_SSCRATCH>,
    pub stimecmp: ReadWriteRiscvCsr<stimecmp::Register, CSR_STIMECMP>,
    pub menvcfg: ReadWriteRiscvCsr<menvcfg::Register, CSR_MENVCFG>,
    pub mip: ReadWriteRiscvCsr<mip::Register, CSR_MIP>,
    pub mvendorid: ReadWriteRiscvCsr<ident::Register, CSR_MVENDORID>,
    pub marchid: ReadWriteRiscvCsr<ident::Register, CSR_MARCHID>,
    pub mimpid: ReadWriteRiscvCsr<ident::Register, CSR_MIMPID>,
}

// Define the "addresses" of each CSR register.
pub const CSR: &CSR = &CSR {
    sscratch: ReadWriteRiscvCsr::new(),
    stimecmp: ReadWriteRiscvCsr::new(),
    menvcfg: ReadWriteRiscvCsr::new(),
    mip: ReadWriteRiscvCsr::new(),
    mvendorid: ReadWriteRiscvCsr::new(),
    marchid: ReadWriteRiscvCsr::new(),
    mimpid: ReadWriteRiscvCsr::new(),
};
