// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Guest CSR interception policy and emulation of the intercepted CSRs.

use flagset::{flags, FlagSet};
use log::{error, warn};
use riscv_regs::GprIndex;

use crate::hypervisor::Hypervisor;
use crate::platform::{GuestServices, Platform};
use crate::vm::VmId;

/// Errors returned to the CSR exit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The CSR number is outside both interceptable ranges.
    InvalidCsr(u32),
    /// The guest may not access the CSR.
    AccessDenied(u32),
    /// The exit names a VM or vCPU that doesn't exist.
    NoSuchVcpu,
}

pub type Result<T> = core::result::Result<T, Error>;

const EACCES: i32 = 13;
const EINVAL: i32 = 22;

impl Error {
    /// Returns the negative errno reported to the exit path.
    pub fn to_errno(self) -> i32 {
        match self {
            Error::AccessDenied(_) => -EACCES,
            Error::InvalidCsr(_) | Error::NoSuchVcpu => -EINVAL,
        }
    }
}

/// Guest timer deadline.
pub const CSR_TIMER_DEADLINE: u32 = 0x6e0;
/// Guest-physical base of the virtual CLINT.
pub const CSR_CLINT_BASE: u32 = 0x1b;
/// Memory-type range capabilities.
pub const CSR_MTRR_CAP: u32 = 0xfe;

/// Number of CSRs with per-vCPU emulated state.
pub const NUM_GUEST_CSRS: usize = 2;

// Shares its indexes with the per-vCPU emulated CSR state.
const EMULATED_GUEST_CSRS: [u32; NUM_GUEST_CSRS] = [CSR_TIMER_DEADLINE, CSR_CLINT_BASE];

const MTRR_CSRS: [u32; 1] = [CSR_MTRR_CAP];

/// Size of a vCPU's CSR interception bitmap.
pub const CSR_BITMAP_SIZE: usize = 4096;

const READ_OFFSET: usize = 0;
const WRITE_OFFSET: usize = 2048;
const HIGH_RANGE_OFFSET: usize = 1024;
const HIGH_RANGE_START: u32 = 0xc000_0000;
const RANGE_MASK: u32 = 0x1fff;

flags! {
    /// Accesses that trap to the hypervisor.
    pub enum Intercept: u8 {
        Read = 1 << 0,
        Write = 1 << 1,
    }
}

/// Per-vCPU interception bitmap. Bytes `0..1024` cover reads of CSRs `0..=0x1fff`, bytes
/// `1024..2048` reads of `0xc000_0000..=0xc000_1fff`, and the upper 2 KiB the same two ranges
/// for writes.
#[derive(Clone)]
pub struct CsrBitmap([u8; CSR_BITMAP_SIZE]);

impl Default for CsrBitmap {
    fn default() -> Self {
        Self([0; CSR_BITMAP_SIZE])
    }
}

impl core::fmt::Debug for CsrBitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let set = self.0.iter().map(|b| b.count_ones()).sum::<u32>();
        write!(f, "CsrBitmap {{ intercepted bits: {} }}", set)
    }
}

// Returns the (read byte, write byte, bit) location of `csr`.
fn bitmap_location(csr: u32) -> Result<(usize, usize, u8)> {
    let high = (HIGH_RANGE_START..=HIGH_RANGE_START | RANGE_MASK).contains(&csr);
    if csr > RANGE_MASK && !high {
        return Err(Error::InvalidCsr(csr));
    }
    let (read, write) = if high {
        (
            READ_OFFSET + HIGH_RANGE_OFFSET,
            WRITE_OFFSET + HIGH_RANGE_OFFSET,
        )
    } else {
        (READ_OFFSET, WRITE_OFFSET)
    };
    let csr = csr & RANGE_MASK;
    let index = (csr >> 3) as usize;
    Ok((read + index, write + index, 1 << (csr & 0x7)))
}

impl CsrBitmap {
    /// Sets the interception of `csr` to exactly `mode`. An empty `mode` disables interception.
    pub fn enable_csr_interception(
        &mut self,
        csr: u32,
        mode: impl Into<FlagSet<Intercept>>,
    ) -> Result<()> {
        let mode = mode.into();
        let (read, write, bit) = bitmap_location(csr)?;
        if mode.contains(Intercept::Read) {
            self.0[read] |= bit;
        } else {
            self.0[read] &= !bit;
        }
        if mode.contains(Intercept::Write) {
            self.0[write] |= bit;
        } else {
            self.0[write] &= !bit;
        }
        Ok(())
    }

    /// Returns the accesses to `csr` that trap.
    pub fn interception(&self, csr: u32) -> FlagSet<Intercept> {
        let mut mode = FlagSet::default();
        if let Ok((read, write, bit)) = bitmap_location(csr) {
            if self.0[read] & bit != 0 {
                mode |= Intercept::Read;
            }
            if self.0[write] & bit != 0 {
                mode |= Intercept::Write;
            }
        }
        mode
    }

    /// Returns the raw bitmap as loaded into the hardware.
    pub fn as_bytes(&self) -> &[u8; CSR_BITMAP_SIZE] {
        &self.0
    }
}

/// Installs the default interception policy: every emulated CSR and every MTRR CSR traps on
/// both read and write.
pub fn init_csr_emulation(bitmap: &mut CsrBitmap) {
    for &csr in EMULATED_GUEST_CSRS.iter().chain(MTRR_CSRS.iter()) {
        if let Err(e) = bitmap.enable_csr_interception(csr, Intercept::Read | Intercept::Write) {
            error!("failed to intercept CSR {:#x}: {:?}", csr, e);
        }
    }
}

/// Returns the index of `csr` in the per-vCPU emulated CSR state, or `NUM_GUEST_CSRS` if the CSR
/// has none.
pub fn vcsr_get_guest_csr_index(csr: u32) -> usize {
    let index = EMULATED_GUEST_CSRS
        .iter()
        .position(|&c| c == csr)
        .unwrap_or(NUM_GUEST_CSRS);
    if index == NUM_GUEST_CSRS {
        error!("CSR {:#x} is not an emulated guest CSR", csr);
    }
    index
}

impl<P: Platform> Hypervisor<P> {
    /// Emulates a guest read of the CSR named by a0. The value is returned split across a0 (low
    /// 32 bits) and a2 (high 32 bits); denied reads return 0.
    pub fn rdcsr_vmexit_handler(&self, vm_id: VmId, vcpu_id: usize) -> Result<()> {
        let vm = self.vm(vm_id);
        let vcpus = vm.vcpus();
        let vcpu = vcpus.get(vcpu_id).ok_or(Error::NoSuchVcpu)?;
        let csr = vcpu.gpr(GprIndex::A0) as u32;
        let result = match csr {
            CSR_TIMER_DEADLINE => Ok(self.services().vclint_deadline(vm_id, vcpu_id)),
            CSR_MTRR_CAP if !vm.vm_hide_mtrr() => {
                Ok(self.services().read_vmtrr(vm_id, vcpu_id, csr))
            }
            CSR_CLINT_BASE => Ok(self.services().vclint_base(vm_id)),
            _ => {
                warn!(
                    "vm{} vcpu{} reading CSR {:#x} not supported",
                    vm_id.raw(),
                    vcpu_id,
                    csr
                );
                Err(Error::AccessDenied(csr))
            }
        };
        let value = result.unwrap_or(0);
        vcpu.set_gpr(GprIndex::A0, value & 0xffff_ffff);
        vcpu.set_gpr(GprIndex::A2, value >> 32);
        result.map(|_| ())
    }

    /// Emulates a guest write of `(a1 << 32) | a2` to the CSR named by a0.
    pub fn wrcsr_vmexit_handler(&self, vm_id: VmId, vcpu_id: usize) -> Result<()> {
        let vm = self.vm(vm_id);
        let vcpus = vm.vcpus();
        let vcpu = vcpus.get(vcpu_id).ok_or(Error::NoSuchVcpu)?;
        let csr = vcpu.gpr(GprIndex::A0) as u32;
        let value = (vcpu.gpr(GprIndex::A1) << 32) | vcpu.gpr(GprIndex::A2);
        match csr {
            CSR_TIMER_DEADLINE => {
                self.services().vclint_set_deadline(vm_id, vcpu_id, value);
                Ok(())
            }
            _ => {
                warn!(
                    "vm{} vcpu{} writing CSR {:#x} not supported",
                    vm_id.raw(),
                    vcpu_id,
                    csr
                );
                Err(Error::AccessDenied(csr))
            }
        }
    }
}
