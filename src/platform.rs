// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Interfaces to the hardware and to the guest-facing collaborators the hypervisor core drives
//! but does not implement: image loading, stage-2 tables, the virtual CLINT/PLIC/UART models
//! and TEE world switching.

use drivers::{Clint, CpuId, IrqChip};
use flagset::{flags, FlagSet};

use crate::config::VuartConfig;
use crate::vm::VmId;

/// Errors reported by guest-facing collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The stage-2 translation table couldn't be allocated.
    Stage2Init,
    /// A stage-2 mapping couldn't be installed.
    Stage2Map { gpa: u64, size: u64 },
    /// A stage-2 mapping couldn't be removed.
    Stage2Unmap { gpa: u64, size: u64 },
    /// A host-physical image range couldn't be read.
    ImageRead { hpa: u64 },
    /// Guest memory at `gpa` couldn't be written.
    GuestWrite { gpa: u64 },
}

/// Holds the result of a collaborator operation.
pub type Result<T> = core::result::Result<T, Error>;

flags! {
    /// Stage-2 access permissions.
    pub enum MemProt: u8 {
        Read = 0b001,
        Write = 0b010,
        Exec = 0b100,
    }
}

/// Location of a guest kernel image in host-physical memory as reported by the loader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KernelInfo {
    pub kernel_addr: u64,
    pub kernel_len: u64,
}

/// Location of a guest device tree blob in host-physical memory as reported by the loader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DtbInfo {
    pub dtb_addr: u64,
    pub dtb_len: u64,
}

/// Hardware operations on the current physical hart and on the interrupt controllers.
pub trait HartOps: Sync {
    /// Returns the logical ID of the calling CPU.
    fn cpu_id(&self) -> CpuId;

    /// Returns true if `cpu` has been brought up and takes software interrupts.
    fn cpu_online(&self, cpu: CpuId) -> bool;

    /// Returns the core-local interruptor.
    fn clint(&self) -> &Clint;

    /// Returns the platform-level interrupt controller.
    fn irqchip(&self) -> &dyn IrqChip;

    /// Rings the software-interrupt doorbell of `cpu`.
    fn send_swi(&self, cpu: CpuId) {
        self.clint().set_msip(cpu);
    }

    /// Returns the `mvendorid` CSR.
    fn mvendorid(&self) -> u64;

    /// Returns the `marchid` CSR.
    fn marchid(&self) -> u64;

    /// Returns the `mimpid` CSR.
    fn mimpid(&self) -> u64;

    /// Returns true if the Sstc extension is enabled (`menvcfg.STCE`).
    fn has_sstc(&self) -> bool;

    /// Programs `stimecmp`.
    fn write_stimecmp(&self, deadline: u64);

    /// Clears `mask` in `mip`.
    fn clear_mip(&self, mask: u64);

    /// Programs the S-mode timer deadline of the calling CPU.
    fn set_deadline(&self, deadline: u64);

    /// Runs the hypervisor timer subsystem.
    fn hv_timer_handler(&self);

    /// Runs pending softirqs on the calling CPU.
    fn do_softirq(&self);

    /// Flushes every guest translation on the calling CPU.
    fn flush_guest_tlb_local(&self);

    /// Flushes guest translations of `addr` on the calling CPU.
    fn flush_tlb_addr(&self, addr: u64);

    /// Flushes guest translations tagged with `asid` on the calling CPU.
    fn flush_tlb_asid(&self, asid: u64);

    /// Flushes guest translations of `addr` tagged with `asid` on the calling CPU.
    fn flush_tlb_addr_asid(&self, addr: u64, asid: u64);

    /// Invalidates the instruction cache of the calling CPU.
    fn invalidate_icache_local(&self);
}

/// Guest-facing collaborators used when building VMs and emulating guest requests.
pub trait GuestServices: Sync {
    /// Returns where the loader placed the kernel image for `vm`.
    fn kernel_info(&self, vm: VmId) -> KernelInfo;

    /// Returns where the loader placed the device tree for `vm`.
    fn dtb_info(&self, vm: VmId) -> DtbInfo;

    /// Reads `buf.len()` bytes of host-physical memory starting at `hpa`.
    fn read_image(&self, hpa: u64, buf: &mut [u8]) -> Result<()>;

    /// Copies `len` bytes from host-physical `hpa` to guest-physical `gpa` of `vm`.
    fn copy_to_gpa(&self, vm: VmId, hpa: u64, gpa: u64, len: u64) -> Result<()>;

    /// Writes `bytes` to guest-physical `gpa` of `vm`.
    fn write_guest(&self, vm: VmId, gpa: u64, bytes: &[u8]) -> Result<()>;

    /// Allocates the stage-2 root of `vm`.
    fn s2pt_init(&self, vm: VmId) -> Result<()>;

    /// Maps `size` bytes at `gpa` to `hpa` in the stage-2 table of `vm`.
    fn s2pt_add_mr(
        &self,
        vm: VmId,
        hpa: u64,
        gpa: u64,
        size: u64,
        prot: FlagSet<MemProt>,
    ) -> Result<()>;

    /// Unmaps `size` bytes at `gpa` from the stage-2 table of `vm`.
    fn s2pt_del_mr(&self, vm: VmId, gpa: u64, size: u64) -> Result<()>;

    /// Initializes the virtual CLINT of `vm`.
    fn vclint_init(&self, vm: VmId);

    /// Initializes the virtual PLIC of `vm`.
    fn vplic_init(&self, vm: VmId);

    /// Raises a virtual software interrupt on `vcpu` of `vm`.
    fn vclint_send_ipi(&self, vm: VmId, vcpu: usize);

    /// Programs the virtual timer comparator of `vcpu`.
    fn vclint_write_tmr(&self, vm: VmId, vcpu: usize, deadline: u64);

    /// Returns the emulated timer deadline CSR of `vcpu`.
    fn vclint_deadline(&self, vm: VmId, vcpu: usize) -> u64;

    /// Updates the emulated timer deadline CSR of `vcpu`.
    fn vclint_set_deadline(&self, vm: VmId, vcpu: usize, deadline: u64);

    /// Returns the guest-physical base of the virtual CLINT of `vm`.
    fn vclint_base(&self, vm: VmId) -> u64;

    /// Latches `irq` into the virtual PLIC of `vm` on behalf of `vcpu`.
    fn vplic_accept_intr(&self, vm: VmId, vcpu: usize, irq: u32, level: bool);

    /// Creates the virtual UARTs of `vm`.
    fn init_vuarts(&self, vm: VmId, vuarts: &[VuartConfig]);

    /// Tears down the virtual UARTs of `vm`.
    fn deinit_vuarts(&self, vm: VmId);

    /// Makes `vcpu` of `vm` runnable on physical CPU `pcpu`.
    fn launch_vcpu(&self, vm: VmId, vcpu: usize, pcpu: CpuId);

    /// Switches `vcpu` to the other execution environment.
    fn tee_switch(&self, vm: VmId, vcpu: usize);

    /// Resumes the rich environment waiting on a request `vcpu` just completed.
    fn tee_answer_ree(&self, vm: VmId, vcpu: usize);

    /// Reads the virtual MTRR register `csr`.
    fn read_vmtrr(&self, vm: VmId, vcpu: usize, csr: u32) -> u64;
}

/// Everything the hypervisor core needs from the machine it runs on.
pub trait Platform: Sync {
    type Hart: HartOps;
    type Services: GuestServices;

    /// Returns the hardware operations of the machine.
    fn hart(&self) -> &Self::Hart;

    /// Returns the guest-facing collaborators.
    fn services(&self) -> &Self::Services;
}
