// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Host stand-ins for the hardware and guest collaborators, recording every call made to them.

use core::cell::Cell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use drivers::{clint, irqchip, Clint, CpuId, CpuMask, IrqChip, MAX_CPUS};
use flagset::FlagSet;
use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;
use sync::Mutex;

use crate::config::{
    GuestFlag, LoadOrder, Severity, VmConfig, VuartConfig, CLINT_BASE, MAX_VMS,
};
use crate::hypervisor::Hypervisor;
use crate::platform::{self, DtbInfo, GuestServices, HartOps, KernelInfo, MemProt, Platform};
use crate::vm::VmId;

pub const KERNEL_ADDR: u64 = 0x8020_0000;
pub const KERNEL_LEN: u64 = 0x20_0000;
pub const DTB_ADDR: u64 = 0x8220_0000;
pub const DTB_LEN: u64 = 0x1_0000;

pub const MOCK_MVENDORID: u64 = 0x5b7;
pub const MOCK_MARCHID: u64 = 0x8000_0000_0000_0007;
pub const MOCK_MIMPID: u64 = 0x2;
pub const MOCK_MTRR_CAP: u64 = 0x5_0000_0508;

/// A call made to the mock platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    S2ptInit(usize),
    S2ptAddMr {
        vm: usize,
        hpa: u64,
        gpa: u64,
        size: u64,
        prot: FlagSet<MemProt>,
    },
    S2ptDelMr {
        vm: usize,
        gpa: u64,
        size: u64,
    },
    CopyToGpa {
        vm: usize,
        hpa: u64,
        gpa: u64,
        len: u64,
    },
    WriteGuest {
        vm: usize,
        gpa: u64,
        bytes: Vec<u8>,
    },
    VclintInit(usize),
    VplicInit(usize),
    VclintSendIpi {
        vm: usize,
        vcpu: usize,
    },
    VclintWriteTmr {
        vm: usize,
        vcpu: usize,
        deadline: u64,
    },
    VplicAcceptIntr {
        vm: usize,
        vcpu: usize,
        irq: u32,
    },
    InitVuarts(usize),
    DeinitVuarts(usize),
    LaunchVcpu {
        vm: usize,
        vcpu: usize,
        pcpu: usize,
    },
    TeeSwitch {
        vm: usize,
        vcpu: usize,
    },
    TeeAnswerRee {
        vm: usize,
        vcpu: usize,
    },
    ReadVmtrr(u32),
    WriteStimecmp(u64),
    ClearMip(u64),
    SetDeadline(u64),
    HvTimer,
    Softirq,
    FlushGuestTlb,
    FlushTlbAddr(u64),
    FlushTlbAsid(u64),
    FlushTlbAddrAsid(u64, u64),
    InvalidateIcache,
    SendSwi(usize),
}

/// An operation performed on the mock interrupt controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChipCall {
    SetPriority(u32, u32),
    SetThreshold(u32),
    Enable(u32),
    Disable(u32),
    Complete(u32),
}

/// Interrupt controller whose pending lines are a queue filled by the test.
pub struct MockIrqChip {
    pending: Mutex<VecDeque<u32>>,
    log: Mutex<Vec<ChipCall>>,
}

impl MockIrqChip {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Makes `irq` claimable.
    pub fn raise(&self, irq: u32) {
        self.pending.lock().push_back(irq);
    }

    pub fn pending(&self) -> Vec<u32> {
        self.pending.lock().iter().copied().collect()
    }

    pub fn log(&self) -> Vec<ChipCall> {
        self.log.lock().clone()
    }

    fn record(&self, irq: u32, call: ChipCall) -> irqchip::Result<()> {
        if irq == 0 || irq >= 1024 {
            return Err(irqchip::Error::InvalidIrq(irq));
        }
        self.log.lock().push(call);
        Ok(())
    }
}

impl IrqChip for MockIrqChip {
    fn name(&self) -> &'static str {
        "mock-irqchip"
    }

    fn set_priority(&self, irq: u32, priority: u32) -> irqchip::Result<()> {
        self.record(irq, ChipCall::SetPriority(irq, priority))
    }

    fn set_threshold(&self, threshold: u32) {
        self.log.lock().push(ChipCall::SetThreshold(threshold));
    }

    fn enable(&self, irq: u32) -> irqchip::Result<()> {
        self.record(irq, ChipCall::Enable(irq))
    }

    fn disable(&self, irq: u32) -> irqchip::Result<()> {
        self.record(irq, ChipCall::Disable(irq))
    }

    fn claim(&self) -> Option<u32> {
        self.pending.lock().pop_front()
    }

    fn complete(&self, irq: u32) -> irqchip::Result<()> {
        self.record(irq, ChipCall::Complete(irq))
    }
}

std::thread_local! {
    static CURRENT_CPU: Cell<usize> = const { Cell::new(0) };
}

/// Makes the calling thread act as `cpu`.
pub fn set_current_cpu(cpu: CpuId) {
    CURRENT_CPU.with(|c| c.set(cpu.raw()));
}

/// Hardware and collaborators for host tests. Every thread is CPU 0 unless it calls
/// `set_current_cpu`; CPUs 0-3 are online.
pub struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    clint: Clint,
    irqchip: MockIrqChip,
    online: AtomicU64,
    sstc: AtomicBool,
    kernel_header: Mutex<[u8; 64]>,
    vclint_deadline: AtomicU64,
    fail_guest_writes: AtomicBool,
    swi: [AtomicBool; MAX_CPUS],
}

impl MockPlatform {
    pub fn new() -> Self {
        let clint_mem = Box::leak(std::vec![0u64; clint::CLINT_SIZE / 8].into_boxed_slice());
        // Safety: the leaked buffer covers the whole register window and is never freed.
        let clint = unsafe { Clint::new(NonNull::new(clint_mem.as_mut_ptr().cast()).unwrap()) };
        let mut kernel_header = [0u8; 64];
        kernel_header[48..56].copy_from_slice(&0x5643534952u64.to_le_bytes());
        kernel_header[56..60].copy_from_slice(&0x05435352u32.to_le_bytes());
        Self {
            calls: Mutex::new(Vec::new()),
            clint,
            irqchip: MockIrqChip::new(),
            online: AtomicU64::new(0b1111),
            sstc: AtomicBool::new(false),
            kernel_header: Mutex::new(kernel_header),
            vclint_deadline: AtomicU64::new(0),
            fail_guest_writes: AtomicBool::new(false),
            swi: core::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// Returns every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn irqchip_mock(&self) -> &MockIrqChip {
        &self.irqchip
    }

    pub fn set_online(&self, cpus: CpuMask) {
        self.online.store(cpus.raw(), Ordering::SeqCst);
    }

    pub fn set_sstc(&self, enabled: bool) {
        self.sstc.store(enabled, Ordering::SeqCst);
    }

    /// Overwrites the kernel header at `offset` with the little-endian bytes of `value`.
    pub fn patch_kernel_header(&self, offset: usize, value: u64) {
        let mut header = self.kernel_header.lock();
        let end = (offset + 8).min(header.len());
        header[offset..end].copy_from_slice(&value.to_le_bytes()[..end - offset]);
    }

    pub fn set_vclint_deadline(&self, deadline: u64) {
        self.vclint_deadline.store(deadline, Ordering::SeqCst);
    }

    pub fn vclint_deadline_value(&self) -> u64 {
        self.vclint_deadline.load(Ordering::SeqCst)
    }

    pub fn fail_guest_writes(&self) {
        self.fail_guest_writes.store(true, Ordering::SeqCst);
    }

    /// Consumes a software interrupt sent to `cpu`.
    pub fn take_swi(&self, cpu: CpuId) -> bool {
        self.swi[cpu.raw()].swap(false, Ordering::SeqCst)
    }
}

impl HartOps for MockPlatform {
    fn cpu_id(&self) -> CpuId {
        CpuId::new(CURRENT_CPU.with(|c| c.get()))
    }

    fn cpu_online(&self, cpu: CpuId) -> bool {
        CpuMask::from_raw(self.online.load(Ordering::SeqCst)).contains(cpu)
    }

    fn clint(&self) -> &Clint {
        &self.clint
    }

    fn irqchip(&self) -> &dyn IrqChip {
        &self.irqchip
    }

    fn send_swi(&self, cpu: CpuId) {
        self.record(Call::SendSwi(cpu.raw()));
        self.clint.set_msip(cpu);
        self.swi[cpu.raw()].store(true, Ordering::SeqCst);
    }

    fn mvendorid(&self) -> u64 {
        MOCK_MVENDORID
    }

    fn marchid(&self) -> u64 {
        MOCK_MARCHID
    }

    fn mimpid(&self) -> u64 {
        MOCK_MIMPID
    }

    fn has_sstc(&self) -> bool {
        self.sstc.load(Ordering::SeqCst)
    }

    fn write_stimecmp(&self, deadline: u64) {
        self.record(Call::WriteStimecmp(deadline));
    }

    fn clear_mip(&self, mask: u64) {
        self.record(Call::ClearMip(mask));
    }

    fn set_deadline(&self, deadline: u64) {
        self.record(Call::SetDeadline(deadline));
    }

    fn hv_timer_handler(&self) {
        self.record(Call::HvTimer);
    }

    fn do_softirq(&self) {
        self.record(Call::Softirq);
    }

    fn flush_guest_tlb_local(&self) {
        self.record(Call::FlushGuestTlb);
    }

    fn flush_tlb_addr(&self, addr: u64) {
        self.record(Call::FlushTlbAddr(addr));
    }

    fn flush_tlb_asid(&self, asid: u64) {
        self.record(Call::FlushTlbAsid(asid));
    }

    fn flush_tlb_addr_asid(&self, addr: u64, asid: u64) {
        self.record(Call::FlushTlbAddrAsid(addr, asid));
    }

    fn invalidate_icache_local(&self) {
        self.record(Call::InvalidateIcache);
    }
}

impl GuestServices for MockPlatform {
    fn kernel_info(&self, _vm: VmId) -> KernelInfo {
        KernelInfo {
            kernel_addr: KERNEL_ADDR,
            kernel_len: KERNEL_LEN,
        }
    }

    fn dtb_info(&self, _vm: VmId) -> DtbInfo {
        DtbInfo {
            dtb_addr: DTB_ADDR,
            dtb_len: DTB_LEN,
        }
    }

    fn read_image(&self, hpa: u64, buf: &mut [u8]) -> platform::Result<()> {
        let header = self.kernel_header.lock();
        if hpa != KERNEL_ADDR || buf.len() > header.len() {
            return Err(platform::Error::ImageRead { hpa });
        }
        buf.copy_from_slice(&header[..buf.len()]);
        Ok(())
    }

    fn copy_to_gpa(&self, vm: VmId, hpa: u64, gpa: u64, len: u64) -> platform::Result<()> {
        self.record(Call::CopyToGpa {
            vm: vm.raw(),
            hpa,
            gpa,
            len,
        });
        Ok(())
    }

    fn write_guest(&self, vm: VmId, gpa: u64, bytes: &[u8]) -> platform::Result<()> {
        if self.fail_guest_writes.load(Ordering::SeqCst) {
            return Err(platform::Error::GuestWrite { gpa });
        }
        self.record(Call::WriteGuest {
            vm: vm.raw(),
            gpa,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn s2pt_init(&self, vm: VmId) -> platform::Result<()> {
        self.record(Call::S2ptInit(vm.raw()));
        Ok(())
    }

    fn s2pt_add_mr(
        &self,
        vm: VmId,
        hpa: u64,
        gpa: u64,
        size: u64,
        prot: FlagSet<MemProt>,
    ) -> platform::Result<()> {
        self.record(Call::S2ptAddMr {
            vm: vm.raw(),
            hpa,
            gpa,
            size,
            prot,
        });
        Ok(())
    }

    fn s2pt_del_mr(&self, vm: VmId, gpa: u64, size: u64) -> platform::Result<()> {
        self.record(Call::S2ptDelMr {
            vm: vm.raw(),
            gpa,
            size,
        });
        Ok(())
    }

    fn vclint_init(&self, vm: VmId) {
        self.record(Call::VclintInit(vm.raw()));
    }

    fn vplic_init(&self, vm: VmId) {
        self.record(Call::VplicInit(vm.raw()));
    }

    fn vclint_send_ipi(&self, vm: VmId, vcpu: usize) {
        self.record(Call::VclintSendIpi { vm: vm.raw(), vcpu });
    }

    fn vclint_write_tmr(&self, vm: VmId, vcpu: usize, deadline: u64) {
        self.record(Call::VclintWriteTmr {
            vm: vm.raw(),
            vcpu,
            deadline,
        });
    }

    fn vclint_deadline(&self, _vm: VmId, _vcpu: usize) -> u64 {
        self.vclint_deadline_value()
    }

    fn vclint_set_deadline(&self, _vm: VmId, _vcpu: usize, deadline: u64) {
        self.set_vclint_deadline(deadline);
    }

    fn vclint_base(&self, _vm: VmId) -> u64 {
        CLINT_BASE
    }

    fn vplic_accept_intr(&self, vm: VmId, vcpu: usize, irq: u32, _level: bool) {
        self.record(Call::VplicAcceptIntr {
            vm: vm.raw(),
            vcpu,
            irq,
        });
    }

    fn init_vuarts(&self, vm: VmId, _vuarts: &[VuartConfig]) {
        self.record(Call::InitVuarts(vm.raw()));
    }

    fn deinit_vuarts(&self, vm: VmId) {
        self.record(Call::DeinitVuarts(vm.raw()));
    }

    fn launch_vcpu(&self, vm: VmId, vcpu: usize, pcpu: CpuId) {
        self.record(Call::LaunchVcpu {
            vm: vm.raw(),
            vcpu,
            pcpu: pcpu.raw(),
        });
    }

    fn tee_switch(&self, vm: VmId, vcpu: usize) {
        self.record(Call::TeeSwitch { vm: vm.raw(), vcpu });
    }

    fn tee_answer_ree(&self, vm: VmId, vcpu: usize) {
        self.record(Call::TeeAnswerRee { vm: vm.raw(), vcpu });
    }

    fn read_vmtrr(&self, _vm: VmId, _vcpu: usize, csr: u32) -> u64 {
        self.record(Call::ReadVmtrr(csr));
        MOCK_MTRR_CAP
    }
}

impl Platform for MockPlatform {
    type Hart = Self;
    type Services = Self;

    fn hart(&self) -> &Self {
        self
    }

    fn services(&self) -> &Self {
        self
    }
}

const CPU0: [CpuId; 1] = [CpuId::new(0)];
const CPUS_0_2_3: [CpuId; 3] = [CpuId::new(0), CpuId::new(2), CpuId::new(3)];

const COMPANION_VM: VmConfig = VmConfig {
    name: "test companion VM",
    load_order: LoadOrder::PostLaunched,
    severity: Severity::StandardVm,
    flags: &[GuestFlag::Tee],
    companion_vm: 0,
    cpu_affinity: &CPU0,
    vuarts: &[],
};

/// A service VM with vCPUs 0, 1 and 2 on CPUs 0, 2 and 3.
pub static MULTI_VCPU_VMS: [VmConfig; MAX_VMS] = [
    VmConfig {
        name: "test service VM",
        load_order: LoadOrder::Service,
        severity: Severity::ServiceVm,
        flags: &[GuestFlag::Ree],
        companion_vm: 1,
        cpu_affinity: &CPUS_0_2_3,
        vuarts: &[],
    },
    COMPANION_VM,
];

/// A service VM that may not access the MTRR CSRs.
pub static HIDDEN_MTRR_VMS: [VmConfig; MAX_VMS] = [
    VmConfig {
        name: "test service VM",
        load_order: LoadOrder::Service,
        severity: Severity::ServiceVm,
        flags: &[GuestFlag::Ree, GuestFlag::HideMtrr],
        companion_vm: 1,
        cpu_affinity: &CPU0,
        vuarts: &[],
    },
    COMPANION_VM,
];

/// Returns a hypervisor on a fresh mock platform with a valid kernel image.
pub fn mock_hypervisor() -> Hypervisor<MockPlatform> {
    Hypervisor::new(MockPlatform::new())
}

/// Returns a hypervisor on a fresh mock platform running the VMs described by `configs`.
pub fn mock_hypervisor_with(configs: &'static [VmConfig; MAX_VMS]) -> Hypervisor<MockPlatform> {
    Hypervisor::with_configs(MockPlatform::new(), configs)
}
