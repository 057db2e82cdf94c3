// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use arrayvec::ArrayVec;
use core::ops::Range;
use core::sync::atomic::{AtomicU64, Ordering};
use log::info;
use memoffset::offset_of;
use static_assertions::const_assert_eq;
use sync::{Mutex, RwLock, RwLockReadGuard};

use crate::config::*;
use crate::platform::{self, DtbInfo, GuestServices, KernelInfo, MemProt};
use crate::vm_cpu::{VmCpu, VmCpuStatus, World};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The VM is in a state the requested transition doesn't start from.
    InvalidState(VmState),
    /// The kernel image doesn't carry the RISC-V boot image magic.
    BadKernelImage,
    /// The configuration names more vCPUs than a VM can hold.
    TooManyVcpus,
    /// The I/O request slot is out of range.
    InvalidIoreqSlot(usize),
    /// A collaborator failed while building the VM.
    Platform(platform::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<platform::Error> for Error {
    fn from(error: platform::Error) -> Error {
        Error::Platform(error)
    }
}

/// Index of a VM in the VM table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct VmId(usize);

impl VmId {
    /// The service VM.
    pub const SERVICE: VmId = VmId(0);
    /// The companion of the service VM.
    pub const COMPANION: VmId = VmId(1);

    /// Returns the ID for `raw` if such a VM exists.
    pub fn new(raw: usize) -> Option<Self> {
        (raw < MAX_VMS).then_some(VmId(raw))
    }

    // Callers index the VM table, so `raw` is below `MAX_VMS`.
    pub(crate) const fn from_index(raw: usize) -> Self {
        VmId(raw)
    }

    /// Returns the raw index of the VM.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// Lifecycle state of a VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmState {
    PoweredOff,
    Created,
    Running,
    Paused,
}

// RISC-V Linux boot image header.
#[repr(C)]
struct KernelHeader {
    code0: u32,
    code1: u32,
    text_offset: u64,
    image_size: u64,
    flags: u64,
    version: u32,
    res1: u32,
    res2: u64,
    magic0: u64,
    magic1: u32,
    res3: u32,
}

const KERNEL_HEADER_SIZE: usize = core::mem::size_of::<KernelHeader>();
const_assert_eq!(KERNEL_HEADER_SIZE, 64);

const RV64_IMAGE_MAGIC0: u64 = 0x5643534952;
const RV64_IMAGE_MAGIC1: u32 = 0x05435352;

fn header_u64(raw: &[u8; KERNEL_HEADER_SIZE], offset: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&raw[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn header_u32(raw: &[u8; KERNEL_HEADER_SIZE], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Checks the boot image header at the start of the kernel. Returns the text offset the image
/// is loaded at, which is always 0.
fn parse_kernel_header<S: GuestServices + ?Sized>(services: &S, kinfo: &KernelInfo) -> Result<u64> {
    let mut raw = [0u8; KERNEL_HEADER_SIZE];
    services.read_image(kinfo.kernel_addr, &mut raw)?;
    let magic0 = header_u64(&raw, offset_of!(KernelHeader, magic0));
    let magic1 = header_u32(&raw, offset_of!(KernelHeader, magic1));
    if magic0 != RV64_IMAGE_MAGIC0 || magic1 != RV64_IMAGE_MAGIC1 {
        return Err(Error::BadKernelImage);
    }
    // The image is placed at the start of guest memory; the header's text offset is ignored.
    let text_offset = 0;
    info!(
        "kernel image at {:#x}, header text offset {:#x}, using {:#x}",
        kinfo.kernel_addr,
        header_u64(&raw, offset_of!(KernelHeader, text_offset)),
        text_offset
    );
    Ok(text_offset)
}

/// Guest-physical layout of a VM's kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KernelLayout {
    pub kernel_addr: u64,
    pub kernel_len: u64,
    pub text_offset: u64,
    pub mem_start_gpa: u64,
    pub mem_size_gpa: u64,
    pub load_addr: u64,
    pub entry: u64,
}

impl KernelLayout {
    fn new(kinfo: &KernelInfo, text_offset: u64) -> Self {
        // Guest memory is identity mapped over the kernel image.
        let mem_start_gpa = kinfo.kernel_addr;
        let load_addr = mem_start_gpa + text_offset;
        Self {
            kernel_addr: kinfo.kernel_addr,
            kernel_len: kinfo.kernel_len,
            text_offset,
            mem_start_gpa,
            mem_size_gpa: kinfo.kernel_len,
            load_addr,
            entry: load_addr,
        }
    }
}

/// Guest-physical layout of a VM's device tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DtbLayout {
    pub dtb_addr: u64,
    pub dtb_len: u64,
    pub dtb_start_gpa: u64,
    pub dtb_size_gpa: u64,
}

impl From<&DtbInfo> for DtbLayout {
    fn from(dinfo: &DtbInfo) -> Self {
        Self {
            dtb_addr: dinfo.dtb_addr,
            dtb_len: dinfo.dtb_len,
            dtb_start_gpa: dinfo.dtb_addr,
            dtb_size_gpa: dinfo.dtb_len,
        }
    }
}

// Software record of a VM, guarded by the lifecycle lock.
#[derive(Debug)]
struct VmInner {
    state: VmState,
    kernel: KernelLayout,
    dtb: DtbLayout,
    is_polling_ioreq: bool,
    passthrough_irqs: Option<Range<u32>>,
}

impl VmInner {
    const fn new() -> Self {
        Self {
            state: VmState::PoweredOff,
            kernel: KernelLayout {
                kernel_addr: 0,
                kernel_len: 0,
                text_offset: 0,
                mem_start_gpa: 0,
                mem_size_gpa: 0,
                load_addr: 0,
                entry: 0,
            },
            dtb: DtbLayout {
                dtb_addr: 0,
                dtb_len: 0,
                dtb_start_gpa: 0,
                dtb_size_gpa: 0,
            },
            is_polling_ioreq: false,
            passthrough_irqs: None,
        }
    }
}

/// A virtual machine. VMs live for the lifetime of the hypervisor and cycle through
/// `PoweredOff -> Created -> Running -> Paused` as they are created, started, paused, reset and
/// shut down. Every transition runs under the VM's lifecycle lock.
pub struct Vm {
    id: VmId,
    config: &'static VmConfig,
    inner: Mutex<VmInner>,
    vcpus: RwLock<ArrayVec<VmCpu, MAX_VCPUS_PER_VM>>,
    pending_ioreqs: AtomicU64,
}

impl Vm {
    /// Returns a powered-off VM for table slot `id`.
    pub fn new(id: VmId) -> Self {
        Self::with_config(id, &VM_CONFIGS[id.raw()])
    }

    /// Returns a powered-off VM in slot `id` described by `config`.
    pub fn with_config(id: VmId, config: &'static VmConfig) -> Self {
        Self {
            id,
            config,
            inner: Mutex::new(VmInner::new()),
            vcpus: RwLock::new(ArrayVec::new()),
            pending_ioreqs: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> VmId {
        self.id
    }

    pub fn config(&self) -> &'static VmConfig {
        self.config
    }

    pub fn state(&self) -> VmState {
        self.inner.lock().state
    }

    /// Returns the vCPUs of the VM, indexed by vCPU ID.
    pub fn vcpus(&self) -> RwLockReadGuard<ArrayVec<VmCpu, MAX_VCPUS_PER_VM>> {
        self.vcpus.read()
    }

    /// Returns the number of vCPUs created for the VM.
    pub fn created_vcpus(&self) -> usize {
        self.vcpus.read().len()
    }

    /// Returns the kernel layout recorded at creation.
    pub fn kernel_layout(&self) -> KernelLayout {
        self.inner.lock().kernel
    }

    /// Returns the device tree layout recorded at creation.
    pub fn dtb_layout(&self) -> DtbLayout {
        self.inner.lock().dtb
    }

    /// Returns the host interrupt lines routed to this VM.
    pub fn passthrough_irqs(&self) -> Option<Range<u32>> {
        self.inner.lock().passthrough_irqs.clone()
    }

    /// Returns true if the VM polls for I/O request completion instead of taking an upcall.
    pub fn is_polling_ioreq(&self) -> bool {
        self.inner.lock().is_polling_ioreq
    }

    pub fn is_service_vm(&self) -> bool {
        self.config.load_order == LoadOrder::Service
    }

    pub fn is_prelaunched_vm(&self) -> bool {
        self.config.load_order == LoadOrder::PreLaunched
    }

    pub fn is_postlaunched_vm(&self) -> bool {
        self.config.load_order == LoadOrder::PostLaunched
    }

    pub fn is_created_vm(&self) -> bool {
        self.state() == VmState::Created
    }

    pub fn is_paused_vm(&self) -> bool {
        self.state() == VmState::Paused
    }

    pub fn is_poweroff_vm(&self) -> bool {
        self.state() == VmState::PoweredOff
    }

    /// Returns true if guest access to the MTRR CSRs is denied.
    pub fn vm_hide_mtrr(&self) -> bool {
        self.config.guest_flags().contains(GuestFlag::HideMtrr)
    }

    /// Returns the world new vCPUs of this VM boot into.
    fn boot_world(&self) -> World {
        if self.config.guest_flags().contains(GuestFlag::Tee) {
            World::Tee
        } else {
            World::Ree
        }
    }

    /// Marks I/O request `slot` as pending.
    pub fn post_ioreq(&self, slot: usize) -> Result<()> {
        let bit = Self::ioreq_bit(slot)?;
        self.pending_ioreqs.fetch_or(bit, Ordering::AcqRel);
        Ok(())
    }

    /// Marks I/O request `slot` as completed.
    pub fn complete_ioreq(&self, slot: usize) -> Result<()> {
        let bit = Self::ioreq_bit(slot)?;
        self.pending_ioreqs.fetch_and(!bit, Ordering::AcqRel);
        Ok(())
    }

    /// Returns the set of pending I/O request slots.
    pub fn pending_ioreqs(&self) -> u64 {
        self.pending_ioreqs.load(Ordering::Acquire)
    }

    fn ioreq_bit(slot: usize) -> Result<u64> {
        if slot >= u64::BITS as usize {
            return Err(Error::InvalidIoreqSlot(slot));
        }
        Ok(1 << slot)
    }

    /// Builds the VM from its configuration: stage-2 table, guest memory, kernel and device tree,
    /// interrupt controllers, vCPUs and UARTs. Fails with `BadKernelImage` before touching guest
    /// memory if the kernel isn't a RISC-V boot image.
    pub fn create<S: GuestServices + ?Sized>(&self, services: &S) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != VmState::PoweredOff {
            return Err(Error::InvalidState(inner.state));
        }
        *inner = VmInner::new();
        let mut vcpus = self.vcpus.write();
        vcpus.clear();
        self.pending_ioreqs.store(0, Ordering::Release);

        let id = self.id;
        info!("vm{}: init stage 2 translation table", id.raw());
        services.s2pt_init(id)?;

        let kinfo = services.kernel_info(id);
        let dinfo = services.dtb_info(id);
        info!(
            "vm{}: kernel addr {:#x} size {:#x}",
            id.raw(),
            kinfo.kernel_addr,
            kinfo.kernel_len
        );
        let text_offset = parse_kernel_header(services, &kinfo)?;
        let kernel = KernelLayout::new(&kinfo, text_offset);
        let dtb = DtbLayout::from(&dinfo);

        info!("vm{}: allocate memory for guest", id.raw());
        services.s2pt_add_mr(
            id,
            kernel.mem_start_gpa,
            kernel.mem_start_gpa,
            kernel.mem_size_gpa,
            MemProt::Read | MemProt::Write | MemProt::Exec,
        )?;
        info!(
            "vm{}: loading kernel from {:#x} to {:#x} - {:#x}",
            id.raw(),
            kernel.kernel_addr,
            kernel.load_addr,
            kernel.load_addr.wrapping_add(kernel.kernel_len)
        );
        services.copy_to_gpa(id, kernel.kernel_addr, kernel.load_addr, kernel.kernel_len)?;
        info!(
            "vm{}: loading DTB to {:#x} - {:#x}",
            id.raw(),
            dtb.dtb_start_gpa,
            dtb.dtb_start_gpa.wrapping_add(dtb.dtb_size_gpa)
        );
        services.copy_to_gpa(id, dtb.dtb_addr, dtb.dtb_start_gpa, dtb.dtb_size_gpa)?;

        if self.is_service_vm() {
            info!("vm{}: passthru devices", id.raw());
            services.s2pt_add_mr(
                id,
                SOS_DEVICE_MMIO_START,
                SOS_DEVICE_MMIO_START,
                SOS_DEVICE_MMIO_SIZE,
                MemProt::Read | MemProt::Write,
            )?;
            services.s2pt_del_mr(id, CLINT_BASE, CLINT_SIZE)?;
            inner.passthrough_irqs = Some(SOS_PASSTHROUGH_IRQS);
        }

        services.vclint_init(id);
        services.vplic_init(id);

        let world = self.boot_world();
        for (vcpu_id, &pcpu) in self.config.cpu_affinity.iter().enumerate() {
            vcpus
                .try_push(VmCpu::new(vcpu_id, pcpu, world, kernel.entry, dtb.dtb_start_gpa))
                .map_err(|_| Error::TooManyVcpus)?;
            info!("vm{}: created vcpu{} on cpu{}", id.raw(), vcpu_id, pcpu.raw());
        }

        if !self.is_service_vm() {
            // I/O completion is polled; the completion upcall races with UART passthrough.
            inner.is_polling_ioreq = true;
        }

        services.init_vuarts(id, self.config.vuarts);
        inner.kernel = kernel;
        inner.dtb = dtb;
        inner.state = VmState::Created;
        Ok(())
    }

    /// Moves a created VM to running and launches every vCPU on its physical CPU.
    pub fn start<S: GuestServices + ?Sized>(&self, services: &S) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != VmState::Created {
            return Err(Error::InvalidState(inner.state));
        }
        inner.state = VmState::Running;
        for vcpu in self.vcpus.read().iter() {
            vcpu.set_status(VmCpuStatus::Running);
            services.launch_vcpu(self.id, vcpu.vcpu_id(), vcpu.pcpu());
        }
        Ok(())
    }

    /// Pauses a running VM, turning its boot vCPU into a zombie.
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != VmState::Running {
            return Err(Error::InvalidState(inner.state));
        }
        if let Some(vcpu) = self.vcpus.read().first() {
            vcpu.set_status(VmCpuStatus::Zombie);
        }
        inner.state = VmState::Paused;
        Ok(())
    }

    /// Returns a paused VM to the created state and drops its pending I/O requests. A powered-off
    /// VM has to go through `create` again.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != VmState::Paused {
            return Err(Error::InvalidState(inner.state));
        }
        self.pending_ioreqs.store(0, Ordering::Release);
        inner.state = VmState::Created;
        Ok(())
    }

    /// Powers off a running or paused VM. Shutting down a powered-off VM succeeds without doing
    /// anything.
    pub fn shutdown<S: GuestServices + ?Sized>(&self, services: &S) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            VmState::PoweredOff => Ok(()),
            VmState::Running | VmState::Paused => {
                inner.state = VmState::PoweredOff;
                if let Some(vcpu) = self.vcpus.read().first() {
                    vcpu.set_status(VmCpuStatus::Offline);
                }
                services.deinit_vuarts(self.id);
                Ok(())
            }
            state => Err(Error::InvalidState(state)),
        }
    }
}
