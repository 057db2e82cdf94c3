// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Static board and VM configuration.

use core::ops::Range;

use drivers::CpuId;
use flagset::{flags, FlagSet};
use static_assertions::const_assert;

/// Number of VMs the hypervisor runs: one service VM and its companion.
pub const MAX_VMS: usize = 2;

/// Maximum number of vCPUs a VM may be configured with.
pub const MAX_VCPUS_PER_VM: usize = 4;

/// Console UART.
pub const UART_BASE: u64 = 0x1000_0000;
pub const UART_IRQ: u32 = 10;

/// Core-local interruptor.
pub const CLINT_BASE: u64 = 0x0200_0000;
pub const CLINT_SIZE: u64 = 0x1_0000;

/// Platform-level interrupt controller.
pub const PLIC_BASE: u64 = 0x0c00_0000;
pub const PLIC_SIZE: u64 = 0x60_0000;

/// Device MMIO window passed through to the service VM.
pub const SOS_DEVICE_MMIO_START: u64 = 0x0800_0000;
pub const SOS_DEVICE_MMIO_SIZE: u64 = 0x0300_0000;

/// Host interrupt lines routed to the service VM.
pub const SOS_PASSTHROUGH_IRQS: Range<u32> = 32..992;

const_assert!(MAX_VCPUS_PER_VM <= drivers::MAX_CPUS);
const_assert!(CLINT_SIZE as usize == drivers::clint::CLINT_SIZE);
const_assert!(PLIC_SIZE as usize >= drivers::plic::PLIC_SIZE);

/// How a VM is brought up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOrder {
    PreLaunched,
    Service,
    PostLaunched,
}

/// Scheduling severity of a VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    StandardVm,
    ServiceVm,
}

flags! {
    /// Per-VM feature flags.
    pub enum GuestFlag: u32 {
        /// The VM runs the rich execution environment.
        Ree = 1 << 0,
        /// The VM runs the trusted execution environment.
        Tee = 1 << 1,
        /// Guest accesses to the MTRR CSRs are denied.
        HideMtrr = 1 << 2,
    }
}

/// Kind of virtual UART.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VuartType {
    Mmio,
}

/// A virtual UART exposed to a VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VuartConfig {
    pub kind: VuartType,
    pub base: u64,
    pub irq: u32,
}

/// Static description of a VM.
#[derive(Debug)]
pub struct VmConfig {
    pub name: &'static str,
    pub load_order: LoadOrder,
    pub severity: Severity,
    pub flags: &'static [GuestFlag],
    /// The VM sharing the physical CPUs with this one across REE/TEE switches.
    pub companion_vm: usize,
    /// Physical CPU of each vCPU, indexed by vCPU ID.
    pub cpu_affinity: &'static [CpuId],
    pub vuarts: &'static [VuartConfig],
}

impl VmConfig {
    /// Returns the feature flags of the VM.
    pub fn guest_flags(&self) -> FlagSet<GuestFlag> {
        self.flags
            .iter()
            .fold(FlagSet::default(), |acc, &flag| acc | flag)
    }
}

const CONSOLE_VUART: [VuartConfig; 1] = [VuartConfig {
    kind: VuartType::Mmio,
    base: UART_BASE,
    irq: UART_IRQ,
}];

const SERVICE_VM_CPUS: [CpuId; 1] = [CpuId::new(0)];
const COMPANION_VM_CPUS: [CpuId; 1] = [CpuId::new(0)];

const_assert!(SERVICE_VM_CPUS.len() <= MAX_VCPUS_PER_VM);
const_assert!(COMPANION_VM_CPUS.len() <= MAX_VCPUS_PER_VM);

/// The VM table, indexed by VM ID. VM 0 is the service VM.
pub static VM_CONFIGS: [VmConfig; MAX_VMS] = [
    VmConfig {
        name: "RISC-V service VM",
        load_order: LoadOrder::Service,
        severity: Severity::ServiceVm,
        flags: &[GuestFlag::Ree],
        companion_vm: 1,
        cpu_affinity: &SERVICE_VM_CPUS,
        vuarts: &CONSOLE_VUART,
    },
    VmConfig {
        name: "RISC-V companion VM",
        load_order: LoadOrder::PostLaunched,
        severity: Severity::StandardVm,
        flags: &[GuestFlag::Tee],
        companion_vm: 0,
        cpu_affinity: &COMPANION_VM_CPUS,
        vuarts: &CONSOLE_VUART,
    },
];
