// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use crate::config::{VmConfig, MAX_VMS, VM_CONFIGS};
use crate::irq::IrqTable;
use crate::notify::Notifier;
use crate::platform::Platform;
use crate::vm::{self, Vm, VmId};

/// The hypervisor core: the VM table plus the per-machine interrupt and notification state,
/// running on top of the platform `P`.
pub struct Hypervisor<P: Platform> {
    platform: P,
    notifier: Notifier,
    irqs: IrqTable,
    vms: [Vm; MAX_VMS],
}

impl<P: Platform> Hypervisor<P> {
    /// Creates a hypervisor with every VM powered off and every interrupt line disabled.
    pub fn new(platform: P) -> Self {
        Self::with_configs(platform, &VM_CONFIGS)
    }

    /// Creates a hypervisor whose VMs are described by `configs` instead of the board table.
    pub fn with_configs(platform: P, configs: &'static [VmConfig; MAX_VMS]) -> Self {
        Self {
            platform,
            notifier: Notifier::new(),
            irqs: IrqTable::new(),
            vms: core::array::from_fn(|i| Vm::with_config(VmId::from_index(i), &configs[i])),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Returns the hardware operations of the machine.
    pub fn hart(&self) -> &P::Hart {
        self.platform.hart()
    }

    /// Returns the guest-facing collaborators.
    pub fn services(&self) -> &P::Services {
        self.platform.services()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn irqs(&self) -> &IrqTable {
        &self.irqs
    }

    pub fn vm(&self, id: VmId) -> &Vm {
        &self.vms[id.raw()]
    }

    /// Returns every VM, in ID order.
    pub fn vms(&self) -> impl Iterator<Item = &Vm> {
        self.vms.iter()
    }

    /// Builds VM `id` from its configuration.
    pub fn create_vm(&self, id: VmId) -> vm::Result<()> {
        self.vm(id).create(self.services())
    }

    /// Launches every vCPU of a created VM.
    pub fn start_vm(&self, id: VmId) -> vm::Result<()> {
        self.vm(id).start(self.services())
    }

    pub fn pause_vm(&self, id: VmId) -> vm::Result<()> {
        self.vm(id).pause()
    }

    pub fn reset_vm(&self, id: VmId) -> vm::Result<()> {
        self.vm(id).reset()
    }

    pub fn shutdown_vm(&self, id: VmId) -> vm::Result<()> {
        self.vm(id).shutdown(self.services())
    }
}
