// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Host interrupt descriptors and dispatch of external interrupts claimed from the PLIC.

use drivers::{irqchip, IrqChip};
use flagset::{flags, FlagSet};
use log::{debug, error};
use sync::Mutex;

use crate::hypervisor::Hypervisor;
use crate::platform::{GuestServices, HartOps, Platform};
use crate::vm::VmId;

/// Number of interrupt lines with a descriptor.
pub const NR_IRQS: usize = 1024;

/// Vector of a line that has none assigned.
pub const VECTOR_INVALID: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The line has no descriptor.
    InvalidIrq(u32),
    /// The line already has a handler.
    AlreadyRequested(u32),
    /// The interrupt controller rejected the operation.
    Chip(irqchip::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<irqchip::Error> for Error {
    fn from(error: irqchip::Error) -> Error {
        Error::Chip(error)
    }
}

flags! {
    /// Dispatch state of an interrupt line.
    pub enum IrqStatus: u8 {
        /// The line isn't dispatched to its handler.
        Disabled = 1,
        /// The handler is running.
        InProgress = 2,
    }
}

/// Trigger type of an interrupt line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqType {
    Invalid,
    Level,
    Edge,
}

/// Handler for a host interrupt line.
pub trait IrqAction: Sync {
    fn handle(&self, irq: u32);
}

struct IrqDesc {
    action: Option<&'static dyn IrqAction>,
    vector: u32,
    status: FlagSet<IrqStatus>,
    irq_type: IrqType,
}

impl IrqDesc {
    fn new() -> Self {
        Self {
            action: None,
            vector: VECTOR_INVALID,
            status: IrqStatus::Disabled.into(),
            irq_type: IrqType::Invalid,
        }
    }
}

/// Descriptors for every host interrupt line. Each descriptor has its own lock; handlers run
/// without it held.
pub struct IrqTable {
    descs: [Mutex<IrqDesc>; NR_IRQS],
}

impl IrqTable {
    /// Creates a table with every line disabled, unassigned and of invalid type.
    pub fn new() -> Self {
        Self {
            descs: core::array::from_fn(|_| Mutex::new(IrqDesc::new())),
        }
    }

    fn desc(&self, irq: u32) -> Result<&Mutex<IrqDesc>> {
        self.descs
            .get(irq as usize)
            .ok_or(Error::InvalidIrq(irq))
    }

    /// Installs `action` as the handler of `irq`. The line stays disabled until `enable_irq`.
    pub fn request_irq(&self, irq: u32, action: &'static dyn IrqAction) -> Result<()> {
        let mut desc = self.desc(irq)?.lock();
        if desc.action.is_some() {
            return Err(Error::AlreadyRequested(irq));
        }
        desc.action = Some(action);
        Ok(())
    }

    /// Disables `irq` and removes its handler.
    pub fn free_irq(&self, chip: &dyn IrqChip, irq: u32) -> Result<()> {
        let mut desc = self.desc(irq)?.lock();
        chip.disable(irq)?;
        desc.status |= IrqStatus::Disabled;
        desc.action = None;
        Ok(())
    }

    /// Enables `irq` at the controller and starts dispatching it.
    pub fn enable_irq(&self, chip: &dyn IrqChip, irq: u32) -> Result<()> {
        let mut desc = self.desc(irq)?.lock();
        chip.enable(irq)?;
        desc.status -= IrqStatus::Disabled;
        Ok(())
    }

    /// Masks `irq` at the controller and stops dispatching it.
    pub fn disable_irq(&self, chip: &dyn IrqChip, irq: u32) -> Result<()> {
        let mut desc = self.desc(irq)?.lock();
        chip.disable(irq)?;
        desc.status |= IrqStatus::Disabled;
        Ok(())
    }

    pub fn set_irq_priority(&self, chip: &dyn IrqChip, irq: u32, priority: u32) -> Result<()> {
        let _desc = self.desc(irq)?.lock();
        chip.set_priority(irq, priority)?;
        Ok(())
    }

    /// Sets the priority threshold of the calling hart's context.
    pub fn set_irq_threshold(&self, chip: &dyn IrqChip, threshold: u32) {
        chip.set_threshold(threshold);
    }

    /// Returns the vector assigned to `irq`, or `VECTOR_INVALID`.
    pub fn irq_to_vector(&self, irq: u32) -> u32 {
        self.desc(irq)
            .map(|desc| desc.lock().vector)
            .unwrap_or(VECTOR_INVALID)
    }

    pub fn set_irq_vector(&self, irq: u32, vector: u32) -> Result<()> {
        self.desc(irq)?.lock().vector = vector;
        Ok(())
    }

    pub fn irq_type(&self, irq: u32) -> Result<IrqType> {
        Ok(self.desc(irq)?.lock().irq_type)
    }

    pub fn set_irq_type(&self, irq: u32, irq_type: IrqType) -> Result<()> {
        self.desc(irq)?.lock().irq_type = irq_type;
        Ok(())
    }

    /// Returns the dispatch state of `irq`.
    pub fn status(&self, irq: u32) -> Result<FlagSet<IrqStatus>> {
        Ok(self.desc(irq)?.lock().status)
    }

    /// Runs the handler of a claimed `irq` and signals completion to the controller. A disabled
    /// line is completed without running its handler.
    pub fn do_irq(&self, chip: &dyn IrqChip, irq: u32) {
        let Ok(lock) = self.desc(irq) else {
            error!("claimed IRQ {} has no descriptor", irq);
            return;
        };
        let mut desc = lock.lock();
        if desc.status.contains(IrqStatus::Disabled) {
            debug!("IRQ {} is disabled", irq);
        } else {
            desc.status |= IrqStatus::InProgress;
            let action = desc.action;
            drop(desc);
            if let Some(action) = action {
                action.handle(irq);
            }
            desc = lock.lock();
            desc.status -= IrqStatus::InProgress;
        }
        if let Err(e) = chip.complete(irq) {
            error!("failed to complete IRQ {}: {:?}", irq, e);
        }
    }

    /// Claims and handles interrupts until the controller has none pending.
    pub fn dispatch_interrupt(&self, chip: &dyn IrqChip) {
        while let Some(irq) = chip.claim() {
            debug!("dispatch interrupt: {}", irq);
            self.do_irq(chip, irq);
        }
    }
}

impl Default for IrqTable {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> Hypervisor<P> {
    /// Handles an S-mode external interrupt by dispatching every pending line to its handler.
    pub fn dispatch_interrupt(&self) {
        self.irqs().dispatch_interrupt(self.hart().irqchip());
    }

    /// Handles an M-mode external interrupt by injecting every pending line into the boot vCPU of
    /// the service VM. The lines are completed by the guest through its virtual PLIC.
    pub fn handle_mexti(&self) {
        let chip = self.hart().irqchip();
        while let Some(irq) = chip.claim() {
            debug!("inject interrupt: {}", irq);
            self.services()
                .vplic_accept_intr(VmId::SERVICE, 0, irq, true);
        }
    }
}
