// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use core::ptr::NonNull;
use log::info;
use riscv_regs::mmio_wmb;
use sync::Mutex;

use crate::irqchip::IrqChip;
pub use crate::irqchip::{Error, Result};

const PLIC_PRIORITY: usize = 0x0;
const PLIC_PENDING: usize = 0x1000;
const PLIC_ENABLE: usize = 0x2000;
const PLIC_THRESHOLD: usize = 0x20_0000;
const PLIC_CLAIM_COMPLETE: usize = 0x20_0004;

// Priorities and the threshold are 3 bits wide.
const PRIORITY_MASK: u32 = 0x7;

/// Number of interrupt sources the PLIC implements; source 0 is reserved.
pub const PLIC_NUM_IRQS: u32 = 1024;

/// Size of the register window used by the driver.
pub const PLIC_SIZE: usize = PLIC_CLAIM_COMPLETE + 4;

struct PlicRegs {
    base: NonNull<u8>,
}

impl PlicRegs {
    fn read32(&self, offset: usize) -> u32 {
        // Safety: offsets computed by the driver are aligned and within `PLIC_SIZE`, which
        // the caller of `Plic::new` guaranteed is mapped.
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset) as *const u32) }
    }

    fn write32(&self, offset: usize, val: u32) {
        // Safety: see `read32`.
        unsafe { core::ptr::write_volatile(self.base.as_ptr().add(offset) as *mut u32, val) }
    }

    fn enable_word(irq: u32) -> (usize, u32) {
        (PLIC_ENABLE + (irq as usize / 32) * 4, 1 << (irq % 32))
    }
}

/// Driver for a SiFive-compatible platform-level interrupt controller. All register access is
/// serialized by a single controller-wide lock.
pub struct Plic {
    regs: Mutex<PlicRegs>,
}

fn check_irq(irq: u32) -> Result<()> {
    if irq == 0 || irq >= PLIC_NUM_IRQS {
        return Err(Error::InvalidIrq(irq));
    }
    Ok(())
}

impl Plic {
    /// Creates a driver for the PLIC mapped at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to at least `PLIC_SIZE` bytes of PLIC registers (or memory standing
    /// in for them) that remain valid and are not accessed by anything else for the lifetime of
    /// the driver.
    pub unsafe fn new(base: NonNull<u8>) -> Self {
        info!("plic base: {:#x} size: {:#x}", base.as_ptr() as usize, PLIC_SIZE);
        Self {
            regs: Mutex::new(PlicRegs { base }),
        }
    }

    /// Returns true if `irq` is pending at the controller.
    pub fn is_pending(&self, irq: u32) -> Result<bool> {
        check_irq(irq)?;
        let regs = self.regs.lock();
        let word = regs.read32(PLIC_PENDING + (irq as usize / 32) * 4);
        Ok(word & (1 << (irq % 32)) != 0)
    }

    /// Returns true if `irq` is unmasked.
    pub fn is_enabled(&self, irq: u32) -> Result<bool> {
        check_irq(irq)?;
        let regs = self.regs.lock();
        let (offset, bit) = PlicRegs::enable_word(irq);
        Ok(regs.read32(offset) & bit != 0)
    }

    /// Returns the programmed priority of `irq`.
    pub fn priority(&self, irq: u32) -> Result<u32> {
        check_irq(irq)?;
        Ok(self.regs.lock().read32(PLIC_PRIORITY + irq as usize * 4))
    }

    /// Returns the programmed priority threshold.
    pub fn threshold(&self) -> u32 {
        self.regs.lock().read32(PLIC_THRESHOLD)
    }
}

impl IrqChip for Plic {
    fn name(&self) -> &'static str {
        "sifive-plic"
    }

    fn set_priority(&self, irq: u32, priority: u32) -> Result<()> {
        check_irq(irq)?;
        let regs = self.regs.lock();
        regs.write32(PLIC_PRIORITY + irq as usize * 4, priority & PRIORITY_MASK);
        Ok(())
    }

    fn set_threshold(&self, threshold: u32) {
        let regs = self.regs.lock();
        regs.write32(PLIC_THRESHOLD, threshold & PRIORITY_MASK);
    }

    fn enable(&self, irq: u32) -> Result<()> {
        check_irq(irq)?;
        let regs = self.regs.lock();
        let (offset, bit) = PlicRegs::enable_word(irq);
        regs.write32(offset, regs.read32(offset) | bit);
        mmio_wmb();
        Ok(())
    }

    fn disable(&self, irq: u32) -> Result<()> {
        check_irq(irq)?;
        let regs = self.regs.lock();
        let (offset, bit) = PlicRegs::enable_word(irq);
        regs.write32(offset, regs.read32(offset) & !bit);
        mmio_wmb();
        Ok(())
    }

    fn claim(&self) -> Option<u32> {
        match self.regs.lock().read32(PLIC_CLAIM_COMPLETE) {
            0 => None,
            irq => Some(irq),
        }
    }

    fn complete(&self, irq: u32) -> Result<()> {
        check_irq(irq)?;
        self.regs.lock().write32(PLIC_CLAIM_COMPLETE, irq);
        Ok(())
    }
}

// Safety: Access to the pointer to the PLIC's registers is guarded by a Mutex and the Plic API
// guarantees that it is used safely.
unsafe impl Send for Plic {}
unsafe impl Sync for Plic {}
