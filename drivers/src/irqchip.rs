// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

/// Errors reported by an interrupt controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The interrupt line is not implemented by the controller.
    InvalidIrq(u32),
}

/// Holds the result of an interrupt controller operation.
pub type Result<T> = core::result::Result<T, Error>;

/// Operations the IRQ layer needs from a platform-level interrupt controller. Implementations
/// serialize register access internally, so every method takes `&self`.
pub trait IrqChip: Sync {
    /// Returns the controller's name for diagnostics.
    fn name(&self) -> &'static str;

    /// Sets the priority of `irq`.
    fn set_priority(&self, irq: u32, priority: u32) -> Result<()>;

    /// Sets the priority threshold below which interrupts are masked.
    fn set_threshold(&self, threshold: u32);

    /// Unmasks `irq`.
    fn enable(&self, irq: u32) -> Result<()>;

    /// Masks `irq`.
    fn disable(&self, irq: u32) -> Result<()>;

    /// Claims the highest-priority pending interrupt, if any.
    fn claim(&self) -> Option<u32>;

    /// Signals completion of a previously claimed interrupt.
    fn complete(&self, irq: u32) -> Result<()>;
}
