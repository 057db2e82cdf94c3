// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Routing of M-, HS- and VS-level interrupts to their handlers.

use log::{debug, error};
use memoffset::offset_of;
use riscv_regs::{mip, GeneralPurposeRegisters, GprIndex, Interrupt, Trap};
use static_assertions::const_assert_eq;

use crate::hypervisor::Hypervisor;
use crate::platform::{HartOps, Platform};

/// Register state saved by the trap entry code. `repr(C)` because it is filled from assembly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TrapFrame {
    pub gprs: GeneralPurposeRegisters,
    pub pc: u64,
}

const_assert_eq!(offset_of!(TrapFrame, pc), 32 * 8);

/// Privilege level an interrupt was taken at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapMode {
    Machine,
    Supervisor,
    VirtualSupervisor,
}

/// M-mode service call that drops a pending supervisor timer interrupt.
pub const M_SERVICE_CLEAR_STIP: u64 = 1;

const NUM_M_HANDLERS: usize = 13;
const NUM_S_HANDLERS: usize = 11;

type IrqHandler<P> = fn(&Hypervisor<P>);

impl<P: Platform> Hypervisor<P> {
    const M_IRQ_HANDLERS: [IrqHandler<P>; NUM_M_HANDLERS] = [
        Self::mexpt_handler,
        Self::mexpt_handler,
        Self::mexpt_handler,
        Self::mswi_handler,
        Self::mexpt_handler,
        Self::mexpt_handler,
        Self::mexpt_handler,
        Self::mtimer_handler,
        Self::mexpt_handler,
        Self::mexpt_handler,
        Self::mexpt_handler,
        Self::handle_mexti,
        Self::mexpt_handler,
    ];

    const S_IRQ_HANDLERS: [IrqHandler<P>; NUM_S_HANDLERS] = [
        Self::sexpt_handler,
        Self::sswi_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::stimer_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::dispatch_interrupt,
        Self::sexpt_handler,
    ];

    const VS_IRQ_HANDLERS: [IrqHandler<P>; NUM_S_HANDLERS] = [
        Self::sexpt_handler,
        Self::vsswi_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::stimer_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::sexpt_handler,
        Self::dispatch_interrupt,
        Self::sexpt_handler,
    ];

    /// Handles the M-mode interrupt with cause code `cause`, then runs pending softirqs.
    pub fn mint_handler(&self, cause: u64) {
        let index = (cause as usize).min(NUM_M_HANDLERS - 1);
        Self::M_IRQ_HANDLERS[index](self);
        self.hart().do_softirq();
    }

    /// Handles the HS-mode interrupt with cause code `cause`.
    pub fn sint_handler(&self, cause: u64) {
        let index = (cause as usize).min(NUM_S_HANDLERS - 1);
        Self::S_IRQ_HANDLERS[index](self);
    }

    /// Handles an interrupt taken while a guest was running.
    pub fn vsint_handler(&self, cause: u64) {
        let index = (cause as usize).min(NUM_S_HANDLERS - 1);
        Self::VS_IRQ_HANDLERS[index](self);
    }

    /// Routes the trap described by the raw `mcause`/`scause` value `cause` taken at `mode`.
    /// Exceptions aren't routed here and are logged.
    pub fn handle_interrupt(&self, mode: TrapMode, cause: u64) {
        match Trap::from_cause(cause) {
            Ok(Trap::Interrupt(irq)) => match mode {
                TrapMode::Machine => self.mint_handler(irq.code()),
                TrapMode::Supervisor => self.sint_handler(irq.code()),
                TrapMode::VirtualSupervisor => self.vsint_handler(irq.code()),
            },
            Ok(Trap::Exception(e)) => error!("{:?} exception routed as interrupt", e),
            Err(e) => error!("unknown trap cause {:#x}: {:?}", cause, e),
        }
    }

    /// Handles an M-mode service call from S-mode. The call number is in a0.
    pub fn m_service(&self, frame: &mut TrapFrame) {
        if frame.gprs.reg(GprIndex::A0) == M_SERVICE_CLEAR_STIP {
            self.hart().clear_mip(mip::stimer.mask << mip::stimer.shift);
            frame.pc += 4;
        }
    }

    fn mexpt_handler(&self) {
        error!("unsupported M-mode interrupt");
    }

    fn mswi_handler(&self) {
        let hart = self.hart();
        hart.clint().clear_msip(hart.cpu_id());
        self.handle_swi();
    }

    fn mtimer_handler(&self) {
        let hart = self.hart();
        hart.clint().disable_timer(hart.cpu_id());
        hart.clear_mip(mip::mtimer.mask << mip::mtimer.shift);
        hart.hv_timer_handler();
    }

    fn sexpt_handler(&self) {
        error!("unsupported S-mode interrupt");
    }

    fn sswi_handler(&self) {
        self.handle_swi();
    }

    fn stimer_handler(&self) {
        self.hart().set_deadline(u64::MAX);
        self.hart().hv_timer_handler();
    }

    fn vsswi_handler(&self) {
        debug!(
            "virtual software interrupt on cpu{}",
            self.hart().cpu_id().raw()
        );
    }
}

// Keep the table sizes in step with the interrupt causes they cover.
const_assert_eq!(
    Interrupt::SupervisorGuestExternal as usize,
    NUM_M_HANDLERS - 1
);
const_assert_eq!(
    Interrupt::VirtualSupervisorExternal as usize,
    NUM_S_HANDLERS - 1
);
