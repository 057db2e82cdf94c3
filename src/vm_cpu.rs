// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use drivers::CpuId;
use riscv_regs::{GeneralPurposeRegisters, GprIndex};
use sbi::SbiReturn;
use sync::Mutex;

use crate::vcsr::{init_csr_emulation, CsrBitmap};

/// Execution environments a vCPU can run in. Each has its own saved context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum World {
    Ree = 0,
    Tee = 1,
}

impl World {
    fn index(self) -> usize {
        self as usize
    }
}

const NUM_WORLDS: usize = 2;

/// Run state of a vCPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmCpuStatus {
    /// Created but not yet launched.
    Init,
    /// Launched on its physical CPU.
    Running,
    /// Stopped by a VM pause; may not run again until the VM is reset.
    Zombie,
    /// Powered off with its VM.
    Offline,
}

/// Guest register state saved on a trap from one world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuestContext {
    pub gprs: GeneralPurposeRegisters,
    /// Virtual supervisor interrupt-pending bits.
    pub sip: u64,
    pub pc: u64,
}

#[derive(Debug)]
struct VmCpuState {
    contexts: [GuestContext; NUM_WORLDS],
    cur_context: World,
    status: VmCpuStatus,
    mpxy_shmem: Option<u64>,
    csr_bitmap: CsrBitmap,
}

/// A virtual CPU, pinned to one physical CPU for its lifetime.
#[derive(Debug)]
pub struct VmCpu {
    vcpu_id: usize,
    pcpu: CpuId,
    state: Mutex<VmCpuState>,
}

impl VmCpu {
    /// Creates a vCPU that boots `world` at `entry` with its hart ID in a0 and the device tree
    /// address in a1.
    pub fn new(vcpu_id: usize, pcpu: CpuId, world: World, entry: u64, dtb_gpa: u64) -> Self {
        let mut contexts: [GuestContext; NUM_WORLDS] = Default::default();
        let boot = &mut contexts[world.index()];
        boot.pc = entry;
        boot.gprs.set_reg(GprIndex::A0, vcpu_id as u64);
        boot.gprs.set_reg(GprIndex::A1, dtb_gpa);
        let mut csr_bitmap = CsrBitmap::default();
        init_csr_emulation(&mut csr_bitmap);
        Self {
            vcpu_id,
            pcpu,
            state: Mutex::new(VmCpuState {
                contexts,
                cur_context: world,
                status: VmCpuStatus::Init,
                mpxy_shmem: None,
                csr_bitmap,
            }),
        }
    }

    pub fn vcpu_id(&self) -> usize {
        self.vcpu_id
    }

    /// Returns the physical CPU this vCPU runs on.
    pub fn pcpu(&self) -> CpuId {
        self.pcpu
    }

    pub fn status(&self) -> VmCpuStatus {
        self.state.lock().status
    }

    pub fn set_status(&self, status: VmCpuStatus) {
        self.state.lock().status = status;
    }

    /// Returns the world whose context is live.
    pub fn active_world(&self) -> World {
        self.state.lock().cur_context
    }

    /// Makes `world` the live context.
    pub fn set_active_world(&self, world: World) {
        self.state.lock().cur_context = world;
    }

    /// Runs `f` on the saved context of `world`.
    pub fn with_context<R>(&self, world: World, f: impl FnOnce(&mut GuestContext) -> R) -> R {
        f(&mut self.state.lock().contexts[world.index()])
    }

    /// Returns a copy of the live context.
    pub fn context(&self) -> GuestContext {
        let state = self.state.lock();
        state.contexts[state.cur_context.index()].clone()
    }

    /// Returns register `reg` of the live context.
    pub fn gpr(&self, reg: GprIndex) -> u64 {
        let state = self.state.lock();
        state.contexts[state.cur_context.index()].gprs.reg(reg)
    }

    /// Sets register `reg` of the live context.
    pub fn set_gpr(&self, reg: GprIndex, val: u64) {
        let mut state = self.state.lock();
        let world = state.cur_context.index();
        state.contexts[world].gprs.set_reg(reg, val);
    }

    /// Captures the live world and its a0-a7 at an ecall trap.
    pub fn ecall_args(&self) -> (World, [u64; 8]) {
        let state = self.state.lock();
        let world = state.cur_context;
        let mut args = [0; 8];
        args.copy_from_slice(state.contexts[world.index()].gprs.a_regs());
        (world, args)
    }

    /// Writes the result of an ecall to the context of `world` that issued it and steps its pc
    /// past the `ecall`.
    pub fn complete_ecall(&self, world: World, ret: SbiReturn) {
        self.with_context(world, |ctx| {
            ctx.gprs.set_reg(GprIndex::A0, ret.error_code as u64);
            if let Some(value) = ret.return_value {
                ctx.gprs.set_reg(GprIndex::A1, value);
            }
            ctx.pc += 4;
        });
    }

    /// Returns the guest-physical base of the MPXY shared memory, if the guest has set one.
    pub fn mpxy_shmem(&self) -> Option<u64> {
        self.state.lock().mpxy_shmem
    }

    pub fn set_mpxy_shmem(&self, base: u64) {
        self.state.lock().mpxy_shmem = Some(base);
    }

    /// Runs `f` on the CSR interception bitmap.
    pub fn with_csr_bitmap<R>(&self, f: impl FnOnce(&mut CsrBitmap) -> R) -> R {
        f(&mut self.state.lock().csr_bitmap)
    }
}
