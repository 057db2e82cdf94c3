// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! SBI calls made by guests.

use arrayvec::ArrayVec;
use drivers::CpuMask;
use log::debug;
use riscv_regs::sip;
use sbi::{Error as SbiError, Result as SbiResult, *};

use crate::hypervisor::Hypervisor;
use crate::platform::{GuestServices, HartOps, Platform};
use crate::vm::{Vm, VmId};
use crate::vm_cpu::{VmCpu, World};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The trapping vCPU doesn't exist in its VM.
    NoSuchVcpu { vm: VmId, vcpu: usize },
}

pub type Result<T> = core::result::Result<T, Error>;

// What we report ourselves as in sbi_get_sbi_impl_id(). Just pick something unclaimed.
const SBI_IMPL_ID_RVISOR: u64 = 0x5256_4953;
const SBI_IMPL_VERSION_MAJOR: u64 = 0;
const SBI_IMPL_VERSION_MINOR: u64 = 1;

// Report ourselves as being SBI v1.0 compliant.
const SBI_SPEC_MAJOR_VERSION_SHIFT: u64 = 24;
const SBI_SPEC_VERSION: u64 = 1 << SBI_SPEC_MAJOR_VERSION_SHIFT;

const PAGE_SIZE: u64 = 4096;

// Ranged fences covering more pages than this fall back to a full flush.
const RFENCE_MAX_PAGES: u64 = 512;

// Size of the MPXY shared memory window.
const MPXY_SHMEM_SIZE: u64 = PAGE_SIZE;

// Channel list returned by get_channel_ids: remaining, returned, then the channel IDs.
const MPXY_CHANNEL_IDS: [u32; 4] = [0, 2, 0, 1];

// Channel attributes: protocol ID, protocol version, max message length, send and completion
// timeouts, capability flags.
const MPXY_CHANNEL_ATTRS: [u32; 6] = [0, 1, 1024, 100, 100, 0x8];

const MPXY_MAX_WORDS: usize = 8;

impl<P: Platform> Hypervisor<P> {
    /// Handles an ecall from `vcpu_id` of `vm_id`: decodes a0-a7 of the trapping world, runs the
    /// call and writes the result back to that world. The guest pc is stepped past the ecall.
    pub fn handle_ecall(&self, vm_id: VmId, vcpu_id: usize) -> Result<()> {
        let vm = self.vm(vm_id);
        let vcpus = vm.vcpus();
        let vcpu = vcpus.get(vcpu_id).ok_or(Error::NoSuchVcpu {
            vm: vm_id,
            vcpu: vcpu_id,
        })?;
        let (world, args) = vcpu.ecall_args();
        let ret = match SbiMessage::from_regs(&args) {
            Ok(msg) => self.handle_sbi_msg(vm, vcpu, world, msg),
            Err(e) => {
                debug!(
                    "vm{} vcpu{}: unsupported SBI call {:#x}/{:#x}",
                    vm_id.raw(),
                    vcpu_id,
                    args[7],
                    args[6]
                );
                e.into()
            }
        };
        vcpu.complete_ecall(world, ret);
        Ok(())
    }

    fn handle_sbi_msg(&self, vm: &Vm, vcpu: &VmCpu, world: World, msg: SbiMessage) -> SbiReturn {
        match msg {
            SbiMessage::Base(base_func) => self.handle_base_msg(base_func),
            SbiMessage::Timer(TimerFunction::SetTimer(deadline)) => {
                self.handle_set_timer(vm, vcpu, world, deadline).into()
            }
            SbiMessage::Ipi(IpiFunction::SendIpi {
                hart_mask,
                hart_mask_base,
            }) => {
                let harts = HartMask {
                    mask: hart_mask,
                    base: hart_mask_base,
                };
                self.handle_send_ipi(vm, harts).into()
            }
            SbiMessage::RemoteFence(rfence_func) => self.handle_rfence_msg(vm, rfence_func).into(),
            SbiMessage::HartState(_) | SbiMessage::Reset(_) | SbiMessage::Pmu(_) => {
                SbiError::NotSupported.into()
            }
            SbiMessage::Mpxy(mpxy_func) => self.handle_mpxy_msg(vm, vcpu, mpxy_func),
        }
    }

    fn handle_base_msg(&self, base_func: BaseFunction) -> SbiReturn {
        use BaseFunction::*;
        let hart = self.hart();
        let ret = match base_func {
            GetSpecificationVersion => SBI_SPEC_VERSION,
            GetImplementationId => SBI_IMPL_ID_RVISOR,
            GetImplementationVersion => (SBI_IMPL_VERSION_MAJOR << 24) | SBI_IMPL_VERSION_MINOR,
            ProbeSbiExtension(ext) => match ext {
                EXT_BASE | EXT_IPI | EXT_RFENCE | EXT_TIMER | EXT_MPXY => 1,
                _ => 0,
            },
            GetMachineVendorId => hart.mvendorid(),
            GetMachineArchitectureId => hart.marchid(),
            GetMachineImplementationId => hart.mimpid(),
        };
        SbiReturn::value(ret)
    }

    fn handle_set_timer(
        &self,
        vm: &Vm,
        vcpu: &VmCpu,
        world: World,
        deadline: u64,
    ) -> SbiResult<()> {
        let hart = self.hart();
        if hart.has_sstc() {
            hart.write_stimecmp(deadline);
        } else {
            let stip = sip::stimer.mask << sip::stimer.shift;
            vcpu.with_context(world, |ctx| ctx.sip &= !stip);
            hart.clear_mip(stip);
            self.services()
                .vclint_write_tmr(vm.id(), vcpu.vcpu_id(), deadline);
        }
        Ok(())
    }

    fn handle_send_ipi(&self, vm: &Vm, harts: HartMask) -> SbiResult<()> {
        for vcpu_id in target_vcpus(harts, vm.created_vcpus()) {
            self.services().vclint_send_ipi(vm.id(), vcpu_id);
        }
        Ok(())
    }

    fn handle_rfence_msg(&self, vm: &Vm, rfence_func: RfenceFunction) -> SbiResult<()> {
        use RfenceFunction::*;
        let cpus: CpuMask = {
            let vcpus = vm.vcpus();
            target_vcpus(rfence_func.harts(), vcpus.len())
                .filter_map(|vcpu_id| vcpus.get(vcpu_id).map(VmCpu::pcpu))
                .collect()
        };
        let hart = self.hart();
        match rfence_func {
            FenceI(_) => self.smp_call_function(cpus, &|| hart.invalidate_icache_local()),
            SfenceVma { start, size, .. } => self.smp_call_function(cpus, &|| {
                if (start == 0 && size == 0) || size == RFENCE_FLUSH_ALL || too_many_pages(size) {
                    hart.flush_guest_tlb_local();
                } else {
                    for addr in pages(start, size) {
                        hart.flush_tlb_addr(addr);
                    }
                }
            }),
            SfenceVmaAsid {
                start, size, asid, ..
            } => self.smp_call_function(cpus, &|| {
                if start == 0 && size == 0 {
                    hart.flush_guest_tlb_local();
                } else if size == RFENCE_FLUSH_ALL || too_many_pages(size) {
                    hart.flush_tlb_asid(asid);
                } else {
                    for addr in pages(start, size) {
                        hart.flush_tlb_addr_asid(addr, asid);
                    }
                }
            }),
        }
        Ok(())
    }

    fn handle_mpxy_msg(&self, vm: &Vm, vcpu: &VmCpu, mpxy_func: MpxyFunction) -> SbiReturn {
        use MpxyFunction::*;
        match mpxy_func {
            GetShmemSize => SbiReturn::value(MPXY_SHMEM_SIZE),
            SetShmem { base } => {
                vcpu.set_mpxy_shmem(base);
                SbiReturn::success()
            }
            GetChannelIds { .. } => self
                .mpxy_write_words(vm, vcpu, &MPXY_CHANNEL_IDS)
                .map(|_| 0)
                .into(),
            ReadAttributes { .. } => self.mpxy_write_words(vm, vcpu, &MPXY_CHANNEL_ATTRS).into(),
            WriteAttributes { .. } => self.mpxy_shmem(vcpu).map(|_| ()).into(),
            SendMessageWithResponse {
                channel_id,
                message_id,
                ..
            } => self
                .mpxy_send_message(vm, vcpu, channel_id, message_id)
                .into(),
        }
    }

    fn mpxy_send_message(
        &self,
        vm: &Vm,
        vcpu: &VmCpu,
        channel_id: u64,
        message_id: u64,
    ) -> SbiResult<()> {
        let shmem = self.mpxy_shmem(vcpu)?;
        let services = self.services();
        let reqfwd = channel_id & MPXY_CHANNEL_REQFWD != 0;
        if channel_id == 0 || channel_id == 1 {
            services.tee_switch(vm.id(), vcpu.vcpu_id());
        } else if reqfwd && message_id == RPMI_REQFWD_RETRIEVE_MESSAGE {
            services.tee_switch(vm.id(), vcpu.vcpu_id());
        } else if reqfwd && message_id == RPMI_REQFWD_COMPLETE_MESSAGE {
            services.tee_answer_ree(vm.id(), vcpu.vcpu_id());
            let completion = ReqFwdCompletion {
                status: SBI_SUCCESS as i32,
                count: 1,
            };
            services
                .write_guest(vm.id(), shmem, &completion.to_le_bytes())
                .map_err(|_| SbiError::InvalidAddress)?;
        }
        Ok(())
    }

    fn mpxy_shmem(&self, vcpu: &VmCpu) -> SbiResult<u64> {
        vcpu.mpxy_shmem().ok_or(SbiError::NoShmem)
    }

    // Writes `words` in little-endian order to the start of the vCPU's MPXY shared memory.
    fn mpxy_write_words(&self, vm: &Vm, vcpu: &VmCpu, words: &[u32]) -> SbiResult<()> {
        let shmem = self.mpxy_shmem(vcpu)?;
        let mut bytes = ArrayVec::<u8, { MPXY_MAX_WORDS * 4 }>::new();
        for word in words {
            bytes
                .try_extend_from_slice(&word.to_le_bytes())
                .map_err(|_| SbiError::Failed)?;
        }
        self.services()
            .write_guest(vm.id(), shmem, &bytes)
            .map_err(|_| SbiError::InvalidAddress)
    }
}

/// Returns the vCPU IDs selected by `harts`, lowest first, stopping at the first one that is not
/// below `created`.
fn target_vcpus(harts: HartMask, created: usize) -> impl Iterator<Item = usize> {
    CpuMask::from_raw(harts.mask)
        .iter()
        .map(move |bit| harts.base.saturating_add(bit.raw() as u64))
        .take_while(move |&vcpu_id| vcpu_id < created as u64)
        .map(|vcpu_id| vcpu_id as usize)
}

/// Returns the address of every 4 KiB step in `[start, start + size)`.
fn pages(start: u64, size: u64) -> impl Iterator<Item = u64> {
    (0..size)
        .step_by(PAGE_SIZE as usize)
        .map(move |offset| start.wrapping_add(offset))
}

fn too_many_pages(size: u64) -> bool {
    size.div_ceil(PAGE_SIZE) > RFENCE_MAX_PAGES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        mock_hypervisor, mock_hypervisor_with, set_current_cpu, Call, MockPlatform,
        MOCK_MVENDORID, MULTI_VCPU_VMS,
    };
    use crate::vm_cpu::GuestContext;
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use drivers::CpuId;
    use riscv_regs::GprIndex;
    use std::thread;
    use std::vec::Vec;

    const SHMEM: u64 = 0x9000_0000;

    fn setup() -> Hypervisor<MockPlatform> {
        let hv = mock_hypervisor();
        hv.create_vm(VmId::SERVICE).unwrap();
        hv.platform().clear_calls();
        hv
    }

    // Loads `regs` into a0-a7 of vCPU 0, runs the ecall and returns the resulting context.
    fn ecall(hv: &Hypervisor<MockPlatform>, regs: [u64; 8]) -> GuestContext {
        {
            let vcpus = hv.vm(VmId::SERVICE).vcpus();
            for (i, &val) in regs.iter().enumerate() {
                let reg = GprIndex::from_raw(GprIndex::A0 as u32 + i as u32).unwrap();
                vcpus[0].set_gpr(reg, val);
            }
        }
        hv.handle_ecall(VmId::SERVICE, 0).unwrap();
        hv.vm(VmId::SERVICE).vcpus()[0].context()
    }

    fn call(hv: &Hypervisor<MockPlatform>, msg: SbiMessage) -> GuestContext {
        ecall(hv, msg.to_regs())
    }

    fn le_words(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn a0(ctx: &GuestContext) -> i64 {
        ctx.gprs.reg(GprIndex::A0) as i64
    }

    fn a1(ctx: &GuestContext) -> u64 {
        ctx.gprs.reg(GprIndex::A1)
    }

    #[test]
    fn unknown_extension_only_touches_a0_and_pc() {
        let hv = setup();
        let regs = [1, 0xaa, 2, 3, 4, 5, 6, EXT_VENDOR_START];
        let before = {
            let vcpus = hv.vm(VmId::SERVICE).vcpus();
            for (i, &val) in regs.iter().enumerate() {
                let reg = GprIndex::from_raw(GprIndex::A0 as u32 + i as u32).unwrap();
                vcpus[0].set_gpr(reg, val);
            }
            vcpus[0].context()
        };
        let after = ecall(&hv, regs);
        let mut expected = before.clone();
        expected.gprs.set_reg(GprIndex::A0, SBI_ERR_NOT_SUPPORTED as u64);
        expected.pc += 4;
        assert_eq!(after, expected);

        // Unknown function of a known extension.
        let after = ecall(&hv, [0, 0xbb, 0, 0, 0, 0, 9, EXT_BASE]);
        assert_eq!(a0(&after), SBI_ERR_NOT_SUPPORTED);
        assert_eq!(a1(&after), 0xbb);
        assert_eq!(after.pc, before.pc + 8);
    }

    #[test]
    fn missing_vcpu() {
        let hv = setup();
        assert_eq!(
            hv.handle_ecall(VmId::SERVICE, 3),
            Err(Error::NoSuchVcpu {
                vm: VmId::SERVICE,
                vcpu: 3
            })
        );
    }

    #[test]
    fn probe() {
        let hv = setup();
        for ext in [EXT_BASE, EXT_IPI, EXT_RFENCE, EXT_TIMER, EXT_MPXY] {
            let ctx = call(&hv, SbiMessage::Base(BaseFunction::ProbeSbiExtension(ext)));
            assert_eq!(a0(&ctx), 0);
            assert_eq!(a1(&ctx), 1);
        }
        for ext in [EXT_HART_STATE, EXT_RESET, EXT_PMU, EXT_VENDOR_START] {
            let ctx = call(&hv, SbiMessage::Base(BaseFunction::ProbeSbiExtension(ext)));
            assert_eq!(a0(&ctx), 0);
            assert_eq!(a1(&ctx), 0);
        }
    }

    #[test]
    fn base_identification() {
        let hv = setup();
        let ctx = call(&hv, SbiMessage::Base(BaseFunction::GetSpecificationVersion));
        assert_eq!(a1(&ctx), 1 << 24);
        let ctx = call(&hv, SbiMessage::Base(BaseFunction::GetImplementationId));
        assert_eq!(a1(&ctx), SBI_IMPL_ID_RVISOR);
        let ctx = call(&hv, SbiMessage::Base(BaseFunction::GetImplementationVersion));
        assert_eq!(a1(&ctx), SBI_IMPL_VERSION_MINOR);
        let ctx = call(&hv, SbiMessage::Base(BaseFunction::GetMachineVendorId));
        assert_eq!(a1(&ctx), MOCK_MVENDORID);
    }

    #[test]
    fn stub_extensions_not_supported() {
        let hv = setup();
        for ext in [EXT_HART_STATE, EXT_RESET, EXT_PMU] {
            let ctx = ecall(&hv, [0, 0x77, 0, 0, 0, 0, 0, ext]);
            assert_eq!(a0(&ctx), SBI_ERR_NOT_SUPPORTED);
            assert_eq!(a1(&ctx), 0x77);
        }
        assert!(hv.platform().calls().is_empty());
    }

    #[test]
    fn set_timer_without_sstc() {
        let hv = setup();
        {
            let vcpus = hv.vm(VmId::SERVICE).vcpus();
            vcpus[0].with_context(vcpus[0].active_world(), |ctx| ctx.sip = 0x22);
        }
        let ctx = ecall(&hv, [5000, 0x55, 0, 0, 0, 0, 0, EXT_TIMER]);
        assert_eq!(a0(&ctx), 0);
        assert_eq!(a1(&ctx), 0x55);
        assert_eq!(ctx.sip, 0x2);
        assert_eq!(
            hv.platform().calls(),
            [
                Call::ClearMip(0x20),
                Call::VclintWriteTmr {
                    vm: 0,
                    vcpu: 0,
                    deadline: 5000
                }
            ]
        );
    }

    #[test]
    fn set_timer_with_sstc() {
        let hv = setup();
        hv.platform().set_sstc(true);
        let ctx = call(&hv, SbiMessage::Timer(TimerFunction::SetTimer(7000)));
        assert_eq!(a0(&ctx), 0);
        assert_eq!(hv.platform().calls(), [Call::WriteStimecmp(7000)]);
    }

    #[test]
    fn ipi_stops_at_created_vcpus() {
        let hv = setup();
        let created = hv.vm(VmId::SERVICE).created_vcpus();
        let ctx = ecall(&hv, [0b1111, 0, 0, 0, 0, 0, 0, EXT_IPI]);
        assert_eq!(a0(&ctx), 0);
        let ipis = hv
            .platform()
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::VclintSendIpi { vm: 0, .. }))
            .count();
        assert_eq!(ipis, created);

        hv.platform().clear_calls();
        ecall(&hv, [0b1, created as u64, 0, 0, 0, 0, 0, EXT_IPI]);
        assert!(hv.platform().calls().is_empty());
    }

    fn sent_ipis(hv: &Hypervisor<MockPlatform>) -> Vec<usize> {
        hv.platform()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::VclintSendIpi { vm: 0, vcpu } => Some(*vcpu),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn ipi_mask_base_across_vcpus() {
        let hv = mock_hypervisor_with(&MULTI_VCPU_VMS);
        hv.create_vm(VmId::SERVICE).unwrap();
        assert_eq!(hv.vm(VmId::SERVICE).created_vcpus(), 3);

        let send = |mask: u64, base: u64| {
            hv.platform().clear_calls();
            let msg = SbiMessage::Ipi(IpiFunction::SendIpi {
                hart_mask: mask,
                hart_mask_base: base,
            });
            assert_eq!(a0(&call(&hv, msg)), 0);
            sent_ipis(&hv)
        };
        assert_eq!(send(0b101, 0), [0, 2]);
        assert_eq!(send(0b11, 1), [1, 2]);
        // vCPU 3 doesn't exist, so the walk stops there.
        assert_eq!(send(0b111, 1), [1, 2]);
        assert_eq!(send(0b1001, 0), [0]);
        assert!(send(0b1, 3).is_empty());
    }

    #[test]
    fn remote_sfence_runs_on_target_cores() {
        let hv = mock_hypervisor_with(&MULTI_VCPU_VMS);
        hv.create_vm(VmId::SERVICE).unwrap();
        hv.platform().clear_calls();
        let done = AtomicBool::new(false);
        let doorbells = [AtomicU32::new(0), AtomicU32::new(0)];

        let ctx = thread::scope(|s| {
            for (slot, cpu) in [2, 3].into_iter().enumerate() {
                let hv = &hv;
                let done = &done;
                let doorbells = &doorbells;
                s.spawn(move || {
                    set_current_cpu(CpuId::new(cpu));
                    while !done.load(Ordering::SeqCst) {
                        if hv.platform().take_swi(CpuId::new(cpu)) {
                            doorbells[slot].fetch_add(1, Ordering::SeqCst);
                            hv.handle_swi();
                        }
                        core::hint::spin_loop();
                    }
                });
            }

            // vCPUs 1 and 2 live on CPUs 2 and 3; the calling CPU 0 isn't a target.
            let ctx = call(
                &hv,
                SbiMessage::RemoteFence(RfenceFunction::SfenceVma {
                    harts: HartMask { mask: 0b11, base: 1 },
                    start: 0x1000,
                    size: 0x1000,
                }),
            );
            done.store(true, Ordering::SeqCst);
            ctx
        });

        assert_eq!(a0(&ctx), 0);
        assert!(hv.notifier().call_mask().is_empty());
        let calls = hv.platform().calls();
        assert!(calls.contains(&Call::SendSwi(2)));
        assert!(calls.contains(&Call::SendSwi(3)));
        assert!(!calls.contains(&Call::SendSwi(0)));
        let flushes = calls
            .iter()
            .filter(|c| **c == Call::FlushTlbAddr(0x1000))
            .count();
        assert_eq!(flushes, 2);
        assert_eq!(doorbells[0].load(Ordering::SeqCst), 1);
        assert_eq!(doorbells[1].load(Ordering::SeqCst), 1);
    }

    fn rfence(hv: &Hypervisor<MockPlatform>, func: RfenceFunction) -> Vec<Call> {
        hv.platform().clear_calls();
        let ctx = call(hv, SbiMessage::RemoteFence(func));
        assert_eq!(a0(&ctx), 0);
        hv.platform().calls()
    }

    const VCPU0: HartMask = HartMask { mask: 1, base: 0 };

    #[test]
    fn sfence_vma_ranges() {
        let hv = setup();
        let calls = rfence(
            &hv,
            RfenceFunction::SfenceVma {
                harts: VCPU0,
                start: 0x1000,
                size: 0x2001,
            },
        );
        assert_eq!(
            calls,
            [
                Call::FlushTlbAddr(0x1000),
                Call::FlushTlbAddr(0x2000),
                Call::FlushTlbAddr(0x3000)
            ]
        );

        for (start, size) in [(0, 0), (0x4000, RFENCE_FLUSH_ALL), (0x4000, 1 << 40)] {
            let calls = rfence(
                &hv,
                RfenceFunction::SfenceVma {
                    harts: VCPU0,
                    start,
                    size,
                },
            );
            assert_eq!(calls, [Call::FlushGuestTlb]);
        }
    }

    #[test]
    fn sfence_vma_asid_ranges() {
        let hv = setup();
        let func = |start, size| RfenceFunction::SfenceVmaAsid {
            harts: VCPU0,
            start,
            size,
            asid: 9,
        };
        assert_eq!(rfence(&hv, func(0, 0)), [Call::FlushGuestTlb]);
        assert_eq!(
            rfence(&hv, func(0x8000, RFENCE_FLUSH_ALL)),
            [Call::FlushTlbAsid(9)]
        );
        assert_eq!(
            rfence(&hv, func(0x8000, 0x1000)),
            [Call::FlushTlbAddrAsid(0x8000, 9)]
        );
        assert_eq!(
            rfence(&hv, func(0x8000, 1 << 40)),
            [Call::FlushTlbAsid(9)]
        );
    }

    #[test]
    fn ranged_fence_page_limit() {
        let hv = setup();
        let limit = RFENCE_MAX_PAGES * PAGE_SIZE;
        let calls = rfence(
            &hv,
            RfenceFunction::SfenceVma {
                harts: VCPU0,
                start: 0,
                size: limit,
            },
        );
        assert_eq!(calls.len(), RFENCE_MAX_PAGES as usize);
        assert_eq!(calls[0], Call::FlushTlbAddr(0));
        let calls = rfence(
            &hv,
            RfenceFunction::SfenceVma {
                harts: VCPU0,
                start: 0,
                size: limit + 1,
            },
        );
        assert_eq!(calls, [Call::FlushGuestTlb]);
    }

    #[test]
    fn fence_i_and_empty_targets() {
        let hv = setup();
        assert_eq!(
            rfence(&hv, RfenceFunction::FenceI(VCPU0)),
            [Call::InvalidateIcache]
        );
        let nobody = HartMask { mask: 1, base: 8 };
        assert!(rfence(&hv, RfenceFunction::FenceI(nobody)).is_empty());
        let ctx = ecall(&hv, [1, 0, 0, 0, 0, 0, 3, EXT_RFENCE]);
        assert_eq!(a0(&ctx), SBI_ERR_NOT_SUPPORTED);
    }

    #[test]
    fn mpxy_requires_shmem() {
        let hv = setup();
        let ctx = call(&hv, SbiMessage::Mpxy(MpxyFunction::GetShmemSize));
        assert_eq!(a0(&ctx), 0);
        assert_eq!(a1(&ctx), 4096);
        let ctx = call(
            &hv,
            SbiMessage::Mpxy(MpxyFunction::GetChannelIds { start_index: 0 }),
        );
        assert_eq!(a0(&ctx), SBI_ERR_NO_SHMEM);
        assert!(hv.platform().calls().is_empty());
    }

    #[test]
    fn mpxy_channel_discovery() {
        let hv = setup();
        call(&hv, SbiMessage::Mpxy(MpxyFunction::SetShmem { base: SHMEM }));
        let ctx = call(
            &hv,
            SbiMessage::Mpxy(MpxyFunction::GetChannelIds { start_index: 0 }),
        );
        assert_eq!(a0(&ctx), 0);
        assert_eq!(a1(&ctx), 0);
        let ctx = call(
            &hv,
            SbiMessage::Mpxy(MpxyFunction::ReadAttributes {
                channel_id: 0,
                base_attribute_id: 0,
                count: 6,
            }),
        );
        assert_eq!(a0(&ctx), 0);
        assert_eq!(
            hv.platform().calls(),
            [
                Call::WriteGuest {
                    vm: 0,
                    gpa: SHMEM,
                    bytes: le_words(&[0, 2, 0, 1])
                },
                Call::WriteGuest {
                    vm: 0,
                    gpa: SHMEM,
                    bytes: le_words(&[0, 1, 1024, 100, 100, 8])
                },
            ]
        );
        let ctx = call(
            &hv,
            SbiMessage::Mpxy(MpxyFunction::WriteAttributes {
                channel_id: 0,
                base_attribute_id: 0,
                count: 1,
            }),
        );
        assert_eq!(a0(&ctx), 0);
        assert_eq!(hv.platform().calls().len(), 2);
    }

    #[test]
    fn mpxy_bad_shmem_address() {
        let hv = setup();
        call(&hv, SbiMessage::Mpxy(MpxyFunction::SetShmem { base: SHMEM }));
        hv.platform().fail_guest_writes();
        let ctx = call(
            &hv,
            SbiMessage::Mpxy(MpxyFunction::GetChannelIds { start_index: 0 }),
        );
        assert_eq!(a0(&ctx), SBI_ERR_INVALID_ADDRESS);
    }

    fn send(hv: &Hypervisor<MockPlatform>, channel_id: u64, message_id: u64) -> Vec<Call> {
        hv.platform().clear_calls();
        let ctx = call(
            hv,
            SbiMessage::Mpxy(MpxyFunction::SendMessageWithResponse {
                channel_id,
                message_id,
                message_len: 0,
            }),
        );
        assert_eq!(a0(&ctx), 0);
        hv.platform().calls()
    }

    #[test]
    fn mpxy_send_message_routing() {
        let hv = setup();
        call(&hv, SbiMessage::Mpxy(MpxyFunction::SetShmem { base: SHMEM }));
        let switch = Call::TeeSwitch { vm: 0, vcpu: 0 };
        assert_eq!(send(&hv, 0, 0x42), [switch.clone()]);
        assert_eq!(send(&hv, 1, 0x42), [switch.clone()]);
        assert_eq!(
            send(&hv, MPXY_CHANNEL_REQFWD | 1, RPMI_REQFWD_RETRIEVE_MESSAGE),
            [switch]
        );
        assert_eq!(
            send(&hv, MPXY_CHANNEL_REQFWD | 1, RPMI_REQFWD_COMPLETE_MESSAGE),
            [
                Call::TeeAnswerRee { vm: 0, vcpu: 0 },
                Call::WriteGuest {
                    vm: 0,
                    gpa: SHMEM,
                    bytes: std::vec![0, 0, 0, 0, 1, 0, 0, 0]
                }
            ]
        );
        assert!(send(&hv, 2, RPMI_REQFWD_RETRIEVE_MESSAGE).is_empty());
        assert!(send(&hv, MPXY_CHANNEL_REQFWD, 0x7).is_empty());
    }
}
