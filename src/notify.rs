// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Synchronous cross-core function calls over software interrupts.

use core::sync::atomic::{AtomicU64, Ordering};
use drivers::{CpuId, CpuMask, MAX_CPUS};
use log::{debug, error, warn};
use sync::{Mutex, SpinWait};

use crate::hypervisor::Hypervisor;
use crate::platform::{HartOps, Platform};

/// Reasons a core is sent a software interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwiReason {
    /// A vCPU on the core has a pending virtual interrupt.
    NotifyVcpu = 0,
    /// The core has a function to run in its mailbox.
    SmpFuncCall = 1,
}

impl SwiReason {
    fn bit(self) -> u64 {
        1 << self as u64
    }
}

/// Pending software-interrupt reasons of one core.
#[derive(Debug, Default)]
pub struct SwiVector(AtomicU64);

impl SwiVector {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, reason: SwiReason) {
        self.0.fetch_or(reason.bit(), Ordering::AcqRel);
    }

    /// Clears `reason`, returning true if it was pending.
    pub fn test_and_clear(&self, reason: SwiReason) -> bool {
        self.0.fetch_and(!reason.bit(), Ordering::AcqRel) & reason.bit() != 0
    }

    pub fn is_pending(&self, reason: SwiReason) -> bool {
        self.0.load(Ordering::Acquire) & reason.bit() != 0
    }
}

type CallFn = dyn Fn() + Sync;

/// Cross-core call state: a per-core mailbox valid while the core's bit is set in the call mask.
/// At most one broadcast is in flight at a time.
pub struct Notifier {
    call_mask: AtomicU64,
    // The references only live for the duration of one `smp_call_function`; the caller doesn't
    // return until every mailbox it filled has been emptied.
    mailboxes: Mutex<[Option<&'static CallFn>; MAX_CPUS]>,
    swi: [SwiVector; MAX_CPUS],
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            call_mask: AtomicU64::new(0),
            mailboxes: Mutex::new([None; MAX_CPUS]),
            swi: core::array::from_fn(|_| SwiVector::new()),
        }
    }

    /// Returns the cores with an undelivered call.
    pub fn call_mask(&self) -> CpuMask {
        CpuMask::from_raw(self.call_mask.load(Ordering::Acquire))
    }

    /// Returns the software-interrupt reasons pending for `cpu`.
    pub fn swi(&self, cpu: CpuId) -> &SwiVector {
        &self.swi[cpu.raw()]
    }

    /// Runs `func` on every core in `mask`, including the calling core, and returns once all of
    /// them have run it. Offline cores are skipped.
    pub fn smp_call_function<H, F>(&self, hart: &H, mask: CpuMask, func: &F)
    where
        H: HartOps + ?Sized,
        F: Fn() + Sync,
    {
        let func: &(dyn Fn() + Sync) = func;
        // Safety: the reference is only reachable through a mailbox whose core bit is set in
        // `call_mask`. Every such mailbox is emptied before its bit is cleared, and this function
        // doesn't return until `call_mask` is clear, so `func` outlives every use.
        let func = unsafe { core::mem::transmute::<&(dyn Fn() + Sync), &'static CallFn>(func) };

        // Wait for the previous broadcast to drain before claiming the mailboxes.
        let mut wait = SpinWait::new();
        let mut mailboxes = loop {
            let mailboxes = self.mailboxes.lock();
            if self.call_mask.load(Ordering::Acquire) == 0 {
                break mailboxes;
            }
            drop(mailboxes);
            wait.relax();
        };
        self.call_mask.fetch_or(mask.raw(), Ordering::AcqRel);

        let me = hart.cpu_id();
        let mut pending = mask;
        while let Some(cpu) = pending.lowest_set() {
            pending.clear(cpu);
            if cpu == me {
                func();
                self.clear_call(cpu);
            } else if hart.cpu_online(cpu) {
                mailboxes[cpu.raw()] = Some(func);
                self.swi(cpu).set(SwiReason::SmpFuncCall);
                hart.send_swi(cpu);
            } else {
                error!("cpu{} is not online", cpu.raw());
                self.clear_call(cpu);
            }
        }
        drop(mailboxes);

        let mut wait = SpinWait::new();
        let mut reported = false;
        while self.call_mask.load(Ordering::Acquire) != 0 {
            if wait.stalled() && !reported {
                warn!("cross-core call stalled, pending {:#x}", self.call_mask().raw());
                reported = true;
            }
            wait.relax();
        }
    }

    /// Runs the mailbox function of the calling core if a call is pending for it.
    pub fn kick_notification<H: HartOps + ?Sized>(&self, hart: &H) {
        let cpu = hart.cpu_id();
        let mut mailboxes = self.mailboxes.lock();
        if self.call_mask().contains(cpu) {
            if let Some(func) = mailboxes[cpu.raw()].take() {
                func();
            }
            self.clear_call(cpu);
        }
    }

    fn clear_call(&self, cpu: CpuId) {
        self.call_mask
            .fetch_and(!(1 << cpu.raw()), Ordering::AcqRel);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> Hypervisor<P> {
    /// Runs `func` on every core in `mask` and waits for all of them to finish.
    pub fn smp_call_function<F: Fn() + Sync>(&self, mask: CpuMask, func: &F) {
        self.notifier().smp_call_function(self.hart(), mask, func);
    }

    /// Runs the pending cross-core call of the calling core, if any.
    pub fn kick_notification(&self) {
        self.notifier().kick_notification(self.hart());
    }

    /// Records `reason` for `cpu` and rings its doorbell.
    pub fn send_single_swi(&self, cpu: CpuId, reason: SwiReason) {
        self.notifier().swi(cpu).set(reason);
        self.hart().send_swi(cpu);
    }

    /// Handles the software-interrupt reasons pending for the calling core.
    pub fn handle_swi(&self) {
        let swi = self.notifier().swi(self.hart().cpu_id());
        if swi.test_and_clear(SwiReason::NotifyVcpu) {
            debug!("vcpu notification on cpu{}", self.hart().cpu_id().raw());
        }
        if swi.test_and_clear(SwiReason::SmpFuncCall) {
            self.kick_notification();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_hypervisor, set_current_cpu, Call};
    use core::sync::atomic::{AtomicBool, AtomicU32};
    use std::thread;

    #[test]
    fn swi_reasons() {
        let swi = SwiVector::new();
        swi.set(SwiReason::SmpFuncCall);
        assert!(swi.is_pending(SwiReason::SmpFuncCall));
        assert!(!swi.is_pending(SwiReason::NotifyVcpu));
        assert!(swi.test_and_clear(SwiReason::SmpFuncCall));
        assert!(!swi.test_and_clear(SwiReason::SmpFuncCall));
    }

    #[test]
    fn local_only_call_runs_inline() {
        let hv = mock_hypervisor();
        let runs = AtomicU32::new(0);
        hv.smp_call_function(CpuMask::from_raw(1), &|| {
            runs.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(hv.notifier().call_mask().is_empty());
        assert!(!hv
            .platform()
            .calls()
            .iter()
            .any(|c| matches!(c, Call::SendSwi(_))));
    }

    #[test]
    fn offline_targets_are_skipped() {
        let hv = mock_hypervisor();
        hv.platform().set_online(CpuMask::from_raw(0b1));
        let runs = AtomicU32::new(0);
        hv.smp_call_function(CpuMask::from_raw(0b1001), &|| {
            runs.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(hv.notifier().call_mask().is_empty());
    }

    #[test]
    fn broadcast_reaches_every_online_core() {
        let hv = mock_hypervisor();
        let done = AtomicBool::new(false);
        let ran_on = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];
        let record = || {
            let cpu = hv.hart().cpu_id().raw();
            ran_on[cpu].fetch_add(1, Ordering::SeqCst);
        };

        thread::scope(|s| {
            for cpu in 1..3 {
                let hv = &hv;
                let done = &done;
                s.spawn(move || {
                    set_current_cpu(CpuId::new(cpu));
                    while !done.load(Ordering::SeqCst) {
                        if hv.platform().take_swi(CpuId::new(cpu)) {
                            hv.handle_swi();
                        }
                        core::hint::spin_loop();
                    }
                });
            }

            // Core 5 is offline; the call still completes.
            let mask: CpuMask = [0, 1, 2, 5].into_iter().map(CpuId::new).collect();
            hv.smp_call_function(mask, &record);
            assert!(hv.notifier().call_mask().is_empty());
            // The mailboxes are free again right away.
            hv.smp_call_function(CpuMask::from_raw(0b110), &record);
            done.store(true, Ordering::SeqCst);
        });

        assert_eq!(ran_on[0].load(Ordering::SeqCst), 1);
        assert_eq!(ran_on[1].load(Ordering::SeqCst), 2);
        assert_eq!(ran_on[2].load(Ordering::SeqCst), 2);
        assert!(!hv.platform().calls().contains(&Call::SendSwi(5)));
    }

    #[test]
    fn kick_without_pending_call_does_nothing() {
        let hv = mock_hypervisor();
        hv.kick_notification();
        hv.send_single_swi(CpuId::new(0), SwiReason::NotifyVcpu);
        hv.handle_swi();
        assert!(!hv
            .notifier()
            .swi(CpuId::new(0))
            .is_pending(SwiReason::NotifyVcpu));
    }
}
