// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The physical machine: CSR, CLINT, PLIC and fence-backed `HartOps`, and the console.

use core::sync::atomic::{AtomicU64, Ordering};
use drivers::{Clint, CpuId, CpuMask, IrqChip, Plic};
use riscv_regs::{fence_i, hfence_vvma, menvcfg, ReadWriteable, Readable, Writeable, CSR};

use crate::platform::{GuestServices, HartOps, Platform};

/// Hypervisor subsystem entry points invoked from interrupt context.
#[derive(Clone, Copy)]
pub struct BoardHooks {
    /// Runs expired hypervisor timers.
    pub timer: fn(),
    /// Runs pending softirqs.
    pub softirq: fn(),
}

/// Hardware operations of the physical harts. The calling CPU's logical ID is kept in
/// `sscratch` by the trap entry code.
pub struct BoardHart {
    clint: Clint,
    plic: Plic,
    online: AtomicU64,
    hooks: BoardHooks,
}

impl BoardHart {
    /// Creates the hart operations over the given interrupt controllers. Only the boot CPU is
    /// online.
    pub fn new(clint: Clint, plic: Plic, hooks: BoardHooks) -> Self {
        Self {
            clint,
            plic,
            online: AtomicU64::new(1),
            hooks,
        }
    }

    /// Marks `cpu` as taking software interrupts.
    pub fn set_online(&self, cpu: CpuId) {
        let mut mask = CpuMask::empty();
        mask.set(cpu);
        self.online.fetch_or(mask.raw(), Ordering::AcqRel);
    }

    pub fn plic(&self) -> &Plic {
        &self.plic
    }
}

impl HartOps for BoardHart {
    fn cpu_id(&self) -> CpuId {
        CpuId::new(CSR.sscratch.get() as usize)
    }

    fn cpu_online(&self, cpu: CpuId) -> bool {
        CpuMask::from_raw(self.online.load(Ordering::Acquire)).contains(cpu)
    }

    fn clint(&self) -> &Clint {
        &self.clint
    }

    fn irqchip(&self) -> &dyn IrqChip {
        &self.plic
    }

    fn mvendorid(&self) -> u64 {
        CSR.mvendorid.get()
    }

    fn marchid(&self) -> u64 {
        CSR.marchid.get()
    }

    fn mimpid(&self) -> u64 {
        CSR.mimpid.get()
    }

    fn has_sstc(&self) -> bool {
        CSR.menvcfg.is_set(menvcfg::stce)
    }

    fn write_stimecmp(&self, deadline: u64) {
        CSR.stimecmp.set(deadline);
    }

    fn clear_mip(&self, mask: u64) {
        CSR.mip.read_and_clear_bits(mask);
    }

    fn set_deadline(&self, deadline: u64) {
        if self.has_sstc() {
            CSR.stimecmp.set(deadline);
        } else {
            self.clint.set_mtimecmp(self.cpu_id(), deadline);
        }
    }

    fn hv_timer_handler(&self) {
        (self.hooks.timer)();
    }

    fn do_softirq(&self) {
        (self.hooks.softirq)();
    }

    fn flush_guest_tlb_local(&self) {
        hfence_vvma(None, None);
    }

    fn flush_tlb_addr(&self, addr: u64) {
        hfence_vvma(Some(addr), None);
    }

    fn flush_tlb_asid(&self, asid: u64) {
        hfence_vvma(None, Some(asid));
    }

    fn flush_tlb_addr_asid(&self, addr: u64, asid: u64) {
        hfence_vvma(Some(addr), Some(asid));
    }

    fn invalidate_icache_local(&self) {
        fence_i();
    }
}

/// The physical machine with the guest collaborators `S`.
pub struct Board<S: GuestServices> {
    hart: BoardHart,
    services: S,
}

impl<S: GuestServices> Board<S> {
    pub fn new(hart: BoardHart, services: S) -> Self {
        Self { hart, services }
    }

    /// Enables Sstc so guests program their own timer through `stimecmp`.
    pub fn enable_sstc(&self) {
        CSR.menvcfg.modify(menvcfg::stce::SET);
    }
}

impl<S: GuestServices> Platform for Board<S> {
    type Hart = BoardHart;
    type Services = S;

    fn hart(&self) -> &BoardHart {
        &self.hart
    }

    fn services(&self) -> &S {
        &self.services
    }
}

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
mod console {
    use core::ptr::NonNull;
    use drivers::UartDriver;
    use log::{LevelFilter, SetLoggerError};

    use crate::config::UART_BASE;

    // Safety: the console UART is mapped at `UART_BASE` and only used through this driver.
    static UART: UartDriver =
        unsafe { UartDriver::new(NonNull::new_unchecked(UART_BASE as usize as *mut u8)) };

    /// Routes `println!` and `log` output to the console UART.
    pub fn init_console(level: LevelFilter) -> Result<(), SetLoggerError> {
        UART.set_as_console();
        s_mode_utils::logger::init(level)
    }
}

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use console::init_console;
