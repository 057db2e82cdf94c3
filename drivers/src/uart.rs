// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use core::ptr::NonNull;
use s_mode_utils::print::{Console, ConsoleDriver};
use sync::Mutex;

// Transmit holding register and line status register of a 16550a.
const UART_THR: usize = 0;
const UART_LSR: usize = 5;
const LSR_THR_EMPTY: u8 = 1 << 5;

/// Driver for a standard 16550a UART used as the hypervisor console.
pub struct UartDriver {
    base_address: Mutex<NonNull<u8>>,
}

impl UartDriver {
    /// Creates a driver for the UART at `base_address`.
    ///
    /// # Safety
    ///
    /// `base_address` must point to the 8 registers of a 16550a UART (or memory standing in for
    /// them) that nothing else accesses for the lifetime of the driver.
    pub const unsafe fn new(base_address: NonNull<u8>) -> Self {
        Self {
            base_address: Mutex::new(base_address),
        }
    }

    /// Makes this UART the system console.
    pub fn set_as_console(&'static self) {
        Console::set_driver(self);
    }
}

impl ConsoleDriver for UartDriver {
    /// Write an entire byte sequence to this UART.
    fn write_bytes(&self, bytes: &[u8]) {
        let base_address = self.base_address.lock();
        for &b in bytes {
            // Safety: the caller of ::new() had to guarantee that the given address belongs to an
            // actual UART and that nobody else is using it, thereby making this defined behavior.
            unsafe {
                let lsr = base_address.as_ptr().add(UART_LSR);
                while core::ptr::read_volatile(lsr) & LSR_THR_EMPTY == 0 {
                    core::hint::spin_loop();
                }
                core::ptr::write_volatile(base_address.as_ptr().add(UART_THR), b);
            }
        }
    }
}

// Safety: Access to the pointer to the UART's registers is guarded by a Mutex and the UartDriver
// API guarantees that it is used safely.
unsafe impl Send for UartDriver {}
unsafe impl Sync for UartDriver {}
