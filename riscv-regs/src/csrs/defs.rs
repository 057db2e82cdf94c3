// Copyright (c) 2022 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

use tock_registers::register_bitfields;

// Machine interrupt pending. The S-mode bits alias `sip`.
register_bitfields![u64,
    pub mip [
        ssoft OFFSET(1) NUMBITS(1) [],
        msoft OFFSET(3) NUMBITS(1) [],
        stimer OFFSET(5) NUMBITS(1) [],
        mtimer OFFSET(7) NUMBITS(1) [],
        sext OFFSET(9) NUMBITS(1) [],
        mext OFFSET(11) NUMBITS(1) [],
    ]
];

// Supervisor interrupt pending.
register_bitfields![u64,
    pub sip [
        ssoft OFFSET(1) NUMBITS(1) [],
        stimer OFFSET(5) NUMBITS(1) [],
        sext OFFSET(9) NUMBITS(1) [],
    ]
];

// Machine environment configuration.
register_bitfields![u64,
    pub menvcfg [
        fiom OFFSET(0) NUMBITS(1) [],
        cbie OFFSET(4) NUMBITS(2) [],
        cbcfe OFFSET(6) NUMBITS(1) [],
        cbze OFFSET(7) NUMBITS(1) [],
        pbmte OFFSET(62) NUMBITS(1) [],
        // Sstc: `stimecmp` is implemented and drives STIP.
        stce OFFSET(63) NUMBITS(1) [],
    ]
];

// Supervisor timer compare.
register_bitfields![u64,
    pub stimecmp [
        deadline OFFSET(0) NUMBITS(64) []
    ]
];

// Scratch register for supervisor use.
register_bitfields![u64,
    pub sscratch [
        val OFFSET(0) NUMBITS(64) []
    ]
];

// Read-only identification registers (mvendorid, marchid, mimpid).
register_bitfields![u64,
    pub ident [
        val OFFSET(0) NUMBITS(64) []
    ]
];

// Trap cause, shared by mcause and scause.
register_bitfields![u64,
    pub cause [
        code OFFSET(0) NUMBITS(63) [],
        is_interrupt OFFSET(63) NUMBITS(1) [],
    ]
];
