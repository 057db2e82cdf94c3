// Copyright (c) 2021 by Rivos Inc.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Rust SBI message parsing.
//! `SbiMessage` is an enum of all the SBI extensions the hypervisor recognizes.
//! For each extension, a function enum is defined to contain the SBI function data.
#![no_std]

mod base;
mod consts;
mod error;
mod function;
mod ipi;
mod message;
mod mpxy;
mod rfence;
mod timer;

pub use base::*;
pub use consts::*;
pub use error::*;
pub use function::*;
pub use ipi::*;
pub use message::*;
pub use mpxy::*;
pub use rfence::*;
pub use timer::*;
