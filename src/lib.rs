// SPDX-License-Identifier: MPL-2.0

//! Boot Linux kernels under QEMU, and under User Mode Linux, for testing.

#[macro_use]
extern crate log;

pub mod arch;
pub mod cli;
pub mod config;
pub mod error;
pub mod launch;
pub mod locate;
pub mod probe;
pub mod profile;
pub mod rootfs;
pub mod uml;
pub mod util;
pub mod version;

#[doc(hidden)]
pub use owo_colors;
