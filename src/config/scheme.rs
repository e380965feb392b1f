// SPDX-License-Identifier: MPL-2.0

//! The schemes of the `BootQemu.toml` manifest.
//!
//! A scheme is a partially specified configuration. The top level of the
//! manifest is the base scheme and every `[arch.<name>]` table is a scheme
//! that inherits from it. After inheritance, a scheme is finalized into
//! concrete [`Settings`].

use std::path::PathBuf;

use serde::Deserialize;

use super::unix_args::split_to_kv_array;
use crate::{error::Result, util::Timeout};

/// The debugger used when nothing else selects one.
pub const DEFAULT_GDB_BIN: &str = "gdb-multiarch";

macro_rules! inherit_optional {
    ($from:ident, $to:ident, .$field:ident) => {
        if $to.$field.is_none() {
            $to.$field.clone_from(&$from.$field);
        } else if let Some($field) = &$from.$field {
            if let Some(to) = $to.$field.as_mut() {
                to.inherit($field);
            }
        }
    };
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunScheme {
    pub timeout: Option<String>,
    /// Extra kernel command line arguments.
    pub append: Option<String>,
    pub memory: Option<String>,
    pub smp: Option<usize>,
    /// Never use KVM.
    #[serde(default)]
    pub no_kvm: bool,
}

impl RunScheme {
    pub fn inherit(&mut self, from: &Self) {
        if self.timeout.is_none() {
            self.timeout.clone_from(&from.timeout);
        }
        self.append = match (&from.append, &self.append) {
            (Some(base), Some(own)) => Some(format!("{} {}", base, own)),
            (base, own) => own.clone().or_else(|| base.clone()),
        };
        if self.memory.is_none() {
            self.memory.clone_from(&from.memory);
        }
        if self.smp.is_none() {
            self.smp = from.smp;
        }
        if from.no_kvm {
            self.no_kvm = true;
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QemuScheme {
    /// The additional arguments for running QEMU, in the form of raw
    /// command line arguments.
    pub args: Option<String>,
    /// The path of QEMU, replacing the architecture's `qemu-system-*`.
    pub path: Option<PathBuf>,
}

impl QemuScheme {
    pub fn inherit(&mut self, from: &Self) {
        self.args = match (&from.args, &self.args) {
            (Some(base), Some(own)) => Some(format!("{} {}", base, own)),
            (base, own) => own.clone().or_else(|| base.clone()),
        };
        if self.path.is_none() {
            self.path.clone_from(&from.path);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GdbScheme {
    pub bin: Option<String>,
}

impl GdbScheme {
    pub fn inherit(&mut self, from: &Self) {
        if self.bin.is_none() {
            self.bin.clone_from(&from.bin);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirmwareScheme {
    /// The `-bios` firmware for architectures that need one.
    pub bios: Option<PathBuf>,
}

impl FirmwareScheme {
    pub fn inherit(&mut self, from: &Self) {
        if self.bios.is_none() {
            self.bios.clone_from(&from.bios);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scheme {
    pub run: Option<RunScheme>,
    pub qemu: Option<QemuScheme>,
    pub gdb: Option<GdbScheme>,
    pub firmware: Option<FirmwareScheme>,
}

/// The configuration after inheritance, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub timeout: Timeout,
    pub append: Option<String>,
    pub memory: Option<String>,
    pub smp: Option<usize>,
    pub no_kvm: bool,
    /// User QEMU arguments as key-value strings.
    pub qemu_args: Vec<String>,
    pub qemu_path: Option<PathBuf>,
    pub gdb_bin: String,
    pub bios: Option<PathBuf>,
}

impl Scheme {
    pub fn inherit(&mut self, from: &Self) {
        inherit_optional!(from, self, .run);
        inherit_optional!(from, self, .qemu);
        inherit_optional!(from, self, .gdb);
        inherit_optional!(from, self, .firmware);
    }

    pub fn finalize(self) -> Result<Settings> {
        let run = self.run.unwrap_or_default();
        let qemu = self.qemu.unwrap_or_default();
        let timeout = match run.timeout {
            Some(timeout) => timeout.parse()?,
            None => Timeout::default(),
        };
        let qemu_args = match qemu.args {
            Some(args) => split_to_kv_array(&args)?,
            None => Vec::new(),
        };
        Ok(Settings {
            timeout,
            append: run.append,
            memory: run.memory,
            smp: run.smp,
            no_kvm: run.no_kvm,
            qemu_args,
            qemu_path: qemu.path,
            gdb_bin: self
                .gdb
                .and_then(|gdb| gdb.bin)
                .unwrap_or_else(|| DEFAULT_GDB_BIN.to_owned()),
            bios: self.firmware.and_then(|firmware| firmware.bios),
        })
    }
}
