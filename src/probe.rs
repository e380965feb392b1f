// SPDX-License-Identifier: MPL-2.0

//! Host capability probing for hardware-accelerated virtualization.
//!
//! A probe never fails: whatever cannot be proven usable is reported as
//! unusable, and the launch falls back to full software emulation.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use serde::Serialize;

use crate::{
    arch::HostArch,
    profile::{Acceleration, ArchitectureProfile, KvmCheck},
    warn_msg,
};

/// The KVM device node.
pub const KVM_DEVICE: &str = "/dev/kvm";

/// The helper that reports 32-bit EL1 support, relative to the images root.
pub const EL1_HELPER_RELPATH: &str = "utils/aarch64_32_bit_el1_supported";

/// The result of running an external capability check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    Supported,
    Unsupported,
    /// The check itself could not run, e.g. the device is missing or not
    /// accessible.
    Unavailable,
}

impl ProbeOutcome {
    /// Map a helper exit code: 0 is supported, 1 is unsupported and
    /// anything else (including death by signal) means the probe failed.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ProbeOutcome::Supported,
            Some(1) => ProbeOutcome::Unsupported,
            _ => ProbeOutcome::Unavailable,
        }
    }

    pub fn is_supported(&self) -> bool {
        *self == ProbeOutcome::Supported
    }
}

pub trait CapabilityProbe {
    fn host_arch(&self) -> HostArch;

    fn kvm_device_present(&self) -> bool;

    /// Whether the host CPU advertises `svm` or `vmx`.
    fn cpu_has_virt_flags(&self) -> bool;

    /// Whether KVM can run 32-bit EL1 guests on an aarch64 host.
    fn aarch32_el1(&self) -> ProbeOutcome;
}

/// Probes the machine this program runs on.
pub struct SystemProbe {
    el1_helper: PathBuf,
}

impl SystemProbe {
    pub fn new(images_root: impl AsRef<Path>) -> Self {
        Self {
            el1_helper: images_root.as_ref().join(EL1_HELPER_RELPATH),
        }
    }
}

impl CapabilityProbe for SystemProbe {
    fn host_arch(&self) -> HostArch {
        HostArch::current()
    }

    fn kvm_device_present(&self) -> bool {
        Path::new(KVM_DEVICE).exists()
    }

    fn cpu_has_virt_flags(&self) -> bool {
        match fs::read_to_string("/proc/cpuinfo") {
            Ok(cpuinfo) => cpuinfo_has_virt_flags(&cpuinfo),
            Err(err) => {
                debug!("Cannot read /proc/cpuinfo: {}", err);
                false
            }
        }
    }

    fn aarch32_el1(&self) -> ProbeOutcome {
        let status = Command::new(&self.el1_helper)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => ProbeOutcome::from_exit_code(status.code()),
            Err(err) => {
                debug!("Cannot run {}: {}", self.el1_helper.display(), err);
                ProbeOutcome::Unavailable
            }
        }
    }
}

fn cpuinfo_has_virt_flags(cpuinfo: &str) -> bool {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("flags"))
        .flat_map(|line| line.split_whitespace())
        .any(|flag| flag == "svm" || flag == "vmx")
}

/// The acceleration a launch will use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct AccelDecision {
    pub enabled: bool,
}

/// Decide whether KVM may be used for `profile` on the probed host.
pub fn decide(
    profile: &ArchitectureProfile,
    probe: &dyn CapabilityProbe,
    disabled: bool,
) -> AccelDecision {
    let off = AccelDecision { enabled: false };
    if disabled {
        debug!("KVM disabled on request");
        return off;
    }
    let Acceleration::Kvm { host, check, .. } = profile.acceleration else {
        return off;
    };
    if probe.host_arch() != host {
        debug!(
            "KVM needs a {:?} host for {}, running on {:?}",
            host,
            profile.arch,
            probe.host_arch()
        );
        return off;
    }
    if !probe.kvm_device_present() {
        debug!("{} is not present", KVM_DEVICE);
        return off;
    }
    let enabled = match check {
        KvmCheck::None => true,
        KvmCheck::CpuVirtFlags => probe.cpu_has_virt_flags(),
        KvmCheck::Aarch32El1 => {
            let outcome = probe.aarch32_el1();
            if !outcome.is_supported() {
                warn_msg!(
                    "32-bit EL1 probe reported {:?}, falling back to emulation",
                    outcome
                );
            }
            outcome.is_supported()
        }
    };
    AccelDecision { enabled }
}
