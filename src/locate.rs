// SPDX-License-Identifier: MPL-2.0

//! Locating the kernel image, its device tree, its configuration and its
//! debug symbols on disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::{Error, Result},
    profile::{ArchitectureProfile, BootDirConvention},
};

/// The `CONFIG_NR_CPUS` assumed when no kernel configuration is found.
pub const DEFAULT_NR_CPUS: usize = 8;

/// Kernel configuration files relative to the build directory: in-tree,
/// three levels up from `arch/*/boot`, and TuxMake-style output.
const CONFIG_CANDIDATES: &[&str] = &[".config", "../../../.config", "config"];

const VMLINUX_CANDIDATES: &[&str] = &["vmlinux", "../../../vmlinux"];

lazy_static! {
    static ref NR_CPUS: Regex = Regex::new(r"(?m)^CONFIG_NR_CPUS=(\d+)\s*$").unwrap();
}

/// Find the kernel image for `profile` from a user-supplied location.
///
/// `location` may be the image itself or a kernel build directory.
pub fn kernel(location: &Path, profile: &ArchitectureProfile) -> Result<PathBuf> {
    let names_image = location
        .file_name()
        .is_some_and(|name| name == profile.kernel_image);
    let kernel = if names_image || location.is_file() {
        location.to_path_buf()
    } else {
        match profile.boot_dir {
            BootDirConvention::RootOfBuildTree => location.join(profile.kernel_image),
            BootDirConvention::ArchBootSubdirectory => location
                .join("arch")
                .join(profile.kernel_arch)
                .join("boot")
                .join(profile.kernel_image),
        }
    };

    if !kernel.is_file() {
        return Err(Error::KernelNotFound(kernel));
    }
    debug!("Kernel image: {}", kernel.display());
    Ok(kernel)
}

/// Find the device tree blob `name` that belongs to `kernel`.
///
/// In-tree builds keep blobs in `arch/*/boot/dts/`; other build systems put
/// a `dtbs/` directory next to the image.
pub fn device_tree(kernel: &Path, name: &str) -> Result<PathBuf> {
    let parent = kernel.parent().unwrap_or_else(|| Path::new("."));
    let dir = if parent.file_name().is_some_and(|dir| dir == "boot") {
        "dts"
    } else {
        "dtbs"
    };
    let dtb = parent.join(dir).join(name);
    if !dtb.is_file() {
        return Err(Error::DeviceTreeNotFound {
            name: name.to_owned(),
            path: dtb,
        });
    }
    Ok(dtb)
}

fn build_dir(location: &Path) -> &Path {
    if location.is_file() {
        location.parent().unwrap_or_else(|| Path::new("."))
    } else {
        location
    }
}

fn first_existing(dir: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// The kernel configuration that belongs to `location`, if one can be found.
pub fn kernel_config(location: &Path) -> Option<PathBuf> {
    first_existing(build_dir(location), CONFIG_CANDIDATES)
}

/// The uncompressed kernel with debug symbols, used by the debugger.
pub fn vmlinux(location: &Path) -> PathBuf {
    let dir = build_dir(location);
    first_existing(dir, VMLINUX_CANDIDATES).unwrap_or_else(|| dir.join("vmlinux"))
}

/// `CONFIG_NR_CPUS` from the kernel configuration.
pub fn config_nr_cpus(location: &Path) -> usize {
    let Some(config) = kernel_config(location) else {
        return DEFAULT_NR_CPUS;
    };
    match fs::read_to_string(&config) {
        Ok(content) => parse_nr_cpus(&content).unwrap_or(DEFAULT_NR_CPUS),
        Err(err) => {
            warn!("Cannot read {}: {}", config.display(), err);
            DEFAULT_NR_CPUS
        }
    }
}

fn parse_nr_cpus(config: &str) -> Option<usize> {
    NR_CPUS
        .captures(config)
        .and_then(|caps| caps[1].parse().ok())
}

/// The `-smp` value: an explicit request wins, otherwise the smaller of the
/// usable host processors and the kernel's `CONFIG_NR_CPUS`.
pub fn smp_value(requested: Option<usize>, location: &Path, host_cpus: usize) -> usize {
    requested.unwrap_or_else(|| host_cpus.min(config_nr_cpus(location)))
}
