// SPDX-License-Identifier: MPL-2.0

//! QEMU and Linux version detection.
//!
//! Versions are compared as integer codes with at least six digits: the
//! major version as is, the minor version padded to two digits and the
//! patch level padded to three, so 6.2.50 becomes 602050.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    process::Command,
};

use lazy_static::lazy_static;
use libflate::gzip::Decoder;
use regex::{bytes, Regex};

use crate::error::{Error, Result};

lazy_static! {
    static ref QEMU_VERSION: Regex =
        Regex::new(r"QEMU emulator version (\d+)\.(\d+)\.(\d+)").unwrap();
    static ref LINUX_VERSION: bytes::Regex =
        bytes::Regex::new(r"Linux version (\d+)\.(\d+)\.(\d+)").unwrap();
}

pub fn version_code(major: u32, minor: u32, patch: u32) -> u32 {
    major * 100_000 + minor * 1_000 + patch
}

fn code_from_captures<'a>(mut groups: impl Iterator<Item = &'a [u8]>) -> Option<u32> {
    let mut next = || -> Option<u32> { std::str::from_utf8(groups.next()?).ok()?.parse().ok() };
    Some(version_code(next()?, next()?, next()?))
}

/// The first line of `qemu --version`.
pub fn qemu_version_string(qemu: &Path) -> Result<String> {
    let output = Command::new(qemu)
        .arg("--version")
        .output()
        .map_err(|err| Error::io(format!("Failed to run {}", qemu.display()), err))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_owned())
}

pub fn parse_qemu_version(version: &str) -> Option<u32> {
    let caps = QEMU_VERSION.captures(version)?;
    code_from_captures(caps.iter().skip(1).flatten().map(|m| m.as_str().as_bytes()))
}

/// Find the version banner inside a kernel image.
pub fn parse_linux_version(image: &[u8]) -> Option<u32> {
    let caps = LINUX_VERSION.captures(image)?;
    code_from_captures(caps.iter().skip(1).flatten().map(|m| m.as_bytes()))
}

/// The Linux version of a gzip-compressed kernel image such as `Image.gz`.
pub fn gzip_kernel_version(kernel: &Path) -> Result<Option<u32>> {
    let context = || format!("Failed to decompress {}", kernel.display());
    let file = File::open(kernel).map_err(|err| Error::io(context(), err))?;
    let mut decoder =
        Decoder::new(BufReader::new(file)).map_err(|err| Error::io(context(), err))?;
    let mut image = Vec::new();
    decoder
        .read_to_end(&mut image)
        .map_err(|err| Error::io(context(), err))?;
    Ok(parse_linux_version(&image))
}

/// The arm64 CPU model for full software emulation.
///
/// `linux_version` is only consulted for QEMU 6.2.50 and newer, whose `max`
/// CPU exposes features old kernels cannot boot with.
pub fn arm64_cpu(qemu: Option<u32>, linux_version: impl FnOnce() -> Option<u32>) -> String {
    let mut cpu = String::from("max");
    let Some(qemu) = qemu else {
        return cpu;
    };

    if qemu >= version_code(6, 2, 50) {
        match linux_version() {
            Some(linux) if linux < version_code(4, 16, 0) => cpu = "cortex-a72".to_owned(),
            Some(linux) if linux < version_code(5, 12, 0) => cpu.push_str(",lpa2=off"),
            Some(_) => {}
            None => warn!("Linux version string could not be found in the kernel image"),
        }
    }

    // Pointer authentication with the architected algorithm is slow to emulate.
    if cpu.contains("max") && qemu >= version_code(6, 0, 0) {
        cpu.push_str(",pauth-impdef=true");
    }
    cpu
}
