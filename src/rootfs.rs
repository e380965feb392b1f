// SPDX-License-Identifier: MPL-2.0

//! Preparing the root filesystem, firmware blobs and pre-built emulators
//! that ship compressed in the images root.

use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};

use serde::Serialize;

use crate::{
    config::RunRequest,
    error::{Error, Result},
    profile::Firmware,
};

/// Where Debian and Ubuntu install the OpenSBI build for the `virt` board.
pub const OPENSBI_SYSTEM_PATH: &str = "/usr/lib/riscv64-linux-gnu/opensbi/qemu/virt/fw_jump.elf";

/// The version of the pre-built s390 QEMU distribution.
pub const CBL_QEMU_VERSION: &str = "9.0.0";

const INITRD_NAME: &str = "rootfs.cpio";
const DEBIAN_IMAGE_NAME: &str = "debian.img";

/// The root filesystem handed to the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rootfs {
    /// A cpio archive passed with `-initrd`.
    Initrd(PathBuf),
    /// A raw disk image attached as the first virtio disk.
    Disk(PathBuf),
}

/// Prepare the root filesystem for `request`.
///
/// The initrd is decompressed from its `.zst` archive on every run unless
/// `decompress` is false, in which case only its path is computed.
pub fn provision(request: &RunRequest, decompress: bool) -> Result<Rootfs> {
    let images = request.images_dir();
    if request.debian {
        let image = images.join(DEBIAN_IMAGE_NAME);
        if !image.is_file() {
            return Err(Error::RootfsNotFound(image));
        }
        return Ok(Rootfs::Disk(image));
    }

    let initrd = images.join(INITRD_NAME);
    if decompress {
        decompress_zst(&initrd)?;
    }
    Ok(Rootfs::Initrd(initrd))
}

/// The ext4 image booted by User Mode Linux.
pub fn uml_rootfs(root_dir: &Path) -> Result<PathBuf> {
    let rootfs = root_dir.join("images").join("x86_64").join("rootfs.ext4");
    decompress_zst(&rootfs)?;
    Ok(rootfs)
}

fn zst_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".zst");
    PathBuf::from(name)
}

/// Replace `target` with the decompressed contents of `<target>.zst`.
pub fn decompress_zst(target: &Path) -> Result<()> {
    let archive = zst_path(target);
    if !archive.is_file() {
        return Err(Error::RootfsNotFound(archive));
    }
    if target.exists() {
        fs::remove_file(target)
            .map_err(|err| Error::io(format!("Cannot remove {}", target.display()), err))?;
    }

    debug!("Decompressing {}", archive.display());
    let mut zstd = Command::new("zstd");
    zstd.arg("-q").arg("-d").arg(&archive).arg("-o").arg(target);
    run_checked(zstd)
}

fn run_checked(mut command: Command) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let status = command
        .status()
        .map_err(|err| Error::io(format!("Failed to run {}", program), err))?;
    if !status.success() {
        return Err(Error::io(
            format!("{} failed", program),
            io::Error::other(status.to_string()),
        ));
    }
    Ok(())
}

/// The path passed to `-bios` for `firmware`.
///
/// For OpenSBI, an explicit override wins, then the host-installed build.
/// Failing both, QEMU is asked to use its bundled copy.
pub fn firmware(firmware: Firmware, request: &RunRequest) -> PathBuf {
    match firmware {
        Firmware::ImagesDir(name) => request.images_dir().join(name),
        Firmware::OpenSbi => {
            if let Some(bios) = &request.bios {
                return bios.clone();
            }
            let system = Path::new(OPENSBI_SYSTEM_PATH);
            if system.exists() {
                system.to_path_buf()
            } else {
                PathBuf::from("default")
            }
        }
    }
}

/// The pre-built `qemu-system-s390x` under `<root>/qemu-binaries`.
///
/// When only the archive is present and `extract` is set, it is unpacked in
/// place first.
pub fn cbl_qemu(root_dir: &Path, extract: bool) -> Result<PathBuf> {
    let dir = root_dir.join("qemu-binaries");
    let qemu = dir
        .join(CBL_QEMU_VERSION)
        .join("bin")
        .join("qemu-system-s390x");
    if qemu.is_file() || !extract {
        return Ok(qemu);
    }

    let archive = dir.join(format!("{}.tar.zst", CBL_QEMU_VERSION));
    if !archive.is_file() {
        return Err(Error::io(
            format!("Cannot find a pre-built QEMU at {}", qemu.display()),
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }
    info!("Extracting {}", archive.display());
    let mut tar = Command::new("tar");
    tar.arg("--zstd")
        .arg("-xf")
        .arg(&archive)
        .arg("-C")
        .arg(&dir);
    run_checked(tar)?;
    Ok(qemu)
}
