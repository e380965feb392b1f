// SPDX-License-Identifier: MPL-2.0

//! This module is responsible for parsing the configuration manifest and combining it with
//! command-line parameters to obtain the final [`RunRequest`]. The precedence, from the
//! strongest, is: command line (and the environment variables clap maps onto it), the
//! `[arch.<name>]` table of the manifest, the top level of the manifest, built-in defaults.

pub mod scheme;
pub mod unix_args;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use self::{
    scheme::{FirmwareScheme, GdbScheme, QemuScheme, RunScheme, Scheme},
    unix_args::{get_key, split_to_kv_array},
};
use crate::{
    arch::Arch,
    cli::RunArgs,
    error::{Error, Result},
    util::Timeout,
};

/// The manifest file looked up in the root directory.
pub const MANIFEST_FILE: &str = "BootQemu.toml";

/// The top level of `BootQemu.toml`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlManifest {
    pub run: Option<RunScheme>,
    pub qemu: Option<QemuScheme>,
    pub gdb: Option<GdbScheme>,
    pub firmware: Option<FirmwareScheme>,
    /// Per-architecture overrides.
    #[serde(default)]
    pub arch: BTreeMap<String, Scheme>,
}

impl TomlManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|err| Error::io(format!("Cannot read file {}", path.display()), err))?;
        let manifest: Self = toml::from_str(&contents).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            message: err.message().to_owned(),
        })?;
        for name in manifest.arch.keys() {
            if name.parse::<Arch>().is_err() {
                return Err(Error::Config {
                    path: path.to_path_buf(),
                    message: format!("`arch.{}` is not a supported architecture", name),
                });
            }
        }
        Ok(manifest)
    }

    /// The scheme for `arch` after inheriting from the top level.
    pub fn scheme_for(mut self, arch: Arch) -> Scheme {
        let base = Scheme {
            run: self.run,
            qemu: self.qemu,
            gdb: self.gdb,
            firmware: self.firmware,
        };
        match self.arch.remove(arch.name()) {
            Some(mut scheme) => {
                scheme.inherit(&base);
                scheme
            }
            None => base,
        }
    }
}

/// Everything the user asked for in one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub arch: Arch,
    pub kernel_location: PathBuf,
    /// Whether the guest is kept running for a human. Implied by `gdb` and
    /// `debian`.
    pub interactive: bool,
    pub gdb: bool,
    /// Boot a full Debian disk image instead of the minimal initrd.
    pub debian: bool,
    /// Use the pre-built s390 QEMU distribution.
    pub use_cbl_qemu: bool,
    pub timeout: Timeout,
    pub smp: Option<usize>,
    pub memory: Option<String>,
    pub no_kvm: bool,
    pub append: Option<String>,
    pub gdb_bin: String,
    /// User QEMU arguments as key-value strings.
    pub qemu_args: Vec<String>,
    pub qemu_path: Option<PathBuf>,
    pub bios: Option<PathBuf>,
    /// The directory holding `images/` and `utils/`.
    pub root_dir: PathBuf,
    pub dry_run: bool,
}

impl RunRequest {
    pub fn parse(args: &RunArgs) -> Result<Self> {
        let manifest = match manifest_path(args) {
            Some(path) => {
                debug!("Loading {}", path.display());
                TomlManifest::load(&path)?
            }
            None => TomlManifest::default(),
        };
        let settings = manifest.scheme_for(args.arch).finalize()?;

        if args.use_cbl_qemu && args.arch != Arch::S390 {
            return Err(Error::Usage(
                "'--use-cbl-qemu' is only supported with '-a s390'".to_owned(),
            ));
        }
        let smp = args.smp.or(settings.smp);
        if smp == Some(0) {
            return Err(Error::Usage("'--smp' must be at least 1".to_owned()));
        }

        let mut qemu_args = settings.qemu_args;
        for raw in &args.qemu_args {
            qemu_args.extend(split_to_kv_array(raw)?);
        }
        for arg in &qemu_args {
            check_qemu_arg(arg)?;
        }

        let append = match (settings.append, &args.append) {
            (Some(base), Some(own)) => Some(format!("{} {}", base, own)),
            (base, own) => own.clone().or(base),
        };

        Ok(Self {
            arch: args.arch,
            kernel_location: args.kernel_location.clone(),
            interactive: args.interactive || args.gdb || args.debian,
            gdb: args.gdb,
            debian: args.debian,
            use_cbl_qemu: args.use_cbl_qemu,
            timeout: args.timeout.clone().unwrap_or(settings.timeout),
            smp,
            memory: args.memory.clone().or(settings.memory),
            no_kvm: args.no_kvm || settings.no_kvm,
            append,
            gdb_bin: args.gdb_bin.clone().unwrap_or(settings.gdb_bin),
            qemu_args,
            qemu_path: settings.qemu_path,
            bios: args.bios.clone().or(settings.bios),
            root_dir: args.root_dir.clone(),
            dry_run: args.dry_run,
        })
    }

    /// Where this architecture's root filesystem images live.
    pub fn images_dir(&self) -> PathBuf {
        self.root_dir.join("images").join(self.arch.rootfs_dir())
    }
}

fn manifest_path(args: &RunArgs) -> Option<PathBuf> {
    if let Some(config) = &args.config {
        return Some(config.clone());
    }
    let default = args.root_dir.join(MANIFEST_FILE);
    default.is_file().then_some(default)
}

// Below are checked keys in qemu arguments. The key list is non-exhaustive.

/// Keys with multiple values
pub const MULTI_VALUE_KEYS: &[&str] = &[
    "-device", "-chardev", "-object", "-netdev", "-drive", "-machine", "-d",
];
/// Keys with no value
const NO_VALUE_KEYS: &[&str] = &[
    "-no-reboot",
    "-nodefaults",
    "-nographic",
    "-enable-kvm",
    "-s",
    "-S",
];
/// Keys that are computed from the kernel location and may not be set by hand
const NOT_ALLOWED_TO_SET_KEYS: &[&str] = &["-kernel", "-append", "-initrd", "-dtb"];

fn check_qemu_arg(arg: &str) -> Result<()> {
    let key = get_key(arg, " ").unwrap_or_else(|| arg.to_string());

    if NOT_ALLOWED_TO_SET_KEYS.contains(&key.as_str()) {
        return Err(Error::Usage(format!("`{}` is not allowed to set", arg)));
    }

    if NO_VALUE_KEYS.contains(&key.as_str()) && key.as_str() != arg {
        return Err(Error::Usage(format!("`{}` cannot have value", arg)));
    }

    Ok(())
}
