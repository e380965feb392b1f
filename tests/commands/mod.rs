// SPDX-License-Identifier: MPL-2.0

mod dry_run;
mod gdb;
mod run;
mod uml;
