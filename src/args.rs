// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
use clap::Parser;
use std::path::PathBuf;

use upload_processor::changes::PolicyKind;

#[derive(Parser)]
#[command(name = "upload_processor")]
#[command(version)]
#[command(about = "Processes the pending uploads of an archive upload queue")]
pub(crate) struct Args {
    /// Root of the upload queue (holds incoming/, accepted/, rejected/ and failed/).
    pub base_fsroot: Option<PathBuf>,

    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Process uploads without committing, notifying or relocating anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Leave processed uploads in incoming/.
    #[arg(short = 'k', long)]
    pub keep: bool,

    /// Do not send any notifications.
    #[arg(short = 'M', long)]
    pub no_mails: bool,

    /// Upload policy to apply (insecure, buildd, sync or absolutely-anything).
    #[arg(short = 'C', long = "context")]
    pub context: Option<PolicyKind>,

    /// Override the target series of every upload.
    #[arg(short = 's', long)]
    pub series: Option<String>,

    /// Treat the pending uploads as build results.
    #[arg(short = 'b', long)]
    pub builds: bool,

    /// Only process the upload with this leaf name.
    #[arg(short = 'J', long)]
    pub leaf: Option<String>,

    #[arg(
        long,
        long_help = "Path to the JSON registry of distributions, archives, people and builds.\n\
                Overrides the [registry] path of the configuration file."
    )]
    pub registry: Option<PathBuf>,

    /// Path to the JSON-lines journal committed changes are appended to.
    #[arg(long)]
    pub journal: Option<PathBuf>,

    /// Path to the file to write the run report in JSON format.
    #[arg(long)]
    pub report: Option<PathBuf>,
}
