// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
mod args;

use anyhow::{Context as _, Result};
use clap::Parser;
use env_logger::Env;

use args::Args;
use upload_processor::archive::Registry;
use upload_processor::build::DirectoryArtifactUploader;
use upload_processor::config::{FileConfig, ProcessorConfig};
use upload_processor::notify::OutboxNotifier;
use upload_processor::oops::OopsReporter;
use upload_processor::processor::UploadProcessor;
use upload_processor::report::summarize_run;
use upload_processor::store::{JournalStore, MemoryStore, Store};
use upload_processor::upload::{ChangesUploadFactory, SignatureVerifier};
use upload_processor::Context;

fn main() -> Result<()> {
    let args = Args::parse();
    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    init_logging(file_config.logging.level.as_deref());

    let config = processor_config(&args, &file_config)?;
    config.validate()?;

    let registry_path = args
        .registry
        .clone()
        .or_else(|| file_config.registry.path.clone())
        .context("No registry given: pass --registry or set [registry] path")?;
    let registry = Registry::from_file(&registry_path)
        .with_context(|| format!("Failed to load registry: {}", registry_path.display()))?;
    log::info!("Loaded registry: file={}", registry_path.display());

    let notifier = OutboxNotifier::new(file_config.notifications.outbox.clone());
    let oops = OopsReporter::new(file_config.oops.directory.clone());
    let verifier = file_config
        .signing
        .keyring
        .clone()
        .map(|keyring| SignatureVerifier::new(keyring, file_config.signing.gpgv_timeout()));
    if verifier.is_none() {
        log::warn!("No keyring configured, signed changes files are trusted without verification");
    }
    let uploads = ChangesUploadFactory::new(&notifier, verifier);
    let ctx = Context {
        config: &config,
        archives: &registry,
        builds: &registry,
        uploads: &uploads,
        artifacts: &DirectoryArtifactUploader,
        notifier: &notifier,
        oops: &oops,
    };

    let journal = args.journal.clone().or_else(|| file_config.journal.path.clone());
    let mut store: Box<dyn Store> = match journal {
        Some(path) => Box::new(
            JournalStore::open(&path)
                .with_context(|| format!("Failed to open journal: {}", path.display()))?,
        ),
        None => {
            log::warn!("No journal configured, committed changes are kept in memory only");
            Box::new(MemoryStore::default())
        }
    };

    let report = UploadProcessor::new(ctx, store.as_mut())
        .process_upload_queue(args.leaf.as_deref())
        .context("Upload queue processing aborted")?;

    if let Some(dest) = &args.report {
        report.write_to_file(dest)?;
    }
    summarize_run(&report);
    Ok(())
}

/// Log to stderr, honouring `RUST_LOG` over the configured level.
fn init_logging(level: Option<&str>) {
    env_logger::Builder::from_env(Env::default().filter_or("RUST_LOG", level.unwrap_or("info")))
        .init();
}

/// Merge the command line over the configuration file.
///
/// # Errors
/// Returns an error if neither names the queue root.
fn processor_config(args: &Args, file_config: &FileConfig) -> Result<ProcessorConfig> {
    let section = &file_config.processor;
    let base_fsroot = args
        .base_fsroot
        .clone()
        .or_else(|| section.base_fsroot.clone())
        .context("No queue root given: pass BASE_FSROOT or set [processor] base_fsroot")?;

    let mut config = ProcessorConfig::new(base_fsroot);
    config.dry_run = args.dry_run || section.dry_run.unwrap_or(false);
    config.keep = args.keep || section.keep.unwrap_or(false);
    config.no_mails = args.no_mails || section.no_mails.unwrap_or(false);
    config.builds = args.builds || section.builds.unwrap_or(false);
    config.policy = args.context.or(section.context).unwrap_or_default();
    config.suite_override = args.series.clone();
    Ok(config)
}
