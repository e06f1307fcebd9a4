// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Formats and prints run summaries to the console.

use comfy_table::{Cell, Table};

use super::{RunReport, UploadReport};
use crate::handler::{Disposition, UploadStatus};

/// Summarize the run to the console.
///
/// Prints the queue, the disposition counts and a table of every upload that was
/// not simply accepted.
pub fn summarize_run(report: &RunReport) {
    println!("Queue: {}", report.queue);
    println!("Total uploads: {}\n", report.totals.total());

    println!("{}\n", totals_table(report));

    let attention = uploads_needing_attention(report);
    if !attention.is_empty() {
        println!("{}", attention_table(&attention));
        println!(
            "\nTotal: {} upload(s) not accepted",
            attention.len()
        );
    }
}

/// Create a table with the default preset styling.
fn default_table_preset() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL_CONDENSED)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

fn totals_table(report: &RunReport) -> Table {
    let totals = &report.totals;
    let mut table = default_table_preset();
    table
        .set_header(vec![
            Cell::new("Disposition").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Count").add_attribute(comfy_table::Attribute::Bold),
        ])
        .add_row(vec![Cell::new("Accepted"), Cell::new(totals.accepted)])
        .add_row(vec![Cell::new("Rejected"), Cell::new(totals.rejected)])
        .add_row(vec![Cell::new("Failed"), Cell::new(totals.failed)])
        .add_row(vec![Cell::new("Deferred"), Cell::new(totals.deferred)])
        .add_row(vec![Cell::new("Skipped"), Cell::new(totals.skipped)])
        .add_row(vec![
            Cell::new("Total").add_attribute(comfy_table::Attribute::Bold),
            Cell::new(totals.total()).add_attribute(comfy_table::Attribute::Bold),
        ]);
    table
}

/// Leaf, disposition and detail of each upload that was not accepted.
fn uploads_needing_attention(report: &RunReport) -> Vec<(&str, String, String)> {
    report
        .uploads
        .iter()
        .filter_map(|(leaf, upload)| {
            let (disposition, detail) = match upload {
                UploadReport::Handled(outcome) => match outcome.disposition {
                    Disposition::Done(UploadStatus::Accepted) => return None,
                    Disposition::Done(status) => {
                        (status.to_string(), outcome.oops_id.clone().unwrap_or_default())
                    }
                    Disposition::Deferred => ("DEFERRED".to_string(), String::new()),
                },
                UploadReport::Skipped { reason } => ("SKIPPED".to_string(), reason.clone()),
            };
            Some((leaf.as_str(), disposition, detail))
        })
        .collect()
}

fn attention_table(rows: &[(&str, String, String)]) -> Table {
    let mut table = default_table_preset();
    table.set_header(vec![
        Cell::new("Upload").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Disposition").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Detail").add_attribute(comfy_table::Attribute::Bold),
    ]);
    for (leaf, disposition, detail) in rows {
        table.add_row(vec![
            Cell::new(leaf),
            Cell::new(disposition),
            Cell::new(detail),
        ]);
    }
    table
}
