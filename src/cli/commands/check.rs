//! Check command - report cache completeness without network access

use super::release_for;
use crate::cache::{CompletenessChecker, IndexStore, LayerStatus};
use crate::cli::args::{CheckArgs, OutputFormat};
use crate::config::Config;
use crate::error::{StrataError, StrataResult};
use crate::layer::{LayerResolver, ReleaseLayerResolver};
use crate::transport::LocalTransport;
use crate::ui::{self, UiContext};
use serde::Serialize;
use std::sync::Arc;

/// One row of the report
#[derive(Debug, Serialize)]
struct LayerReport {
    layer: String,
    complete: bool,
    status: String,
    missing: Vec<String>,
}

/// Execute the check command
pub async fn execute(args: CheckArgs, config: &Config) -> StrataResult<()> {
    let release = release_for(config, &args.version)?;

    // Offline resolution only reads mirrored layer definitions
    let resolver = ReleaseLayerResolver::new(Arc::new(LocalTransport::new()));
    let chain = resolver.resolve(&release, &args.layer, false).await?;

    let checker = CompletenessChecker::new(IndexStore::new(
        release.local_root(),
        &config.cache.index_file,
    ));

    let mut reports = Vec::with_capacity(chain.len());
    for layer in chain {
        let report = if layer.is_resolved() {
            let status = checker.status(&layer.name).await;
            LayerReport {
                complete: status.is_complete(),
                status: status.to_string(),
                missing: match status {
                    LayerStatus::Incomplete { missing } => missing,
                    _ => Vec::new(),
                },
                layer: layer.name,
            }
        } else {
            LayerReport {
                layer: layer.name,
                complete: false,
                status: "not mirrored".to_string(),
                missing: Vec::new(),
            }
        };
        reports.push(report);
    }

    match args.format {
        OutputFormat::Table => print_table(&reports),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    if reports.iter().all(|r| r.complete) {
        Ok(())
    } else {
        Err(StrataError::User(format!(
            "Layer cache for {} is incomplete",
            args.layer
        )))
    }
}

fn print_table(reports: &[LayerReport]) {
    let ctx = UiContext::detect();
    for report in reports {
        ui::layer_row(&ctx, &report.layer, &report.status, report.complete);
        ui::missing_paths(&ctx, &report.missing);
    }
}
