//! Layers command - show the layer chain a layer requires

use super::release_for;
use crate::cli::args::LayersArgs;
use crate::config::Config;
use crate::error::StrataResult;
use crate::layer::{LayerResolver, ReleaseLayerResolver};
use crate::transport::create_transport;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the layers command
pub async fn execute(args: LayersArgs, config: &Config) -> StrataResult<()> {
    let ctx = UiContext::detect();
    let release = release_for(config, &args.version)?;
    let transport = create_transport(&config.repository)?;

    let online = if args.offline {
        false
    } else {
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Contacting repository...");
        match transport.check_connection(&release.remote_url()).await {
            Ok(()) => {
                spinner.stop("Repository reachable");
                true
            }
            Err(e) => {
                spinner.stop_warn(&format!(
                    "Repository unreachable, using mirrored definitions ({})",
                    e
                ));
                false
            }
        }
    };

    let chain = ReleaseLayerResolver::new(transport)
        .resolve(&release, &args.layer, online)
        .await?;

    ui::heading(&ctx, &format!("Layers of {} in {}", args.layer, release));
    for layer in &chain {
        ui::layer_definition(&ctx, &layer.name, layer.definition.as_deref());
    }

    Ok(())
}
