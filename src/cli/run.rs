//! Run command - workers plus submission API

use std::sync::Arc;
use submit_queue::config::Config;
use submit_queue::error::{Error, Result};
use submit_queue::project::ProjectRegistry;
use submit_queue::report::{Reporter, TracingReporter};
use submit_queue::server::{self, AppState};
use submit_queue::worker::spawn_workers;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Listen address override
    pub listen: Option<String>,
    /// Skip the submission API
    pub no_server: bool,
}

/// Run until Ctrl-C
pub async fn run_service(config: Config, options: RunOptions) -> Result<()> {
    let registry = ProjectRegistry::from_config(&config).await?;
    let shutdown = CancellationToken::new();

    // Bind first; a bad address aborts startup
    let server = if options.no_server {
        None
    } else {
        let mut settings = config.server.clone();
        if let Some(listen) = options.listen {
            settings.listen = listen;
        }
        let listener = server::bind(settings.listen_addr()?).await?;
        Some(tokio::spawn(server::serve(
            listener,
            AppState::new(registry.clone()),
            shutdown.clone(),
        )))
    };

    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);
    let mut workers = spawn_workers(&registry, &reporter, &config.queue, &shutdown);
    info!(projects = registry.len(), "submit queue running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "worker task failed");
        }
    }

    if let Some(server) = server {
        server
            .await
            .map_err(|e| Error::Internal(format!("API task failed: {e}")))??;
    }

    Ok(())
}
