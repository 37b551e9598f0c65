//! chainfeed entry point.

use anyhow::Result;
use node_runtime::{load_config, NodeRuntime};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("CF_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = load_config();
    let runtime = NodeRuntime::new(config);

    tokio::select! {
        result = runtime.run() => {
            // The pipeline only returns on fatal errors. Exit nonzero and
            // let the supervisor restart us into the recovery scan.
            if let Err(err) = &result {
                error!(error = ?err, "Pipeline failed");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
            runtime.shutdown();
            Ok(())
        }
    }
}
