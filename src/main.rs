//! # Global Config Controller
//!
//! Kubernetes controller that copies `GlobalConfig` and `GlobalSecret` payloads
//! into matching namespaces as immutable ConfigMaps and Secrets.
//!
//! ## Overview
//!
//! For every source the controller:
//! 1. Selects namespaces with the `match` and `avoid` regular expressions
//! 2. Creates an immutable artifact named after the source in each matching namespace
//! 3. Deletes and recreates artifacts whose version marker is stale
//! 4. Deletes artifacts from namespaces that left scope
//! 5. Sweeps every owned artifact before releasing the source's finalizer
//!
//! ## Usage
//!
//! The controller watches all namespaces. Both controllers run by default and
//! can be switched off with `ENABLE_GLOBAL_CONFIGS=false` or
//! `ENABLE_GLOBAL_SECRETS=false`.

use anyhow::Result;
use global_config_controller::runtime::{initialize, run};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run(init).await?;
    info!("Controllers stopped, exiting");
    Ok(())
}
