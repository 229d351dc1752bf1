//! # CRD Generator
//!
//! Generates the `GlobalConfig` and `GlobalSecret` CustomResourceDefinitions
//! from the Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/globals.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use global_config_controller::crd::{GlobalConfig, GlobalSecret};
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let documents = [
        serde_yaml::to_string(&GlobalConfig::crd())?,
        serde_yaml::to_string(&GlobalSecret::crd())?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
