//! # Custom Resource Definitions
//!
//! CRD types for the Global Config Controller.
//!
//! ## Module Structure
//!
//! - `namespaces.rs` - Regex-based namespace selection rules shared by both kinds
//! - `global_config.rs` - `GlobalConfig`, propagated as ConfigMaps
//! - `global_secret.rs` - `GlobalSecret`, propagated as Secrets
//! - `status.rs` - Status types shared by both kinds
//! - `source.rs` - `SourceObject` trait abstracting over the two kinds

mod global_config;
mod global_secret;
mod namespaces;
mod source;
mod status;

// Re-export all public types
pub use global_config::{GlobalConfig, GlobalConfigSpec};
pub use global_secret::{GlobalSecret, GlobalSecretSpec, SecretType};
pub use namespaces::NamespacesRegex;
pub use source::{SourceIdentity, SourceKey, SourceObject};
pub use status::{Condition, DeployedArtifact, GlobalStatus};
