//! Global Config Controller Library
//!
//! Propagates `GlobalConfig` and `GlobalSecret` resources into every namespace
//! selected by their regular expressions, as immutable ConfigMaps and Secrets.
//!
//! ## Quick Start
//!
//! ```rust
//! use global_config_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod artifact;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
