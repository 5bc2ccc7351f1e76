//! Warden Core - Cluster Access Decision Engine
//!
//! This crate decides whether a subject may perform an action by querying
//! a remote centralized policy-evaluation service, and returns a decision
//! compatible with the cluster's native access-review protocol. The
//! webhook HTTP transport consuming it lives elsewhere.

pub mod bypass;
pub mod cache;
pub mod config;
pub mod error;
pub mod remote;
pub mod review;
pub mod telemetry;
pub mod token;
pub mod translate;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
pub use remote::CheckAccessClient;
