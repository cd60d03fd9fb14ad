//! Static HTTP route discovery over compiled Jooby applications.
//!
//! Class files are decoded directly; nothing is loaded into a JVM. See
//! [`core::Engine`] for the end-to-end entry point and
//! [`core::discover_routes`] for the analysis itself.

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::{AnalysisReport, Engine};
pub use crate::error::{Result, RouteLensError};
