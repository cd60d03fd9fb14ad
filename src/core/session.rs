// src/core/session.rs
use std::collections::HashSet;

use tracing::debug;

use super::cache::ClassModelCache;
use super::classpath::ClassSource;
use crate::config::AnalysisConfig;

/// Identity of one instruction: owning type, method position, instruction position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsnId {
    pub owner: String,
    pub method: usize,
    pub index: usize,
}

/// A route registration that could not be documented
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedRoute {
    pub owner: String,
    pub method: String,
    pub reason: String,
}

/// State shared by every component during one analysis run
pub struct AnalysisSession<'s> {
    pub cache: ClassModelCache<'s>,
    pub entry: String,
    pub settings: AnalysisConfig,
    processed: HashSet<InsnId>,
    /// Router types currently being walked, outermost first
    mounting: Vec<String>,
    skipped: Vec<SkippedRoute>,
}

impl<'s> AnalysisSession<'s> {
    pub fn new(source: &'s dyn ClassSource, entry: &str, settings: AnalysisConfig) -> Self {
        Self {
            cache: ClassModelCache::new(source),
            entry: super::types::internal(entry),
            settings,
            processed: HashSet::new(),
            mounting: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Marks an instruction as processed; false when it already was in this scope
    pub fn mark_processed(&mut self, id: InsnId) -> bool {
        self.processed.insert(id)
    }

    pub fn is_processed(&self, id: &InsnId) -> bool {
        self.processed.contains(id)
    }

    /// Runs `f` with an empty processed set and restores the outer one after,
    /// so a router mounted twice is walked once per mount.
    pub fn with_fresh_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let outer = std::mem::take(&mut self.processed);
        let result = f(self);
        self.processed = outer;
        result
    }

    /// Pushes `router` on the mount chain; false when it is already being
    /// walked (an application that mounts itself).
    pub fn enter_router(&mut self, router: &str) -> bool {
        if self.mounting.iter().any(|r| r == router) {
            debug!("Skipping recursive mount of {}", router);
            return false;
        }
        self.mounting.push(router.to_string());
        true
    }

    pub fn exit_router(&mut self) {
        self.mounting.pop();
    }

    pub fn skip(&mut self, owner: &str, method: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedRoute {
            owner: super::types::dotted(owner),
            method: method.to_string(),
            reason: reason.into(),
        });
    }

    pub fn skipped(&self) -> &[SkippedRoute] {
        &self.skipped
    }

    pub fn is_context_type(&self, internal_name: &str) -> bool {
        self.settings.context_types.iter().any(|t| t == internal_name)
    }

    pub fn is_async_wrapper(&self, dotted_name: &str) -> bool {
        self.settings.async_wrappers.iter().any(|t| t == dotted_name)
    }

    pub fn is_marker_interface(&self, dotted_name: &str) -> bool {
        self.settings.marker_interfaces.iter().any(|t| t == dotted_name)
    }
}
