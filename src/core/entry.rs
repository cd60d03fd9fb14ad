// src/core/entry.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::ClassModelCache;
use super::classfile::ClassModel;
use super::types::dotted;

/// Framework base types an application class extends
const APPLICATION_BASES: [&str; 2] = ["io/jooby/Jooby", "io/jooby/kt/Kooby"];

/// Superclass hops followed before giving up
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCandidate {
    /// Internal name of the application class
    pub class: String,
    /// Declares `public static void main(String[])`
    pub has_main: bool,
    pub reasoning: String,
}

/// Finds application router classes among a module's compiled types
pub struct EntryDetector<'c, 's> {
    cache: &'c ClassModelCache<'s>,
}

impl<'c, 's> EntryDetector<'c, 's> {
    pub fn new(cache: &'c ClassModelCache<'s>) -> Self {
        Self { cache }
    }

    /// Candidates among `classes`, ones with a `main` method first, then by name
    pub fn detect(&self, classes: &[String]) -> Vec<EntryCandidate> {
        let mut candidates: Vec<EntryCandidate> = classes
            .iter()
            .filter_map(|name| self.cache.try_model(name))
            .filter(|class| !class.is_interface() && class.access & 0x0400 == 0)
            .filter_map(|class| self.analyze_candidate(&class))
            .collect();

        candidates.sort_by(|a, b| b.has_main.cmp(&a.has_main).then_with(|| a.class.cmp(&b.class)));
        debug!("Found {} application classes", candidates.len());
        candidates
    }

    /// Best candidate, if any
    pub fn detect_one(&self, classes: &[String]) -> Option<EntryCandidate> {
        self.detect(classes).into_iter().next()
    }

    fn analyze_candidate(&self, class: &ClassModel) -> Option<EntryCandidate> {
        let base = self.application_base(class)?;
        let has_main = class
            .method("main", "([Ljava/lang/String;)V")
            .is_some_and(|m| m.is_static());

        let mut reasoning = vec![format!("Extends {}", dotted(base))];
        if has_main {
            reasoning.push("Declares main".to_string());
        }
        Some(EntryCandidate {
            class: class.name.clone(),
            has_main,
            reasoning: reasoning.join("; "),
        })
    }

    /// Framework base reached by following in-module superclasses
    fn application_base(&self, class: &ClassModel) -> Option<&'static str> {
        let mut current = class.super_name.clone();
        for _ in 0..MAX_DEPTH {
            let name = current?;
            if let Some(base) = APPLICATION_BASES.iter().find(|b| **b == name) {
                return Some(*base);
            }
            current = self.cache.try_model(&name)?.super_name.clone();
        }
        None
    }
}
