// src/core/cache.rs
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use super::classfile::{parse_class, ClassModel};
use super::classpath::ClassSource;
use super::types::internal;
use crate::error::{Result, RouteLensError};

/// Session-owned memo of decoded class models.
///
/// Interior mutability lets the walker hold `Rc<ClassModel>` handles while
/// resolving further types through a shared reference.
pub struct ClassModelCache<'s> {
    source: &'s dyn ClassSource,
    models: RefCell<HashMap<String, Rc<ClassModel>>>,
    misses: RefCell<HashSet<String>>,
}

impl<'s> ClassModelCache<'s> {
    pub fn new(source: &'s dyn ClassSource) -> Self {
        Self {
            source,
            models: RefCell::new(HashMap::new()),
            misses: RefCell::new(HashSet::new()),
        }
    }

    /// Model for a dotted or internal name. Missing or malformed classes are errors.
    pub fn model(&self, name: &str) -> Result<Rc<ClassModel>> {
        let key = internal(name);
        if let Some(model) = self.models.borrow().get(&key) {
            return Ok(Rc::clone(model));
        }
        if self.misses.borrow().contains(&key) {
            return Err(RouteLensError::ClassNotFound(key));
        }

        let Some(bytes) = self.source.load_class_bytes(&key)? else {
            self.misses.borrow_mut().insert(key.clone());
            return Err(RouteLensError::ClassNotFound(key));
        };
        let model = match parse_class(&bytes) {
            Ok(model) => Rc::new(model),
            Err(source) => {
                self.misses.borrow_mut().insert(key.clone());
                return Err(RouteLensError::ClassFormat { class: key, source });
            }
        };
        debug!("Decoded {} ({} methods)", key, model.methods.len());
        self.models.borrow_mut().insert(key, Rc::clone(&model));
        Ok(model)
    }

    /// Like [`Self::model`] but degrades to `None` for types outside the module
    pub fn try_model(&self, name: &str) -> Option<Rc<ClassModel>> {
        match self.model(name) {
            Ok(model) => Some(model),
            Err(RouteLensError::ClassNotFound(_)) => None,
            Err(e) => {
                debug!("Ignoring unreadable class {}: {}", name, e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.models.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.borrow().is_empty()
    }
}
