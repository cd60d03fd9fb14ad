// src/core/schema.rs
//! Type name to schema mapping.
//!
//! Turning a recovered type into a full schema needs reflection over the
//! type's members, which lives outside this crate. The registry only makes
//! sure each distinct type name reaches the resolver once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::routes::RouteDescriptor;
use super::types::simple_name;

const COMPONENTS: &str = "#/components/schemas/";

/// What a resolver produced for one type name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SchemaHandle {
    /// Primitive schema type (`string`, `integer`, ...)
    Inline(String),
    /// JSON pointer into the components section
    Reference(String),
}

pub trait SchemaResolver {
    fn schema_for(&self, type_name: &str) -> SchemaHandle;
}

/// Primitives and their boxes inline; everything else becomes a reference
/// named after the raw type's simple name.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceSchemaResolver;

impl SchemaResolver for ReferenceSchemaResolver {
    fn schema_for(&self, type_name: &str) -> SchemaHandle {
        let raw = type_name.split('<').next().unwrap_or(type_name);
        if raw.ends_with("[]") {
            return SchemaHandle::Inline("array".to_string());
        }
        let inline = match raw {
            "java.lang.String" | "char" | "java.lang.Character" | "java.util.UUID" => "string",
            "int" | "long" | "short" | "byte" | "java.lang.Integer" | "java.lang.Long" | "java.lang.Short"
            | "java.lang.Byte" | "java.math.BigInteger" => "integer",
            "float" | "double" | "java.lang.Float" | "java.lang.Double" | "java.math.BigDecimal" => "number",
            "boolean" | "java.lang.Boolean" => "boolean",
            "java.util.List" | "java.util.Set" | "java.util.Collection" => "array",
            "void" | "java.lang.Object" | "java.util.Map" => "object",
            _ => return SchemaHandle::Reference(format!("{}{}", COMPONENTS, simple_name(raw))),
        };
        SchemaHandle::Inline(inline.to_string())
    }
}

/// Schema handles for every type a route list mentions
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, SchemaHandle>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_routes(routes: &[RouteDescriptor], resolver: &dyn SchemaResolver) -> Self {
        let mut registry = Self::new();
        for route in routes {
            registry.collect(route, resolver);
        }
        registry
    }

    /// Resolves each parameter, body and response type of `route` not seen before
    pub fn collect(&mut self, route: &RouteDescriptor, resolver: &dyn SchemaResolver) {
        let names = route
            .parameters
            .iter()
            .map(|p| p.type_name.as_str())
            .chain(route.request_body.iter().map(|b| b.type_name.as_str()))
            .chain(route.responses.as_slice().iter().map(String::as_str));
        for name in names {
            if !self.schemas.contains_key(name) {
                self.schemas.insert(name.to_string(), resolver.schema_for(name));
            }
        }
    }

    pub fn get(&self, type_name: &str) -> Option<&SchemaHandle> {
        self.schemas.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaHandle)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }
}
