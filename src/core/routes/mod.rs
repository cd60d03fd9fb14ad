// src/core/routes/mod.rs
//! Route descriptors and route discovery.

pub mod handler;
pub mod mvc;
pub mod params;
pub mod returns;
pub mod walker;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use walker::discover_routes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 9] = [
        HttpVerb::Get,
        HttpVerb::Post,
        HttpVerb::Put,
        HttpVerb::Patch,
        HttpVerb::Delete,
        HttpVerb::Head,
        HttpVerb::Options,
        HttpVerb::Trace,
        HttpVerb::Connect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Trace => "TRACE",
            HttpVerb::Connect => "CONNECT",
        }
    }

    /// Case-insensitive parse of a verb name (`get`, `GET`)
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterOrigin {
    Path,
    Query,
    Form,
    Header,
    Cookie,
    Body,
    Context,
}

impl ParameterOrigin {
    /// Origin for a request-context accessor name
    pub fn from_accessor(name: &str) -> Option<Self> {
        Some(match name {
            "path" => Self::Path,
            "query" => Self::Query,
            "form" | "multipart" => Self::Form,
            "header" => Self::Header,
            "cookie" => Self::Cookie,
            "body" => Self::Body,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Form => "form",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Body => "body",
            Self::Context => "context",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DefaultValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Enum(String),
    Class(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::String(s) => write!(f, "\"{}\"", s),
            DefaultValue::Integer(v) => write!(f, "{}", v),
            DefaultValue::Float(v) => write!(f, "{}", v),
            DefaultValue::Boolean(v) => write!(f, "{}", v),
            DefaultValue::Enum(v) | DefaultValue::Class(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub origin: ParameterOrigin,
    #[serde(rename = "type")]
    pub type_name: String,
    pub multi: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(rename = "type")]
    pub type_name: String,
    pub required: bool,
}

/// Ordered, duplicate-free response type names. Empty means opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseTypeSet(Vec<String>);

impl ResponseTypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `type_name` unless already present; returns whether it was added
    pub fn insert(&mut self, type_name: impl Into<String>) -> bool {
        let type_name = type_name.into();
        if self.0.contains(&type_name) {
            return false;
        }
        self.0.push(type_name);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for ResponseTypeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// Method implementing a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    /// Dotted name of the declaring type
    pub owner: String,
    pub method: String,
    pub descriptor: String,
    /// Compiler-generated body (lambda) rather than a named method
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub verb: Option<HttpVerb>,
    pub path: String,
    pub operation_id: String,
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: ResponseTypeSet,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub produces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub consumes: Vec<String>,
    pub handler: HandlerRef,
}

/// Join a prefix and a route pattern with exactly one separator. An empty
/// or `/` pattern leaves a non-root prefix as written.
pub fn join_path(prefix: &str, suffix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    match (trimmed.is_empty(), suffix.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", suffix),
        (false, true) => leading_slash(prefix),
        (false, false) => format!("{}/{}", leading_slash(trimmed), suffix),
    }
}

fn leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn path_variable_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(r"\{([^}:]+)(?::[^}]*)?\}|:([A-Za-z_][A-Za-z0-9_]*)").ok())
        .as_ref()
}

/// Variable names declared in a path pattern: `{id}`, `{id:[0-9]+}` or `:id`
pub fn path_variables(pattern: &str) -> Vec<String> {
    let Some(re) = path_variable_regex() else {
        return Vec::new();
    };
    re.captures_iter(pattern)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Adds every variable of the route pattern the handler never reads as a
/// required `String` path parameter.
pub fn add_path_variables(route: &mut RouteDescriptor) {
    for name in path_variables(&route.path) {
        let declared = route
            .parameters
            .iter()
            .any(|p| p.origin == ParameterOrigin::Path && p.name == name);
        if !declared {
            route.parameters.push(ParameterDescriptor {
                name,
                origin: ParameterOrigin::Path,
                type_name: "java.lang.String".to_string(),
                multi: false,
                required: true,
                default: None,
            });
        }
    }
}

/// Operation id: the handler's own name when it has one, otherwise the verb
/// followed by the camel-cased path segments (`getApiPeopleId`).
pub fn operation_id(verb: Option<HttpVerb>, path: &str, handler: &HandlerRef) -> String {
    if !handler.synthetic && !handler.method.starts_with('<') && !handler.method.contains('$') {
        return handler.method.clone();
    }
    let mut id = verb.map(|v| v.as_str().to_ascii_lowercase()).unwrap_or_else(|| "route".to_string());
    let without_vars = match path_variable_regex() {
        Some(re) => re
            .replace_all(path, |c: &regex::Captures<'_>| {
                c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string()).unwrap_or_default()
            })
            .into_owned(),
        None => path.to_string(),
    };
    for word in without_vars.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            id.push(first.to_ascii_uppercase());
            id.extend(chars);
        }
    }
    id
}
