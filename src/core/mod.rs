// src/core/mod.rs
pub mod classfile;
pub mod types;

// Class loading
pub mod cache;
pub mod classpath;

// Instruction scanning
pub mod cursor;
pub mod matcher;

// Analysis
pub mod entry;
pub mod routes;
pub mod schema;
pub mod session;

mod engine;

pub use cache::ClassModelCache;
pub use classpath::{ClassSource, DirectoryClassSource, MemorySource};
pub use entry::{EntryCandidate, EntryDetector};
pub use routes::{
    discover_routes, DefaultValue, HandlerRef, HttpVerb, ParameterDescriptor, ParameterOrigin, RequestBody,
    ResponseTypeSet, RouteDescriptor,
};
pub use schema::{ReferenceSchemaResolver, SchemaHandle, SchemaRegistry, SchemaResolver};
pub use session::{AnalysisSession, SkippedRoute};

// Export the main engine
pub use engine::{render_table, AnalysisReport, Engine, OutputFormat};
