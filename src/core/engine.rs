// src/core/engine.rs
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::ClassModelCache;
use super::classfile::ClassModel;
use super::classpath::{ClassSource, DirectoryClassSource};
use super::entry::EntryDetector;
use super::routes::{discover_routes, RouteDescriptor};
use super::schema::{ReferenceSchemaResolver, SchemaRegistry, SchemaResolver};
use super::session::{AnalysisSession, SkippedRoute};
use super::types::dotted;
use crate::config::Config;
use crate::error::RouteLensError;

/// Everything one analysis pass recovered
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Dotted name of the application class
    pub entry: String,
    pub routes: Vec<RouteDescriptor>,
    pub schemas: SchemaRegistry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl OutputFormat {
    pub fn parse(name: &str) -> crate::error::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            other => Err(RouteLensError::Config(format!("Unsupported format: {}", other))),
        }
    }
}

/// Main orchestration engine: configuration, class sources, analysis, rendering
pub struct Engine {
    config: Config,
    resolver: Box<dyn SchemaResolver>,
}

impl Engine {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            resolver: Box::new(ReferenceSchemaResolver),
        }
    }

    /// Replaces the default reference-producing schema resolver
    pub fn with_resolver(mut self, resolver: Box<dyn SchemaResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover the routes of `entry` in one fresh session
    pub fn analyze(&self, source: &dyn ClassSource, entry: &str) -> crate::error::Result<AnalysisReport> {
        let mut session = AnalysisSession::new(source, entry, self.config.analysis.clone());
        let routes = discover_routes(&mut session)?;
        let schemas = SchemaRegistry::from_routes(&routes, self.resolver.as_ref());
        debug!("Decoded {} class models", session.cache.len());

        Ok(AnalysisReport {
            entry: dotted(&session.entry),
            routes,
            schemas,
            skipped: session.skipped().to_vec(),
        })
    }

    /// `routelens routes`
    pub fn routes(
        &self,
        classpath: Vec<PathBuf>,
        entry: Option<String>,
        format: Option<String>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let source = self.class_source(classpath)?;
        let entry = match entry.or_else(|| self.config.project.entry.clone()) {
            Some(entry) => entry,
            None => self.detect_entry(&source)?,
        };
        let format = OutputFormat::parse(format.as_deref().unwrap_or(&self.config.output.format))?;

        info!("🔍 Analyzing {} from {} class directories", entry, source.roots().len());
        let report = self
            .analyze(&source, &entry)
            .with_context(|| format!("Route analysis of {} failed", entry))?;
        for skipped in &report.skipped {
            warn!("⚠️  {}.{}: {}", skipped.owner, skipped.method, skipped.reason);
        }

        let rendered = match format {
            OutputFormat::Json if self.config.output.pretty => serde_json::to_string_pretty(&report)?,
            OutputFormat::Json => serde_json::to_string(&report)?,
            OutputFormat::Table => render_table(&report.routes),
        };
        match output {
            Some(path) => {
                std::fs::write(&path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("✅ Wrote {} routes to {}", report.routes.len(), path.display());
            }
            None => println!("{}", rendered),
        }
        Ok(())
    }

    /// `routelens inspect`: summary of one decoded class
    pub fn inspect(&self, classpath: Vec<PathBuf>, class: &str) -> Result<()> {
        let source = self.class_source(classpath)?;
        let cache = ClassModelCache::new(&source);
        let model = cache.model(class)?;
        print!("{}", describe_class(&model));
        Ok(())
    }

    /// `routelens init`: write the default configuration
    pub fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        info!("Initializing RouteLens in: {}", target_dir.display());

        let config_path = target_dir.join("routelens.toml");
        if config_path.exists() {
            warn!("⚠️  {} already exists, leaving it unchanged", config_path.display());
            return Ok(());
        }
        std::fs::create_dir_all(&target_dir)?;
        let mut config = Config::default();
        if let Some(name) = target_dir.file_name().and_then(|n| n.to_str()) {
            config.project.name = name.to_string();
        }
        config.save(&config_path)?;
        info!("✅ Created {}", config_path.display());
        Ok(())
    }

    fn class_source(&self, classpath: Vec<PathBuf>) -> Result<DirectoryClassSource> {
        let roots = if classpath.is_empty() {
            self.config.project.classpath.clone()
        } else {
            classpath
        };
        Ok(DirectoryClassSource::new(roots)?)
    }

    fn detect_entry(&self, source: &DirectoryClassSource) -> Result<String> {
        let cache = ClassModelCache::new(source);
        let candidates = EntryDetector::new(&cache).detect(&source.list_classes());
        let Some(best) = candidates.first() else {
            return Err(RouteLensError::Config(
                "No application class found; pass --entry or set project.entry".to_string(),
            )
            .into());
        };
        if candidates.len() > 1 {
            warn!("⚠️  {} application classes found, using {}", candidates.len(), dotted(&best.class));
        }
        info!("Detected entry {} ({})", dotted(&best.class), best.reasoning);
        Ok(best.class.clone())
    }
}

/// Plain column layout: verb, path, responses, handler
pub fn render_table(routes: &[RouteDescriptor]) -> String {
    let rows: Vec<[String; 4]> = routes
        .iter()
        .map(|r| {
            let responses: Vec<&str> = r.responses.iter().collect();
            [
                r.verb.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string()),
                r.path.clone(),
                if responses.is_empty() {
                    "-".to_string()
                } else {
                    responses.join(" | ")
                },
                format!("{}.{}", r.handler.owner, r.handler.method),
            ]
        })
        .collect();

    let header = ["VERB", "PATH", "RESPONSES", "HANDLER"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 4]| {
        let padded: Vec<String> = cells.iter().zip(widths).map(|(c, w)| format!("{:<w$}", c, w = w)).collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };
    line(header);
    for row in &rows {
        line([&row[0], &row[1], &row[2], &row[3]]);
    }
    out
}

fn describe_class(class: &ClassModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", class.dotted_name());
    if let Some(super_name) = &class.super_name {
        let _ = writeln!(out, "  extends {}", dotted(super_name));
    }
    for interface in &class.interfaces {
        let _ = writeln!(out, "  implements {}", dotted(interface));
    }
    for annotation in &class.annotations {
        let _ = writeln!(out, "  @{}", dotted(&annotation.type_name));
    }
    for field in &class.fields {
        let _ = writeln!(out, "  field {} {}", field.name, field.descriptor);
    }
    for method in &class.methods {
        let _ = writeln!(
            out,
            "  method {}{} ({} instructions)",
            method.name,
            method.descriptor,
            method.instructions.len()
        );
    }
    out
}
