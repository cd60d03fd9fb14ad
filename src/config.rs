use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, RouteLensError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Route analysis settings
    pub analysis: AnalysisConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Compiled class directories to analyze
    pub classpath: Vec<PathBuf>,

    /// Application class (dotted or internal name); detected when absent
    pub entry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Request context types whose accessors declare parameters (internal names)
    pub context_types: Vec<String>,

    /// Async/reactive wrappers unwrapped to their single type argument
    pub async_wrappers: Vec<String>,

    /// Interfaces dropped when widening closure types
    pub marker_interfaces: Vec<String>,

    /// Abort the whole pass when a route path is not a constant
    pub strict_patterns: bool,

    /// Add path variables the handler never reads as String path parameters
    pub declare_path_variables: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (json or table)
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Project".to_string(),
            classpath: vec![PathBuf::from("target/classes")],
            entry: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            context_types: strings(&["io/jooby/Context", "io/jooby/DefaultContext", "io/jooby/kt/HandlerContext"]),
            async_wrappers: strings(&[
                "java.util.concurrent.CompletionStage",
                "java.util.concurrent.CompletableFuture",
                "java.util.concurrent.Future",
                "reactor.core.publisher.Mono",
                "reactor.core.publisher.Flux",
                "io.reactivex.Single",
                "io.reactivex.Maybe",
                "io.reactivex.Observable",
                "io.reactivex.Flowable",
                "io.reactivex.rxjava3.core.Single",
                "io.reactivex.rxjava3.core.Maybe",
                "io.reactivex.rxjava3.core.Observable",
                "io.reactivex.rxjava3.core.Flowable",
                "org.reactivestreams.Publisher",
                "java.util.concurrent.Flow$Publisher",
                "kotlinx.coroutines.Deferred",
                "kotlinx.coroutines.flow.Flow",
            ]),
            marker_interfaces: strings(&[
                "java.io.Serializable",
                "kotlin.jvm.internal.Lambda",
                "kotlin.jvm.internal.FunctionBase",
                "kotlin.jvm.internal.markers.KMappedMarker",
                "kotlin.coroutines.jvm.internal.SuspendFunction",
                "kotlin.coroutines.jvm.internal.SuspendLambda",
                "kotlin.Function",
            ]),
            strict_patterns: false,
            declare_path_variables: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: true,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RouteLensError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RouteLensError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "RouteLens.toml",
                    "routelens.toml",
                    ".routelens.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
