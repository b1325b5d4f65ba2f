//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::project::Project;
use crate::core::workflow::WorkflowConfig;

/// Portal configuration with layered hierarchy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Default acting username for CLI commands
    pub user: Option<String>,

    /// Workflow rules
    pub workflow: WorkflowConfig,

    /// Letterhead values available to document templates
    pub documents: DocumentsConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

/// Values printed on generated letters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub institution: String,
    pub office: String,
    pub signatory: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            institution: "University".to_string(),
            office: "Internship Office".to_string(),
            signatory: "Internship Coordinator".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8080`
    pub bind: String,

    /// Mutating requests allowed per user per minute
    pub rate_limit_per_minute: u32,

    /// Origin allowed by CORS (none = same-origin only)
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            rate_limit_per_minute: 60,
            allowed_origin: None,
        }
    }
}

/// Partial config as read from one YAML layer. Absent keys leave lower layers alone.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    user: Option<String>,
    workflow: Option<WorkflowLayer>,
    documents: Option<DocumentsLayer>,
    server: Option<ServerLayer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkflowLayer {
    min_committee_size: Option<usize>,
    require_visit_for_completion: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocumentsLayer {
    institution: Option<String>,
    office: Option<String>,
    signatory: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerLayer {
    bind: Option<String>,
    rate_limit_per_minute: Option<u32>,
    allowed_origin: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/portal/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            config.merge_file(&global_path);
        }

        // 3. Project config (.portal/config.yaml)
        if let Some(project) = project {
            config.merge_file(&project.config_path());
        }

        // 4. Environment variables
        if let Ok(user) = std::env::var("PORTAL_USER") {
            if !user.trim().is_empty() {
                config.user = Some(user);
            }
        }
        if let Ok(bind) = std::env::var("PORTAL_BIND") {
            config.server.bind = bind;
        }

        config
    }

    /// Parse a single YAML document as a full config
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        let mut config = Config::default();
        config.merge(serde_yml::from_str(contents)?);
        Ok(config)
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "portal")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn merge_file(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yml::from_str::<ConfigLayer>(&contents) {
                Ok(layer) => self.merge(layer),
                Err(e) => tracing::warn!("Ignoring invalid config {}: {}", path.display(), e),
            },
            Err(e) => tracing::warn!("Cannot read config {}: {}", path.display(), e),
        }
    }

    /// Merge another layer into this one (other takes precedence)
    fn merge(&mut self, other: ConfigLayer) {
        if other.user.is_some() {
            self.user = other.user;
        }
        if let Some(workflow) = other.workflow {
            if let Some(size) = workflow.min_committee_size {
                self.workflow.min_committee_size = size;
            }
            if let Some(require) = workflow.require_visit_for_completion {
                self.workflow.require_visit_for_completion = require;
            }
        }
        if let Some(documents) = other.documents {
            if let Some(institution) = documents.institution {
                self.documents.institution = institution;
            }
            if let Some(office) = documents.office {
                self.documents.office = office;
            }
            if let Some(signatory) = documents.signatory {
                self.documents.signatory = signatory;
            }
        }
        if let Some(server) = other.server {
            if let Some(bind) = server.bind {
                self.server.bind = bind;
            }
            if let Some(limit) = server.rate_limit_per_minute {
                self.server.rate_limit_per_minute = limit;
            }
            if server.allowed_origin.is_some() {
                self.server.allowed_origin = server.allowed_origin;
            }
        }
    }
}
