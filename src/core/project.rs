//! Project discovery and on-disk layout
//!
//! A portal project is a directory containing `.portal/` with the SQLite
//! database, configuration, template overrides and generated documents.

use std::path::{Path, PathBuf};
use thiserror::Error;

const PORTAL_DIR: &str = ".portal";
const DB_FILE: &str = "portal.db";

/// Represents a portal project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .portal/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PORTAL_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(PORTAL_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        Self::init_force(&root)
    }

    /// Initialize even if .portal/ exists. The database is kept; config is rewritten.
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let project = Self { root };

        for dir in [project.templates_dir(), project.documents_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        std::fs::write(project.config_path(), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(project)
    }

    /// Open a project rooted exactly at `path` without walking upwards
    pub fn open(path: &Path) -> Result<Self, ProjectError> {
        let root = path
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        if !root.join(PORTAL_DIR).is_dir() {
            return Err(ProjectError::NotFound {
                searched_from: root,
            });
        }
        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Internship Portal configuration

# Default acting user for CLI commands (overridden by --as or PORTAL_USER)
# user: ""

workflow:
  # Committee members that must be assigned before votes can decide
  min_committee_size: 1
  # Require a completed supervisor visit before completion
  require_visit_for_completion: true

documents:
  institution: "University"
  office: "Internship Office"
  signatory: "Internship Coordinator"

server:
  bind: "127.0.0.1:8080"
  rate_limit_per_minute: 60
  # allowed_origin: "https://portal.example.edu"
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .portal directory
    pub fn portal_dir(&self) -> PathBuf {
        self.root.join(PORTAL_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.portal_dir().join("config.yaml")
    }

    /// Database path; `PORTAL_DB` overrides the default location
    pub fn db_path(&self) -> PathBuf {
        match std::env::var("PORTAL_DB") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.portal_dir().join(DB_FILE),
        }
    }

    /// Directory with per-project template overrides
    pub fn templates_dir(&self) -> PathBuf {
        self.portal_dir().join("templates")
    }

    /// Directory receiving generated documents
    pub fn documents_dir(&self) -> PathBuf {
        self.portal_dir().join("documents")
    }
}

/// Errors related to project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a portal project (or any parent): {searched_from}\nRun 'portal init' to create one")]
    NotFound { searched_from: PathBuf },

    #[error("portal project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_layout() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.portal_dir().is_dir());
        assert!(project.templates_dir().is_dir());
        assert!(project.documents_dir().is_dir());
        assert!(project.config_path().is_file());
    }

    #[test]
    fn test_init_twice_fails() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(matches!(
            Project::init(tmp.path()),
            Err(ProjectError::AlreadyExists(_))
        ));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover_from(&nested).unwrap();
        assert_eq!(project.root(), tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_discover_not_found() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            Project::discover_from(tmp.path()),
            Err(ProjectError::NotFound { .. })
        ));
    }

    #[test]
    fn test_default_config_parses() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let contents = std::fs::read_to_string(project.config_path()).unwrap();
        let config = crate::core::Config::from_yaml(&contents).unwrap();
        assert_eq!(config.workflow.min_committee_size, 1);
    }
}
