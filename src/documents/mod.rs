//! Letter and certificate generation
//!
//! Documents are HTML rendered with Tera. Default templates are embedded in
//! the binary; a file with the same name in the project's template directory
//! (`.portal/templates/<kind>.html`) replaces the default.

use chrono::{NaiveDate, Utc};
use rust_embed::Embed;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tera::Tera;

use crate::core::config::DocumentsConfig;
use crate::core::db::DocumentKind;
use crate::core::error::PortalResult;
use crate::core::identity::EntityId;
use crate::core::status::ApplicationStatus;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

/// Values substituted into a document template
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    pub application_id: String,
    pub student_name: String,
    pub student_email: String,
    pub instructor_name: String,
    pub supervisor_name: Option<String>,
    pub supervisor_email: Option<String>,
    pub company_name: String,
    pub company_address: Option<String>,
    pub company_contact: Option<String>,
    pub internship_title: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DocumentContext {
    fn to_tera(&self, letterhead: &DocumentsConfig) -> tera::Context {
        let mut context = tera::Context::new();
        context.insert("institution", &letterhead.institution);
        context.insert("office", &letterhead.office);
        context.insert("signatory", &letterhead.signatory);
        context.insert("date", &Utc::now().format("%Y-%m-%d").to_string());

        context.insert("application_id", &self.application_id);
        context.insert("student_name", &self.student_name);
        context.insert("student_email", &self.student_email);
        context.insert("instructor_name", &self.instructor_name);
        context.insert("company_name", &self.company_name);
        context.insert("internship_title", &self.internship_title);

        // Optional values stay undefined so templates can use `default` and `if`
        let optional = [
            ("supervisor_name", self.supervisor_name.clone()),
            ("supervisor_email", self.supervisor_email.clone()),
            ("company_address", self.company_address.clone()),
            ("company_contact", self.company_contact.clone()),
            ("start_date", self.start_date.map(|d| d.to_string())),
            ("end_date", self.end_date.map(|d| d.to_string())),
        ];
        for (key, value) in optional {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                context.insert(key, &value);
            }
        }
        context
    }
}

/// Whether a document kind can be produced for an application in `status`
pub fn is_available(kind: DocumentKind, status: ApplicationStatus, has_supervisor: bool) -> bool {
    use ApplicationStatus::*;
    match kind {
        DocumentKind::AcceptanceRequest | DocumentKind::ApprovalLetter => {
            matches!(status, PendingDocuments | SentToCompany | InProgress | Completed)
        }
        DocumentKind::SupervisorAssignment => has_supervisor && !matches!(status, Rejected | Withdrawn),
        DocumentKind::CompletionCertificate => status == Completed,
    }
}

/// Renders documents from embedded and project templates
pub struct DocumentGenerator {
    tera: Tera,
}

impl DocumentGenerator {
    /// Load embedded templates, then any overrides found in `overrides`
    pub fn new(overrides: Option<&Path>) -> PortalResult<Self> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                if let Ok(template_str) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(filename, template_str)?;
                }
            }
        }

        if let Some(dir) = overrides {
            for kind in DocumentKind::all() {
                let path = dir.join(kind.template_name());
                if path.is_file() {
                    let source = std::fs::read_to_string(&path)?;
                    tera.add_raw_template(&kind.template_name(), &source)?;
                    tracing::debug!(template = %path.display(), "using project template override");
                }
            }
        }

        Ok(Self { tera })
    }

    /// Render a document to HTML
    pub fn render(
        &self,
        kind: DocumentKind,
        ctx: &DocumentContext,
        letterhead: &DocumentsConfig,
    ) -> PortalResult<String> {
        Ok(self.tera.render(&kind.template_name(), &ctx.to_tera(letterhead))?)
    }
}

/// A rendered document written to disk
/// A document file on disk. The file is removed when this is dropped unless
/// [`WrittenDocument::keep`] was called, so a failed transaction leaves no
/// orphan behind.
#[derive(Debug)]
pub struct WrittenDocument {
    pub path: PathBuf,
    pub sha256: String,
    kept: bool,
}

impl WrittenDocument {
    /// Keep the file; call once its record is committed
    pub fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for WrittenDocument {
    fn drop(&mut self) {
        if !self.kept {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "cannot remove uncommitted document: {}", e);
            }
        }
    }
}

/// Write rendered HTML to `<documents_dir>/<APP-id>/<kind>-<DOC-ulid>.html`
pub fn write_document(
    documents_dir: &Path,
    application_id: &EntityId,
    kind: DocumentKind,
    document_id: &EntityId,
    html: &str,
) -> PortalResult<WrittenDocument> {
    let dir = documents_dir.join(application_id.to_string());
    std::fs::create_dir_all(&dir)?;

    let path = dir.join(format!("{}-{}.html", kind.as_str(), document_id.ulid()));
    std::fs::write(&path, html)?;

    Ok(WrittenDocument {
        path,
        sha256: compute_hash(html),
        kept: false,
    })
}

/// SHA-256 of document content, lowercase hex
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;
    use tempfile::tempdir;

    fn context() -> DocumentContext {
        DocumentContext {
            application_id: "APP-01KCWY20F01B21V0G4E835NW3J".to_string(),
            student_name: "Alice <Admin>".to_string(),
            student_email: "alice@uni.test".to_string(),
            instructor_name: "Bob".to_string(),
            supervisor_name: Some("Sam Supervisor".to_string()),
            company_name: "Acme".to_string(),
            internship_title: "Backend intern".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_embedded_templates_render() {
        let generator = DocumentGenerator::new(None).unwrap();
        for kind in DocumentKind::all() {
            let html = generator
                .render(*kind, &context(), &DocumentsConfig::default())
                .unwrap();
            assert!(html.contains("Acme"), "{kind} should mention the company");
            assert!(html.contains("University"));
        }
    }

    #[test]
    fn test_values_are_html_escaped() {
        let generator = DocumentGenerator::new(None).unwrap();
        let html = generator
            .render(DocumentKind::ApprovalLetter, &context(), &DocumentsConfig::default())
            .unwrap();
        assert!(html.contains("Alice &lt;Admin&gt;"));
        assert!(!html.contains("<Admin>"));
    }

    #[test]
    fn test_missing_contact_uses_default_greeting() {
        let generator = DocumentGenerator::new(None).unwrap();
        let html = generator
            .render(DocumentKind::AcceptanceRequest, &context(), &DocumentsConfig::default())
            .unwrap();
        assert!(html.contains("Dear Sir or Madam"));
    }

    #[test]
    fn test_project_override_wins() {
        let tmp = tempdir().unwrap();
        std::fs::write(
            tmp.path().join("approval_letter.html"),
            "<p>Congratulations {{ student_name }} from {{ office }}</p>",
        )
        .unwrap();

        let generator = DocumentGenerator::new(Some(tmp.path())).unwrap();
        let html = generator
            .render(DocumentKind::ApprovalLetter, &context(), &DocumentsConfig::default())
            .unwrap();
        assert_eq!(html, "<p>Congratulations Alice &lt;Admin&gt; from Internship Office</p>");

        // Other kinds keep their defaults
        let other = generator
            .render(DocumentKind::AcceptanceRequest, &context(), &DocumentsConfig::default())
            .unwrap();
        assert!(other.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_write_document_layout_and_digest() {
        let tmp = tempdir().unwrap();
        let app = EntityId::new(EntityPrefix::App);
        let doc = EntityId::new(EntityPrefix::Doc);

        let written =
            write_document(tmp.path(), &app, DocumentKind::ApprovalLetter, &doc, "<p>hi</p>").unwrap();
        assert_eq!(
            written.path,
            tmp.path()
                .join(app.to_string())
                .join(format!("approval_letter-{}.html", doc.ulid()))
        );
        assert_eq!(std::fs::read_to_string(&written.path).unwrap(), "<p>hi</p>");
        assert_eq!(written.sha256, compute_hash("<p>hi</p>"));
        assert_eq!(written.sha256.len(), 64);
    }

    #[test]
    fn test_uncommitted_document_is_removed() {
        let tmp = tempdir().unwrap();
        let app = EntityId::new(EntityPrefix::App);

        let written = write_document(
            tmp.path(),
            &app,
            DocumentKind::AcceptanceRequest,
            &EntityId::new(EntityPrefix::Doc),
            "<p>draft</p>",
        )
        .unwrap();
        let dropped = written.path.clone();
        drop(written);
        assert!(!dropped.exists());

        let mut written = write_document(
            tmp.path(),
            &app,
            DocumentKind::AcceptanceRequest,
            &EntityId::new(EntityPrefix::Doc),
            "<p>final</p>",
        )
        .unwrap();
        written.keep();
        let kept = written.path.clone();
        drop(written);
        assert_eq!(std::fs::read_to_string(kept).unwrap(), "<p>final</p>");
    }

    #[test]
    fn test_availability_by_status() {
        use ApplicationStatus::*;
        assert!(!is_available(DocumentKind::AcceptanceRequest, PendingCommittee, true));
        assert!(is_available(DocumentKind::AcceptanceRequest, PendingDocuments, true));
        assert!(is_available(DocumentKind::SupervisorAssignment, PendingCommittee, true));
        assert!(!is_available(DocumentKind::SupervisorAssignment, PendingSupervisor, false));
        assert!(!is_available(DocumentKind::CompletionCertificate, InProgress, true));
        assert!(is_available(DocumentKind::CompletionCertificate, Completed, true));
    }
}
