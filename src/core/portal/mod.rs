//! Portal service layer
//!
//! [`Portal`] is the single authority over applications. Every operation
//! follows the same shape:
//!
//! 1. open an immediate write transaction
//! 2. load the records and build the actor's [`ActorContext`]
//! 3. authorize through the [`WorkflowEngine`] and validate inputs
//! 4. write, with status changes going through the transition table and the
//!    optimistic version check, and commit
//!
//! Committee votes are tallied inside the same transaction as the vote
//! itself, so concurrent voters can never both miss the deciding vote.

mod views;

pub use views::{ApplicationDetail, CommitteeView, Dashboard, InternshipLoad, ReportSummary};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::core::config::Config;
use crate::core::db::catalog::{self, NewCompany, NewInternship};
use crate::core::db::{
    self, applications, committee, records, users, Application, ApplicationEvent,
    ApplicationFilter, Company, Database, DocumentKind, DocumentRecord, Internship, User, Visit,
    VisitStatus,
};
use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::project::Project;
use crate::core::quorum::{QuorumOutcome, QuorumSummary};
use crate::core::role::{Role, RoleSet};
use crate::core::status::{ApplicationStatus, Decision, VoteStatus};
use crate::core::workflow::{Action, ActorContext, WorkflowEngine, WorkflowError};
use crate::documents::{self, DocumentContext, DocumentGenerator};

/// Fields for registering a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub roles: RoleSet,
}

/// Fields for a new internship; `company` is a name or reference
#[derive(Debug, Clone)]
pub struct InternshipInput {
    pub company: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub positions: u32,
}

/// The portal service
pub struct Portal {
    db: Database,
    config: Config,
    engine: WorkflowEngine,
    documents_dir: PathBuf,
    templates_dir: Option<PathBuf>,
}

impl Portal {
    /// Open the project's database with the given configuration
    pub fn open(project: &Project, config: Config) -> PortalResult<Self> {
        let db = Database::open(&project.db_path())?;
        Ok(Self::new(
            db,
            config,
            project.documents_dir(),
            Some(project.templates_dir()),
        ))
    }

    pub fn new(
        db: Database,
        config: Config,
        documents_dir: PathBuf,
        templates_dir: Option<PathBuf>,
    ) -> Self {
        let engine = WorkflowEngine::new(config.workflow.clone());
        Self {
            db,
            config,
            engine,
            documents_dir,
            templates_dir,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Look up the acting user. Unknown and deactivated users are refused.
    pub fn acting_user(&self, username: Option<&str>) -> PortalResult<User> {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(PortalError::NoActingUser)?;
        let user = users::get_by_username(self.db.conn(), username)?
            .ok_or_else(|| PortalError::not_found("user", username))?;
        if !user.active {
            return Err(PortalError::InactiveUser(user.username));
        }
        Ok(user)
    }

    // =====================================================================
    // Users
    // =====================================================================

    /// Create the first administrator. Only allowed while the portal has no users.
    pub fn bootstrap_admin(&mut self, new_user: &NewUser) -> PortalResult<User> {
        let tx = self.db.write()?;
        if users::count(&tx)? > 0 {
            return Err(PortalError::validation(
                "The portal already has users; an admin must register new ones",
            ));
        }
        let roles: RoleSet = new_user.roles.iter().chain([Role::Admin]).collect();
        let id = users::insert(&tx, &new_user.username, &new_user.name, &new_user.email, &roles)?;
        let user = users::get(&tx, &id)?;
        tx.commit()?;

        info!(user = %user.username, "bootstrapped administrator");
        Ok(user)
    }

    pub fn register_user(&mut self, actor: &User, new_user: &NewUser) -> PortalResult<User> {
        self.engine
            .authorize(Action::ManageUsers, &ActorContext::with_roles(actor.roles.clone()))?;

        let tx = self.db.write()?;
        let id = users::insert(&tx, &new_user.username, &new_user.name, &new_user.email, &new_user.roles)?;
        let user = users::get(&tx, &id)?;
        tx.commit()?;

        info!(user = %user.username, roles = %user.roles, by = %actor.username, "registered user");
        Ok(user)
    }

    pub fn deactivate_user(&mut self, actor: &User, target: &str) -> PortalResult<User> {
        self.engine
            .authorize(Action::ManageUsers, &ActorContext::with_roles(actor.roles.clone()))?;

        let tx = self.db.write()?;
        let user = users::resolve(&tx, target)?;
        if user.id == actor.id {
            return Err(PortalError::validation("You cannot deactivate yourself"));
        }
        users::set_active(&tx, &user.id, false)?;
        let user = users::get(&tx, &user.id)?;
        tx.commit()?;

        info!(user = %user.username, by = %actor.username, "deactivated user");
        Ok(user)
    }

    pub fn set_roles(&mut self, actor: &User, target: &str, roles: &RoleSet) -> PortalResult<User> {
        self.engine
            .authorize(Action::ManageUsers, &ActorContext::with_roles(actor.roles.clone()))?;

        let tx = self.db.write()?;
        let user = users::resolve(&tx, target)?;
        if user.id == actor.id && !roles.is_admin() {
            return Err(PortalError::validation("You cannot remove your own admin role"));
        }
        users::set_roles(&tx, &user.id, roles)?;
        let user = users::get(&tx, &user.id)?;
        tx.commit()?;

        info!(user = %user.username, roles = %user.roles, by = %actor.username, "changed roles");
        Ok(user)
    }

    pub fn list_users(&self, role: Option<Role>, include_inactive: bool) -> PortalResult<Vec<User>> {
        users::list(self.db.conn(), role, include_inactive)
    }

    pub fn find_user(&self, reference: &str) -> PortalResult<User> {
        users::resolve(self.db.conn(), reference)
    }

    // =====================================================================
    // Companies and internships
    // =====================================================================

    pub fn add_company(&mut self, actor: &User, company: &NewCompany) -> PortalResult<Company> {
        self.engine
            .authorize(Action::ManageCatalog, &ActorContext::with_roles(actor.roles.clone()))?;

        let tx = self.db.write()?;
        let id = catalog::insert_company(&tx, company)?;
        let company = catalog::get_company(&tx, &id)?;
        tx.commit()?;

        info!(company = %company.name, by = %actor.username, "added company");
        Ok(company)
    }

    pub fn list_companies(&self) -> PortalResult<Vec<Company>> {
        catalog::list_companies(self.db.conn())
    }

    pub fn add_internship(&mut self, actor: &User, input: &InternshipInput) -> PortalResult<Internship> {
        self.engine
            .authorize(Action::ManageCatalog, &ActorContext::with_roles(actor.roles.clone()))?;

        let tx = self.db.write()?;
        let company = catalog::resolve_company(&tx, &input.company)?;
        let id = catalog::insert_internship(
            &tx,
            &NewInternship {
                company_id: company.id,
                title: input.title.clone(),
                description: input.description.clone(),
                start_date: input.start_date,
                end_date: input.end_date,
                positions: input.positions,
            },
        )?;
        let internship = catalog::get_internship(&tx, &id)?;
        tx.commit()?;

        info!(internship = %internship.id, title = %internship.title, by = %actor.username, "added internship");
        Ok(internship)
    }

    pub fn list_internships(&self, open_only: bool) -> PortalResult<Vec<Internship>> {
        catalog::list_internships(self.db.conn(), open_only)
    }

    /// Stop accepting applications. Applications already submitted continue.
    pub fn close_internship(&mut self, actor: &User, reference: &str) -> PortalResult<Internship> {
        self.engine
            .authorize(Action::ManageCatalog, &ActorContext::with_roles(actor.roles.clone()))?;

        let tx = self.db.write()?;
        let id = db::resolve(&tx, EntityPrefix::Int, reference)?;
        catalog::set_internship_open(&tx, &id, false)?;
        let internship = catalog::get_internship(&tx, &id)?;
        tx.commit()?;

        info!(internship = %internship.id, by = %actor.username, "closed internship");
        Ok(internship)
    }

    // =====================================================================
    // Application lifecycle
    // =====================================================================

    pub fn submit_application(
        &mut self,
        actor: &User,
        internship: &str,
        instructor: &str,
        statement: &str,
    ) -> PortalResult<Application> {
        self.engine
            .authorize(Action::Submit, &ActorContext::with_roles(actor.roles.clone()))?;
        if statement.trim().is_empty() {
            return Err(PortalError::validation("The application statement must not be empty"));
        }

        let tx = self.db.write()?;
        let internship_id = db::resolve(&tx, EntityPrefix::Int, internship)?;
        let internship = catalog::get_internship(&tx, &internship_id)?;
        if !internship.open {
            return Err(PortalError::validation(format!(
                "Internship '{}' is closed",
                internship.title
            )));
        }
        if catalog::filled_positions(&tx, &internship.id)? >= internship.positions {
            return Err(PortalError::validation(format!(
                "All {} positions of '{}' are filled",
                internship.positions, internship.title
            )));
        }

        let instructor = users::resolve(&tx, instructor)?;
        require_member(&instructor, Role::Instructor, "course instructor")?;
        if instructor.id == actor.id {
            return Err(PortalError::validation("You cannot be your own course instructor"));
        }

        let id = applications::insert(&tx, &actor.id, &internship.id, &instructor.id, statement)?;
        let app = applications::get(&tx, &id)?;
        tx.commit()?;

        info!(application = %app.id, student = %actor.username, internship = %internship.title, "application submitted");
        Ok(app)
    }

    pub fn withdraw_application(
        &mut self,
        actor: &User,
        reference: &str,
        reason: Option<&str>,
    ) -> PortalResult<Application> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::Withdraw, &actor_context(&tx, actor, &app)?)?;

        transition(engine, &tx, &app, ApplicationStatus::Withdrawn, actor, reason)?;
        let app = applications::get(&tx, &app.id)?;
        tx.commit()?;
        Ok(app)
    }

    /// Course instructor approves or rejects a freshly submitted application
    pub fn instructor_review(
        &mut self,
        actor: &User,
        reference: &str,
        decision: Decision,
        feedback: Option<&str>,
    ) -> PortalResult<Application> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let mut app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::InstructorReview, &actor_context(&tx, actor, &app)?)?;
        engine.expect_status(app.status, ApplicationStatus::PendingInstructor)?;

        if let Some(feedback) = feedback {
            applications::set_instructor_feedback(&tx, &app.id, app.version, Some(feedback))?;
            app = applications::get(&tx, &app.id)?;
        }
        let to = match decision {
            Decision::Approve => ApplicationStatus::PendingSupervisor,
            Decision::Reject => ApplicationStatus::Rejected,
        };
        let note = format!("instructor {}", decision.as_vote());
        transition(engine, &tx, &app, to, actor, Some(&note))?;

        let app = applications::get(&tx, &app.id)?;
        tx.commit()?;
        Ok(app)
    }

    /// Assign the supervisor. In `pending_supervisor` this moves the
    /// application to the committee; later on it replaces the supervisor.
    pub fn assign_supervisor(
        &mut self,
        actor: &User,
        reference: &str,
        supervisor: &str,
    ) -> PortalResult<Application> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::AssignSupervisor, &actor_context(&tx, actor, &app)?)?;

        let supervisor = users::resolve(&tx, supervisor)?;
        require_member(&supervisor, Role::Supervisor, "supervisor")?;
        if supervisor.id == app.student_id {
            return Err(PortalError::validation("A student cannot supervise their own internship"));
        }

        use ApplicationStatus::*;
        match app.status {
            PendingSupervisor => {
                applications::set_supervisor(&tx, &app.id, app.version, &supervisor.id)?;
                let app = applications::get(&tx, &app.id)?;
                let note = format!("supervisor {} assigned", supervisor.username);
                transition(engine, &tx, &app, PendingCommittee, actor, Some(&note))?;

                // A committee formed early may already be decided
                let app = applications::get(&tx, &app.id)?;
                settle_committee(engine, &tx, &app, actor)?;
            }
            PendingCommittee | PendingDocuments | SentToCompany | InProgress => {
                applications::set_supervisor(&tx, &app.id, app.version, &supervisor.id)?;
                info!(application = %app.id, supervisor = %supervisor.username, by = %actor.username, "supervisor replaced");
            }
            current => {
                return Err(WorkflowError::WrongStatus {
                    expected: PendingSupervisor,
                    current,
                }
                .into())
            }
        }

        let app = applications::get(&tx, &app.id)?;
        tx.commit()?;
        Ok(app)
    }

    // =====================================================================
    // Committee
    // =====================================================================

    /// Add committee members. Members already on the committee are skipped.
    pub fn assign_committee(
        &mut self,
        actor: &User,
        reference: &str,
        members: &[String],
    ) -> PortalResult<CommitteeView> {
        if members.is_empty() {
            return Err(PortalError::validation("No committee members given"));
        }

        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::ManageCommittee, &actor_context(&tx, actor, &app)?)?;
        expect_committee_open(&app)?;

        let mut seen = BTreeSet::new();
        let mut added = 0;
        for reference in members {
            let member = users::resolve(&tx, reference)?;
            if !seen.insert(member.id.clone()) {
                continue;
            }
            require_member(&member, Role::Committee, "committee member")?;
            if member.id == app.student_id {
                return Err(PortalError::validation(
                    "A student cannot sit on the committee for their own application",
                ));
            }
            if committee::assign(&tx, &app.id, &member.id)? {
                added += 1;
                debug!(application = %app.id, member = %member.username, "committee member assigned");
            }
        }
        info!(application = %app.id, added, by = %actor.username, "committee updated");

        settle_committee(engine, &tx, &app, actor)?;
        let view = committee_view(&tx, &app.id)?;
        tx.commit()?;
        Ok(view)
    }

    /// Remove a member. Their vote stops counting, which may decide the tally.
    pub fn remove_committee_member(
        &mut self,
        actor: &User,
        reference: &str,
        member: &str,
    ) -> PortalResult<CommitteeView> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::ManageCommittee, &actor_context(&tx, actor, &app)?)?;
        expect_committee_open(&app)?;

        let member = users::resolve(&tx, member)?;
        if !committee::deactivate(&tx, &app.id, &member.id)? {
            return Err(PortalError::NotOnCommittee(member.username));
        }
        info!(application = %app.id, member = %member.username, by = %actor.username, "committee member removed");

        settle_committee(engine, &tx, &app, actor)?;
        let view = committee_view(&tx, &app.id)?;
        tx.commit()?;
        Ok(view)
    }

    /// Record the acting member's vote and apply the quorum rule, atomically
    pub fn cast_vote(
        &mut self,
        actor: &User,
        reference: &str,
        decision: Decision,
        comment: Option<&str>,
    ) -> PortalResult<CommitteeView> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::Vote, &actor_context(&tx, actor, &app)?)?;
        engine.expect_status(app.status, ApplicationStatus::PendingCommittee)?;

        committee::record_vote(&tx, &app.id, &actor.id, decision.as_vote(), comment)?;
        info!(application = %app.id, member = %actor.username, vote = %decision, "committee vote recorded");

        settle_committee(engine, &tx, &app, actor)?;
        let view = committee_view(&tx, &app.id)?;
        tx.commit()?;
        Ok(view)
    }

    pub fn committee_status(&self, actor: &User, reference: &str) -> PortalResult<CommitteeView> {
        let conn = self.db.conn();
        let app = applications::resolve(conn, reference)?;
        ensure_can_view(&self.engine, &actor_context(conn, actor, &app)?)?;
        committee_view(conn, &app.id)
    }

    // =====================================================================
    // Documents and the company
    // =====================================================================

    pub fn generate_document(
        &mut self,
        actor: &User,
        reference: &str,
        kind: DocumentKind,
    ) -> PortalResult<DocumentRecord> {
        let generator = DocumentGenerator::new(self.templates_dir.as_deref())?;
        let engine = &self.engine;
        let letterhead = &self.config.documents;
        let documents_dir = &self.documents_dir;

        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::GenerateDocument, &actor_context(&tx, actor, &app)?)?;
        if !documents::is_available(kind, app.status, app.supervisor_id.is_some()) {
            return Err(PortalError::validation(format!(
                "A {} cannot be generated while the application is {}",
                kind, app.status
            )));
        }

        let ctx = document_context(&tx, &app)?;
        let html = generator.render(kind, &ctx, letterhead)?;
        let doc_id = EntityId::new(EntityPrefix::Doc);
        let mut written = documents::write_document(documents_dir, &app.id, kind, &doc_id, &html)?;
        records::insert_document(&tx, &doc_id, &app.id, kind, &written.path, &written.sha256, &actor.id)?;
        let record = records::get_document(&tx, &doc_id)?;
        tx.commit()?;
        written.keep();

        info!(application = %app.id, kind = %kind, path = %written.path.display(), "document generated");
        Ok(record)
    }

    pub fn list_documents(&self, actor: &User, reference: &str) -> PortalResult<Vec<DocumentRecord>> {
        let conn = self.db.conn();
        let app = applications::resolve(conn, reference)?;
        ensure_can_view(&self.engine, &actor_context(conn, actor, &app)?)?;
        records::list_documents(conn, &app.id)
    }

    /// Send the acceptance request to the company
    pub fn send_to_company(
        &mut self,
        actor: &User,
        reference: &str,
        note: Option<&str>,
    ) -> PortalResult<Application> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let mut app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::SendToCompany, &actor_context(&tx, actor, &app)?)?;
        engine.expect_status(app.status, ApplicationStatus::PendingDocuments)?;

        let request = records::latest_document(&tx, &app.id, DocumentKind::AcceptanceRequest)?
            .ok_or_else(|| {
                PortalError::validation(
                    "Generate an acceptance_request document before sending to the company",
                )
            })?;

        if let Some(note) = note {
            applications::set_staff_feedback(&tx, &app.id, app.version, Some(note))?;
            app = applications::get(&tx, &app.id)?;
        }
        let event_note = format!("acceptance request {} sent", request.id.short());
        transition(engine, &tx, &app, ApplicationStatus::SentToCompany, actor, Some(&event_note))?;

        let app = applications::get(&tx, &app.id)?;
        tx.commit()?;
        Ok(app)
    }

    pub fn record_company_response(
        &mut self,
        actor: &User,
        reference: &str,
        accepted: bool,
        note: Option<&str>,
    ) -> PortalResult<Application> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let mut app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::RecordCompanyResponse, &actor_context(&tx, actor, &app)?)?;
        engine.expect_status(app.status, ApplicationStatus::SentToCompany)?;

        if accepted {
            let internship = catalog::get_internship(&tx, &app.internship_id)?;
            if catalog::filled_positions(&tx, &internship.id)? >= internship.positions {
                return Err(PortalError::validation(format!(
                    "All {} positions of '{}' are already filled",
                    internship.positions, internship.title
                )));
            }
        }

        if let Some(note) = note {
            applications::set_company_note(&tx, &app.id, app.version, Some(note))?;
            app = applications::get(&tx, &app.id)?;
        }
        let (to, event_note) = if accepted {
            (ApplicationStatus::InProgress, "company accepted")
        } else {
            (ApplicationStatus::Rejected, "company declined")
        };
        transition(engine, &tx, &app, to, actor, Some(event_note))?;

        let app = applications::get(&tx, &app.id)?;
        tx.commit()?;
        Ok(app)
    }

    // =====================================================================
    // Visits and completion
    // =====================================================================

    pub fn schedule_visit(
        &mut self,
        actor: &User,
        reference: &str,
        at: DateTime<Utc>,
        location: &str,
    ) -> PortalResult<Visit> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::ScheduleVisit, &actor_context(&tx, actor, &app)?)?;
        engine.expect_status(app.status, ApplicationStatus::InProgress)?;

        let supervisor_id = app
            .supervisor_id
            .clone()
            .ok_or_else(|| PortalError::validation("The application has no supervisor"))?;
        let id = records::insert_visit(&tx, &app.id, &supervisor_id, at, location)?;
        let visit = records::get_visit(&tx, &id)?;
        tx.commit()?;

        info!(application = %app.id, visit = %visit.id, at = %visit.scheduled_for, "visit scheduled");
        Ok(visit)
    }

    pub fn complete_visit(&mut self, actor: &User, visit: &str, notes: Option<&str>) -> PortalResult<Visit> {
        self.finish_visit(actor, visit, VisitStatus::Completed, notes)
    }

    pub fn cancel_visit(&mut self, actor: &User, visit: &str, notes: Option<&str>) -> PortalResult<Visit> {
        self.finish_visit(actor, visit, VisitStatus::Cancelled, notes)
    }

    fn finish_visit(
        &mut self,
        actor: &User,
        reference: &str,
        to: VisitStatus,
        notes: Option<&str>,
    ) -> PortalResult<Visit> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let visit = records::resolve_visit(&tx, reference)?;
        let app = applications::get(&tx, &visit.application_id)?;
        engine.authorize(Action::ScheduleVisit, &actor_context(&tx, actor, &app)?)?;

        records::finish_visit(&tx, &visit.id, to, notes)?;
        let visit = records::get_visit(&tx, &visit.id)?;
        tx.commit()?;

        info!(visit = %visit.id, status = %visit.status, by = %actor.username, "visit updated");
        Ok(visit)
    }

    pub fn list_visits(&self, actor: &User, reference: &str) -> PortalResult<Vec<Visit>> {
        let conn = self.db.conn();
        let app = applications::resolve(conn, reference)?;
        ensure_can_view(&self.engine, &actor_context(conn, actor, &app)?)?;
        records::list_visits(conn, &app.id)
    }

    pub fn complete_application(
        &mut self,
        actor: &User,
        reference: &str,
        note: Option<&str>,
    ) -> PortalResult<Application> {
        let engine = &self.engine;
        let tx = self.db.write()?;
        let app = applications::resolve(&tx, reference)?;
        engine.authorize(Action::Complete, &actor_context(&tx, actor, &app)?)?;
        engine.expect_status(app.status, ApplicationStatus::InProgress)?;

        if engine.config().require_visit_for_completion && !records::has_completed_visit(&tx, &app.id)? {
            return Err(PortalError::validation(
                "A completed supervisor visit is required before the internship can be completed",
            ));
        }
        transition(engine, &tx, &app, ApplicationStatus::Completed, actor, note)?;

        let app = applications::get(&tx, &app.id)?;
        tx.commit()?;
        Ok(app)
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn show_application(&self, actor: &User, reference: &str) -> PortalResult<ApplicationDetail> {
        let conn = self.db.conn();
        let app = applications::resolve(conn, reference)?;
        ensure_can_view(&self.engine, &actor_context(conn, actor, &app)?)?;

        let members = committee::list(conn, &app.id, true)?;
        let committee = QuorumSummary::from_votes(members.iter().filter(|m| m.active).map(|m| m.status));
        let events = applications::events(conn, &app.id)?;
        let progress = app
            .progress()
            .with_timeline(events.iter().map(|e| (e.from_status, e.to_status, e.at)));
        Ok(ApplicationDetail {
            progress,
            allowed_transitions: self.engine.allowed_transitions(app.status),
            committee,
            members,
            documents: records::list_documents(conn, &app.id)?,
            visits: records::list_visits(conn, &app.id)?,
            events,
            application: app,
        })
    }

    pub fn history(&self, actor: &User, reference: &str) -> PortalResult<Vec<ApplicationEvent>> {
        let conn = self.db.conn();
        let app = applications::resolve(conn, reference)?;
        ensure_can_view(&self.engine, &actor_context(conn, actor, &app)?)?;
        applications::events(conn, &app.id)
    }

    /// Applications the actor may see. Staff and admins see everything;
    /// everyone else sees the applications they take part in.
    pub fn list_applications(
        &self,
        actor: &User,
        status: Option<ApplicationStatus>,
    ) -> PortalResult<Vec<Application>> {
        let conn = self.db.conn();
        let base = ApplicationFilter {
            status,
            ..Default::default()
        };

        if can_view_all(&self.engine, actor) {
            return applications::list(conn, &base);
        }

        let mut filters = Vec::new();
        if actor.has_role(Role::Student) {
            filters.push(ApplicationFilter {
                student_id: Some(actor.id.clone()),
                ..base.clone()
            });
        }
        if actor.has_role(Role::Instructor) {
            filters.push(ApplicationFilter {
                instructor_id: Some(actor.id.clone()),
                ..base.clone()
            });
        }
        if actor.has_role(Role::Supervisor) {
            filters.push(ApplicationFilter {
                supervisor_id: Some(actor.id.clone()),
                ..base.clone()
            });
        }
        if actor.has_role(Role::Committee) {
            filters.push(ApplicationFilter {
                committee_member_id: Some(actor.id.clone()),
                ..base.clone()
            });
        }

        let mut seen = BTreeSet::new();
        let mut apps = Vec::new();
        for filter in &filters {
            for app in applications::list(conn, filter)? {
                if seen.insert(app.id.clone()) {
                    apps.push(app);
                }
            }
        }
        apps.sort_by(|a, b| b.created.cmp(&a.created).then(b.row.cmp(&a.row)));
        Ok(apps)
    }

    pub fn dashboard(&self, actor: &User) -> PortalResult<Dashboard> {
        let conn = self.db.conn();
        let by_status = |status: ApplicationStatus, filter: ApplicationFilter| {
            applications::list(
                conn,
                &ApplicationFilter {
                    status: Some(status),
                    ..filter
                },
            )
        };

        let mut dashboard = Dashboard {
            username: actor.username.clone(),
            roles: actor.roles.clone(),
            counts: None,
            my_applications: Vec::new(),
            awaiting_review: Vec::new(),
            awaiting_vote: Vec::new(),
            supervising: Vec::new(),
            upcoming_visits: Vec::new(),
            staff_queue: Vec::new(),
        };

        if actor.has_role(Role::Student) {
            dashboard.my_applications = applications::list(
                conn,
                &ApplicationFilter {
                    student_id: Some(actor.id.clone()),
                    ..Default::default()
                },
            )?;
        }
        if actor.has_role(Role::Instructor) {
            dashboard.awaiting_review = by_status(
                ApplicationStatus::PendingInstructor,
                ApplicationFilter {
                    instructor_id: Some(actor.id.clone()),
                    ..Default::default()
                },
            )?;
        }
        if actor.has_role(Role::Committee) {
            for app in by_status(
                ApplicationStatus::PendingCommittee,
                ApplicationFilter {
                    committee_member_id: Some(actor.id.clone()),
                    ..Default::default()
                },
            )? {
                let pending = committee::get(conn, &app.id, &actor.id)?
                    .map(|a| a.active && a.status == VoteStatus::Pending)
                    .unwrap_or(false);
                if pending {
                    dashboard.awaiting_vote.push(app);
                }
            }
        }
        if actor.has_role(Role::Supervisor) {
            dashboard.supervising = applications::list(
                conn,
                &ApplicationFilter {
                    supervisor_id: Some(actor.id.clone()),
                    ..Default::default()
                },
            )?
            .into_iter()
            .filter(|a| !a.status.is_terminal())
            .collect();
            dashboard.upcoming_visits = records::scheduled_for_supervisor(conn, &actor.id)?;
        }
        if can_view_all(&self.engine, actor) {
            dashboard.counts = Some(applications::count_by_status(conn)?);
            for status in [
                ApplicationStatus::PendingSupervisor,
                ApplicationStatus::PendingDocuments,
                ApplicationStatus::SentToCompany,
            ] {
                dashboard
                    .staff_queue
                    .extend(by_status(status, ApplicationFilter::default())?);
            }
        }

        Ok(dashboard)
    }

    /// Office-wide report; staff and admins only
    pub fn report_summary(&self, actor: &User) -> PortalResult<ReportSummary> {
        self.engine
            .authorize(Action::ViewAll, &ActorContext::with_roles(actor.roles.clone()))?;
        let conn = self.db.conn();

        let counts = applications::count_by_status(conn)?;
        let mut internships = Vec::new();
        for internship in catalog::list_internships(conn, false)? {
            let applications = applications::list(
                conn,
                &ApplicationFilter {
                    internship_id: Some(internship.id.clone()),
                    ..Default::default()
                },
            )?
            .len();
            internships.push(InternshipLoad {
                filled: catalog::filled_positions(conn, &internship.id)?,
                id: internship.id,
                title: internship.title,
                company_name: internship.company_name,
                positions: internship.positions,
                applications,
                open: internship.open,
            });
        }

        Ok(ReportSummary {
            total: counts.values().sum(),
            counts,
            internships,
        })
    }
}

// =========================================================================
// Helpers shared by operations; they take the open transaction
// =========================================================================

fn actor_context(conn: &Connection, actor: &User, app: &Application) -> PortalResult<ActorContext> {
    let is_committee_member = committee::get(conn, &app.id, &actor.id)?
        .map(|a| a.active)
        .unwrap_or(false);
    Ok(ActorContext {
        roles: actor.roles.clone(),
        is_owner: app.student_id == actor.id,
        is_instructor: app.instructor_id == actor.id,
        is_supervisor: app.supervisor_id.as_ref() == Some(&actor.id),
        is_committee_member,
    })
}

fn can_view_all(engine: &WorkflowEngine, actor: &User) -> bool {
    engine
        .authorize(Action::ViewAll, &ActorContext::with_roles(actor.roles.clone()))
        .is_ok()
}

/// Participants see their applications; anyone else needs the staff role
fn ensure_can_view(engine: &WorkflowEngine, ctx: &ActorContext) -> PortalResult<()> {
    if ctx.is_owner || ctx.is_instructor || ctx.is_supervisor || ctx.is_committee_member {
        return Ok(());
    }
    engine.authorize(Action::ViewAll, ctx)?;
    Ok(())
}

fn require_member(user: &User, role: Role, what: &str) -> PortalResult<()> {
    if !user.active {
        return Err(PortalError::InactiveUser(user.username.clone()));
    }
    if !user.has_role(role) {
        return Err(PortalError::validation(format!(
            "{} cannot act as {}: missing the {} role",
            user.username, what, role
        )));
    }
    Ok(())
}

/// The committee can be formed before the supervisor is assigned and
/// changed until it has decided
fn expect_committee_open(app: &Application) -> PortalResult<()> {
    match app.status {
        ApplicationStatus::PendingSupervisor | ApplicationStatus::PendingCommittee => Ok(()),
        current => Err(WorkflowError::WrongStatus {
            expected: ApplicationStatus::PendingCommittee,
            current,
        }
        .into()),
    }
}

fn transition(
    engine: &WorkflowEngine,
    conn: &Connection,
    app: &Application,
    to: ApplicationStatus,
    actor: &User,
    note: Option<&str>,
) -> PortalResult<()> {
    engine.check_transition(app.status, to)?;
    applications::update_status(conn, &app.id, app.version, app.status, to, &actor.id, note)?;
    info!(application = %app.id, from = %app.status, to = %to, actor = %actor.username, "application status changed");
    Ok(())
}

/// Apply the quorum rule to an application in the committee stage.
/// An approval only counts once the committee has its minimum size.
fn settle_committee(
    engine: &WorkflowEngine,
    conn: &Connection,
    app: &Application,
    actor: &User,
) -> PortalResult<QuorumSummary> {
    let summary = QuorumSummary::from_votes(committee::active_votes(conn, &app.id)?);
    if app.status != ApplicationStatus::PendingCommittee {
        return Ok(summary);
    }

    let to = match summary.outcome() {
        QuorumOutcome::Rejected => ApplicationStatus::Rejected,
        QuorumOutcome::Approved if summary.total >= engine.config().min_committee_size => {
            ApplicationStatus::PendingDocuments
        }
        _ => return Ok(summary),
    };
    let note = format!(
        "committee {} ({} of {} approved)",
        summary.outcome(),
        summary.approved,
        summary.total
    );
    transition(engine, conn, app, to, actor, Some(&note))?;
    Ok(summary)
}

fn committee_view(conn: &Connection, id: &EntityId) -> PortalResult<CommitteeView> {
    let application = applications::get(conn, id)?;
    let members = committee::list(conn, id, true)?;
    let summary = QuorumSummary::from_votes(members.iter().filter(|m| m.active).map(|m| m.status));
    Ok(CommitteeView {
        application,
        outcome: summary.outcome(),
        summary,
        members,
    })
}

fn document_context(conn: &Connection, app: &Application) -> PortalResult<DocumentContext> {
    let student = users::get(conn, &app.student_id)?;
    let instructor = users::get(conn, &app.instructor_id)?;
    let supervisor = app
        .supervisor_id
        .as_ref()
        .map(|id| users::get(conn, id))
        .transpose()?;
    let internship = catalog::get_internship(conn, &app.internship_id)?;
    let company = catalog::get_company(conn, &internship.company_id)?;

    Ok(DocumentContext {
        application_id: app.id.to_string(),
        student_name: student.name,
        student_email: student.email,
        instructor_name: instructor.name,
        supervisor_name: supervisor.as_ref().map(|s| s.name.clone()),
        supervisor_email: supervisor.map(|s| s.email),
        company_name: company.name,
        company_address: company.address,
        company_contact: company.contact_name,
        internship_title: internship.title,
        start_date: internship.start_date,
        end_date: internship.end_date,
    })
}
