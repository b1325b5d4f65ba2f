use super::*;
use crate::core::error::PortalError;
use crate::core::role::{Role, RoleSet};
use crate::core::status::{ApplicationStatus, VoteStatus};

struct Seed {
    student: EntityId,
    instructor: EntityId,
    member_a: EntityId,
    member_b: EntityId,
    internship: EntityId,
}

fn roles(list: &[Role]) -> RoleSet {
    RoleSet::new(list.iter().copied())
}

fn seed(db: &Database) -> Seed {
    let conn = db.conn();
    let student = users::insert(conn, "alice", "Alice A", "alice@uni.test", &roles(&[Role::Student])).unwrap();
    let instructor = users::insert(conn, "bob", "Bob B", "bob@uni.test", &roles(&[Role::Instructor])).unwrap();
    let member_a = users::insert(conn, "carol", "Carol C", "carol@uni.test", &roles(&[Role::Committee])).unwrap();
    let member_b = users::insert(conn, "dave", "Dave D", "dave@uni.test", &roles(&[Role::Committee])).unwrap();
    let company = catalog::insert_company(
        conn,
        &catalog::NewCompany {
            name: "Acme".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let internship = catalog::insert_internship(
        conn,
        &catalog::NewInternship {
            company_id: company,
            title: "Backend intern".to_string(),
            description: None,
            start_date: None,
            end_date: None,
            positions: 2,
        },
    )
    .unwrap();
    Seed {
        student,
        instructor,
        member_a,
        member_b,
        internship,
    }
}

fn submit(db: &Database, seed: &Seed) -> EntityId {
    applications::insert(db.conn(), &seed.student, &seed.internship, &seed.instructor, "Hire me").unwrap()
}

#[test]
fn test_schema_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("portal.db");
    {
        let db = Database::open(&path).unwrap();
        users::insert(db.conn(), "alice", "Alice", "a@x", &roles(&[Role::Student])).unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(users::count(db.conn()).unwrap(), 1);
}

#[test]
fn test_username_unique_case_insensitive() {
    let db = Database::open_in_memory().unwrap();
    users::insert(db.conn(), "alice", "Alice", "a@x", &roles(&[Role::Student])).unwrap();
    let err = users::insert(db.conn(), "ALICE", "Other", "o@x", &roles(&[Role::Student])).unwrap_err();
    assert!(matches!(err, PortalError::Validation(_)));

    let found = users::resolve(db.conn(), "Alice").unwrap();
    assert_eq!(found.username, "alice");
}

#[test]
fn test_user_list_filters_role_and_inactive() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    users::set_active(db.conn(), &seed.member_b, false).unwrap();

    let committee = users::list(db.conn(), Some(Role::Committee), false).unwrap();
    assert_eq!(committee.len(), 1);
    assert_eq!(committee[0].username, "carol");

    let everyone = users::list(db.conn(), None, true).unwrap();
    assert_eq!(everyone.len(), 4);
}

#[test]
fn test_resolve_row_and_prefix_references() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app = submit(&db, &seed);

    let by_row = resolve(db.conn(), EntityPrefix::App, "APP@1").unwrap();
    assert_eq!(by_row, app);

    let full = app.to_string();
    let by_prefix = resolve(db.conn(), EntityPrefix::App, &full[..12]).unwrap();
    assert_eq!(by_prefix, app);

    let by_full = resolve(db.conn(), EntityPrefix::App, &full).unwrap();
    assert_eq!(by_full, app);

    let missing = resolve(db.conn(), EntityPrefix::App, "APP@99").unwrap_err();
    assert!(matches!(missing, PortalError::NotFound { .. }));
}

#[test]
fn test_one_open_application_per_internship() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app = submit(&db, &seed);

    let err = applications::insert(db.conn(), &seed.student, &seed.internship, &seed.instructor, "Again")
        .unwrap_err();
    assert!(matches!(err, PortalError::Validation(_)));

    // Once withdrawn, the student may apply again
    applications::update_status(
        db.conn(),
        &app,
        1,
        ApplicationStatus::PendingInstructor,
        ApplicationStatus::Withdrawn,
        &seed.student,
        None,
    )
    .unwrap();
    submit(&db, &seed);
}

#[test]
fn test_update_status_detects_stale_version() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);

    applications::update_status(
        db.conn(),
        &app_id,
        1,
        ApplicationStatus::PendingInstructor,
        ApplicationStatus::PendingSupervisor,
        &seed.instructor,
        Some("looks good"),
    )
    .unwrap();

    let err = applications::update_status(
        db.conn(),
        &app_id,
        1,
        ApplicationStatus::PendingInstructor,
        ApplicationStatus::Rejected,
        &seed.instructor,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, PortalError::Conflict { expected: 1 }));

    let app = applications::get(db.conn(), &app_id).unwrap();
    assert_eq!(app.status, ApplicationStatus::PendingSupervisor);
    assert_eq!(app.version, 2);

    let events = applications::events(db.conn(), &app_id).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].from_status, None);
    assert_eq!(events[1].to_status, ApplicationStatus::PendingSupervisor);
    assert_eq!(events[1].actor_username, "bob");
}

#[test]
fn test_rejection_remembers_stage() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);
    applications::update_status(
        db.conn(),
        &app_id,
        1,
        ApplicationStatus::PendingInstructor,
        ApplicationStatus::Rejected,
        &seed.instructor,
        None,
    )
    .unwrap();

    let app = applications::get(db.conn(), &app_id).unwrap();
    assert_eq!(app.stopped_at, Some(ApplicationStatus::PendingInstructor));
    assert!(app.progress().instructor_reviewed);
    assert_eq!(app.progress().course_instructor_status, VoteStatus::Rejected);
}

#[test]
fn test_list_filters() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);
    committee::assign(db.conn(), &app_id, &seed.member_a).unwrap();

    let mine = applications::list(
        db.conn(),
        &ApplicationFilter {
            committee_member_id: Some(seed.member_a.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(mine.len(), 1);

    let none = applications::list(
        db.conn(),
        &ApplicationFilter {
            committee_member_id: Some(seed.member_b.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(none.is_empty());

    let pending = applications::list(
        db.conn(),
        &ApplicationFilter {
            status: Some(ApplicationStatus::PendingInstructor),
            student_id: Some(seed.student.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(pending.len(), 1);

    let counts = applications::count_by_status(db.conn()).unwrap();
    assert_eq!(counts[&ApplicationStatus::PendingInstructor], 1);
    assert_eq!(counts[&ApplicationStatus::Completed], 0);
}

#[test]
fn test_vote_once_per_member() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);
    assert!(committee::assign(db.conn(), &app_id, &seed.member_a).unwrap());
    assert!(!committee::assign(db.conn(), &app_id, &seed.member_a).unwrap());

    committee::record_vote(db.conn(), &app_id, &seed.member_a, VoteStatus::Approved, None).unwrap();
    let err = committee::record_vote(db.conn(), &app_id, &seed.member_a, VoteStatus::Rejected, None)
        .unwrap_err();
    assert!(matches!(err, PortalError::AlreadyVoted(ref who) if who == "carol"));

    let err = committee::record_vote(db.conn(), &app_id, &seed.member_b, VoteStatus::Approved, None)
        .unwrap_err();
    assert!(matches!(err, PortalError::NotOnCommittee(_)));

    assert_eq!(
        committee::active_votes(db.conn(), &app_id).unwrap(),
        vec![VoteStatus::Approved]
    );
}

#[test]
fn test_reassigned_member_votes_again() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);
    committee::assign(db.conn(), &app_id, &seed.member_a).unwrap();
    committee::record_vote(db.conn(), &app_id, &seed.member_a, VoteStatus::Rejected, Some("no")).unwrap();

    assert!(committee::deactivate(db.conn(), &app_id, &seed.member_a).unwrap());
    assert!(committee::active_votes(db.conn(), &app_id).unwrap().is_empty());
    assert_eq!(committee::list(db.conn(), &app_id, true).unwrap().len(), 1);

    committee::assign(db.conn(), &app_id, &seed.member_a).unwrap();
    let assignment = committee::get(db.conn(), &app_id, &seed.member_a).unwrap().unwrap();
    assert_eq!(assignment.status, VoteStatus::Pending);
    assert!(assignment.voted_at.is_none());
}

#[test]
fn test_visit_finishes_once() {
    let db = Database::open_in_memory().unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);
    let visit = records::insert_visit(db.conn(), &app_id, &seed.instructor, chrono::Utc::now(), "Acme HQ").unwrap();

    assert!(!records::has_completed_visit(db.conn(), &app_id).unwrap());
    records::finish_visit(db.conn(), &visit, VisitStatus::Completed, Some("went well")).unwrap();
    assert!(records::has_completed_visit(db.conn(), &app_id).unwrap());

    let err = records::finish_visit(db.conn(), &visit, VisitStatus::Cancelled, None).unwrap_err();
    assert!(matches!(err, PortalError::Validation(_)));
    assert_eq!(records::get_visit(db.conn(), &visit).unwrap().notes.as_deref(), Some("went well"));
}

#[test]
fn test_concurrent_votes_serialize() {
    use crate::core::quorum::{tally, QuorumOutcome};
    use std::sync::{Arc, Barrier};

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("portal.db");
    let db = Database::open(&path).unwrap();
    let seed = seed(&db);
    let app_id = submit(&db, &seed);

    let mut members = Vec::new();
    for i in 0..6 {
        let id = users::insert(
            db.conn(),
            &format!("member{i}"),
            "Member",
            "m@x",
            &roles(&[Role::Committee]),
        )
        .unwrap();
        committee::assign(db.conn(), &app_id, &id).unwrap();
        members.push(id);
    }
    // Move the application into the committee stage
    for (v, (from, to)) in [
        (ApplicationStatus::PendingInstructor, ApplicationStatus::PendingSupervisor),
        (ApplicationStatus::PendingSupervisor, ApplicationStatus::PendingCommittee),
    ]
    .into_iter()
    .enumerate()
    {
        applications::update_status(db.conn(), &app_id, v as i64 + 1, from, to, &seed.instructor, None)
            .unwrap();
    }
    drop(db);

    let barrier = Arc::new(Barrier::new(members.len()));
    let handles: Vec<_> = members
        .into_iter()
        .map(|member| {
            let path = path.clone();
            let app_id = app_id.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let mut db = Database::open(&path).unwrap();
                barrier.wait();
                let tx = db.write().unwrap();
                committee::record_vote(&tx, &app_id, &member, VoteStatus::Approved, None).unwrap();
                let app = applications::get(&tx, &app_id).unwrap();
                if app.status == ApplicationStatus::PendingCommittee
                    && tally(committee::active_votes(&tx, &app_id).unwrap()) == QuorumOutcome::Approved
                {
                    applications::update_status(
                        &tx,
                        &app_id,
                        app.version,
                        app.status,
                        ApplicationStatus::PendingDocuments,
                        &member,
                        None,
                    )
                    .unwrap();
                }
                tx.commit().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let app = applications::get(db.conn(), &app_id).unwrap();
    assert_eq!(app.status, ApplicationStatus::PendingDocuments);
    let to_documents = applications::events(db.conn(), &app_id)
        .unwrap()
        .into_iter()
        .filter(|e| e.to_status == ApplicationStatus::PendingDocuments)
        .count();
    assert_eq!(to_documents, 1);
}
