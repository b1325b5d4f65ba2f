//! Database schema initialization

use rusqlite::Connection;

pub(super) fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Users; roles is a comma-separated role string
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            roles TEXT NOT NULL DEFAULT '',
            active INTEGER NOT NULL DEFAULT 1,
            created TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            address TEXT,
            contact_name TEXT,
            contact_email TEXT,
            created TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS internships (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(id),
            title TEXT NOT NULL,
            description TEXT,
            start_date TEXT,
            end_date TEXT,
            positions INTEGER NOT NULL DEFAULT 1,
            open INTEGER NOT NULL DEFAULT 1,
            created TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_internships_company ON internships(company_id);

        -- Applications: status is the only progress field; version guards lost updates
        CREATE TABLE IF NOT EXISTS applications (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES users(id),
            internship_id TEXT NOT NULL REFERENCES internships(id),
            instructor_id TEXT NOT NULL REFERENCES users(id),
            supervisor_id TEXT REFERENCES users(id),
            status TEXT NOT NULL,
            stopped_at TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            statement TEXT NOT NULL DEFAULT '',
            instructor_feedback TEXT,
            staff_feedback TEXT,
            company_note TEXT,
            created TEXT NOT NULL,
            updated TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
        CREATE INDEX IF NOT EXISTS idx_applications_student ON applications(student_id);
        CREATE INDEX IF NOT EXISTS idx_applications_instructor ON applications(instructor_id);
        CREATE INDEX IF NOT EXISTS idx_applications_supervisor ON applications(supervisor_id);
        -- At most one open application per student and internship
        CREATE UNIQUE INDEX IF NOT EXISTS idx_applications_open
            ON applications(student_id, internship_id)
            WHERE status NOT IN ('completed', 'rejected', 'withdrawn');

        -- Append-only status history
        CREATE TABLE IF NOT EXISTS application_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id TEXT NOT NULL REFERENCES applications(id),
            from_status TEXT,
            to_status TEXT NOT NULL,
            actor_id TEXT NOT NULL REFERENCES users(id),
            note TEXT,
            at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_application ON application_events(application_id);

        -- One row per committee member per application
        CREATE TABLE IF NOT EXISTS committee_assignments (
            application_id TEXT NOT NULL REFERENCES applications(id),
            member_id TEXT NOT NULL REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'pending',
            comment TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            assigned_at TEXT NOT NULL,
            voted_at TEXT,
            PRIMARY KEY (application_id, member_id)
        );
        CREATE INDEX IF NOT EXISTS idx_committee_member ON committee_assignments(member_id);

        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            application_id TEXT NOT NULL REFERENCES applications(id),
            kind TEXT NOT NULL,
            file_path TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            generated_by TEXT NOT NULL REFERENCES users(id),
            created TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_application ON documents(application_id);

        CREATE TABLE IF NOT EXISTS visits (
            id TEXT PRIMARY KEY,
            application_id TEXT NOT NULL REFERENCES applications(id),
            supervisor_id TEXT NOT NULL REFERENCES users(id),
            scheduled_for TEXT NOT NULL,
            location TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            notes TEXT,
            created TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_visits_application ON visits(application_id);
        "#,
    )
}
