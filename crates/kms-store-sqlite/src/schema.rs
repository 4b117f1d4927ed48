//! SQL schema for the KMS SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('student', 'staff', 'admin')),
    created_at    TEXT NOT NULL    -- RFC 3339 UTC, microseconds
);

CREATE TABLE IF NOT EXISTS modules (
    module_id  TEXT PRIMARY KEY,
    title      TEXT NOT NULL UNIQUE CHECK (length(trim(title)) > 0),
    created_at TEXT NOT NULL
);

-- Many-to-many: which staff supervise which module.
CREATE TABLE IF NOT EXISTS module_staff (
    module_id TEXT NOT NULL REFERENCES modules(module_id) ON DELETE CASCADE,
    staff_id  TEXT NOT NULL REFERENCES users(user_id)     ON DELETE CASCADE,
    PRIMARY KEY (module_id, staff_id)
);

CREATE TABLE IF NOT EXISTS reports (
    report_id   TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    category    TEXT NOT NULL,   -- known label or 'custom:<text>'
    status      TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'in_progress', 'closed')),
    created_at  TEXT NOT NULL,
    owner_id    TEXT NOT NULL REFERENCES users(user_id)     ON DELETE CASCADE,
    module_id   TEXT NOT NULL REFERENCES modules(module_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id      TEXT PRIMARY KEY,
    report_id       TEXT NOT NULL REFERENCES reports(report_id) ON DELETE CASCADE,
    text            TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    visibility      TEXT NOT NULL CHECK (visibility IN ('public', 'private')),
    author_name     TEXT NOT NULL,
    author_staff_id TEXT REFERENCES users(user_id)       ON DELETE SET NULL,
    replies_to      TEXT REFERENCES comments(comment_id) ON DELETE CASCADE
);

-- Visibility is fixed once written.
CREATE TRIGGER IF NOT EXISTS comments_visibility_fixed
BEFORE UPDATE OF visibility ON comments
WHEN NEW.visibility IS NOT OLD.visibility
BEGIN
    SELECT RAISE(ABORT, 'comment visibility cannot change');
END;

CREATE INDEX IF NOT EXISTS reports_owner_idx    ON reports(owner_id);
CREATE INDEX IF NOT EXISTS reports_module_idx   ON reports(module_id);
CREATE INDEX IF NOT EXISTS comments_report_idx  ON comments(report_id);
CREATE INDEX IF NOT EXISTS module_staff_idx     ON module_staff(staff_id);

PRAGMA user_version = 1;
";
