//! SQL schema for the Guise SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS names (
    name_id      TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    name_text    TEXT NOT NULL,
    name_type    TEXT NOT NULL,      -- 'legal' | 'preferred' | 'nickname' | ...
    is_preferred INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

-- At most one preferred name per user.
CREATE UNIQUE INDEX IF NOT EXISTS names_one_preferred_idx
    ON names(user_id) WHERE is_preferred = 1;

CREATE TABLE IF NOT EXISTS contexts (
    context_id   TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    context_name TEXT NOT NULL,
    description  TEXT,
    created_at   TEXT NOT NULL,
    UNIQUE (user_id, context_name)
);

-- One name per context; reassignment replaces the row.
CREATE TABLE IF NOT EXISTS context_name_assignments (
    context_id  TEXT PRIMARY KEY REFERENCES contexts(context_id),
    name_id     TEXT NOT NULL REFERENCES names(name_id),
    user_id     TEXT NOT NULL,
    assigned_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS consents (
    consent_id        TEXT PRIMARY KEY,
    granter_user_id   TEXT NOT NULL,
    requester_user_id TEXT NOT NULL,
    context_id        TEXT NOT NULL REFERENCES contexts(context_id),
    status            TEXT NOT NULL,   -- 'granted' | 'revoked'
    granted_at        TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    expires_at        TEXT,            -- NULL = never expires
    revoked_at        TEXT
);

-- Disclosure log; rows are only ever inserted.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id          TEXT PRIMARY KEY,
    target_user_id    TEXT NOT NULL,
    requester_user_id TEXT,
    action            TEXT NOT NULL,   -- 'NAME_DISCLOSED'
    source            TEXT NOT NULL,   -- ResolutionSource wire name
    resolved_name     TEXT NOT NULL,
    name_id           TEXT,
    metadata_json     TEXT NOT NULL,
    recorded_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS names_user_idx      ON names(user_id);
CREATE INDEX IF NOT EXISTS consents_pair_idx   ON consents(granter_user_id, requester_user_id);
CREATE INDEX IF NOT EXISTS audit_target_idx    ON audit_log(target_user_id, recorded_at);

PRAGMA user_version = 1;
";
