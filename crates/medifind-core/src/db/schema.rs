//! SQLite schema definition.

/// Local schema. Only the signed-in identity is stored; everything else lives
/// in the hosted backend.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Session State
-- ============================================================================

CREATE TABLE IF NOT EXISTS session_state (
    key TEXT PRIMARY KEY,                         -- 'user' | 'profile' | 'session'
    value TEXT NOT NULL,                          -- JSON document
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
