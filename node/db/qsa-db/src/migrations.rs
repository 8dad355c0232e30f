use anyhow::{bail, Context};
use rusqlite::Connection;

/// Schema version the binaries were built against.
pub const SCHEMA_VERSION: u32 = 1;

/// One SQL batch per version, applied in order. Batches are append-only;
/// editing a shipped batch breaks existing deployments.
const MIGRATIONS: &[&str] = &[
    // v1: full initial schema.
    r#"
    CREATE TABLE serials (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        serial_integer   INTEGER NOT NULL UNIQUE,
        batch_id         INTEGER NOT NULL,
        module_sku       TEXT NOT NULL,
        qsa_sequence     INTEGER NOT NULL,
        array_position   INTEGER NOT NULL,
        status           TEXT NOT NULL DEFAULT 'reserved',
        created_by       TEXT NOT NULL DEFAULT '',
        created_at       TEXT NOT NULL,
        engraved_at      TEXT,
        voided_at        TEXT
    );
    CREATE INDEX idx_serials_row ON serials (batch_id, qsa_sequence, status);

    CREATE TABLE design_sequences (
        design           TEXT PRIMARY KEY,
        current_sequence INTEGER NOT NULL
    ) WITHOUT ROWID;

    CREATE TABLE identifiers (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        qsa_id           TEXT NOT NULL UNIQUE,
        design           TEXT NOT NULL,
        sequence_number  INTEGER NOT NULL,
        batch_id         INTEGER NOT NULL,
        qsa_sequence     INTEGER NOT NULL,
        created_at       TEXT NOT NULL,
        UNIQUE (design, sequence_number),
        UNIQUE (batch_id, qsa_sequence)
    );

    CREATE TABLE batches (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        name             TEXT NOT NULL,
        module_count     INTEGER NOT NULL DEFAULT 0,
        row_count        INTEGER NOT NULL DEFAULT 0,
        status           TEXT NOT NULL DEFAULT 'in_progress',
        created_by       TEXT NOT NULL DEFAULT '',
        created_at       TEXT NOT NULL,
        completed_at     TEXT
    );

    CREATE TABLE batch_modules (
        id                    INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id              INTEGER NOT NULL REFERENCES batches (id),
        production_batch_id   INTEGER NOT NULL,
        module_sku            TEXT NOT NULL,
        order_id              INTEGER NOT NULL,
        serial_number         TEXT,
        qsa_sequence          INTEGER NOT NULL,
        original_qsa_sequence INTEGER NOT NULL,
        array_position        INTEGER NOT NULL,
        row_status            TEXT NOT NULL DEFAULT 'pending',
        led_codes             TEXT NOT NULL DEFAULT '[]',
        engraved_at           TEXT
    );
    CREATE INDEX idx_modules_original ON batch_modules (batch_id, original_qsa_sequence);
    CREATE INDEX idx_modules_current ON batch_modules (batch_id, qsa_sequence);

    CREATE TABLE config_elements (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        design           TEXT NOT NULL,
        revision         TEXT NOT NULL DEFAULT '',
        position         INTEGER NOT NULL,
        element_type     TEXT NOT NULL,
        origin_x         REAL NOT NULL,
        origin_y         REAL NOT NULL,
        rotation         REAL NOT NULL DEFAULT 0,
        text_height      REAL,
        element_size     REAL,
        is_active        INTEGER NOT NULL DEFAULT 1,
        UNIQUE (design, revision, position, element_type)
    );

    CREATE TABLE sku_mappings (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        legacy_pattern   TEXT NOT NULL,
        match_type       TEXT NOT NULL,
        canonical_code   TEXT NOT NULL,
        revision         TEXT,
        priority         INTEGER NOT NULL DEFAULT 100,
        is_active        INTEGER NOT NULL DEFAULT 1,
        UNIQUE (legacy_pattern, match_type)
    );
    "#,
];

/// Brings the schema up to [`SCHEMA_VERSION`]. Refuses to touch a database
/// written by a newer binary.
pub(crate) fn apply(conn: &Connection) -> anyhow::Result<()> {
    let current: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("failed to read schema version")?;

    if current as usize > MIGRATIONS.len() {
        bail!(
            "database schema version {} is newer than this binary supports ({})",
            current,
            SCHEMA_VERSION
        );
    }

    for (index, batch) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = index as u32 + 1;
        tracing::info!(version, "applying schema migration");
        conn.execute_batch(batch)
            .with_context(|| format!("migration to schema version {} failed", version))?;
        conn.pragma_update(None, "user_version", version)
            .context("failed to record schema version")?;
    }
    Ok(())
}
