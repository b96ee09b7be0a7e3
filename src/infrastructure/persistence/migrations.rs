use rusqlite::Connection;

/// Initialize the database schema, creating tables if they don't exist.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS devices (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            name           TEXT    NOT NULL,
            model          TEXT    NOT NULL,
            serial_number  TEXT,
            address        TEXT    NOT NULL UNIQUE,
            snmp_community TEXT    NOT NULL DEFAULT 'public',
            snmp_port      INTEGER NOT NULL DEFAULT 161,
            location       TEXT,
            is_monitored   INTEGER NOT NULL DEFAULT 1,
            status         TEXT    NOT NULL DEFAULT 'active',
            last_seen      TEXT,
            created_at     TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS candidates (
            address       TEXT PRIMARY KEY,
            name          TEXT,
            model         TEXT,
            serial_number TEXT,
            description   TEXT NOT NULL,
            discovered_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS samples (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id        INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            is_online        INTEGER NOT NULL,
            paper_status     TEXT    NOT NULL,
            paper_level      INTEGER NOT NULL,
            queue_size       INTEGER NOT NULL,
            total_pages      INTEGER NOT NULL,
            color_pages      INTEGER NOT NULL,
            temperature      REAL,
            error_code       TEXT,
            error_message    TEXT,
            response_time_ms INTEGER,
            recorded_at      TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS supplies (
            device_id        INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            supply_type      TEXT    NOT NULL,
            level            INTEGER NOT NULL,
            max_capacity     INTEGER NOT NULL,
            current_capacity INTEGER NOT NULL,
            status           TEXT    NOT NULL,
            updated_at       TEXT    NOT NULL,
            PRIMARY KEY (device_id, supply_type)
        );

        CREATE TABLE IF NOT EXISTS rules (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            name             TEXT    NOT NULL,
            description      TEXT,
            trigger_type     TEXT    NOT NULL,
            severity         TEXT    NOT NULL,
            threshold        REAL,
            comparison       TEXT,
            cooldown_minutes INTEGER NOT NULL DEFAULT 60,
            device_ids       TEXT    NOT NULL DEFAULT '[]',
            subscriber_ids   TEXT    NOT NULL DEFAULT '[]',
            send_email       INTEGER NOT NULL DEFAULT 1,
            send_sms         INTEGER NOT NULL DEFAULT 0,
            send_system      INTEGER NOT NULL DEFAULT 1,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_id          INTEGER NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
            device_id        INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            title            TEXT    NOT NULL,
            message          TEXT    NOT NULL,
            severity         TEXT    NOT NULL,
            status           TEXT    NOT NULL DEFAULT 'new',
            context          TEXT    NOT NULL DEFAULT '{}',
            created_at       TEXT    NOT NULL,
            acknowledged_at  TEXT,
            acknowledged_by  TEXT,
            resolved_at      TEXT,
            resolved_by      TEXT,
            resolution_notes TEXT
        );

        CREATE TABLE IF NOT EXISTS attempts (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            alert_id   INTEGER NOT NULL REFERENCES alerts(id) ON DELETE CASCADE,
            channel    TEXT    NOT NULL,
            recipient  TEXT    NOT NULL,
            status     TEXT    NOT NULL DEFAULT 'pending',
            attempts   INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at TEXT    NOT NULL,
            sent_at    TEXT
        );

        CREATE TABLE IF NOT EXISTS maintenance (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id    INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            kind         TEXT    NOT NULL,
            description  TEXT    NOT NULL,
            technician   TEXT,
            performed_at TEXT    NOT NULL,
            created_at   TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS print_jobs (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id  INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            status     TEXT    NOT NULL DEFAULT 'pending',
            created_at TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            role     TEXT NOT NULL DEFAULT 'user',
            email    TEXT,
            phone    TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS summaries (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id     INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            period        TEXT    NOT NULL,
            period_start  TEXT    NOT NULL,
            pages_printed INTEGER NOT NULL,
            color_pages   INTEGER NOT NULL,
            mono_pages    INTEGER NOT NULL,
            computed_at   TEXT    NOT NULL,
            UNIQUE (device_id, period, period_start)
        );

        CREATE INDEX IF NOT EXISTS idx_samples_device_recorded ON samples(device_id, recorded_at);
        CREATE INDEX IF NOT EXISTS idx_samples_recorded_at ON samples(recorded_at);
        CREATE INDEX IF NOT EXISTS idx_alerts_rule_created ON alerts(rule_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
        CREATE INDEX IF NOT EXISTS idx_attempts_alert ON attempts(alert_id);
        CREATE INDEX IF NOT EXISTS idx_attempts_status ON attempts(status);
        CREATE INDEX IF NOT EXISTS idx_maintenance_device ON maintenance(device_id, performed_at);
        CREATE INDEX IF NOT EXISTS idx_print_jobs_device_status ON print_jobs(device_id, status);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[allow(clippy::expect_used)]
    #[test]
    fn test_initialize_schema_creates_all_tables() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let result = initialize_schema(&conn);
        assert!(result.is_ok());

        for table in &[
            "devices",
            "candidates",
            "samples",
            "supplies",
            "rules",
            "alerts",
            "attempts",
            "maintenance",
            "print_jobs",
            "users",
            "summaries",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |row| row.get(0),
                )
                .expect("query sqlite_master");
            assert_eq!(count, 1, "table {table} should exist");
        }
    }

    #[allow(clippy::expect_used)]
    #[test]
    fn test_initialize_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        assert!(initialize_schema(&conn).is_ok());
        assert!(initialize_schema(&conn).is_ok());
    }

    #[allow(clippy::expect_used)]
    #[test]
    fn test_tables_have_expected_columns() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        assert!(initialize_schema(&conn).is_ok());

        let check_column = |table: &str, column: &str| {
            let count: i64 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name='{column}'"
                    ),
                    [],
                    |row| row.get(0),
                )
                .expect("pragma_table_info");
            assert_eq!(count, 1, "column {column} should exist in {table}");
        };

        check_column("devices", "address");
        check_column("devices", "snmp_community");
        check_column("devices", "is_monitored");
        check_column("devices", "last_seen");

        check_column("samples", "paper_status");
        check_column("samples", "total_pages");
        check_column("samples", "response_time_ms");

        check_column("supplies", "current_capacity");

        check_column("rules", "trigger_type");
        check_column("rules", "cooldown_minutes");
        check_column("rules", "subscriber_ids");

        check_column("alerts", "context");
        check_column("alerts", "resolution_notes");

        check_column("attempts", "attempts");
        check_column("attempts", "last_error");

        check_column("users", "is_active");

        check_column("summaries", "period_start");
    }
}
