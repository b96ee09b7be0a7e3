use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::domain::entities::alert::{Alert, AlertContext, AlertStatus};
use crate::domain::entities::attempt::{AttemptStatus, NotificationAttempt};
use crate::domain::entities::device::{Device, DeviceCandidate, DeviceStatus};
use crate::domain::entities::maintenance::{MaintenanceKind, MaintenanceRecord};
use crate::domain::entities::rule::AlertRule;
use crate::domain::entities::sample::{PaperStatus, StatusSample};
use crate::domain::entities::summary::{ConsumptionSummary, SummaryPeriod};
use crate::domain::entities::supply::{SupplyLevel, SupplyStatus, SupplyType};
use crate::domain::entities::user::{Role, UserContact};
use crate::domain::ports::directory::UserDirectory;
use crate::domain::ports::store::{
    AlertStore, AttemptStore, DeviceStore, JobStore, MaintenanceStore, RuleStore, SampleStore,
    StoreError, SummaryStore, SupplyStore,
};
use crate::domain::value_objects::{Comparison, Severity, TriggerType};

use super::migrations;

/// SQLite-backed store serving every persistence port.
///
/// One connection behind a mutex; callers run on blocking worker tasks
/// so holding it across a statement is fine.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new `SQLite` store at the given path.
    ///
    /// Expands `~`, creates parent directories, opens connection,
    /// sets WAL mode and pragmas, and initializes schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the database cannot be opened or initialized.
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let expanded = shellexpand::tilde(path);
        let db_path = PathBuf::from(expanded.as_ref());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        let conn =
            Connection::open(&db_path).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and `--dry-run` invocations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if initialization fails.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        migrations::initialize_schema(&conn).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))
    }

    fn write(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))
    }
}

fn conv_err(idx: usize, what: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid {what}").into(),
    )
}

fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| conv_err(idx, "timestamp"))
}

fn parse_ts_opt(idx: usize, raw: Option<String>) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_device_row(row: &rusqlite::Row<'_>) -> Result<Device, rusqlite::Error> {
    let address: String = row.get(4)?;
    let address: IpAddr = address.parse().map_err(|_| conv_err(4, "ip address"))?;
    let status: String = row.get(9)?;
    let last_seen: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let port: i64 = row.get(6)?;

    Ok(Device {
        id: row.get(0)?,
        name: row.get(1)?,
        model: row.get(2)?,
        serial_number: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        address,
        snmp_community: row.get(5)?,
        snmp_port: u16::try_from(port).map_err(|_| conv_err(6, "port"))?,
        location: row.get(7)?,
        is_monitored: row.get(8)?,
        status: DeviceStatus::parse(&status).ok_or_else(|| conv_err(9, "device status"))?,
        last_seen: parse_ts_opt(10, last_seen)?,
        created_at: parse_ts(11, &created_at)?,
    })
}

const DEVICE_COLUMNS: &str = "id, name, model, serial_number, address, snmp_community, \
     snmp_port, location, is_monitored, status, last_seen, created_at";

fn parse_sample_row(row: &rusqlite::Row<'_>) -> Result<StatusSample, rusqlite::Error> {
    let paper_status: String = row.get(1)?;
    let recorded_at: String = row.get(10)?;
    Ok(StatusSample {
        device_id: row.get(0)?,
        paper_status: PaperStatus::parse(&paper_status)
            .ok_or_else(|| conv_err(1, "paper status"))?,
        paper_level: row.get::<_, i64>(2)?.clamp(0, 100) as u8,
        queue_size: u32::try_from(row.get::<_, i64>(3)?.max(0)).unwrap_or(u32::MAX),
        total_pages: row.get::<_, i64>(4)?.max(0) as u64,
        color_pages: row.get::<_, i64>(5)?.max(0) as u64,
        temperature: row.get(6)?,
        error_code: row.get(7)?,
        error_message: row.get(8)?,
        response_time_ms: row.get(9)?,
        recorded_at: parse_ts(10, &recorded_at)?,
        is_online: row.get(11)?,
    })
}

const SAMPLE_COLUMNS: &str = "device_id, paper_status, paper_level, queue_size, total_pages, \
     color_pages, temperature, error_code, error_message, response_time_ms, recorded_at, is_online";

fn parse_rule_row(row: &rusqlite::Row<'_>) -> Result<AlertRule, rusqlite::Error> {
    let trigger: String = row.get(3)?;
    let severity: String = row.get(4)?;
    let comparison: Option<String> = row.get(6)?;
    let device_ids: String = row.get(8)?;
    let subscriber_ids: String = row.get(9)?;
    let created_at: String = row.get(14)?;

    Ok(AlertRule {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        trigger: TriggerType::parse(&trigger).ok_or_else(|| conv_err(3, "trigger type"))?,
        severity: Severity::parse(&severity).ok_or_else(|| conv_err(4, "severity"))?,
        threshold: row.get(5)?,
        comparison: comparison
            .map(|raw| Comparison::parse(&raw).ok_or_else(|| conv_err(6, "comparison")))
            .transpose()?,
        cooldown_minutes: u32::try_from(row.get::<_, i64>(7)?.max(0)).unwrap_or(u32::MAX),
        device_ids: serde_json::from_str(&device_ids).map_err(|_| conv_err(8, "device ids"))?,
        subscriber_ids: serde_json::from_str(&subscriber_ids)
            .map_err(|_| conv_err(9, "subscriber ids"))?,
        send_email: row.get(10)?,
        send_sms: row.get(11)?,
        send_system: row.get(12)?,
        is_active: row.get(13)?,
        created_at: parse_ts(14, &created_at)?,
    })
}

const RULE_COLUMNS: &str = "id, name, description, trigger_type, severity, threshold, comparison, \
     cooldown_minutes, device_ids, subscriber_ids, send_email, send_sms, send_system, is_active, \
     created_at";

fn parse_alert_row(row: &rusqlite::Row<'_>) -> Result<Alert, rusqlite::Error> {
    let severity: String = row.get(5)?;
    let status: String = row.get(6)?;
    let context: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(Alert {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        device_id: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        severity: Severity::parse(&severity).ok_or_else(|| conv_err(5, "severity"))?,
        status: AlertStatus::parse(&status).ok_or_else(|| conv_err(6, "alert status"))?,
        context: serde_json::from_str::<AlertContext>(&context)
            .map_err(|_| conv_err(7, "alert context"))?,
        created_at: parse_ts(8, &created_at)?,
        acknowledged_at: parse_ts_opt(9, row.get(9)?)?,
        acknowledged_by: row.get(10)?,
        resolved_at: parse_ts_opt(11, row.get(11)?)?,
        resolved_by: row.get(12)?,
        resolution_notes: row.get(13)?,
    })
}

const ALERT_COLUMNS: &str = "id, rule_id, device_id, title, message, severity, status, context, \
     created_at, acknowledged_at, acknowledged_by, resolved_at, resolved_by, resolution_notes";

fn parse_attempt_row(row: &rusqlite::Row<'_>) -> Result<NotificationAttempt, rusqlite::Error> {
    let channel: String = row.get(2)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(7)?;

    Ok(NotificationAttempt {
        id: row.get(0)?,
        alert_id: row.get(1)?,
        channel: crate::domain::value_objects::Channel::parse(&channel)
            .ok_or_else(|| conv_err(2, "channel"))?,
        recipient: row.get(3)?,
        status: AttemptStatus::parse(&status).ok_or_else(|| conv_err(4, "attempt status"))?,
        attempts: u32::try_from(row.get::<_, i64>(5)?.max(0)).unwrap_or(u32::MAX),
        last_error: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
        sent_at: parse_ts_opt(8, row.get(8)?)?,
    })
}

const ATTEMPT_COLUMNS: &str =
    "id, alert_id, channel, recipient, status, attempts, last_error, created_at, sent_at";

impl DeviceStore for SqliteStore {
    fn add_device(&self, device: &Device) -> Result<Device, StoreError> {
        let conn = self.write()?;
        let result = conn.execute(
            "INSERT INTO devices (name, model, serial_number, address, snmp_community, \
             snmp_port, location, is_monitored, status, last_seen, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                device.name,
                device.model,
                device.serial_number,
                device.address.to_string(),
                device.snmp_community,
                i64::from(device.snmp_port),
                device.location,
                device.is_monitored,
                device.status.as_str(),
                device.last_seen.map(|t| t.to_rfc3339()),
                device.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => {
                let mut saved = device.clone();
                saved.id = conn.last_insert_rowid();
                Ok(saved)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict(format!(
                    "device at {} already registered",
                    device.address
                )))
            }
            Err(e) => Err(StoreError::WriteFailed(e.to_string())),
        }
    }

    fn get_device(&self, id: i64) -> Result<Device, StoreError> {
        let conn = self.read()?;
        conn.query_row(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
            params![id],
            parse_device_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("device {id}")),
            other => StoreError::ReadFailed(other.to_string()),
        })
    }

    fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id"))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let devices = stmt
            .query_map([], parse_device_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(devices)
    }

    fn monitored_devices(&self) -> Result<Vec<Device>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices WHERE is_monitored = 1 ORDER BY id"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let devices = stmt
            .query_map([], parse_device_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(devices)
    }

    fn set_device_status(&self, id: i64, status: DeviceStatus) -> Result<(), StoreError> {
        let conn = self.write()?;
        let changed = conn
            .execute(
                "UPDATE devices SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("device {id}")));
        }
        Ok(())
    }

    fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "UPDATE devices SET last_seen = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn address_known(&self, address: &str) -> Result<bool, StoreError> {
        let conn = self.read()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM devices WHERE address = ?1",
                params![address],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(count > 0)
    }

    fn upsert_candidate(&self, candidate: &DeviceCandidate) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO candidates (address, name, model, serial_number, description, discovered_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(address) DO UPDATE SET name = ?2, model = ?3, serial_number = ?4, \
             description = ?5, discovered_at = ?6",
            params![
                candidate.address.to_string(),
                candidate.name,
                candidate.model,
                candidate.serial_number,
                candidate.description,
                candidate.discovered_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn list_candidates(&self) -> Result<Vec<DeviceCandidate>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(
                "SELECT address, name, model, serial_number, description, discovered_at \
                 FROM candidates ORDER BY discovered_at DESC",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let candidates = stmt
            .query_map([], |row| {
                let address: String = row.get(0)?;
                let discovered_at: String = row.get(5)?;
                Ok(DeviceCandidate {
                    address: address.parse().map_err(|_| conv_err(0, "ip address"))?,
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    model: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    serial_number: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    description: row.get(4)?,
                    discovered_at: parse_ts(5, &discovered_at)?,
                })
            })
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(candidates)
    }
}

impl SampleStore for SqliteStore {
    fn save_sample(&self, sample: &StatusSample) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO samples (device_id, is_online, paper_status, paper_level, queue_size, \
             total_pages, color_pages, temperature, error_code, error_message, response_time_ms, \
             recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                sample.device_id,
                sample.is_online,
                sample.paper_status.as_str(),
                i64::from(sample.paper_level),
                i64::from(sample.queue_size),
                i64::try_from(sample.total_pages).unwrap_or(i64::MAX),
                i64::try_from(sample.color_pages).unwrap_or(i64::MAX),
                sample.temperature,
                sample.error_code,
                sample.error_message,
                sample.response_time_ms,
                sample.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn latest_sample(&self, device_id: i64) -> Result<Option<StatusSample>, StoreError> {
        let conn = self.read()?;
        let result = conn.query_row(
            &format!(
                "SELECT {SAMPLE_COLUMNS} FROM samples WHERE device_id = ?1 \
                 ORDER BY id DESC LIMIT 1"
            ),
            params![device_id],
            parse_sample_row,
        );
        match result {
            Ok(sample) => Ok(Some(sample)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::ReadFailed(e.to_string())),
        }
    }

    fn samples_between(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatusSample>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SAMPLE_COLUMNS} FROM samples \
                 WHERE device_id = ?1 AND recorded_at >= ?2 AND recorded_at < ?3 \
                 ORDER BY recorded_at"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let samples = stmt
            .query_map(
                params![device_id, from.to_rfc3339(), to.to_rfc3339()],
                parse_sample_row,
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(samples)
    }

    fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.write()?;
        let deleted = conn
            .execute(
                "DELETE FROM samples WHERE recorded_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(deleted as u64)
    }
}

impl SupplyStore for SqliteStore {
    fn save_supply(&self, supply: &SupplyLevel) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO supplies (device_id, supply_type, level, max_capacity, \
             current_capacity, status, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(device_id, supply_type) DO UPDATE SET level = ?3, max_capacity = ?4, \
             current_capacity = ?5, status = ?6, updated_at = ?7",
            params![
                supply.device_id,
                supply.supply_type.as_str(),
                i64::from(supply.level),
                i64::from(supply.max_capacity),
                i64::from(supply.current_capacity),
                supply.status.as_str(),
                supply.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn supplies_for_device(&self, device_id: i64) -> Result<Vec<SupplyLevel>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(
                "SELECT device_id, supply_type, level, max_capacity, current_capacity, status, \
                 updated_at FROM supplies WHERE device_id = ?1 ORDER BY supply_type",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let supplies = stmt
            .query_map(params![device_id], |row| {
                let supply_type: String = row.get(1)?;
                let status: String = row.get(5)?;
                let updated_at: String = row.get(6)?;
                Ok(SupplyLevel {
                    device_id: row.get(0)?,
                    supply_type: SupplyType::parse(&supply_type)
                        .ok_or_else(|| conv_err(1, "supply type"))?,
                    level: row.get::<_, i64>(2)?.clamp(0, 100) as u8,
                    max_capacity: u32::try_from(row.get::<_, i64>(3)?.max(0)).unwrap_or(u32::MAX),
                    current_capacity: u32::try_from(row.get::<_, i64>(4)?.max(0))
                        .unwrap_or(u32::MAX),
                    status: SupplyStatus::parse(&status)
                        .ok_or_else(|| conv_err(5, "supply status"))?,
                    updated_at: parse_ts(6, &updated_at)?,
                })
            })
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(supplies)
    }
}

impl RuleStore for SqliteStore {
    fn add_rule(&self, rule: &AlertRule) -> Result<AlertRule, StoreError> {
        let device_ids = serde_json::to_string(&rule.device_ids)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let subscriber_ids = serde_json::to_string(&rule.subscriber_ids)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let conn = self.write()?;
        conn.execute(
            "INSERT INTO rules (name, description, trigger_type, severity, threshold, \
             comparison, cooldown_minutes, device_ids, subscriber_ids, send_email, send_sms, \
             send_system, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                rule.name,
                rule.description,
                rule.trigger.as_str(),
                rule.severity.as_str(),
                rule.threshold,
                rule.comparison.map(|c| c.as_str()),
                i64::from(rule.cooldown_minutes),
                device_ids,
                subscriber_ids,
                rule.send_email,
                rule.send_sms,
                rule.send_system,
                rule.is_active,
                rule.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let mut saved = rule.clone();
        saved.id = conn.last_insert_rowid();
        Ok(saved)
    }

    fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {RULE_COLUMNS} FROM rules ORDER BY id"))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let rules = stmt
            .query_map([], parse_rule_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(rules)
    }

    fn active_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM rules WHERE is_active = 1 ORDER BY id"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let rules = stmt
            .query_map([], parse_rule_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(rules)
    }

    fn set_rule_active(&self, id: i64, active: bool) -> Result<(), StoreError> {
        let conn = self.write()?;
        let changed = conn
            .execute(
                "UPDATE rules SET is_active = ?1 WHERE id = ?2",
                params![active, id],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("rule {id}")));
        }
        Ok(())
    }
}

impl AlertStore for SqliteStore {
    fn add_alert(&self, alert: &Alert) -> Result<Alert, StoreError> {
        let context = serde_json::to_string(&alert.context)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let conn = self.write()?;
        conn.execute(
            "INSERT INTO alerts (rule_id, device_id, title, message, severity, status, context, \
             created_at, acknowledged_at, acknowledged_by, resolved_at, resolved_by, \
             resolution_notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                alert.rule_id,
                alert.device_id,
                alert.title,
                alert.message,
                alert.severity.as_str(),
                alert.status.as_str(),
                context,
                alert.created_at.to_rfc3339(),
                alert.acknowledged_at.map(|t| t.to_rfc3339()),
                alert.acknowledged_by,
                alert.resolved_at.map(|t| t.to_rfc3339()),
                alert.resolved_by,
                alert.resolution_notes,
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let mut saved = alert.clone();
        saved.id = conn.last_insert_rowid();
        Ok(saved)
    }

    fn get_alert(&self, id: i64) -> Result<Alert, StoreError> {
        let conn = self.read()?;
        conn.query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
            params![id],
            parse_alert_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("alert {id}")),
            other => StoreError::ReadFailed(other.to_string()),
        })
    }

    fn recent_alerts(&self, count: usize) -> Result<Vec<Alert>, StoreError> {
        let limit = i64::try_from(count).map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts ORDER BY id DESC LIMIT ?1"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let alerts = stmt
            .query_map(params![limit], parse_alert_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(alerts)
    }

    fn alerts_with_status(&self, status: AlertStatus) -> Result<Vec<Alert>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts WHERE status = ?1 ORDER BY id DESC"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let alerts = stmt
            .query_map(params![status.as_str()], parse_alert_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(alerts)
    }

    fn count_alerts_for_rule_since(
        &self,
        rule_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let conn = self.read()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM alerts WHERE rule_id = ?1 AND created_at >= ?2",
                params![rule_id, since.to_rfc3339()],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    fn alerts_without_attempts(&self) -> Result<Vec<Alert>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts \
                 WHERE status NOT IN ('resolved', 'closed') \
                 AND id NOT IN (SELECT DISTINCT alert_id FROM attempts) \
                 ORDER BY id"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let alerts = stmt
            .query_map([], parse_alert_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(alerts)
    }

    fn update_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let context = serde_json::to_string(&alert.context)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let conn = self.write()?;
        let changed = conn
            .execute(
                "UPDATE alerts SET status = ?1, context = ?2, acknowledged_at = ?3, \
                 acknowledged_by = ?4, resolved_at = ?5, resolved_by = ?6, resolution_notes = ?7 \
                 WHERE id = ?8",
                params![
                    alert.status.as_str(),
                    context,
                    alert.acknowledged_at.map(|t| t.to_rfc3339()),
                    alert.acknowledged_by,
                    alert.resolved_at.map(|t| t.to_rfc3339()),
                    alert.resolved_by,
                    alert.resolution_notes,
                    alert.id,
                ],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("alert {}", alert.id)));
        }
        Ok(())
    }

    fn delete_finished_alerts_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.write()?;
        let deleted = conn
            .execute(
                "DELETE FROM alerts WHERE status IN ('resolved', 'closed') AND created_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(deleted as u64)
    }
}

impl AttemptStore for SqliteStore {
    fn add_attempt(
        &self,
        attempt: &NotificationAttempt,
    ) -> Result<NotificationAttempt, StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO attempts (alert_id, channel, recipient, status, attempts, last_error, \
             created_at, sent_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.alert_id,
                attempt.channel.as_str(),
                attempt.recipient,
                attempt.status.as_str(),
                i64::from(attempt.attempts),
                attempt.last_error,
                attempt.created_at.to_rfc3339(),
                attempt.sent_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let mut saved = attempt.clone();
        saved.id = conn.last_insert_rowid();
        Ok(saved)
    }

    fn pending_attempts(&self, max_attempts: u32) -> Result<Vec<NotificationAttempt>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM attempts \
                 WHERE status = 'pending' AND attempts < ?1 ORDER BY id"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let attempts = stmt
            .query_map(params![i64::from(max_attempts)], parse_attempt_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(attempts)
    }

    fn attempts_for_alert(&self, alert_id: i64) -> Result<Vec<NotificationAttempt>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE alert_id = ?1 ORDER BY id"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let attempts = stmt
            .query_map(params![alert_id], parse_attempt_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(attempts)
    }

    fn update_attempt(&self, attempt: &NotificationAttempt) -> Result<(), StoreError> {
        let conn = self.write()?;
        let changed = conn
            .execute(
                "UPDATE attempts SET status = ?1, attempts = ?2, last_error = ?3, sent_at = ?4 \
                 WHERE id = ?5",
                params![
                    attempt.status.as_str(),
                    i64::from(attempt.attempts),
                    attempt.last_error,
                    attempt.sent_at.map(|t| t.to_rfc3339()),
                    attempt.id,
                ],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("attempt {}", attempt.id)));
        }
        Ok(())
    }
}

impl MaintenanceStore for SqliteStore {
    fn add_record(&self, record: &MaintenanceRecord) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO maintenance (device_id, kind, description, technician, performed_at, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.device_id,
                record.kind.as_str(),
                record.description,
                record.technician,
                record.performed_at.to_rfc3339(),
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn last_maintenance(&self, device_id: i64) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.read()?;
        let result = conn.query_row(
            "SELECT performed_at FROM maintenance WHERE device_id = ?1 AND kind = ?2 \
             ORDER BY performed_at DESC LIMIT 1",
            params![device_id, MaintenanceKind::Preventive.as_str()],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(raw) => Ok(Some(
                parse_ts(0, &raw).map_err(|e| StoreError::ReadFailed(e.to_string()))?,
            )),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::ReadFailed(e.to_string())),
        }
    }
}

impl JobStore for SqliteStore {
    fn active_job_count(&self, device_id: i64) -> Result<u32, StoreError> {
        let conn = self.read()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM print_jobs WHERE device_id = ?1 \
                 AND status IN ('pending', 'printing')",
                params![device_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(u32::try_from(count.max(0)).unwrap_or(u32::MAX))
    }
}

impl SummaryStore for SqliteStore {
    fn save_summary(&self, summary: &ConsumptionSummary) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO summaries (device_id, period, period_start, pages_printed, color_pages, \
             mono_pages, computed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(device_id, period, period_start) DO UPDATE SET pages_printed = ?4, \
             color_pages = ?5, mono_pages = ?6, computed_at = ?7",
            params![
                summary.device_id,
                summary.period.as_str(),
                summary.period_start.to_string(),
                i64::try_from(summary.pages_printed).unwrap_or(i64::MAX),
                i64::try_from(summary.color_pages).unwrap_or(i64::MAX),
                i64::try_from(summary.mono_pages).unwrap_or(i64::MAX),
                summary.computed_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn summaries_for_device(
        &self,
        device_id: i64,
        period: SummaryPeriod,
    ) -> Result<Vec<ConsumptionSummary>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, device_id, period, period_start, pages_printed, color_pages, \
                 mono_pages, computed_at FROM summaries \
                 WHERE device_id = ?1 AND period = ?2 ORDER BY period_start DESC",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let summaries = stmt
            .query_map(params![device_id, period.as_str()], |row| {
                let period: String = row.get(2)?;
                let period_start: String = row.get(3)?;
                let computed_at: String = row.get(7)?;
                Ok(ConsumptionSummary {
                    id: row.get(0)?,
                    device_id: row.get(1)?,
                    period: SummaryPeriod::parse(&period).ok_or_else(|| conv_err(2, "period"))?,
                    period_start: period_start
                        .parse::<NaiveDate>()
                        .map_err(|_| conv_err(3, "period start"))?,
                    pages_printed: row.get::<_, i64>(4)?.max(0) as u64,
                    color_pages: row.get::<_, i64>(5)?.max(0) as u64,
                    mono_pages: row.get::<_, i64>(6)?.max(0) as u64,
                    computed_at: parse_ts(7, &computed_at)?,
                })
            })
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(summaries)
    }

    fn summary_exists(
        &self,
        device_id: i64,
        period: SummaryPeriod,
        period_start: NaiveDate,
    ) -> Result<bool, StoreError> {
        let conn = self.read()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM summaries WHERE device_id = ?1 AND period = ?2 \
                 AND period_start = ?3",
                params![device_id, period.as_str(), period_start.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(count > 0)
    }
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> Result<UserContact, rusqlite::Error> {
    let role: String = row.get(2)?;
    Ok(UserContact {
        id: row.get(0)?,
        username: row.get(1)?,
        role: Role::parse(&role).ok_or_else(|| conv_err(2, "role"))?,
        email: row.get(3)?,
        phone: row.get(4)?,
        is_active: row.get(5)?,
    })
}

impl UserDirectory for SqliteStore {
    fn contacts(&self, user_ids: &[i64]) -> Result<Vec<UserContact>, StoreError> {
        let conn = self.read()?;
        let mut contacts = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            let result = conn.query_row(
                "SELECT id, username, role, email, phone, is_active FROM users \
                 WHERE id = ?1 AND is_active = 1",
                params![id],
                parse_user_row,
            );
            match result {
                Ok(contact) => contacts.push(contact),
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(StoreError::ReadFailed(e.to_string())),
            }
        }
        Ok(contacts)
    }

    fn staff_contacts(&self) -> Result<Vec<UserContact>, StoreError> {
        let conn = self.read()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, username, role, email, phone, is_active FROM users \
                 WHERE role IN ('admin', 'technician') AND is_active = 1 ORDER BY id",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let contacts = stmt
            .query_map([], parse_user_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        Ok(contacts)
    }
}

impl SqliteStore {
    /// Insert a user row. Exposed for provisioning and tests; the daemon
    /// itself only reads contacts.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the insert fails.
    pub fn add_user(&self, user: &UserContact) -> Result<UserContact, StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO users (username, role, email, phone, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.username, user.role.as_str(), user.email, user.phone, user.is_active],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let mut saved = user.clone();
        saved.id = conn.last_insert_rowid();
        Ok(saved)
    }

    /// Insert a print job row in the given status. Exposed for the spooler
    /// integration and tests.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the insert fails.
    pub fn add_print_job(
        &self,
        device_id: i64,
        status: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO print_jobs (device_id, status, created_at) VALUES (?1, ?2, ?3)",
            params![device_id, status, created_at.to_rfc3339()],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
