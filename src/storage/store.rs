//! SQLite-backed assessment store. The full assessment snapshot (including the student's
//! display name) is kept AES-GCM encrypted; indexed columns carry only what filtering needs.
//! Assessments are append-only; alert and intervention rows carry the mutable workflow.

use crate::alerts::{AlertRecord, AlertState};
use crate::error::{Result, RiskError};
use crate::features::FactorType;
use crate::interventions::{InterventionAction, InterventionStatus};
use crate::risk::{AssessmentRecord, RiskAssessment, RiskLevel};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS risk_assessments (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        student_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        risk_level TEXT NOT NULL,
        dropout_probability REAL NOT NULL,
        alert_triggered INTEGER NOT NULL,
        model_fingerprint TEXT NOT NULL,
        payload_enc TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_risk_assessments_student
        ON risk_assessments(student_id, created_at);
    CREATE TRIGGER IF NOT EXISTS risk_assessments_no_update
        BEFORE UPDATE ON risk_assessments
        BEGIN SELECT RAISE(ABORT, 'risk_assessments is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS risk_assessments_no_delete
        BEFORE DELETE ON risk_assessments
        BEGIN SELECT RAISE(ABORT, 'risk_assessments is append-only'); END;

    CREATE TABLE IF NOT EXISTS risk_factors (
        assessment_id TEXT NOT NULL REFERENCES risk_assessments(id),
        factor_type TEXT NOT NULL,
        weight REAL NOT NULL,
        current_value REAL NOT NULL,
        threshold_value REAL NOT NULL,
        contribution REAL NOT NULL,
        severity TEXT NOT NULL,
        trend TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (assessment_id, factor_type)
    );

    CREATE TABLE IF NOT EXISTS risk_alerts (
        assessment_id TEXT PRIMARY KEY REFERENCES risk_assessments(id),
        state TEXT NOT NULL,
        acknowledged_at INTEGER,
        acknowledged_by TEXT,
        resolved_at INTEGER,
        resolution_note TEXT
    );

    CREATE TABLE IF NOT EXISTS intervention_actions (
        id TEXT PRIMARY KEY,
        assessment_id TEXT NOT NULL REFERENCES risk_assessments(id),
        action_type TEXT NOT NULL,
        description TEXT NOT NULL,
        priority TEXT NOT NULL,
        scheduled_date TEXT,
        status TEXT NOT NULL,
        assignee TEXT,
        origin TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_intervention_actions_assessment
        ON intervention_actions(assessment_id);
"#;

/// Latest assessment per student.
const CURRENT_CTE: &str = "WITH current AS ( \
     SELECT a.id, a.risk_level FROM risk_assessments a \
     WHERE a.seq = (SELECT MAX(b.seq) FROM risk_assessments b WHERE b.student_id = a.student_id))";

const RECORD_COLUMNS: &str = "a.payload_enc, l.state, l.acknowledged_at, l.acknowledged_by, \
     l.resolved_at, l.resolution_note";

/// AES-256 key: SHA-256 of the store secret.
fn derive_key(secret: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&Sha256::digest(secret));
    key
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| RiskError::Crypto(e.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|e| RiskError::Crypto(e.to_string()))?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| RiskError::Crypto(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(RiskError::Crypto("payload too short".into()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| RiskError::Crypto(e.to_string()))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|_| RiskError::Crypto("payload failed authentication (wrong secret?)".into()))
}

/// Enum → its serde string form.
fn to_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(RiskError::Internal(format!("expected a string value, got {}", other))),
    }
}

fn from_text<T: DeserializeOwned>(text: String) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(text))?)
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| RiskError::Internal(format!("corrupt id {}: {}", s, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| RiskError::Internal(format!("corrupt timestamp {}", ms)))
}

/// Filters for listing assessments; all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentFilter {
    pub student_id: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub alert_triggered: Option<bool>,
    pub limit: Option<usize>,
}

/// Overview of every student's current assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub students: usize,
    pub by_risk_level: BTreeMap<RiskLevel, usize>,
    pub open_alerts: usize,
    pub factor_counts: BTreeMap<FactorType, usize>,
}

struct RawRecord {
    payload_enc: String,
    state: String,
    acknowledged_at: Option<i64>,
    acknowledged_by: Option<String>,
    resolved_at: Option<i64>,
    resolution_note: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            payload_enc: row.get(0)?,
            state: row.get(1)?,
            acknowledged_at: row.get(2)?,
            acknowledged_by: row.get(3)?,
            resolved_at: row.get(4)?,
            resolution_note: row.get(5)?,
        })
    }
}

struct RawIntervention {
    id: String,
    assessment_id: String,
    action_type: String,
    description: String,
    priority: String,
    scheduled_date: Option<String>,
    status: String,
    assignee: Option<String>,
    origin: String,
    created_at: i64,
}

impl RawIntervention {
    const COLUMNS: &'static str = "id, assessment_id, action_type, description, priority, \
         scheduled_date, status, assignee, origin, created_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            assessment_id: row.get(1)?,
            action_type: row.get(2)?,
            description: row.get(3)?,
            priority: row.get(4)?,
            scheduled_date: row.get(5)?,
            status: row.get(6)?,
            assignee: row.get(7)?,
            origin: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn decode(self) -> Result<InterventionAction> {
        Ok(InterventionAction {
            id: parse_uuid(&self.id)?,
            assessment_id: parse_uuid(&self.assessment_id)?,
            action_type: self.action_type,
            description: self.description,
            priority: from_text(self.priority)?,
            scheduled_date: self.scheduled_date.map(from_text).transpose()?,
            status: from_text(self.status)?,
            assignee: self.assignee,
            origin: from_text(self.origin)?,
            created_at: from_millis(self.created_at)?,
        })
    }
}

pub struct AssessmentStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AssessmentStore {
    /// Open or create the DB at path. Key is derived from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self> {
        Self::init(Connection::open(path)?, secret)
    }

    pub fn open_in_memory(secret: &[u8]) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, secret)
    }

    fn init(conn: Connection, secret: &[u8]) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RiskError::Internal("assessment store lock poisoned".into()))
    }

    /// Persist an assessment with its factors and alert, all or nothing.
    pub fn insert_assessment(
        &self,
        assessment: &RiskAssessment,
        alert: &AlertRecord,
    ) -> Result<()> {
        let payload = serde_json::to_string(assessment)?;
        let enc = encrypt(&self.key, payload.as_bytes())?;
        let id = assessment.id.to_string();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO risk_assessments \
             (id, student_id, created_at, risk_level, dropout_probability, alert_triggered, \
              model_fingerprint, payload_enc) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                assessment.student_id,
                assessment.created_at.timestamp_millis(),
                assessment.risk_level.as_str(),
                assessment.dropout_probability,
                assessment.alert_triggered,
                assessment.model.fingerprint,
                enc,
            ],
        )?;
        for (position, f) in assessment.factors.iter().enumerate() {
            tx.execute(
                "INSERT INTO risk_factors \
                 (assessment_id, factor_type, weight, current_value, threshold_value, \
                  contribution, severity, trend, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    f.factor_type.as_str(),
                    f.weight,
                    f.current_value,
                    f.threshold_value,
                    f.contribution,
                    f.severity.as_str(),
                    to_text(&f.trend)?,
                    position as i64,
                ],
            )?;
        }
        Self::write_alert(&tx, alert)?;
        tx.commit()?;
        Ok(())
    }

    fn write_alert(conn: &Connection, alert: &AlertRecord) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO risk_alerts \
             (assessment_id, state, acknowledged_at, acknowledged_by, \
              resolved_at, resolution_note) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alert.assessment_id.to_string(),
                alert.state.as_str(),
                alert.acknowledged_at.map(|t| t.timestamp_millis()),
                alert.acknowledged_by,
                alert.resolved_at.map(|t| t.timestamp_millis()),
                alert.resolution_note,
            ],
        )?;
        Ok(())
    }

    fn decode_assessment(&self, payload_enc: &str) -> Result<RiskAssessment> {
        let plain = decrypt(&self.key, payload_enc)?;
        Ok(serde_json::from_slice(&plain)?)
    }

    fn decode_record(&self, raw: RawRecord) -> Result<AssessmentRecord> {
        let assessment = self.decode_assessment(&raw.payload_enc)?;
        let alert = AlertRecord {
            assessment_id: assessment.id,
            state: from_text::<AlertState>(raw.state)?,
            acknowledged_at: raw.acknowledged_at.map(from_millis).transpose()?,
            acknowledged_by: raw.acknowledged_by,
            resolved_at: raw.resolved_at.map(from_millis).transpose()?,
            resolution_note: raw.resolution_note,
        };
        Ok(AssessmentRecord::new(assessment, alert))
    }

    fn load_record(&self, conn: &Connection, id: &Uuid) -> Result<Option<AssessmentRecord>> {
        let sql = format!(
            "SELECT {} FROM risk_assessments a JOIN risk_alerts l ON l.assessment_id = a.id \
             WHERE a.id = ?1",
            RECORD_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![id.to_string()], RawRecord::from_row)
            .optional()?;
        raw.map(|r| self.decode_record(r)).transpose()
    }

    fn load_alert(&self, conn: &Connection, id: &Uuid) -> Result<AlertRecord> {
        self.load_record(conn, id)?
            .map(|r| r.alert)
            .ok_or_else(|| RiskError::NotFound(format!("risk assessment {}", id)))
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<AssessmentRecord>> {
        let conn = self.conn()?;
        self.load_record(&conn, id)
    }

    /// The student's most recent assessment, which the next one's trends compare against.
    pub fn latest_for_student(&self, student_id: &str) -> Result<Option<RiskAssessment>> {
        let conn = self.conn()?;
        let enc: Option<String> = conn
            .query_row(
                "SELECT payload_enc FROM risk_assessments WHERE student_id = ?1 \
                 ORDER BY seq DESC LIMIT 1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()?;
        enc.map(|e| self.decode_assessment(&e)).transpose()
    }

    /// Newest first.
    pub fn list(&self, filter: &AssessmentFilter) -> Result<Vec<AssessmentRecord>> {
        let mut sql = format!(
            "SELECT {} FROM risk_assessments a JOIN risk_alerts l ON l.assessment_id = a.id \
             WHERE 1 = 1",
            RECORD_COLUMNS
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(student_id) = &filter.student_id {
            args.push(Value::Text(student_id.clone()));
            sql.push_str(&format!(" AND a.student_id = ?{}", args.len()));
        }
        if let Some(level) = filter.risk_level {
            args.push(Value::Text(level.as_str().to_string()));
            sql.push_str(&format!(" AND a.risk_level = ?{}", args.len()));
        }
        if let Some(triggered) = filter.alert_triggered {
            args.push(Value::Integer(triggered as i64));
            sql.push_str(&format!(" AND a.alert_triggered = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY a.seq DESC");
        if let Some(limit) = filter.limit {
            args.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", args.len()));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(args), RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(|r| self.decode_record(r)).collect()
    }

    pub fn acknowledge(
        &self,
        id: &Uuid,
        by: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(AssessmentRecord, bool)> {
        self.transition_alert(id, |alert| alert.acknowledge(by, at))
    }

    pub fn resolve(
        &self,
        id: &Uuid,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(AssessmentRecord, bool)> {
        self.transition_alert(id, |alert| alert.resolve(note, at))
    }

    /// Apply an alert transition atomically; the flag reports whether anything changed.
    fn transition_alert<F>(&self, id: &Uuid, apply: F) -> Result<(AssessmentRecord, bool)>
    where
        F: FnOnce(&AlertRecord) -> Result<Option<AlertRecord>>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = self.load_alert(&tx, id)?;
        let changed = match apply(&current)? {
            Some(next) => {
                Self::write_alert(&tx, &next)?;
                true
            }
            None => false,
        };
        tx.commit()?;
        let record = self
            .load_record(&conn, id)?
            .ok_or_else(|| RiskError::NotFound(format!("risk assessment {}", id)))?;
        Ok((record, changed))
    }

    fn ensure_assessment(conn: &Connection, id: &Uuid) -> Result<()> {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM risk_assessments WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        exists
            .map(|_| ())
            .ok_or_else(|| RiskError::NotFound(format!("risk assessment {}", id)))
    }

    pub fn insert_intervention(&self, action: &InterventionAction) -> Result<()> {
        let conn = self.conn()?;
        Self::ensure_assessment(&conn, &action.assessment_id)?;
        conn.execute(
            "INSERT INTO intervention_actions \
             (id, assessment_id, action_type, description, priority, scheduled_date, status, \
              assignee, origin, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                action.id.to_string(),
                action.assessment_id.to_string(),
                action.action_type,
                action.description,
                to_text(&action.priority)?,
                action.scheduled_date.as_ref().map(to_text).transpose()?,
                to_text(&action.status)?,
                action.assignee,
                to_text(&action.origin)?,
                action.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn interventions_for(&self, assessment_id: &Uuid) -> Result<Vec<InterventionAction>> {
        let conn = self.conn()?;
        Self::ensure_assessment(&conn, assessment_id)?;
        let sql = format!(
            "SELECT {} FROM intervention_actions WHERE assessment_id = ?1 \
             ORDER BY created_at, id",
            RawIntervention::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![assessment_id.to_string()], RawIntervention::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawIntervention::decode).collect()
    }

    pub fn update_intervention_status(
        &self,
        id: &Uuid,
        status: InterventionStatus,
    ) -> Result<InterventionAction> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let sql = format!(
            "SELECT {} FROM intervention_actions WHERE id = ?1",
            RawIntervention::COLUMNS
        );
        let mut action = tx
            .query_row(&sql, params![id.to_string()], RawIntervention::from_row)
            .optional()?
            .ok_or_else(|| RiskError::NotFound(format!("intervention {}", id)))?
            .decode()?;
        if action.transition(status)? {
            tx.execute(
                "UPDATE intervention_actions SET status = ?1 WHERE id = ?2",
                params![to_text(&action.status)?, id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(action)
    }

    pub fn summary(&self) -> Result<CohortSummary> {
        let conn = self.conn()?;
        let mut summary = CohortSummary::default();

        let mut stmt = conn.prepare(&format!(
            "{} SELECT risk_level, COUNT(*) FROM current GROUP BY risk_level",
            CURRENT_CTE
        ))?;
        let levels = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (level, count) in levels {
            summary.students += count as usize;
            summary
                .by_risk_level
                .insert(from_text(level)?, count as usize);
        }

        summary.open_alerts = conn.query_row(
            &format!(
                "{} SELECT COUNT(*) FROM current c JOIN risk_alerts l ON l.assessment_id = c.id \
                 WHERE l.state IN ('triggered', 'acknowledged')",
                CURRENT_CTE
            ),
            [],
            |row| row.get::<_, i64>(0),
        )? as usize;

        let mut stmt = conn.prepare(&format!(
            "{} SELECT f.factor_type, COUNT(*) FROM current c \
             JOIN risk_factors f ON f.assessment_id = c.id GROUP BY f.factor_type",
            CURRENT_CTE
        ))?;
        let factors = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (factor, count) in factors {
            summary.factor_counts.insert(from_text(factor)?, count as usize);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_sha256_of_secret() {
        // SHA-256("abc")
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let hex: String = derive_key(b"abc").iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(hex, expected);
        assert_ne!(derive_key(b"secret-a"), derive_key(b"secret-b"));
    }

    #[test]
    fn payload_decrypts_only_with_its_key() {
        let key = derive_key(b"store-secret");
        let sealed = encrypt(&key, b"{\"student_name\":\"Avery Lee\"}").unwrap();
        assert!(!sealed.contains("Avery"));
        assert_eq!(
            decrypt(&key, &sealed).unwrap(),
            b"{\"student_name\":\"Avery Lee\"}".to_vec()
        );
        assert!(matches!(
            decrypt(&derive_key(b"other"), &sealed),
            Err(RiskError::Crypto(_))
        ));
    }
}
