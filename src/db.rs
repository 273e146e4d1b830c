use crate::record::AttendanceRecord;
use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "rollcall.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    // seq keeps save order; a re-saved key is deleted and re-inserted so it
    // moves to the newest position.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            class_id TEXT NOT NULL,
            period_id TEXT NOT NULL,
            present_seats TEXT NOT NULL,
            score REAL NOT NULL,
            saved_at TEXT NOT NULL,
            UNIQUE(date, class_id, period_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_class ON attendance_records(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn upsert_record(conn: &Connection, record: &AttendanceRecord) -> anyhow::Result<()> {
    let (date, class_id, period_id) = record.key();
    let date = date.format("%Y-%m-%d").to_string();
    let seats = serde_json::to_string(&record.present_seats)?;
    let saved_at = chrono::Utc::now().to_rfc3339();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance_records WHERE date = ? AND class_id = ? AND period_id = ?",
        (&date, class_id, period_id),
    )?;
    tx.execute(
        "INSERT INTO attendance_records(date, class_id, period_id, present_seats, score, saved_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&date, class_id, period_id, &seats, record.score, &saved_at),
    )?;
    tx.commit()?;
    Ok(())
}

/// All cached sheets, oldest save first.
pub fn list_records(conn: &Connection) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, class_id, period_id, present_seats, score
         FROM attendance_records
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, f64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (date, class_id, period_id, seats, score) in rows {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("bad cached date {date}"))?;
        let present_seats: Vec<u32> = serde_json::from_str(&seats)
            .with_context(|| format!("bad cached seats for {class_id} {date}"))?;
        out.push(AttendanceRecord {
            date,
            class_id,
            period_id,
            present_seats,
            score,
        });
    }
    Ok(out)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn rec(day: u32, class_id: &str, period_id: &str, seats: &[u32]) -> AttendanceRecord {
        AttendanceRecord {
            date: NaiveDate::from_ymd_opt(2026, 4, day).expect("date"),
            class_id: class_id.to_string(),
            period_id: period_id.to_string(),
            present_seats: seats.to_vec(),
            score: 0.4,
        }
    }

    #[test]
    fn resaving_a_key_replaces_and_moves_to_newest() {
        let ws = temp_dir("rollcall-db-upsert");
        let conn = open_db(&ws).expect("open");
        upsert_record(&conn, &rec(1, "2R", "1교시", &[1, 2])).expect("a");
        upsert_record(&conn, &rec(1, "1R", "1교시", &[3])).expect("b");
        upsert_record(&conn, &rec(1, "2R", "1교시", &[4])).expect("a again");

        let all = list_records(&conn).expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].class_id, "1R");
        assert_eq!(all[1], rec(1, "2R", "1교시", &[4]));

        // Survives reopen.
        drop(conn);
        let conn = open_db(&ws).expect("reopen");
        assert_eq!(list_records(&conn).expect("list").len(), 2);
    }

    #[test]
    fn settings_roundtrip() {
        let ws = temp_dir("rollcall-db-settings");
        let conn = open_db(&ws).expect("open");
        assert_eq!(settings_get_json(&conn, "students.names").expect("get"), None);
        settings_set_json(&conn, "students.names", &json!({ "2R": { "1": "Kim" } })).expect("set");
        settings_set_json(&conn, "students.names", &json!({ "2R": { "1": "Lee" } })).expect("set");
        let v = settings_get_json(&conn, "students.names")
            .expect("get")
            .expect("value");
        assert_eq!(v["2R"]["1"], "Lee");
    }
}
