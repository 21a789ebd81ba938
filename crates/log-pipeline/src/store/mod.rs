//! 영구 저장소 -- SQLite 기반 추가 전용 로그 저장소
//!
//! [`LogStore`]는 단일 연결을 `Mutex`로 보호하며 모든 메서드가 동기입니다.
//! 비동기 컨텍스트에서는 `spawn_blocking`을 통해 호출해야 합니다
//! ([`QueryService`](crate::query::QueryService) 참조).
//!
//! 쓰기는 [`StoreWriter`]가 전용 블로킹 태스크에서 수행합니다.

pub mod writer;

pub use writer::{PersistStats, StoreWriter};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use hooklog_core::types::{DataType, Level, LogRecord, LogStats, StoredLog};

use crate::error::LogPipelineError;

/// `per_app` 통계에 포함할 최대 앱 수
pub const TOP_APPS: usize = 10;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   TEXT    NOT NULL,
    created_at  INTEGER NOT NULL,
    level       TEXT    NOT NULL,
    tag         TEXT    NOT NULL,
    message     TEXT    NOT NULL,
    source_ip   TEXT    NOT NULL,
    app_package TEXT,
    hook_point  TEXT,
    data_type   TEXT,
    raw_data    TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp   ON logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_created_at  ON logs(created_at);
CREATE INDEX IF NOT EXISTS idx_logs_level       ON logs(level);
CREATE INDEX IF NOT EXISTS idx_logs_tag         ON logs(tag);
CREATE INDEX IF NOT EXISTS idx_logs_app_package ON logs(app_package);
";

const SELECT_COLUMNS: &str = "id, timestamp, level, tag, message, source_ip, \
                              app_package, hook_point, data_type, raw_data";

/// 목록 조회 조건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// 레벨 정확히 일치
    pub level: Option<Level>,
    /// message/tag/app_package 부분 문자열 검색
    pub search: Option<String>,
    /// 최대 반환 건수
    pub limit: usize,
    /// 건너뛸 건수
    pub offset: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            level: None,
            search: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// SQLite 로그 저장소
pub struct LogStore {
    conn: Mutex<Connection>,
}

impl LogStore {
    /// 파일 경로에 저장소를 열고 스키마를 준비합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LogPipelineError::Storage(format!(
                    "cannot create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            LogPipelineError::Storage(format!("cannot open {}: {e}", path.display()))
        })?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "log store opened");
        Ok(store)
    }

    /// 메모리 저장소를 엽니다 (테스트/임시 용도).
    pub fn open_in_memory() -> Result<Self, LogPipelineError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, LogPipelineError> {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        debug!(journal_mode = mode.as_str(), "log store schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 레코드를 저장하고 부여된 ID를 반환합니다.
    pub fn insert(&self, record: &LogRecord) -> Result<i64, LogPipelineError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO logs (timestamp, created_at, level, tag, message, source_ip, \
             app_package, hook_point, data_type, raw_data) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.timestamp.to_rfc3339(),
                Utc::now().timestamp_millis(),
                record.level.as_str(),
                record.tag,
                record.message,
                record.source_ip,
                record.app_package.as_deref(),
                record.hook_point.as_deref(),
                record.data_type.map(|d| d.as_str()),
                record.raw_data,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 조건에 맞는 레코드를 최신순(ID 내림차순)으로 반환합니다.
    pub fn list(&self, query: &LogQuery) -> Result<Vec<StoredLog>, LogPipelineError> {
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM logs");
        let mut clauses = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(level) = query.level {
            args.push(Value::Text(level.as_str().to_owned()));
            clauses.push(format!("level = ?{}", args.len()));
        }

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            args.push(Value::Text(format!("%{}%", escape_like(search))));
            let n = args.len();
            clauses.push(format!(
                "(message LIKE ?{n} ESCAPE '\\' OR tag LIKE ?{n} ESCAPE '\\' \
                 OR app_package LIKE ?{n} ESCAPE '\\')"
            ));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        args.push(Value::Integer(to_i64(query.limit)));
        args.push(Value::Integer(to_i64(query.offset)));
        sql.push_str(&format!(
            " ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            args.len() - 1,
            args.len()
        ));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_stored)?;
        let logs = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// 집계 통계를 계산합니다.
    pub fn stats(&self) -> Result<LogStats, LogPipelineError> {
        let (day_start, day_end) = local_day_bounds_ms(Local::now());
        let conn = self.lock();

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |r| r.get(0))?;

        let mut per_level = std::collections::BTreeMap::new();
        {
            let mut stmt = conn.prepare("SELECT level, COUNT(*) FROM logs GROUP BY level")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (level, n) = row?;
                let level = Level::from_str_loose(&level).unwrap_or_default();
                *per_level.entry(level).or_insert(0) += to_u64(n);
            }
        }

        let per_app = {
            let mut stmt = conn.prepare(
                "SELECT app_package, COUNT(*) AS n FROM logs \
                 WHERE app_package IS NOT NULL \
                 GROUP BY app_package ORDER BY n DESC, app_package ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map([to_i64(TOP_APPS)], |r| {
                Ok((r.get::<_, String>(0)?, to_u64(r.get::<_, i64>(1)?)))
            })?;
            let apps = rows.collect::<Result<Vec<_>, _>>()?;
            apps
        };

        let today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM logs WHERE created_at >= ?1 AND created_at < ?2",
            params![day_start, day_end],
            |r| r.get(0),
        )?;

        Ok(LogStats {
            total: to_u64(total),
            per_level,
            per_app,
            today: to_u64(today),
        })
    }

    /// 모든 레코드를 삭제하고 삭제 건수를 반환합니다.
    pub fn clear(&self) -> Result<u64, LogPipelineError> {
        let deleted = self.lock().execute("DELETE FROM logs", [])?;
        Ok(deleted as u64)
    }

    /// 전체 레코드 수를 반환합니다.
    pub fn count(&self) -> Result<u64, LogPipelineError> {
        let n: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM logs", [], |r| r.get(0))?;
        Ok(to_u64(n))
    }

    /// 최신 `max_records`건을 남기고 오래된 레코드를 삭제합니다.
    pub fn prune(&self, max_records: u64) -> Result<u64, LogPipelineError> {
        let conn = self.lock();
        let cutoff: Option<i64> = conn
            .query_row(
                "SELECT id FROM logs ORDER BY id DESC LIMIT 1 OFFSET ?1",
                [i64::try_from(max_records).unwrap_or(i64::MAX)],
                |r| r.get(0),
            )
            .optional()?;

        let Some(cutoff) = cutoff else {
            return Ok(0);
        };
        let deleted = conn.execute("DELETE FROM logs WHERE id <= ?1", [cutoff])?;
        Ok(deleted as u64)
    }
}

fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredLog> {
    let ts: String = row.get(1)?;
    let timestamp = DateTime::parse_from_rfc3339(&ts)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let level: String = row.get(2)?;
    let data_type: Option<String> = row.get(8)?;

    Ok(StoredLog {
        id: row.get(0)?,
        record: LogRecord {
            timestamp,
            level: Level::from_str_loose(&level).unwrap_or_default(),
            tag: row.get(3)?,
            message: row.get(4)?,
            source_ip: row.get(5)?,
            app_package: row.get(6)?,
            hook_point: row.get(7)?,
            data_type: data_type.as_deref().and_then(DataType::from_str_loose),
            raw_data: row.get(9)?,
        },
    })
}

/// LIKE 패턴의 메타 문자(`%`, `_`, `\`)를 이스케이프합니다.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// 로컬 달력 기준 오늘의 [시작, 끝) 경계를 Unix ms로 반환합니다.
fn local_day_bounds_ms<Tz: TimeZone>(now: DateTime<Tz>) -> (i64, i64) {
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    let tz = now.timezone();
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .map(|t| t.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis() - DAY_MS);
    (start, start + DAY_MS)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
