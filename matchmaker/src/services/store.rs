//! SQLite-backed member and match store
//!
//! Members, matches and the meeting history live in one SQLite file. A match
//! references its 2 or 3 members through the `match_members` join table, and
//! `member_meetings` holds every pair exactly once (`member_id < met_with_id`).
//! Match creation runs in an IMMEDIATE transaction so two rounds started from
//! different processes cannot both book the same member.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter};
use shared::{
    ChannelId, Job, Match, MatchId, Member, MemberId, MemberPair, MemberProfile, MemberSet, PlatformUserId,
    job_debug,
};

use crate::core::MeetingHistory;
use crate::error::{MatchmakerError, MatchmakerResult};
use crate::traits::MemberStore;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    platform_id TEXT UNIQUE,
    name TEXT NOT NULL,
    email TEXT,
    handle TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    matched_at TEXT NOT NULL,
    met INTEGER NOT NULL DEFAULT 0,
    is_current INTEGER NOT NULL DEFAULT 1,
    channel_id TEXT,
    met_confirmed_at TEXT
);

CREATE TABLE IF NOT EXISTS match_members (
    match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    PRIMARY KEY (match_id, member_id)
);

CREATE INDEX IF NOT EXISTS idx_match_members_member ON match_members(member_id);

CREATE TABLE IF NOT EXISTS member_meetings (
    member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    met_with_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    met_at TEXT NOT NULL,
    PRIMARY KEY (member_id, met_with_id),
    CHECK (member_id < met_with_id)
);
";

const MATCH_COLUMNS: &str = "id, matched_at, met, is_current, channel_id, met_confirmed_at";
const MEMBER_COLUMNS: &str = "id, platform_id, name, email, handle, is_active";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> MatchmakerResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Private in-memory database
    pub fn in_memory() -> MatchmakerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> MatchmakerResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> MatchmakerResult<T>) -> MatchmakerResult<T> {
        let conn = self.conn.lock().map_err(|_| MatchmakerError::LockPoisoned {
            resource: "sqlite".to_string(),
        })?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> MatchmakerResult<T>) -> MatchmakerResult<T> {
        let mut conn = self.conn.lock().map_err(|_| MatchmakerError::LockPoisoned {
            resource: "sqlite".to_string(),
        })?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn read_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: MemberId(row.get(0)?),
        platform_id: row.get::<_, Option<String>>(1)?.map(|id| PlatformUserId::new(id)),
        name: row.get(2)?,
        email: row.get(3)?,
        handle: row.get(4)?,
        is_active: row.get(5)?,
    })
}

/// Match row without its members
struct MatchRow {
    id: MatchId,
    matched_at: DateTime<Utc>,
    met: bool,
    is_current: bool,
    channel_id: Option<ChannelId>,
    met_confirmed_at: Option<DateTime<Utc>>,
}

fn read_match_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    let matched_at: String = row.get(1)?;
    let met_confirmed_at: Option<String> = row.get(5)?;
    Ok(MatchRow {
        id: MatchId(row.get(0)?),
        matched_at: parse_time(&matched_at)?,
        met: row.get(2)?,
        is_current: row.get(3)?,
        channel_id: row.get::<_, Option<String>>(4)?.map(|id| ChannelId::new(id)),
        met_confirmed_at: met_confirmed_at.as_deref().map(parse_time).transpose()?,
    })
}

fn attach_members(conn: &Connection, row: MatchRow) -> MatchmakerResult<Match> {
    let mut stmt = conn.prepare_cached("SELECT member_id FROM match_members WHERE match_id = ?1 ORDER BY member_id")?;
    let ids = stmt
        .query_map(params![row.id.0], |r| r.get::<_, i64>(0).map(MemberId))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Match {
        id: row.id,
        members: MemberSet::new(ids)?,
        matched_at: row.matched_at,
        met: row.met,
        is_current: row.is_current,
        channel_id: row.channel_id,
        met_confirmed_at: row.met_confirmed_at,
    })
}

fn query_matches(conn: &Connection, filter: &str, args: &[&dyn rusqlite::ToSql]) -> MatchmakerResult<Vec<Match>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args, read_match_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(|row| attach_members(conn, row)).collect()
}

fn load_match(conn: &Connection, match_id: MatchId) -> MatchmakerResult<Option<Match>> {
    Ok(query_matches(conn, "WHERE id = ?1", &[&match_id.0])?.into_iter().next())
}

#[async_trait]
impl MemberStore for SqliteStore {
    async fn available_members(&self) -> MatchmakerResult<Vec<MemberId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id FROM members
                WHERE is_active = 1
                  AND id NOT IN (
                    SELECT mm.member_id FROM match_members mm
                    JOIN matches m ON m.id = mm.match_id
                    WHERE m.is_current = 1
                  )
                ORDER BY id
                ",
            )?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0).map(MemberId))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }

    async fn meeting_history(&self) -> MatchmakerResult<MeetingHistory> {
        self.with_conn(|conn| {
            let mut history = MeetingHistory::new();

            let mut recorded = conn.prepare("SELECT member_id, met_with_id FROM member_meetings")?;
            let pairs = recorded
                .query_map([], |row| Ok((MemberId(row.get(0)?), MemberId(row.get(1)?))))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (a, b) in pairs {
                history.record(a, b);
            }

            // Pairs inside confirmed matches count even if never recorded separately
            let mut confirmed = conn.prepare(
                r"
                SELECT a.member_id, b.member_id
                FROM matches m
                JOIN match_members a ON a.match_id = m.id
                JOIN match_members b ON b.match_id = m.id AND a.member_id < b.member_id
                WHERE m.met = 1
                ",
            )?;
            let pairs = confirmed
                .query_map([], |row| Ok((MemberId(row.get(0)?), MemberId(row.get(1)?))))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (a, b) in pairs {
                history.record(a, b);
            }

            job_debug!(Job::current(), "Loaded meeting history with {} pairs", history.len());
            Ok(history)
        })
    }

    async fn record_meeting(&self, pair: MemberPair, met_at: DateTime<Utc>) -> MatchmakerResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO member_meetings(member_id, met_with_id, met_at) VALUES (?1, ?2, ?3)",
                params![pair.low().0, pair.high().0, met_at.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    async fn forget_meeting(&self, pair: MemberPair) -> MatchmakerResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM member_meetings WHERE member_id = ?1 AND met_with_id = ?2",
                params![pair.low().0, pair.high().0],
            )?;
            Ok(())
        })
    }

    async fn create_match(&self, members: &MemberSet, matched_at: DateTime<Utc>) -> MatchmakerResult<Match> {
        self.with_tx(|tx| {
            for member_id in members.members() {
                let busy = tx
                    .query_row(
                        r"
                        SELECT 1 FROM match_members mm
                        JOIN matches m ON m.id = mm.match_id
                        WHERE mm.member_id = ?1 AND m.is_current = 1
                        LIMIT 1
                        ",
                        params![member_id.0],
                        |_| Ok(()),
                    )
                    .optional()?;
                if busy.is_some() {
                    return Err(MatchmakerError::AlreadyMatched { member_id: *member_id });
                }
            }

            tx.execute(
                "INSERT INTO matches(matched_at, met, is_current) VALUES (?1, 0, 1)",
                params![matched_at.to_rfc3339()],
            )?;
            let match_id = MatchId(tx.last_insert_rowid());
            for member_id in members.members() {
                tx.execute(
                    "INSERT INTO match_members(match_id, member_id) VALUES (?1, ?2)",
                    params![match_id.0, member_id.0],
                )?;
            }

            load_match(tx, match_id)?.ok_or(MatchmakerError::MatchNotFound { match_id })
        })
    }

    async fn retire_current_matches(&self) -> MatchmakerResult<usize> {
        self.with_conn(|conn| Ok(conn.execute("UPDATE matches SET is_current = 0 WHERE is_current = 1", [])?))
    }

    async fn get_match(&self, match_id: MatchId) -> MatchmakerResult<Option<Match>> {
        self.with_conn(|conn| load_match(conn, match_id))
    }

    async fn current_match_for(&self, member_id: MemberId) -> MatchmakerResult<Option<Match>> {
        self.with_conn(|conn| {
            let found = query_matches(
                conn,
                r"
                WHERE is_current = 1
                  AND id IN (SELECT match_id FROM match_members WHERE member_id = ?1)
                ORDER BY matched_at DESC, id DESC
                ",
                &[&member_id.0],
            )?;
            Ok(found.into_iter().next())
        })
    }

    async fn set_channel(&self, match_id: MatchId, channel: &ChannelId) -> MatchmakerResult<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE matches SET channel_id = ?1 WHERE id = ?2",
                params![channel.as_str(), match_id.0],
            )?;
            if updated == 0 {
                return Err(MatchmakerError::MatchNotFound { match_id });
            }
            Ok(())
        })
    }

    async fn matches_without_channel(&self) -> MatchmakerResult<Vec<Match>> {
        self.with_conn(|conn| {
            query_matches(
                conn,
                "WHERE channel_id IS NULL OR TRIM(channel_id) = '' ORDER BY matched_at, id",
                &[],
            )
        })
    }

    async fn set_met(&self, match_id: MatchId, met_at: Option<DateTime<Utc>>) -> MatchmakerResult<Match> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE matches SET met = ?1, met_confirmed_at = ?2 WHERE id = ?3",
                params![met_at.is_some(), met_at.map(|t| t.to_rfc3339()), match_id.0],
            )?;
            if updated == 0 {
                return Err(MatchmakerError::MatchNotFound { match_id });
            }
            load_match(conn, match_id)?.ok_or(MatchmakerError::MatchNotFound { match_id })
        })
    }

    async fn pending_reminders(&self, cutoff: DateTime<Utc>) -> MatchmakerResult<Vec<Match>> {
        self.with_conn(|conn| {
            let candidates = query_matches(conn, "WHERE is_current = 1 AND met = 0 ORDER BY matched_at, id", &[])?;
            Ok(candidates.into_iter().filter(|m| m.matched_at <= cutoff).collect())
        })
    }

    async fn members_by_id(&self, ids: &[MemberId]) -> MatchmakerResult<Vec<Member>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id IN ({placeholders}) ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let members = stmt
                .query_map(params_from_iter(ids.iter().map(|id| id.0)), read_member)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
    }

    async fn member_by_platform_id(&self, platform_id: &PlatformUserId) -> MatchmakerResult<Option<Member>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE platform_id = ?1");
            Ok(conn
                .query_row(&sql, params![platform_id.as_str()], read_member)
                .optional()?)
        })
    }

    async fn upsert_member(&self, profile: &MemberProfile) -> MatchmakerResult<Member> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO members(platform_id, name, email, handle, is_active, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
                ON CONFLICT(platform_id) DO UPDATE SET
                  name = excluded.name,
                  email = excluded.email,
                  handle = excluded.handle,
                  is_active = 1,
                  updated_at = excluded.updated_at
                ",
                params![
                    profile.platform_id.as_str(),
                    profile.name,
                    profile.email,
                    profile.handle,
                    now
                ],
            )?;
            let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE platform_id = ?1");
            Ok(conn.query_row(&sql, params![profile.platform_id.as_str()], read_member)?)
        })
    }

    async fn deactivate_members_not_in(&self, keep: &[PlatformUserId]) -> MatchmakerResult<usize> {
        self.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let changed = if keep.is_empty() {
                conn.execute(
                    "UPDATE members SET is_active = 0, updated_at = ?1 WHERE platform_id IS NOT NULL AND is_active = 1",
                    params![now],
                )?
            } else {
                let placeholders = (0..keep.len()).map(|i| format!("?{}", i + 2)).collect::<Vec<_>>().join(", ");
                let sql = format!(
                    "UPDATE members SET is_active = 0, updated_at = ?1 \
                     WHERE platform_id IS NOT NULL AND is_active = 1 AND platform_id NOT IN ({placeholders})"
                );
                let mut values: Vec<String> = Vec::with_capacity(keep.len() + 1);
                values.push(now);
                values.extend(keep.iter().map(|id| id.as_str().to_string()));
                conn.execute(&sql, params_from_iter(values.iter()))?
            };
            Ok(changed)
        })
    }
}

impl SqliteStore {
    /// Insert a member that has not been synced from the platform
    pub fn insert_local_member(&self, name: &str, email: Option<&str>) -> MatchmakerResult<Member> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO members(platform_id, name, email, is_active, created_at, updated_at) VALUES (NULL, ?1, ?2, 1, ?3, ?3)",
                params![name, email, now],
            )?;
            let id = conn.last_insert_rowid();
            let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?1");
            Ok(conn.query_row(&sql, params![id], read_member)?)
        })
    }
}
