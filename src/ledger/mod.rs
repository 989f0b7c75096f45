use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::warn;

use crate::domains::event::{EventDraft, EventKind, EventRecord, MessageState};
use crate::error::{LedgerError, Result};

mod schema;
use schema::events;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct EventRow {
    id: i64,
    kind: String,
    actor_id: String,
    channel_id: String,
    created_at: i64,
    message_id: Option<String>,
    message_state: String,
    customer_name: String,
    set_at: Option<i64>,
    has_bill: Option<bool>,
    system_size: Option<f64>,
    setter_id: Option<String>,
}

#[derive(QueryableByName)]
struct RowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    id: i64,
}

#[derive(Insertable)]
#[diesel(table_name = events)]
struct NewEvent<'a> {
    kind: &'a str,
    actor_id: &'a str,
    channel_id: &'a str,
    created_at: i64,
    message_state: &'a str,
    customer_name: &'a str,
    set_at: Option<i64>,
    has_bill: Option<bool>,
    system_size: Option<f64>,
    setter_id: Option<&'a str>,
}

impl<'a> NewEvent<'a> {
    fn from_draft(draft: &'a EventDraft, created_at: i64) -> Self {
        let mut new = NewEvent {
            kind: draft.kind().as_str(),
            actor_id: draft.actor_id(),
            channel_id: draft.channel_id(),
            created_at,
            message_state: MessageState::Pending.as_str(),
            customer_name: draft.customer_name(),
            set_at: None,
            has_bill: None,
            system_size: None,
            setter_id: None,
        };
        match draft {
            EventDraft::Set {
                set_at, has_bill, ..
            } => {
                new.set_at = Some(*set_at);
                new.has_bill = Some(*has_bill);
            }
            EventDraft::Closed {
                system_size,
                setter_id,
                ..
            } => {
                new.system_size = Some(*system_size);
                new.setter_id = Some(setter_id.as_str());
            }
            EventDraft::InstallScheduled { setter_id, .. } => {
                new.setter_id = Some(setter_id.as_str());
            }
        }
        new
    }
}

/// The durable event ledger: single source of truth for recorded sales
/// activity. Constructed explicitly and injected into every component.
pub struct EventLedger {
    pool: SqlitePool,
}

impl EventLedger {
    pub async fn open(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Validates the draft, stamps `id` and `created_at`, and persists the
    /// row in the `pending` announcement state. The returned id is
    /// immediately readable back.
    pub async fn append(&self, draft: &EventDraft) -> Result<i64> {
        draft.validate()?;
        let now = now_ts();
        let new = NewEvent::from_draft(draft, now);

        let mut conn = self.conn().await?;
        diesel::insert_into(events::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;

        // rowid is per-connection state, so the read must stay on the
        // connection that ran the insert.
        let row: RowId = diesel::sql_query("SELECT last_insert_rowid() AS id")
            .get_result(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        Ok(row.id)
    }

    /// Second phase of the two-phase write: records the announcement
    /// message id. Idempotent; a missing row is logged and tolerated
    /// because the business event itself was already durably recorded.
    pub async fn attach_message(&self, id: i64, message_id: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(events::table.find(id))
            .set((
                events::message_id.eq(Some(message_id)),
                events::message_state.eq(MessageState::Finalized.as_str()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        if updated == 0 {
            warn!(event_id = id, "attach_message: row no longer exists");
        }
        Ok(())
    }

    /// Marks a row whose announcement never got posted. Same missing-row
    /// tolerance as `attach_message`.
    pub async fn mark_orphaned(&self, id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(events::table.find(id))
            .set(events::message_state.eq(MessageState::Orphaned.as_str()))
            .execute(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        if updated == 0 {
            warn!(event_id = id, "mark_orphaned: row no longer exists");
        }
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<EventRecord>> {
        let mut conn = self.conn().await?;
        let row: Option<EventRow> = events::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        row.map(map_row).transpose()
    }

    /// Newest id first; drives the deletion picker.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<EventRecord>> {
        let mut conn = self.conn().await?;
        let rows: Vec<EventRow> = events::table
            .order(events::id.desc())
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        rows.into_iter().map(map_row).collect()
    }

    /// Id ascending; the export scan.
    pub async fn list_all(&self) -> Result<Vec<EventRecord>> {
        let mut conn = self.conn().await?;
        let rows: Vec<EventRow> = events::table
            .order(events::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        rows.into_iter().map(map_row).collect()
    }

    /// Hard delete. Returns the affected-row count: 0 means the row was
    /// already gone (a concurrent delete won), which callers treat as
    /// "already handled", never as an error.
    pub async fn delete(&self, id: i64) -> Result<usize> {
        let mut conn = self.conn().await?;
        diesel::delete(events::table.find(id))
            .execute(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    pub(crate) async fn count_created_between(
        &self,
        kind: EventKind,
        start: i64,
        end: i64,
    ) -> Result<i64> {
        let mut conn = self.conn().await?;
        events::table
            .filter(events::kind.eq(kind.as_str()))
            .filter(events::created_at.ge(start))
            .filter(events::created_at.lt(end))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    pub(crate) async fn count_sets_between(&self, start: i64, end: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        events::table
            .filter(events::kind.eq(EventKind::Set.as_str()))
            .filter(events::set_at.ge(Some(start)))
            .filter(events::set_at.lt(Some(end)))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    /// Set events whose business date falls in the range, id ascending;
    /// the leaderboard fold depends on this scan order.
    pub(crate) async fn list_sets_between(&self, start: i64, end: i64) -> Result<Vec<EventRecord>> {
        let mut conn = self.conn().await?;
        let rows: Vec<EventRow> = events::table
            .filter(events::kind.eq(EventKind::Set.as_str()))
            .filter(events::set_at.ge(Some(start)))
            .filter(events::set_at.lt(Some(end)))
            .order(events::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        rows.into_iter().map(map_row).collect()
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))
    }
}

fn map_row(row: EventRow) -> Result<EventRecord> {
    let kind = EventKind::parse(&row.kind)
        .ok_or_else(|| LedgerError::Store(format!("unknown event kind '{}'", row.kind)))?;
    let message_state = MessageState::parse(&row.message_state).ok_or_else(|| {
        LedgerError::Store(format!("unknown message state '{}'", row.message_state))
    })?;
    Ok(EventRecord {
        id: row.id,
        kind,
        actor_id: row.actor_id,
        channel_id: row.channel_id,
        created_at: row.created_at,
        message_id: row.message_id,
        message_state,
        customer_name: row.customer_name,
        set_at: row.set_at,
        has_bill: row.has_bill,
        system_size: row.system_size,
        setter_id: row.setter_id,
    })
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::Store(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        Ok::<_, LedgerError>(())
    })
    .await
    .map_err(|e| LedgerError::Store(e.to_string()))??;
    Ok(())
}
