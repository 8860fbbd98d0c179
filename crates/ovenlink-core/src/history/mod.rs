// ── Telemetry history ──
//
// Append-only SQLite time series of flattened appliance snapshots. The
// store is the sole writer; readers either query once or hold a
// `HistoryWatch` that re-evaluates after every append.

mod nearest;
mod range;
mod schema;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use tokio::sync::{OnceCell, watch};
use tracing::{debug, info};

pub use nearest::{Timestamped, nearest, nearest_index};
pub use range::HistoryRange;
pub use schema::{HistoryTable, Table};

use crate::config::HistoryLocation;
use crate::error::CoreError;
use crate::model::HistorySnapshot;

const INSERT_SNAPSHOT: &str = r"
    INSERT OR REPLACE INTO oven_history (
        id, appliance_id, cook_id, updated_timestamp,
        dry, dry_top, dry_bottom, wet, wet_dosed, temperature_mode,
        dry_setpoint, wet_setpoint,
        lamp_on, lamp_preference, vent_open, door_closed, water_tank_empty, fan_speed,
        heating_top_on, heating_bottom_on, heating_rear_on,
        heating_top_watts, heating_bottom_watts, heating_rear_watts,
        probe_connected, probe, probe_setpoint,
        steam_mode, evaporator, boiler, boiler_dosed, evaporator_watts, boiler_watts,
        relative_humidity, relative_humidity_setpoint, steam_percentage_setpoint,
        timer_mode, timer_initial, timer_current
    ) VALUES (
        $1, $2, $3, $4,
        $5, $6, $7, $8, $9, $10,
        $11, $12,
        $13, $14, $15, $16, $17, $18,
        $19, $20, $21,
        $22, $23, $24,
        $25, $26, $27,
        $28, $29, $30, $31, $32, $33,
        $34, $35, $36,
        $37, $38, $39
    )
";

/// Handle to the history database. Cheap to clone.
#[derive(Clone)]
pub struct TimeSeriesStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    pool: SqlitePool,
    schema: OnceCell<()>,
    revision: watch::Sender<u64>,
}

impl TimeSeriesStore {
    /// Open (or create) the database at `location`. The schema is created
    /// lazily on first use.
    pub async fn open(location: &HistoryLocation, sql_trace: bool) -> Result<Self, CoreError> {
        let (options, pool_options) = match location {
            // Every in-memory connection is its own database: pin exactly one.
            HistoryLocation::InMemory => (
                SqliteConnectOptions::from_str("sqlite::memory:")?,
                SqlitePoolOptions::new()
                    .min_connections(1)
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None),
            ),
            HistoryLocation::File(path) => (
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
                SqlitePoolOptions::new().min_connections(1).max_connections(4),
            ),
        };

        let options = if sql_trace {
            options
        } else {
            options.disable_statement_logging()
        };

        let pool = pool_options.connect_with(options).await?;
        info!(location = ?location, sql_trace, "history store opened");

        let (revision, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(StoreInner {
                pool,
                schema: OnceCell::new(),
                revision,
            }),
        })
    }

    pub async fn in_memory() -> Result<Self, CoreError> {
        Self::open(&HistoryLocation::InMemory, false).await
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        self.inner
            .schema
            .get_or_try_init(|| async {
                let table = HistoryTable;
                for statement in table.create() {
                    sqlx::query(statement).execute(&self.inner.pool).await?;
                }
                debug!(table = table.name(), "history schema ready");
                Ok::<_, CoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Insert `snapshot`, or replace the row with its id when it already
    /// has one. Returns the row id.
    pub async fn append(&self, snapshot: &HistorySnapshot) -> Result<i64, CoreError> {
        self.ensure_schema().await?;

        let id = sqlx::query(INSERT_SNAPSHOT)
            .bind(snapshot.id)
            .bind(&snapshot.appliance_id)
            .bind(&snapshot.cook_id)
            .bind(snapshot.updated_timestamp.trunc_subsecs(0))
            .bind(snapshot.dry)
            .bind(snapshot.dry_top)
            .bind(snapshot.dry_bottom)
            .bind(snapshot.wet)
            .bind(snapshot.wet_dosed)
            .bind(&snapshot.temperature_mode)
            .bind(snapshot.dry_setpoint)
            .bind(snapshot.wet_setpoint)
            .bind(snapshot.lamp_on)
            .bind(snapshot.lamp_preference)
            .bind(snapshot.vent_open)
            .bind(snapshot.door_closed)
            .bind(snapshot.water_tank_empty)
            .bind(snapshot.fan_speed)
            .bind(snapshot.heating_top_on)
            .bind(snapshot.heating_bottom_on)
            .bind(snapshot.heating_rear_on)
            .bind(snapshot.heating_top_watts)
            .bind(snapshot.heating_bottom_watts)
            .bind(snapshot.heating_rear_watts)
            .bind(snapshot.probe_connected)
            .bind(snapshot.probe)
            .bind(snapshot.probe_setpoint)
            .bind(&snapshot.steam_mode)
            .bind(snapshot.evaporator)
            .bind(snapshot.boiler)
            .bind(snapshot.boiler_dosed)
            .bind(snapshot.evaporator_watts)
            .bind(snapshot.boiler_watts)
            .bind(snapshot.relative_humidity)
            .bind(snapshot.relative_humidity_setpoint)
            .bind(snapshot.steam_percentage_setpoint)
            .bind(&snapshot.timer_mode)
            .bind(snapshot.timer_initial)
            .bind(snapshot.timer_current)
            .execute(&self.inner.pool)
            .await?
            .last_insert_rowid();

        self.inner.revision.send_modify(|r| *r = r.wrapping_add(1));
        Ok(id)
    }

    /// Snapshots for `appliance_id` newer than `now - window`, oldest first.
    pub async fn query(
        &self,
        appliance_id: &str,
        window: Duration,
    ) -> Result<Vec<HistorySnapshot>, CoreError> {
        let window = chrono::Duration::from_std(window).map_err(|e| CoreError::Storage {
            message: format!("history window out of range: {e}"),
        })?;
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.query_since(appliance_id, cutoff).await
    }

    /// Snapshots for `appliance_id` strictly after `cutoff`, oldest first.
    pub async fn query_since(
        &self,
        appliance_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<HistorySnapshot>, CoreError> {
        self.ensure_schema().await?;

        let rows: Vec<HistorySnapshot> = sqlx::query_as(
            r"
            SELECT * FROM oven_history
            WHERE appliance_id = $1 AND updated_timestamp > $2
            ORDER BY updated_timestamp ASC, id ASC
            ",
        )
        .bind(appliance_id)
        .bind(cutoff.trunc_subsecs(0))
        .fetch_all(&self.inner.pool)
        .await?;

        Ok(rows)
    }

    /// Every snapshot recorded during one cook, oldest first.
    pub async fn snapshots_for_cook(
        &self,
        appliance_id: &str,
        cook_id: &str,
    ) -> Result<Vec<HistorySnapshot>, CoreError> {
        self.ensure_schema().await?;

        let rows: Vec<HistorySnapshot> = sqlx::query_as(
            r"
            SELECT * FROM oven_history
            WHERE appliance_id = $1 AND cook_id = $2
            ORDER BY updated_timestamp ASC, id ASC
            ",
        )
        .bind(appliance_id)
        .bind(cook_id)
        .fetch_all(&self.inner.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64, CoreError> {
        self.ensure_schema().await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM oven_history")
            .fetch_one(&self.inner.pool)
            .await?;
        Ok(count)
    }

    /// Delete every row.
    pub async fn reset(&self) -> Result<u64, CoreError> {
        self.ensure_schema().await?;

        let removed = sqlx::query(HistoryTable.truncate())
            .execute(&self.inner.pool)
            .await?
            .rows_affected();

        info!(removed, "history reset");
        self.inner.revision.send_modify(|r| *r = r.wrapping_add(1));
        Ok(removed)
    }

    /// A live view of `query(appliance_id, window)`.
    pub fn watch_query(&self, appliance_id: impl Into<String>, window: Duration) -> HistoryWatch {
        HistoryWatch {
            store: self.clone(),
            appliance_id: appliance_id.into(),
            window,
            revision: self.inner.revision.subscribe(),
        }
    }

    pub async fn close(&self) {
        self.inner.pool.close().await;
    }
}

// ── Live query ───────────────────────────────────────────────────────

/// Re-evaluates one history query whenever the store changes. The window
/// slides: each evaluation uses the current wall clock.
pub struct HistoryWatch {
    store: TimeSeriesStore,
    appliance_id: String,
    window: Duration,
    revision: watch::Receiver<u64>,
}

impl HistoryWatch {
    pub async fn current(&self) -> Result<Vec<HistorySnapshot>, CoreError> {
        self.store.query(&self.appliance_id, self.window).await
    }

    /// Wait for the next append or reset, then re-run the query.
    /// Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Result<Vec<HistorySnapshot>, CoreError>> {
        self.revision.changed().await.ok()?;
        self.revision.borrow_and_update();
        Some(self.current().await)
    }

    pub fn appliance_id(&self) -> &str {
        &self.appliance_id
    }
}
