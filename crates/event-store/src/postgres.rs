use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, RequestContext};
use sqlx::{Acquire, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::dispatcher::EventDispatcher;
use crate::error::{EventStoreError, Result};
use crate::event::{Event, EventMeta};
use crate::store::{AggregateSource, EventStore, EventStream, fill_meta_defaults};

const SELECT_COLUMNS: &str = "id, event_type, payload, version, entity_id, entity_type, \
     root_id, sequence_no, user_id, module_id, group_id, schema_name, created";

/// PostgreSQL-backed event store.
///
/// One append-only `events` table holds the full log; `sequence_no` is
/// unique per root so two interleaved writers on the same aggregate
/// cannot both commit.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    dispatcher: Arc<EventDispatcher>,
}

impl PostgresEventStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { pool, dispatcher }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The dispatcher persisted events are broadcast through.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        Ok(Event {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            version: row.try_get::<i32, _>("version")? as u32,
            meta: EventMeta {
                entity_id: row.try_get("entity_id")?,
                entity_type: row.try_get("entity_type")?,
                root_id: row.try_get("root_id")?,
                sequence_no: row.try_get("sequence_no")?,
                user: row.try_get("user_id")?,
                module: row.try_get("module_id")?,
                group: row.try_get("group_id")?,
                schema_name: row.try_get("schema_name")?,
                created: row.try_get::<DateTime<Utc>, _>("created")?,
            },
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, ctx, aggregate))]
    async fn persist(
        &self,
        ctx: &RequestContext,
        aggregate: &mut dyn AggregateSource,
    ) -> Result<Vec<Event>> {
        if ctx.is_cancelled() {
            return Err(EventStoreError::Cancelled);
        }

        if aggregate.uncommitted_events().is_empty() {
            return Ok(Vec::new());
        }

        let mut batch: Vec<Event> = aggregate.uncommitted_events().to_vec();
        for event in &mut batch {
            fill_meta_defaults(ctx, event);
        }
        let root_id = batch[0].meta.root_id.clone();

        let mut tx = self.pool.begin().await?;

        // Optimistic concurrency: reject before anything is written.
        if let Some(expected) = ctx.expected_sequence_no {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT MAX(sequence_no) FROM events WHERE root_id = $1")
                    .bind(&root_id)
                    .fetch_one(&mut *tx)
                    .await?;
            let actual = actual.unwrap_or(0);
            if actual != expected {
                return Err(EventStoreError::StaleSequence {
                    root_id,
                    expected,
                    actual,
                });
            }
        }

        // Savepoint around the batch: the first invalid event discards
        // every write made for it.
        let mut sp = tx.begin().await?;
        for event in &batch {
            if ctx.is_cancelled() {
                sp.rollback().await?;
                return Err(EventStoreError::Cancelled);
            }

            if let Err(validation) = event.validate() {
                sp.rollback().await?;
                return Err(validation);
            }

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, payload, version, entity_id, entity_type,
                                    root_id, sequence_no, user_id, module_id, group_id,
                                    schema_name, created)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(event.id.as_uuid())
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.version as i32)
            .bind(&event.meta.entity_id)
            .bind(&event.meta.entity_type)
            .bind(&event.meta.root_id)
            .bind(event.meta.sequence_no)
            .bind(&event.meta.user)
            .bind(&event.meta.module)
            .bind(&event.meta.group)
            .bind(&event.meta.schema_name)
            .bind(event.meta.created)
            .execute(&mut *sp)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_root_sequence")
                {
                    return EventStoreError::StaleSequence {
                        root_id: event.meta.root_id.clone(),
                        expected: ctx.expected_sequence_no.unwrap_or(0),
                        actual: event.meta.sequence_no,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }
        sp.commit().await?;
        tx.commit().await?;

        aggregate.clear_uncommitted();
        metrics::counter!("event_store_events_persisted").increment(batch.len() as u64);

        for event in &batch {
            let errors = self.dispatcher.dispatch(event).await;
            if !errors.is_empty() {
                tracing::error!(
                    event_id = %event.id,
                    error_count = errors.len(),
                    "subscriber errors during event fan-out"
                );
            }
        }

        Ok(batch)
    }

    async fn get_by_aggregate(&self, root_id: &str) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE root_id = $1 ORDER BY sequence_no ASC"
        ))
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_by_entity_and_aggregate(
        &self,
        entity_id: &str,
        entity_type: &str,
        root_id: &str,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM events \
             WHERE entity_id = $1 AND entity_type = $2 AND root_id = $3 \
             ORDER BY sequence_no ASC"
        ))
        .bind(entity_id)
        .bind(entity_type)
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_by_aggregate_and_sequence_range(
        &self,
        root_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM events \
             WHERE root_id = $1 AND sequence_no >= $2 AND sequence_no <= $3 \
             ORDER BY sequence_no ASC"
        ))
        .bind(root_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_aggregate_sequence_number(&self, root_id: &str) -> Result<i64> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence_no) FROM events WHERE root_id = $1")
                .bind(root_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max.unwrap_or(0))
    }

    async fn stream_all(&self, since: Option<DateTime<Utc>>) -> Result<EventStream> {
        use futures_util::stream;

        let rows = match since {
            Some(since) => {
                sqlx::query(&format!(
                    "SELECT {SELECT_COLUMNS} FROM events WHERE created >= $1 \
                     ORDER BY created ASC, id ASC"
                ))
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {SELECT_COLUMNS} FROM events ORDER BY created ASC, id ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn migrate(&self, ctx: &RequestContext) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(EventStoreError::Cancelled);
        }

        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id UUID PRIMARY KEY,
                event_type TEXT NOT NULL,
                payload JSONB NOT NULL,
                version INTEGER NOT NULL,
                entity_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                root_id TEXT NOT NULL,
                sequence_no BIGINT NOT NULL,
                user_id TEXT NOT NULL DEFAULT '',
                module_id TEXT NOT NULL DEFAULT '',
                group_id TEXT NOT NULL DEFAULT '',
                schema_name TEXT NOT NULL DEFAULT '',
                created TIMESTAMPTZ NOT NULL,
                CONSTRAINT unique_root_sequence UNIQUE (root_id, sequence_no)
            );

            CREATE INDEX IF NOT EXISTS idx_events_entity ON events (entity_id, entity_type);
            CREATE INDEX IF NOT EXISTS idx_events_root ON events (root_id);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events (event_type);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, events: &[Event]) -> Result<()> {
        let ids: Vec<Uuid> = events.iter().map(|e| e.id.as_uuid()).collect();
        sqlx::query("DELETE FROM events WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
