//! PostgreSQL storage backend.
//!
//! Persists checked-header flags and domain-record rows. Checkpoint flags
//! are one integer column per event id on `checked_headers`, added lazily
//! with `ADD COLUMN IF NOT EXISTS`; this keeps the missing-header query a
//! single join-free scan per contract.
//!
//! # Schema
//! - `headers(id, block_number, hash)` — populated by the header-sync
//!   subsystem (created here only so fresh databases work end to end).
//! - `checked_headers(id, header_id UNIQUE, <event_id> INT DEFAULT 0 …)`
//! - `ens.domain_records(name_hash, block_number, …)` with primary key
//!   `(name_hash, block_number)`; inserts upsert under that key.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};

use ensindex_core::error::IndexError;
use ensindex_core::record::DomainRecord;
use ensindex_core::repo::{DomainRecordRepository, Header, HeaderRepository};

/// Connection options for the Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

/// PostgreSQL-backed header + domain-record storage.
///
/// Thread-safe and cheaply cloneable — wraps a connection pool.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect and initialize the schema.
    pub async fn connect(database_url: &str) -> Result<Self, IndexError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, IndexError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| IndexError::Checkpoint(format!("postgres connect: {e}")))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        info!("PostgresStorage connected and schema initialized");
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), IndexError> {
        sqlx::query("CREATE SCHEMA IF NOT EXISTS ens")
            .execute(&self.pool)
            .await
            .map_err(checkpoint_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS headers (
                id           BIGSERIAL PRIMARY KEY,
                block_number BIGINT NOT NULL,
                hash         TEXT   NOT NULL,
                UNIQUE (block_number, hash)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(checkpoint_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checked_headers (
                id        BIGSERIAL PRIMARY KEY,
                header_id BIGINT UNIQUE NOT NULL REFERENCES headers (id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(checkpoint_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ens.domain_records (
                name_hash        TEXT   NOT NULL,
                block_number     BIGINT NOT NULL,
                parent_hash      TEXT,
                label_hash       TEXT,
                owner            TEXT,
                resolver_addr    TEXT,
                ttl              BIGINT,
                points_to_addr   TEXT,
                name             TEXT,
                content          TEXT,
                content_type     TEXT,
                pub_key_x        TEXT,
                pub_key_y        TEXT,
                text_key         TEXT,
                indexed_text_key TEXT,
                multihash        TEXT,
                contenthash      TEXT,
                PRIMARY KEY (name_hash, block_number)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(checkpoint_err)?;

        debug!("PostgresStorage schema initialized");
        Ok(())
    }

    /// Insert a synced header row, returning its id. Test/bootstrap helper;
    /// production headers come from the header-sync subsystem.
    pub async fn insert_header(
        &self,
        block_number: i64,
        hash: &str,
    ) -> Result<i64, IndexError> {
        let row = sqlx::query(
            "INSERT INTO headers (block_number, hash) VALUES ($1, $2)
             ON CONFLICT (block_number, hash) DO UPDATE SET hash = EXCLUDED.hash
             RETURNING id",
        )
        .bind(block_number)
        .bind(hash)
        .fetch_one(&self.pool)
        .await
        .map_err(checkpoint_err)?;
        Ok(row.get::<i64, _>("id"))
    }

    /// The underlying pool, for custom queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Event ids become column names and cannot be bound as parameters; reject
/// anything outside the id alphabet before interpolation.
fn validate_event_id(event_id: &str) -> Result<(), IndexError> {
    let valid = !event_id.is_empty()
        && event_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && event_id.starts_with(|c: char| c.is_ascii_lowercase());
    if valid {
        Ok(())
    } else {
        Err(IndexError::Checkpoint(format!(
            "invalid event id '{event_id}'"
        )))
    }
}

fn checkpoint_err(e: sqlx::Error) -> IndexError {
    IndexError::Checkpoint(e.to_string())
}

/// Serialization and deadlock failures are write conflicts; everything
/// else is a checkpoint-layer failure.
fn write_err(e: sqlx::Error) -> IndexError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return IndexError::WriteConflict(e.to_string());
        }
    }
    IndexError::Checkpoint(e.to_string())
}

#[async_trait]
impl HeaderRepository for PostgresStorage {
    async fn add_check_column(&self, event_id: &str) -> Result<(), IndexError> {
        validate_event_id(event_id)?;
        let sql = format!(
            "ALTER TABLE checked_headers ADD COLUMN IF NOT EXISTS {event_id} INTEGER NOT NULL DEFAULT 0"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(checkpoint_err)?;
        debug!(event_id, "checkpoint column ensured");
        Ok(())
    }

    async fn missing_headers_for_all(
        &self,
        start_block: i64,
        end_block: i64,
        event_ids: &[String],
    ) -> Result<Vec<Header>, IndexError> {
        if event_ids.is_empty() {
            return Ok(vec![]);
        }
        for id in event_ids {
            validate_event_id(id)?;
        }
        let unchecked = event_ids
            .iter()
            .map(|id| format!("checked_headers.{id} = 0"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT headers.id, headers.block_number, headers.hash
             FROM headers
             LEFT JOIN checked_headers ON checked_headers.header_id = headers.id
             WHERE (checked_headers.header_id IS NULL OR {unchecked})
               AND headers.block_number >= $1
               AND (headers.block_number <= $2 OR $2 = -1)
             ORDER BY headers.block_number ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(start_block)
            .bind(end_block)
            .fetch_all(&self.pool)
            .await
            .map_err(checkpoint_err)?;

        Ok(rows
            .iter()
            .map(|r| Header {
                id: r.get("id"),
                block_number: r.get("block_number"),
                hash: r.get("hash"),
            })
            .collect())
    }

    async fn mark_checked_for_all(
        &self,
        header_id: i64,
        event_ids: &[String],
    ) -> Result<(), IndexError> {
        if event_ids.is_empty() {
            return Ok(());
        }
        for id in event_ids {
            validate_event_id(id)?;
        }
        let columns = event_ids.join(", ");
        let ones = vec!["1"; event_ids.len()].join(", ");
        let updates = event_ids
            .iter()
            .map(|id| format!("{id} = 1"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO checked_headers (header_id, {columns}) VALUES ($1, {ones})
             ON CONFLICT (header_id) DO UPDATE SET {updates}"
        );
        sqlx::query(&sql)
            .bind(header_id)
            .execute(&self.pool)
            .await
            .map_err(checkpoint_err)?;
        Ok(())
    }
}

#[async_trait]
impl DomainRecordRepository for PostgresStorage {
    async fn exists(&self, name_hash: &B256) -> Result<bool, IndexError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM ens.domain_records WHERE name_hash = $1) AS present",
        )
        .bind(hex32(name_hash))
        .fetch_one(&self.pool)
        .await
        .map_err(checkpoint_err)?;
        Ok(row.get::<bool, _>("present"))
    }

    async fn get_latest(&self, name_hash: &B256, block: i64) -> Result<DomainRecord, IndexError> {
        let row = sqlx::query(
            "SELECT * FROM ens.domain_records
             WHERE name_hash = $1 AND block_number <= $2
             ORDER BY block_number DESC
             LIMIT 1",
        )
        .bind(hex32(name_hash))
        .bind(block)
        .fetch_optional(&self.pool)
        .await
        .map_err(checkpoint_err)?;

        match row {
            Some(r) => record_from_row(&r),
            None => Err(IndexError::RecordMissing {
                node: *name_hash,
                block,
            }),
        }
    }

    async fn create(&self, record: &DomainRecord) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO ens.domain_records (
                name_hash, block_number, parent_hash, label_hash, owner,
                resolver_addr, ttl, points_to_addr, name, content,
                content_type, pub_key_x, pub_key_y, text_key,
                indexed_text_key, multihash, contenthash
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             ON CONFLICT (name_hash, block_number) DO UPDATE SET
                parent_hash = EXCLUDED.parent_hash,
                label_hash = EXCLUDED.label_hash,
                owner = EXCLUDED.owner,
                resolver_addr = EXCLUDED.resolver_addr,
                ttl = EXCLUDED.ttl,
                points_to_addr = EXCLUDED.points_to_addr,
                name = EXCLUDED.name,
                content = EXCLUDED.content,
                content_type = EXCLUDED.content_type,
                pub_key_x = EXCLUDED.pub_key_x,
                pub_key_y = EXCLUDED.pub_key_y,
                text_key = EXCLUDED.text_key,
                indexed_text_key = EXCLUDED.indexed_text_key,
                multihash = EXCLUDED.multihash,
                contenthash = EXCLUDED.contenthash",
        )
        .bind(hex32(&record.name_hash))
        .bind(record.block_number)
        .bind(record.parent_hash.as_ref().map(hex32))
        .bind(record.label_hash.as_ref().map(hex32))
        .bind(record.owner.as_ref().map(hex20))
        .bind(record.resolver_addr.as_ref().map(hex20))
        .bind(record.ttl.map(|t| t as i64))
        .bind(record.points_to_addr.as_ref().map(hex20))
        .bind(record.name.as_deref())
        .bind(record.content.as_ref().map(hex32))
        .bind(record.content_type.as_deref())
        .bind(record.pub_key_x.as_ref().map(hex32))
        .bind(record.pub_key_y.as_ref().map(hex32))
        .bind(record.text_key.as_deref())
        .bind(record.indexed_text_key.as_deref())
        .bind(record.multihash.as_deref())
        .bind(record.contenthash.as_deref())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }
}

// ─── Hex boundary conversion ──────────────────────────────────────────────────

fn hex32(h: &B256) -> String {
    format!("{h:#x}")
}

fn hex20(a: &Address) -> String {
    format!("{a:#x}")
}

fn parse32(s: &str) -> Result<B256, IndexError> {
    s.parse::<B256>()
        .map_err(|e| IndexError::Checkpoint(format!("corrupt hash column '{s}': {e}")))
}

fn parse20(s: &str) -> Result<Address, IndexError> {
    s.parse::<Address>()
        .map_err(|e| IndexError::Checkpoint(format!("corrupt address column '{s}': {e}")))
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<DomainRecord, IndexError> {
    let opt32 = |name: &str| -> Result<Option<B256>, IndexError> {
        row.get::<Option<String>, _>(name)
            .map(|s| parse32(&s))
            .transpose()
    };
    let opt20 = |name: &str| -> Result<Option<Address>, IndexError> {
        row.get::<Option<String>, _>(name)
            .map(|s| parse20(&s))
            .transpose()
    };

    Ok(DomainRecord {
        name_hash: parse32(&row.get::<String, _>("name_hash"))?,
        block_number: row.get("block_number"),
        parent_hash: opt32("parent_hash")?,
        label_hash: opt32("label_hash")?,
        owner: opt20("owner")?,
        resolver_addr: opt20("resolver_addr")?,
        ttl: row.get::<Option<i64>, _>("ttl").map(|t| t as u64),
        points_to_addr: opt20("points_to_addr")?,
        name: row.get("name"),
        content: opt32("content")?,
        content_type: row.get("content_type"),
        pub_key_x: opt32("pub_key_x")?,
        pub_key_y: opt32("pub_key_y")?,
        text_key: row.get("text_key"),
        indexed_text_key: row.get("indexed_text_key"),
        multihash: row.get("multihash"),
        contenthash: row.get("contenthash"),
    })
}
