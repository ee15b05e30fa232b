//! Postgres-backed store.
//!
//! Every table name is schema-qualified, so the pool never depends on a
//! connection-level search path. Each upsert and each reference lookup runs
//! inside a savepoint: a rejected statement rolls back to the savepoint and the
//! surrounding transaction stays usable for the rest of its chunk.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{Connection, QueryBuilder, Transaction};
use tracing::debug;

use crate::entity::EntityDescriptor;
use crate::error::StoreError;
use crate::record::{Record, SqlValue};
use crate::store::{Session, Store};

pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

fn push_value(sep: &mut sqlx::query_builder::Separated<'_, 'static, Postgres, &str>, value: &SqlValue) {
    match value.clone() {
        SqlValue::Int(v) => sep.push_bind(v),
        SqlValue::Float(v) => sep.push_bind(v),
        SqlValue::Bool(v) => sep.push_bind(v),
        SqlValue::Text(v) => sep.push_bind(v),
        SqlValue::Timestamp(v) => sep.push_bind(v),
    };
}

/// `INSERT .. ON CONFLICT (keys) DO UPDATE` for one record.
///
/// Every non-key column is overwritten from `EXCLUDED`; a descriptor with a
/// server-maintained column also bumps it to `CURRENT_TIMESTAMP`.
pub fn upsert_query(
    schema: &str,
    descriptor: &EntityDescriptor,
    record: &Record,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("INSERT INTO ");
    qb.push(qualified(schema, descriptor.table));

    qb.push(" (");
    let mut cols = qb.separated(", ");
    for column in record.columns() {
        cols.push(quote_ident(column));
    }
    qb.push(") VALUES (");
    let mut vals = qb.separated(", ");
    for (_, value) in record.iter() {
        push_value(&mut vals, value);
    }
    qb.push(") ON CONFLICT (");
    let mut keys = qb.separated(", ");
    for key in descriptor.conflict_keys {
        keys.push(quote_ident(key));
    }
    qb.push(")");

    let mut updates: Vec<String> = record
        .columns()
        .filter(|c| !descriptor.conflict_keys.contains(c))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
        .collect();
    if let Some(touched) = descriptor.touch_on_update {
        updates.push(format!("{} = CURRENT_TIMESTAMP", quote_ident(touched)));
    }

    if updates.is_empty() {
        qb.push(" DO NOTHING");
    } else {
        qb.push(" DO UPDATE SET ");
        qb.push(updates.join(", "));
    }
    qb
}

#[async_trait]
impl Store for PgStore {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn check_schema(&self) -> Result<(), StoreError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(&self.schema)
        .fetch_one(&self.pool)
        .await?;

        if found {
            Ok(())
        } else {
            Err(StoreError::Rejected(format!(
                "schema {} does not exist",
                quote_ident(&self.schema)
            )))
        }
    }

    async fn begin(&self) -> Result<Box<dyn Session + '_>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession {
            schema: &self.schema,
            tx: Some(tx),
        }))
    }
}

struct PgSession<'a> {
    schema: &'a str,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession<'_> {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Rejected("transaction already finished".into()))
    }
}

#[async_trait]
impl Session for PgSession<'_> {
    async fn exists(
        &mut self,
        table: &str,
        key_column: &str,
        key: &SqlValue,
    ) -> Result<bool, StoreError> {
        let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM ");
        qb.push(qualified(self.schema, table));
        qb.push(" WHERE ");
        qb.push(quote_ident(key_column));
        qb.push(" = ");
        push_value(&mut qb.separated(""), key);
        qb.push(")");

        let tx = self.tx()?;

        // A failed lookup must not abort the chunk's transaction either.
        let mut savepoint = tx.begin().await?;
        let found: Result<bool, sqlx::Error> =
            qb.build_query_scalar().fetch_one(&mut *savepoint).await;
        match found {
            Ok(found) => {
                savepoint.commit().await?;
                Ok(found)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn upsert(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &Record,
    ) -> Result<(), StoreError> {
        let mut qb = upsert_query(self.schema, descriptor, record);
        let tx = self.tx()?;

        let mut savepoint = tx.begin().await?;
        match qb.build().execute(&mut *savepoint).await {
            Ok(done) => {
                savepoint.commit().await?;
                debug!(table = descriptor.table, rows = done.rows_affected(), "upserted");
                Ok(())
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(StoreError::Rejected("transaction already finished".into())),
        }
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}
