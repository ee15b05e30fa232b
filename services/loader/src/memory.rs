//! In-memory store used for dry runs and tests.
//!
//! Rows are keyed by their conflict-key values. Writes are staged per
//! session and applied on commit, so a rolled-back or dropped session leaves
//! no trace. Declared unique column sets are enforced like Postgres does:
//! rows with a null in the set never clash.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::entity::EntityDescriptor;
use crate::error::StoreError;
use crate::record::{Record, SqlValue};
use crate::store::{Session, Store};

type Table = BTreeMap<String, Record>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    schema: String,
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            tables: Mutex::default(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".into()))
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock()
            .map(|t| t.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Row whose single-column key renders as `key`.
    #[cfg(test)]
    pub fn row(&self, table: &str, key: &SqlValue) -> Option<Record> {
        let tables = self.lock().ok()?;
        tables.get(table)?.get(&key.to_string()).cloned()
    }

    #[cfg(test)]
    pub fn seed(&self, descriptor: &EntityDescriptor, record: Record) {
        let key = row_key(descriptor, &record).expect("seeded record needs its key");
        if let Ok(mut tables) = self.lock() {
            tables
                .entry(descriptor.table.to_string())
                .or_default()
                .insert(key, record);
        }
    }
}

fn row_key(descriptor: &EntityDescriptor, record: &Record) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(descriptor.conflict_keys.len());
    for (column, value) in descriptor.conflict_keys.iter().zip(descriptor.key_of(record)) {
        match value {
            Some(v) if !v.is_null() => parts.push(v.to_string()),
            _ => {
                return Err(StoreError::Rejected(format!(
                    "null value in key column \"{column}\" of \"{}\"",
                    descriptor.table
                )))
            }
        }
    }
    Ok(parts.join("|"))
}

#[async_trait]
impl Store for MemoryStore {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn check_schema(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn begin(&self) -> Result<Box<dyn Session + '_>, StoreError> {
        Ok(Box::new(MemorySession {
            store: self,
            staged: Vec::new(),
        }))
    }
}

struct MemorySession<'a> {
    store: &'a MemoryStore,
    staged: Vec<(String, String, Record)>,
}

impl MemorySession<'_> {
    /// First unique column set another row of the table already holds.
    fn unique_violation(
        &self,
        descriptor: &EntityDescriptor,
        key: &str,
        record: &Record,
    ) -> Result<Option<&'static [&'static str]>, StoreError> {
        let tables = self.store.lock()?;
        for columns in descriptor.unique_keys.iter().copied() {
            let values: Vec<_> = columns.iter().map(|c| record.get(c)).collect();
            if values.iter().any(|v| v.map_or(true, SqlValue::is_null)) {
                continue;
            }
            let clashes = |other: &Record| {
                columns
                    .iter()
                    .zip(&values)
                    .all(|(c, v)| other.get(c) == *v)
            };

            // Latest staged version of each row shadows the committed one.
            let mut shadowed = HashSet::new();
            for (table, other_key, other) in self.staged.iter().rev() {
                if table != descriptor.table || !shadowed.insert(other_key.as_str()) {
                    continue;
                }
                if other_key != key && clashes(other) {
                    return Ok(Some(columns));
                }
            }
            let committed = tables.get(descriptor.table).into_iter().flatten();
            for (other_key, other) in committed {
                if other_key != key && !shadowed.contains(other_key.as_str()) && clashes(other) {
                    return Ok(Some(columns));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Session for MemorySession<'_> {
    async fn exists(
        &mut self,
        table: &str,
        key_column: &str,
        key: &SqlValue,
    ) -> Result<bool, StoreError> {
        let matches = |r: &Record| r.get(key_column) == Some(key);
        if self
            .staged
            .iter()
            .any(|(t, _, r)| t == table && matches(r))
        {
            return Ok(true);
        }
        let tables = self.store.lock()?;
        Ok(tables
            .get(table)
            .is_some_and(|rows| rows.values().any(matches)))
    }

    async fn upsert(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &Record,
    ) -> Result<(), StoreError> {
        let key = row_key(descriptor, record)?;
        if let Some(columns) = self.unique_violation(descriptor, &key, record)? {
            return Err(StoreError::Rejected(format!(
                "duplicate key value violates unique constraint on \"{}\" ({})",
                descriptor.table,
                columns.join(", ")
            )));
        }
        self.staged
            .push((descriptor.table.to_string(), key, record.clone()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut tables = self.store.lock()?;
        for (table, key, record) in self.staged.drain(..) {
            tables.entry(table).or_default().insert(key, record);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.staged.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BAIRRO, IMOVEL, SECAO};

    fn bairro(id: i64, nome: &str) -> Record {
        Record::new()
            .int("id", Some(id))
            .text("nome", Some(nome.into()))
    }

    #[tokio::test]
    async fn test_commit_applies_and_overwrites() {
        let store = MemoryStore::new("imobiliario");
        let mut s = store.begin().await.unwrap();
        s.upsert(&BAIRRO, &bairro(1, "Centro")).await.unwrap();
        s.upsert(&BAIRRO, &bairro(1, "Centro Novo")).await.unwrap();
        s.commit().await.unwrap();
        drop(s);

        assert_eq!(store.row_count("bairro"), 1);
        let row = store.row("bairro", &SqlValue::Int(Some(1))).unwrap();
        assert_eq!(row.get("nome"), Some(&SqlValue::Text(Some("Centro Novo".into()))));
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard() {
        let store = MemoryStore::new("imobiliario");
        {
            let mut s = store.begin().await.unwrap();
            s.upsert(&BAIRRO, &bairro(1, "A")).await.unwrap();
            s.rollback().await.unwrap();
            s.commit().await.unwrap();
        }
        {
            let mut s = store.begin().await.unwrap();
            s.upsert(&BAIRRO, &bairro(2, "B")).await.unwrap();
        }
        assert_eq!(store.row_count("bairro"), 0);
    }

    #[tokio::test]
    async fn test_exists_sees_staged_and_committed_rows() {
        let store = MemoryStore::new("imobiliario");
        store.seed(&BAIRRO, bairro(1, "A"));
        let mut s = store.begin().await.unwrap();
        s.upsert(&BAIRRO, &bairro(2, "B")).await.unwrap();
        assert!(s.exists("bairro", "id", &SqlValue::Int(Some(1))).await.unwrap());
        assert!(s.exists("bairro", "id", &SqlValue::Int(Some(2))).await.unwrap());
        assert!(!s.exists("bairro", "id", &SqlValue::Int(Some(3))).await.unwrap());
        assert!(!s.exists("logradouro", "id", &SqlValue::Int(Some(1))).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_pair_is_enforced() {
        let store = MemoryStore::new("imobiliario");
        let unit = |id: i64, unidade: Option<i64>| {
            Record::new()
                .int("id", Some(id))
                .int("codigo", Some(555))
                .int("unidade", unidade)
        };
        store.seed(&IMOVEL, unit(1, Some(1)));
        let mut s = store.begin().await.unwrap();

        let err = s.upsert(&IMOVEL, &unit(2, Some(1))).await.unwrap_err();
        assert!(err.to_string().contains("unique constraint on \"imovel\" (codigo, unidade)"));

        // Same row again, another unit, or a null in the pair are all fine.
        s.upsert(&IMOVEL, &unit(1, Some(1))).await.unwrap();
        s.upsert(&IMOVEL, &unit(3, Some(2))).await.unwrap();
        s.upsert(&IMOVEL, &unit(4, None)).await.unwrap();
        s.upsert(&IMOVEL, &unit(5, None)).await.unwrap();
        assert!(s.upsert(&IMOVEL, &unit(6, Some(2))).await.is_err());
    }

    #[tokio::test]
    async fn test_unique_pair_freed_by_staged_overwrite() {
        let store = MemoryStore::new("imobiliario");
        let secao = |id: i64, nro: i64| {
            Record::new()
                .int("id", Some(id))
                .int("nro_secao", Some(nro))
                .int("logradouro_id", Some(4))
        };
        store.seed(&SECAO, secao(1, 10));
        let mut s = store.begin().await.unwrap();
        s.upsert(&SECAO, &secao(1, 11)).await.unwrap();
        s.upsert(&SECAO, &secao(2, 10)).await.unwrap();
        s.commit().await.unwrap();
        assert_eq!(store.row_count("secao"), 2);
    }

    #[tokio::test]
    async fn test_null_key_is_rejected() {
        let store = MemoryStore::new("imobiliario");
        let mut s = store.begin().await.unwrap();
        let err = s
            .upsert(&BAIRRO, &Record::new().int("id", None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("null value in key column"));
    }
}
