//! Referential pre-check.
//!
//! A reference to a row that is not in the store is nulled before the upsert
//! rather than letting the foreign-key constraint reject the whole record.

use tracing::debug;

use crate::entity::EntityDescriptor;
use crate::record::Record;
use crate::store::Session;

/// Null every declared reference whose target row does not exist.
///
/// Returns the columns that were nulled. A failed lookup counts as missing.
/// A reference to the record's own key in its own table is kept as is,
/// because the row it names is the one being written.
pub async fn resolve_references(
    session: &mut dyn Session,
    descriptor: &EntityDescriptor,
    record: &mut Record,
) -> Vec<&'static str> {
    let mut nulled = Vec::new();

    for fk in descriptor.foreign_keys {
        let Some(value) = record.get(fk.column).filter(|v| !v.is_null()).cloned() else {
            continue;
        };

        if fk.table == descriptor.table && record.get(fk.key) == Some(&value) {
            continue;
        }

        let found = match session.exists(fk.table, fk.key, &value).await {
            Ok(found) => found,
            Err(e) => {
                debug!(column = fk.column, error = %e, "reference lookup failed");
                false
            }
        };

        if !found {
            debug!(
                table = descriptor.table,
                column = fk.column,
                value = %value,
                "reference not found; storing null"
            );
            record.clear(fk.column);
            nulled.push(fk.column);
        }
    }

    nulled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BAIRRO, IMOVEL, LOGRADOURO};
    use crate::memory::MemoryStore;
    use crate::record::SqlValue;
    use crate::store::Store;

    fn imovel(id: i64) -> Record {
        Record::new()
            .int("id", Some(id))
            .int("bairro_id", Some(1))
            .int("condominio_id", None)
            .int("distrito_id", None)
            .int("logradouro_id", Some(99))
            .int("loteamento_id", None)
            .int("id_imovel_principal", Some(id))
            .int("id_imovel_englobado", Some(500))
    }

    #[tokio::test]
    async fn test_missing_references_are_nulled() {
        let store = MemoryStore::new("imobiliario");
        store.seed(&BAIRRO, Record::new().int("id", Some(1)));
        let mut session = store.begin().await.unwrap();

        let mut rec = imovel(10);
        let nulled = resolve_references(session.as_mut(), &IMOVEL, &mut rec).await;

        assert_eq!(nulled, vec!["logradouro_id", "id_imovel_englobado"]);
        assert_eq!(rec.get("logradouro_id"), Some(&SqlValue::Int(None)));
        assert_eq!(rec.get("bairro_id"), Some(&SqlValue::Int(Some(1))));
        assert_eq!(rec.get("id_imovel_principal"), Some(&SqlValue::Int(Some(10))));
    }

    #[tokio::test]
    async fn test_reference_staged_in_same_session_is_kept() {
        let store = MemoryStore::new("imobiliario");
        let mut session = store.begin().await.unwrap();
        session
            .upsert(&LOGRADOURO, &Record::new().int("id", Some(99)))
            .await
            .unwrap();

        let mut rec = imovel(10);
        resolve_references(session.as_mut(), &IMOVEL, &mut rec).await;
        assert_eq!(rec.get("logradouro_id"), Some(&SqlValue::Int(Some(99))));
    }

    #[tokio::test]
    async fn test_null_references_are_not_looked_up() {
        let store = MemoryStore::new("imobiliario");
        let mut session = store.begin().await.unwrap();
        let mut rec = Record::new().int("id", Some(3)).int("bairro_id", None);
        let nulled = resolve_references(session.as_mut(), &IMOVEL, &mut rec).await;
        assert!(nulled.is_empty());
    }
}
