//! Entity descriptors.
//!
//! One generic pipeline serves every cadastral entity; what differs per
//! entity is captured here: target table, conflict key, normalizer, the
//! references to check before writing, and the commit granularity.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::normalize;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Municipio,
    Bairro,
    Condominio,
    Distrito,
    Logradouro,
    Loteamento,
    Imovel,
    Pessoa,
    Secao,
    PlantaValor,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().table)
    }
}

impl EntityKind {
    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Municipio => &MUNICIPIO,
            EntityKind::Bairro => &BAIRRO,
            EntityKind::Condominio => &CONDOMINIO,
            EntityKind::Distrito => &DISTRITO,
            EntityKind::Logradouro => &LOGRADOURO,
            EntityKind::Loteamento => &LOTEAMENTO,
            EntityKind::Imovel => &IMOVEL,
            EntityKind::Pessoa => &PESSOA,
            EntityKind::Secao => &SECAO,
            EntityKind::PlantaValor => &PLANTA_VALOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Fixed-size chunks, one transaction per chunk.
    Chunked,
    /// One transaction per record.
    PerRecord,
}

/// A column that names a row of another (or the same) table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: &'static str,
    pub key: &'static str,
}

const fn fk(column: &'static str, table: &'static str, key: &'static str) -> ForeignKey {
    ForeignKey { column, table, key }
}

pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub table: &'static str,
    pub conflict_keys: &'static [&'static str],
    /// Column sets that must be unique besides the conflict key. The database
    /// enforces them; listed here so the in-memory store can too.
    pub unique_keys: &'static [&'static [&'static str]],
    pub normalize: fn(&Value) -> Option<Record>,
    pub foreign_keys: &'static [ForeignKey],
    pub commit_mode: CommitMode,
    /// Server-maintained column bumped to `CURRENT_TIMESTAMP` on overwrite.
    pub touch_on_update: Option<&'static str>,
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("table", &self.table)
            .field("conflict_keys", &self.conflict_keys)
            .field("commit_mode", &self.commit_mode)
            .finish_non_exhaustive()
    }
}

impl PartialEq for EntityDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl EntityDescriptor {
    /// Key values of a normalized record, in `conflict_keys` order.
    pub fn key_of<'r>(&self, record: &'r Record) -> Vec<Option<&'r crate::record::SqlValue>> {
        self.conflict_keys.iter().map(|k| record.get(k)).collect()
    }
}

const MUNICIPIO_SIAFI: &str = "municipio_codigo_siafi";

pub static MUNICIPIO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Municipio,
    table: "municipio",
    conflict_keys: &["codigo_siafi"],
    unique_keys: &[],
    normalize: normalize::municipio,
    foreign_keys: &[],
    commit_mode: CommitMode::PerRecord,
    touch_on_update: None,
};

pub static BAIRRO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Bairro,
    table: "bairro",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::bairro,
    foreign_keys: &[fk(MUNICIPIO_SIAFI, "municipio", "codigo_siafi")],
    commit_mode: CommitMode::Chunked,
    touch_on_update: None,
};

pub static CONDOMINIO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Condominio,
    table: "condominio",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::condominio,
    foreign_keys: &[],
    commit_mode: CommitMode::Chunked,
    touch_on_update: None,
};

pub static DISTRITO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Distrito,
    table: "distrito",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::distrito,
    foreign_keys: &[fk(MUNICIPIO_SIAFI, "municipio", "codigo_siafi")],
    commit_mode: CommitMode::Chunked,
    touch_on_update: None,
};

pub static LOGRADOURO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Logradouro,
    table: "logradouro",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::logradouro,
    foreign_keys: &[fk(MUNICIPIO_SIAFI, "municipio", "codigo_siafi")],
    commit_mode: CommitMode::Chunked,
    touch_on_update: None,
};

pub static LOTEAMENTO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Loteamento,
    table: "loteamento",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::loteamento,
    foreign_keys: &[
        fk("bairro_id", "bairro", "id"),
        fk(MUNICIPIO_SIAFI, "municipio", "codigo_siafi"),
    ],
    commit_mode: CommitMode::Chunked,
    touch_on_update: None,
};

pub static IMOVEL: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Imovel,
    table: "imovel",
    conflict_keys: &["id"],
    unique_keys: &[&["codigo", "unidade"]],
    normalize: normalize::imovel,
    foreign_keys: &[
        fk("bairro_id", "bairro", "id"),
        fk("condominio_id", "condominio", "id"),
        fk("distrito_id", "distrito", "id"),
        fk("logradouro_id", "logradouro", "id"),
        fk("loteamento_id", "loteamento", "id"),
        fk("id_imovel_principal", "imovel", "id"),
        fk("id_imovel_englobado", "imovel", "id"),
    ],
    commit_mode: CommitMode::PerRecord,
    touch_on_update: None,
};

pub static PESSOA: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Pessoa,
    table: "pessoa",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::pessoa,
    foreign_keys: &[],
    commit_mode: CommitMode::PerRecord,
    touch_on_update: None,
};

pub static SECAO: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Secao,
    table: "secao",
    conflict_keys: &["id"],
    unique_keys: &[&["nro_secao", "logradouro_id"]],
    normalize: normalize::secao,
    foreign_keys: &[
        fk("logradouro_id", "logradouro", "id"),
        fk("face_id", "face", "id"),
    ],
    commit_mode: CommitMode::Chunked,
    touch_on_update: None,
};

pub static PLANTA_VALOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::PlantaValor,
    table: "planta_valores",
    conflict_keys: &["id"],
    unique_keys: &[],
    normalize: normalize::planta_valor,
    foreign_keys: &[],
    commit_mode: CommitMode::Chunked,
    touch_on_update: Some("updated_at"),
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[EntityKind] = &[
        EntityKind::Municipio,
        EntityKind::Bairro,
        EntityKind::Condominio,
        EntityKind::Distrito,
        EntityKind::Logradouro,
        EntityKind::Loteamento,
        EntityKind::Imovel,
        EntityKind::Pessoa,
        EntityKind::Secao,
        EntityKind::PlantaValor,
    ];

    #[test]
    fn test_descriptor_kind_round_trips() {
        for kind in ALL {
            assert_eq!(kind.descriptor().kind, *kind);
        }
    }

    #[test]
    fn test_strict_entities_commit_per_record() {
        assert_eq!(IMOVEL.commit_mode, CommitMode::PerRecord);
        assert_eq!(PESSOA.commit_mode, CommitMode::PerRecord);
        assert_eq!(BAIRRO.commit_mode, CommitMode::Chunked);
    }

    #[test]
    fn test_foreign_key_columns_are_produced_by_normalizer() {
        let raw = serde_json::json!({"id": 1});
        for kind in ALL {
            let d = kind.descriptor();
            let Some(rec) = (d.normalize)(&raw) else {
                continue;
            };
            for key in d.conflict_keys.iter().chain(d.unique_keys.iter().copied().flatten()) {
                assert!(rec.get(key).is_some(), "{}: missing key {key}", d.table);
            }
            for fk in d.foreign_keys {
                assert!(rec.get(fk.column).is_some(), "{}: missing {}", d.table, fk.column);
            }
        }
    }

    #[test]
    fn test_display_is_table_name() {
        assert_eq!(EntityKind::PlantaValor.to_string(), "planta_valores");
    }
}
