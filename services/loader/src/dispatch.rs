//! Entity-type dispatch by structural signature.
//!
//! Export files carry no type tag. The first record's key set is matched
//! against an ordered route table; the first matching route wins. Signatures
//! overlap (a property record can also look like a district), so the order
//! of `ROUTES` is part of the contract.

use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{
    EntityDescriptor, BAIRRO, CONDOMINIO, DISTRITO, IMOVEL, LOGRADOURO, LOTEAMENTO, PESSOA,
    PLANTA_VALOR, SECAO,
};
use crate::error::LoadError;

type Fields = Map<String, Value>;

pub struct Route {
    pub name: &'static str,
    pub matches: fn(&Fields) -> bool,
    pub descriptor: &'static EntityDescriptor,
}

fn has_all(sample: &Fields, keys: &[&str]) -> bool {
    keys.iter().all(|k| sample.contains_key(*k))
}

fn has_any(sample: &Fields, keys: &[&str]) -> bool {
    keys.iter().any(|k| sample.contains_key(*k))
}

fn is_imovel(s: &Fields) -> bool {
    s.contains_key("inscricaoImobiliariaFormatada")
}

fn is_condominio(s: &Fields) -> bool {
    s.contains_key("tipoCondominio")
}

fn is_bairro(s: &Fields) -> bool {
    has_all(s, &["municipio", "zonaRural"])
}

fn is_logradouro(s: &Fields) -> bool {
    has_all(s, &["tipoLogradouroDescricao", "tipoLogradouroAbreviatura"])
}

fn is_loteamento(s: &Fields) -> bool {
    has_all(s, &["matriculaImobiliaria", "nroDecretoAprovacao"])
}

fn is_pessoa(s: &Fields) -> bool {
    has_any(s, &["cpfCnpj", "tipoPessoa", "pessoaFisica"])
}

fn is_secao(s: &Fields) -> bool {
    has_all(s, &["nroSecao", "logradouro", "face"])
}

fn is_distrito(s: &Fields) -> bool {
    has_all(s, &["id", "nome", "municipio"]) && !s.contains_key("zonaRural")
}

fn is_planta_valor(s: &Fields) -> bool {
    s.keys().any(|k| k.starts_with("planta"))
}

pub static ROUTES: &[Route] = &[
    Route {
        name: "condominium kind",
        matches: is_condominio,
        descriptor: &CONDOMINIO,
    },
    Route {
        name: "municipality with rural zone",
        matches: is_bairro,
        descriptor: &BAIRRO,
    },
    Route {
        name: "formatted property inscription",
        matches: is_imovel,
        descriptor: &IMOVEL,
    },
    Route {
        name: "street type",
        matches: is_logradouro,
        descriptor: &LOGRADOURO,
    },
    Route {
        name: "land registration and approval decree",
        matches: is_loteamento,
        descriptor: &LOTEAMENTO,
    },
    Route {
        name: "tax id or person type",
        matches: is_pessoa,
        descriptor: &PESSOA,
    },
    Route {
        name: "section number on a street face",
        matches: is_secao,
        descriptor: &SECAO,
    },
    // Loosest signature; anything more specific must come first.
    Route {
        name: "named municipality member",
        matches: is_distrito,
        descriptor: &DISTRITO,
    },
    Route {
        name: "value table prefix",
        matches: is_planta_valor,
        descriptor: &PLANTA_VALOR,
    },
];

/// The `content` array of an export document.
pub fn content(doc: &Value) -> Result<&[Value], LoadError> {
    let Some(root) = doc.as_object() else {
        return Err(LoadError::InvalidFormat(
            "expected object with 'content' array".into(),
        ));
    };
    match root.get("content") {
        Some(Value::Array(items)) => Ok(items.as_slice()),
        // Null content is the same as no records.
        Some(Value::Null) => Ok(&[]),
        Some(_) => Err(LoadError::InvalidFormat("'content' is not an array".into())),
        None => Err(LoadError::InvalidFormat(
            "expected object with 'content' array".into(),
        )),
    }
}

/// Pick the route for a single sample record.
pub fn route_for(sample: &Value) -> Result<&'static Route, LoadError> {
    let fields = match sample.as_object() {
        Some(map) => map,
        None => return Err(LoadError::UnroutableSchema { fields: Vec::new() }),
    };
    ROUTES
        .iter()
        .find(|route| (route.matches)(fields))
        .ok_or_else(|| LoadError::UnroutableSchema {
            fields: fields.keys().cloned().collect(),
        })
}

/// Choose the descriptor for a whole document from its first record.
pub fn dispatch(doc: &Value) -> Result<&'static EntityDescriptor, LoadError> {
    let records = content(doc)?;
    let sample = records.first().ok_or(LoadError::EmptyPayload)?;
    let route = route_for(sample)?;
    debug!(route = route.name, table = route.descriptor.table, "dispatched");
    Ok(route.descriptor)
}
