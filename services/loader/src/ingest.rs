//! File entry point: bytes on disk to rows in the store.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn, Instrument};

use crate::dispatch::{content, dispatch};
use crate::encoding::{decode_bytes, fix_encoding_in_value};
use crate::entity::MUNICIPIO;
use crate::error::{FileError, LoadError};
use crate::municipio;
use crate::runner::{BatchRunner, RunReport};

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Present when embedded municipalities were loaded first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipios: Option<RunReport>,
    pub report: RunReport,
}

/// Load one export file. Every failure names the file.
pub async fn load_file(
    runner: &BatchRunner<'_>,
    path: &Path,
    with_municipios: bool,
) -> Result<FileReport, FileError> {
    let span = info_span!("file", path = %path.display());
    load(runner, path, with_municipios)
        .instrument(span)
        .await
        .map(|(municipios, report)| FileReport {
            path: path.to_path_buf(),
            municipios,
            report,
        })
        .map_err(|e| FileError::new(path, e))
}

async fn load(
    runner: &BatchRunner<'_>,
    path: &Path,
    with_municipios: bool,
) -> Result<(Option<RunReport>, RunReport), LoadError> {
    let bytes = tokio::fs::read(path).await?;
    info!(bytes = bytes.len(), "read file");
    let doc = parse(&bytes)?;
    load_document(runner, &doc, with_municipios).await
}

/// Decode, parse and repair a document.
pub fn parse(bytes: &[u8]) -> Result<Value, LoadError> {
    let (text, fallback) = decode_bytes(bytes);
    if fallback {
        warn!("file is not valid UTF-8; decoded as Windows-1252");
    }
    let mut doc: Value = serde_json::from_str(&text)
        .map_err(|e| LoadError::InvalidFormat(format!("malformed JSON: {e}")))?;
    fix_encoding_in_value(&mut doc);
    Ok(doc)
}

/// Dispatch a parsed document and run its records.
pub async fn load_document(
    runner: &BatchRunner<'_>,
    doc: &Value,
    with_municipios: bool,
) -> Result<(Option<RunReport>, RunReport), LoadError> {
    let descriptor = dispatch(doc)?;
    let records = content(doc)?;
    info!(entity = descriptor.table, records = records.len(), "loading");

    let municipios = if with_municipios {
        let found = municipio::extract(records);
        if found.is_empty() {
            None
        } else {
            Some(runner.run(&MUNICIPIO, &found).await?)
        }
    } else {
        None
    };

    let report = runner.run(descriptor, records).await?;
    Ok((municipios, report))
}
