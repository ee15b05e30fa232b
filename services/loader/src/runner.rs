//! Batch runner: the generic engine every entity goes through.
//!
//! A run checks the schema, normalizes each record, filters its references
//! and upserts it, committing either per chunk or per record depending on the
//! entity. Record and chunk failures are counted, never returned; the only
//! error a run can produce is an unreachable schema.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::entity::{CommitMode, EntityDescriptor, EntityKind};
use crate::error::{LoadError, SkipReason};
use crate::filter::resolve_references;
use crate::record::Record;
use crate::store::Store;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    PartiallyCompleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub entity: EntityKind,
    pub status: RunStatus,
    pub succeeded: usize,
    pub skipped: usize,
    /// Records that were written but lost with a failed chunk commit.
    pub rolled_back: usize,
    pub chunks_failed: usize,
    /// Reference columns stored as null because their target was missing.
    pub references_nulled: usize,
}

impl RunReport {
    fn new(entity: EntityKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            entity,
            status: RunStatus::Pending,
            succeeded: 0,
            skipped: 0,
            rolled_back: 0,
            chunks_failed: 0,
            references_nulled: 0,
        }
    }

    /// `(succeeded, skipped)`
    pub fn counts(&self) -> (usize, usize) {
        (self.succeeded, self.skipped)
    }

    fn skip(&mut self, index: usize, reason: SkipReason) {
        match &reason {
            SkipReason::Unnormalizable => debug!(index, %reason, "record skipped"),
            _ => warn!(index, %reason, "record skipped"),
        }
        self.skipped += 1;
    }

    fn finish(&mut self) {
        self.status = if self.skipped == 0 && self.rolled_back == 0 {
            RunStatus::Completed
        } else {
            RunStatus::PartiallyCompleted
        };
    }
}

pub struct BatchRunner<'s> {
    store: &'s dyn Store,
    chunk_size: usize,
}

impl<'s> BatchRunner<'s> {
    pub fn new(store: &'s dyn Store, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn run(
        &self,
        descriptor: &EntityDescriptor,
        records: &[Value],
    ) -> Result<RunReport, LoadError> {
        let mut report = RunReport::new(descriptor.kind);
        let span = info_span!("run", run_id = %report.run_id, entity = descriptor.table);
        self.execute(descriptor, records, &mut report)
            .instrument(span)
            .await?;
        Ok(report)
    }

    async fn execute(
        &self,
        descriptor: &EntityDescriptor,
        records: &[Value],
        report: &mut RunReport,
    ) -> Result<(), LoadError> {
        self.store
            .check_schema()
            .await
            .map_err(|source| LoadError::SchemaUnreachable {
                schema: self.store.schema().to_string(),
                source,
            })?;
        report.status = RunStatus::Running;

        match descriptor.commit_mode {
            CommitMode::Chunked => self.run_chunked(descriptor, records, report).await,
            CommitMode::PerRecord => self.run_per_record(descriptor, records, report).await,
        }

        report.finish();
        info!(
            status = ?report.status,
            succeeded = report.succeeded,
            skipped = report.skipped,
            rolled_back = report.rolled_back,
            "run finished"
        );
        Ok(())
    }

    async fn run_chunked(
        &self,
        descriptor: &EntityDescriptor,
        records: &[Value],
        report: &mut RunReport,
    ) {
        let mut buffer: Vec<(usize, Record)> = Vec::with_capacity(self.chunk_size);

        for (index, raw) in records.iter().enumerate() {
            match (descriptor.normalize)(raw) {
                Some(record) => buffer.push((index, record)),
                None => report.skip(index, SkipReason::Unnormalizable),
            }
            if buffer.len() >= self.chunk_size {
                self.flush(descriptor, &mut buffer, report).await;
            }
        }
        if !buffer.is_empty() {
            self.flush(descriptor, &mut buffer, report).await;
        }
    }

    /// Write one chunk in one transaction.
    async fn flush(
        &self,
        descriptor: &EntityDescriptor,
        buffer: &mut Vec<(usize, Record)>,
        report: &mut RunReport,
    ) {
        let mut session = match self.store.begin().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, records = buffer.len(), "could not open chunk transaction");
                report.rolled_back += buffer.len();
                report.chunks_failed += 1;
                buffer.clear();
                return;
            }
        };

        let mut written = 0;
        for (index, mut record) in buffer.drain(..) {
            report.references_nulled +=
                resolve_references(session.as_mut(), descriptor, &mut record)
                    .await
                    .len();
            match session.upsert(descriptor, &record).await {
                Ok(()) => written += 1,
                Err(e) => report.skip(index, SkipReason::UpsertFailed(e.to_string())),
            }
        }

        match session.commit().await {
            Ok(()) => {
                debug!(records = written, "chunk committed");
                report.succeeded += written;
            }
            Err(e) => {
                warn!(error = %e, records = written, "chunk commit failed; chunk rolled back");
                if let Err(rb) = session.rollback().await {
                    debug!(error = %rb, "rollback after failed commit");
                }
                report.rolled_back += written;
                report.chunks_failed += 1;
            }
        }
    }

    async fn run_per_record(
        &self,
        descriptor: &EntityDescriptor,
        records: &[Value],
        report: &mut RunReport,
    ) {
        for (index, raw) in records.iter().enumerate() {
            let Some(mut record) = (descriptor.normalize)(raw) else {
                report.skip(index, SkipReason::Unnormalizable);
                continue;
            };

            let mut session = match self.store.begin().await {
                Ok(session) => session,
                Err(e) => {
                    report.skip(index, SkipReason::CommitFailed(e.to_string()));
                    continue;
                }
            };

            report.references_nulled +=
                resolve_references(session.as_mut(), descriptor, &mut record)
                    .await
                    .len();

            if let Err(e) = session.upsert(descriptor, &record).await {
                if let Err(rb) = session.rollback().await {
                    debug!(error = %rb, "rollback after failed upsert");
                }
                report.skip(index, SkipReason::UpsertFailed(e.to_string()));
                continue;
            }

            match session.commit().await {
                Ok(()) => report.succeeded += 1,
                Err(e) => report.skip(index, SkipReason::CommitFailed(e.to_string())),
            }
        }
    }
}
