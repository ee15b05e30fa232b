//! Store collaborator seam.
//!
//! The pipeline never opens connections or sets search paths itself. It
//! receives a `Store` that is already bound to its target schema and asks it
//! for transactional sessions, one per chunk or per record. Sessions are not
//! shared; each is committed or rolled back before the next one opens.

use async_trait::async_trait;

use crate::entity::EntityDescriptor;
use crate::error::StoreError;
use crate::record::{Record, SqlValue};

#[async_trait]
pub trait Store: Send + Sync {
    /// Schema name for logs and errors.
    fn schema(&self) -> &str;

    /// Pre-flight check that the target schema is reachable.
    async fn check_schema(&self) -> Result<(), StoreError>;

    async fn begin(&self) -> Result<Box<dyn Session + '_>, StoreError>;
}

/// One transaction. Dropping a session without committing discards its writes.
#[async_trait]
pub trait Session: Send {
    /// Whether a row with `key_column = key` exists, as seen by this session.
    async fn exists(
        &mut self,
        table: &str,
        key_column: &str,
        key: &SqlValue,
    ) -> Result<bool, StoreError>;

    /// Insert the record, or overwrite every non-key column on key conflict.
    /// A failed upsert leaves the session usable for further records.
    async fn upsert(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &Record,
    ) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}
