//! Unit-of-work seam between the harvest orchestrator and persistence.
//!
//! A harvest unit (one keyword in one region) writes its records inside one
//! transaction: [`WorkflowStore::begin_unit`], then [`UnitOfWork::upsert`] per
//! record, then `commit` or `rollback`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use wfpop_core::CanonicalRecord;

use crate::workflows::upsert_workflow;
use crate::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    type Unit: UnitOfWork;

    async fn begin_unit(&self) -> Result<Self::Unit, DbError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn upsert(&mut self, record: &CanonicalRecord) -> Result<UpsertOutcome, DbError>;

    async fn commit(self) -> Result<(), DbError>;

    async fn rollback(self) -> Result<(), DbError>;
}

/// Postgres-backed store. Cloning is cheap; the pool is shared.
#[derive(Debug, Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    type Unit = PgUnit;

    async fn begin_unit(&self) -> Result<PgUnit, DbError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnit { tx })
    }
}

/// One open transaction. Dropping it without `commit` rolls back.
pub struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn upsert(&mut self, record: &CanonicalRecord) -> Result<UpsertOutcome, DbError> {
        upsert_workflow(&mut self.tx, record).await
    }

    async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
