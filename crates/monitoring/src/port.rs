//! Data access port consumed by the engine.
//!
//! The store that owns products, sale events and issues is an external
//! collaborator; infra provides implementations (in-memory for tests/dev).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockwatch_core::{DomainError, IssueId};
use stockwatch_products::Product;
use stockwatch_sales::SaleEvent;

use crate::issue::{Issue, IssueInput, ResolvedBy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store is unreachable or returned malformed data.
    #[error("data access failed: {0}")]
    DataAccess(String),

    /// A record failed validation and was not written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("issue not found: {0}")]
    NotFound(IssueId),
}

impl From<DomainError> for StoreError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => StoreError::Validation(msg),
            other if other.is_invalid_record() => StoreError::Validation(other.to_string()),
            other => StoreError::DataAccess(other.to_string()),
        }
    }
}

pub trait MonitoringStore: Send + Sync {
    fn get_active_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Most recent `window` sale events, newest first.
    fn get_recent_sale_events(&self, window: usize) -> Result<Vec<SaleEvent>, StoreError>;

    fn get_open_issues(&self) -> Result<Vec<Issue>, StoreError>;

    fn create_issue(&self, input: IssueInput) -> Result<Issue, StoreError>;

    /// Transition an issue to `Resolved`. Resolving an already-resolved issue
    /// succeeds without changing it.
    fn resolve_issue(&self, id: IssueId, by: ResolvedBy, at: DateTime<Utc>) -> Result<(), StoreError>;
}

impl<S> MonitoringStore for Arc<S>
where
    S: MonitoringStore + ?Sized,
{
    fn get_active_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).get_active_products()
    }

    fn get_recent_sale_events(&self, window: usize) -> Result<Vec<SaleEvent>, StoreError> {
        (**self).get_recent_sale_events(window)
    }

    fn get_open_issues(&self) -> Result<Vec<Issue>, StoreError> {
        (**self).get_open_issues()
    }

    fn create_issue(&self, input: IssueInput) -> Result<Issue, StoreError> {
        (**self).create_issue(input)
    }

    fn resolve_issue(&self, id: IssueId, by: ResolvedBy, at: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).resolve_issue(id, by, at)
    }
}
