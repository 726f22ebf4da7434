//! Read/write contract with the hosted relational store.
//!
//! Every call is one request/response unit; nothing here holds locks
//! across calls, so concurrent edits resolve as last write wins.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{StoreBackend, StoreConfig};
use crate::core::error::StoreError;
use crate::core::shared::{
    CatalogReference, Client, CompanyProfile, JoinedLine, LineFields, Quotation, QuotationHeader,
    QuotationLine, QuotationWithClient, RecordId,
};

pub use memory::MemoryStore;
pub use rest::RestStore;

#[async_trait]
pub trait QuotationStore: Send + Sync {
    async fn company_profile(&self, user_id: &str) -> Result<Option<CompanyProfile>, StoreError>;

    async fn clients(&self) -> Result<Vec<Client>, StoreError>;

    /// Catalog ordered by reference name.
    async fn catalog(&self) -> Result<Vec<CatalogReference>, StoreError>;

    async fn quotation(&self, id: RecordId) -> Result<Option<QuotationWithClient>, StoreError>;

    async fn quotations_by_number(&self, number: &str) -> Result<Vec<Quotation>, StoreError>;

    /// Lines of a quotation in storage order, each with its reference joined.
    async fn quotation_lines(&self, quotation_id: RecordId) -> Result<Vec<JoinedLine>, StoreError>;

    async fn insert_quotation(&self, header: &QuotationHeader) -> Result<Quotation, StoreError>;

    async fn update_quotation(
        &self,
        id: RecordId,
        header: &QuotationHeader,
    ) -> Result<(), StoreError>;

    async fn delete_quotation(&self, id: RecordId) -> Result<(), StoreError>;

    async fn insert_line(&self, fields: &LineFields) -> Result<QuotationLine, StoreError>;

    async fn update_line(&self, id: RecordId, fields: &LineFields) -> Result<(), StoreError>;

    async fn delete_line(&self, id: RecordId) -> Result<(), StoreError>;

    async fn delete_lines_for(&self, quotation_id: RecordId) -> Result<(), StoreError>;
}

pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn QuotationStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            let store = match &config.fixture {
                Some(path) => MemoryStore::from_fixture_file(path).await?,
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Rest => Ok(Arc::new(RestStore::new(config)?)),
    }
}
