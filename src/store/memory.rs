use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

use super::QuotationStore;
use crate::core::error::StoreError;
use crate::core::shared::{
    CatalogReference, Client, CompanyProfile, JoinedLine, LineFields, Quotation, QuotationHeader,
    QuotationLine, QuotationWithClient, RecordId,
};

/// Table snapshot used to seed a [`MemoryStore`], keyed like the hosted tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    #[serde(rename = "clientes")]
    pub clients: Vec<Client>,
    #[serde(rename = "referencias")]
    pub references: Vec<CatalogReference>,
    #[serde(rename = "cotizaciones")]
    pub quotations: Vec<Quotation>,
    #[serde(rename = "cotizacion_referencias")]
    pub lines: Vec<QuotationLine>,
    #[serde(rename = "empresa_config")]
    pub companies: Vec<CompanyProfile>,
}

#[derive(Default)]
struct Tables {
    clients: BTreeMap<RecordId, Client>,
    references: BTreeMap<RecordId, CatalogReference>,
    quotations: BTreeMap<RecordId, Quotation>,
    lines: BTreeMap<RecordId, QuotationLine>,
    companies: HashMap<String, CompanyProfile>,
    next_id: RecordId,
}

impl Tables {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store with the same contract as the hosted one.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut tables = Tables::default();
        let mut max_id = 0;

        for client in fixture.clients {
            max_id = max_id.max(client.id);
            tables.clients.insert(client.id, client);
        }
        for reference in fixture.references {
            max_id = max_id.max(reference.id);
            tables.references.insert(reference.id, reference);
        }
        for quotation in fixture.quotations {
            max_id = max_id.max(quotation.id);
            tables.quotations.insert(quotation.id, quotation);
        }
        for line in fixture.lines {
            max_id = max_id.max(line.id);
            tables.lines.insert(line.id, line);
        }
        for company in fixture.companies {
            if let Some(user_id) = company.user_id.clone() {
                tables.companies.insert(user_id, company);
            }
        }

        tables.next_id = max_id;
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub async fn from_fixture_file(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Request(format!("Failed to read fixture {}: {e}", path.display())))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .map_err(|e| StoreError::Decode(format!("Invalid fixture {}: {e}", path.display())))?;
        Ok(Self::from_fixture(fixture))
    }

    pub async fn save_company_profile(&self, user_id: &str, mut profile: CompanyProfile) {
        profile.user_id = Some(user_id.to_string());
        let mut tables = self.tables.write().await;
        tables.companies.insert(user_id.to_string(), profile);
    }

    pub async fn upsert_reference(&self, reference: CatalogReference) {
        let mut tables = self.tables.write().await;
        tables.next_id = tables.next_id.max(reference.id);
        tables.references.insert(reference.id, reference);
    }
}

#[async_trait]
impl QuotationStore for MemoryStore {
    async fn company_profile(&self, user_id: &str) -> Result<Option<CompanyProfile>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.companies.get(user_id).cloned())
    }

    async fn clients(&self) -> Result<Vec<Client>, StoreError> {
        let tables = self.tables.read().await;
        let mut clients: Vec<Client> = tables.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn catalog(&self) -> Result<Vec<CatalogReference>, StoreError> {
        let tables = self.tables.read().await;
        let mut references: Vec<CatalogReference> = tables.references.values().cloned().collect();
        references.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(references)
    }

    async fn quotation(&self, id: RecordId) -> Result<Option<QuotationWithClient>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.quotations.get(&id).map(|quotation| QuotationWithClient {
            client: tables.clients.get(&quotation.header.client_id).cloned(),
            quotation: quotation.clone(),
        }))
    }

    async fn quotations_by_number(&self, number: &str) -> Result<Vec<Quotation>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .quotations
            .values()
            .filter(|q| q.header.number.as_deref() == Some(number))
            .cloned()
            .collect())
    }

    async fn quotation_lines(&self, quotation_id: RecordId) -> Result<Vec<JoinedLine>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .lines
            .values()
            .filter(|line| line.fields.quotation_id == quotation_id)
            .map(|line| JoinedLine {
                reference: tables.references.get(&line.fields.reference_id).cloned(),
                line: line.clone(),
            })
            .collect())
    }

    async fn insert_quotation(&self, header: &QuotationHeader) -> Result<Quotation, StoreError> {
        let mut tables = self.tables.write().await;
        let quotation = Quotation {
            id: tables.allocate_id(),
            created_at: Utc::now(),
            header: header.clone(),
        };
        tables.quotations.insert(quotation.id, quotation.clone());
        Ok(quotation)
    }

    async fn update_quotation(
        &self,
        id: RecordId,
        header: &QuotationHeader,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let quotation = tables
            .quotations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("cotizaciones {id}")))?;
        quotation.header = header.clone();
        Ok(())
    }

    async fn delete_quotation(&self, id: RecordId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .quotations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("cotizaciones {id}")))
    }

    async fn insert_line(&self, fields: &LineFields) -> Result<QuotationLine, StoreError> {
        let mut tables = self.tables.write().await;
        let line = QuotationLine {
            id: tables.allocate_id(),
            fields: fields.clone(),
        };
        tables.lines.insert(line.id, line.clone());
        Ok(line)
    }

    async fn update_line(&self, id: RecordId, fields: &LineFields) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let line = tables
            .lines
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("cotizacion_referencias {id}")))?;
        line.fields = fields.clone();
        Ok(())
    }

    async fn delete_line(&self, id: RecordId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.lines.remove(&id);
        Ok(())
    }

    async fn delete_lines_for(&self, quotation_id: RecordId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .lines
            .retain(|_, line| line.fields.quotation_id != quotation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(id: RecordId, name: &str) -> CatalogReference {
        CatalogReference {
            id,
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ids_continue_after_fixture() {
        let store = MemoryStore::from_fixture(Fixture {
            references: vec![reference(40, "AA-050A")],
            ..Default::default()
        });

        let quotation = store
            .insert_quotation(&QuotationHeader {
                client_id: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(quotation.id, 41);
    }

    #[tokio::test]
    async fn test_lines_are_joined_with_references() {
        let store = MemoryStore::from_fixture(Fixture {
            references: vec![reference(1, "AA-050A")],
            ..Default::default()
        });
        let quotation = store
            .insert_quotation(&QuotationHeader::default())
            .await
            .unwrap();
        for reference_id in [1, 99] {
            store
                .insert_line(&LineFields {
                    quotation_id: quotation.id,
                    reference_id,
                    quantity: 2,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let lines = store.quotation_lines(quotation.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].reference.as_ref().unwrap().name, "AA-050A");
        assert!(lines[1].reference.is_none());

        store.delete_lines_for(quotation.id).await.unwrap();
        assert!(store.quotation_lines(quotation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_quotation_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_quotation(5, &QuotationHeader::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
