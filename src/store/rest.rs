//! PostgREST adapter for the hosted database (`/rest/v1/<table>`).

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use super::QuotationStore;
use crate::core::config::StoreConfig;
use crate::core::error::StoreError;
use crate::core::shared::{
    CatalogReference, Client, CompanyProfile, JoinedLine, LineFields, Quotation, QuotationHeader,
    QuotationLine, QuotationWithClient, RecordId,
};

const REST_PREFIX: &str = "/rest/v1";

pub struct RestStore {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Request(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}{}/{}", self.base_url, REST_PREFIX, table);
        debug!("Store request: {} {}", method, url);

        self.http_client
            .request(method, &url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, StoreError> {
        let resp = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Store error: {} - {}", status, body);
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.text()
            .await
            .map_err(|e| StoreError::Request(format!("Failed to read response body: {e}")))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let text = self.send(request).await?;
        serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, StoreError> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body);
        let mut rows: Vec<T> = self.fetch(request).await?;
        if rows.is_empty() {
            return Err(StoreError::Decode(format!("Insert into {table} returned no row")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn patch<B: Serialize + Sync>(
        &self,
        table: &str,
        id: RecordId,
        body: &B,
    ) -> Result<(), StoreError> {
        let request = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{id}"))])
            .json(body);
        self.send(request).await.map(|_| ())
    }

    async fn delete_where(&self, table: &str, column: &str, id: RecordId) -> Result<(), StoreError> {
        let request = self
            .request(Method::DELETE, table)
            .query(&[(column, format!("eq.{id}"))]);
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl QuotationStore for RestStore {
    async fn company_profile(&self, user_id: &str) -> Result<Option<CompanyProfile>, StoreError> {
        let request = self.request(Method::GET, "empresa_config").query(&[
            ("user_id", format!("eq.{user_id}")),
            ("select", "*".to_string()),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<CompanyProfile> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn clients(&self) -> Result<Vec<Client>, StoreError> {
        let request = self
            .request(Method::GET, "clientes")
            .query(&[("select", "*"), ("order", "nombre")]);
        self.fetch(request).await
    }

    async fn catalog(&self) -> Result<Vec<CatalogReference>, StoreError> {
        let request = self
            .request(Method::GET, "referencias")
            .query(&[("select", "*"), ("order", "nombre")]);
        self.fetch(request).await
    }

    async fn quotation(&self, id: RecordId) -> Result<Option<QuotationWithClient>, StoreError> {
        let request = self.request(Method::GET, "cotizaciones").query(&[
            ("id", format!("eq.{id}")),
            ("select", "*,clientes(*)".to_string()),
        ]);
        let rows: Vec<QuotationWithClient> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn quotations_by_number(&self, number: &str) -> Result<Vec<Quotation>, StoreError> {
        let request = self.request(Method::GET, "cotizaciones").query(&[
            ("numero_cotizacion", format!("eq.{number}")),
            ("select", "*".to_string()),
        ]);
        self.fetch(request).await
    }

    async fn quotation_lines(&self, quotation_id: RecordId) -> Result<Vec<JoinedLine>, StoreError> {
        let request = self.request(Method::GET, "cotizacion_referencias").query(&[
            ("cotizacion_id", format!("eq.{quotation_id}")),
            ("select", "*,referencias(*)".to_string()),
            ("order", "id".to_string()),
        ]);
        self.fetch(request).await
    }

    async fn insert_quotation(&self, header: &QuotationHeader) -> Result<Quotation, StoreError> {
        self.insert("cotizaciones", header).await
    }

    async fn update_quotation(
        &self,
        id: RecordId,
        header: &QuotationHeader,
    ) -> Result<(), StoreError> {
        self.patch("cotizaciones", id, header).await
    }

    async fn delete_quotation(&self, id: RecordId) -> Result<(), StoreError> {
        self.delete_where("cotizaciones", "id", id).await
    }

    async fn insert_line(&self, fields: &LineFields) -> Result<QuotationLine, StoreError> {
        self.insert("cotizacion_referencias", fields).await
    }

    async fn update_line(&self, id: RecordId, fields: &LineFields) -> Result<(), StoreError> {
        self.patch("cotizacion_referencias", id, fields).await
    }

    async fn delete_line(&self, id: RecordId) -> Result<(), StoreError> {
        self.delete_where("cotizacion_referencias", "id", id).await
    }

    async fn delete_lines_for(&self, quotation_id: RecordId) -> Result<(), StoreError> {
        self.delete_where("cotizacion_referencias", "cotizacion_id", quotation_id)
            .await
    }
}
