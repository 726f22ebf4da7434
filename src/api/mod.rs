//! HTTP surface: proforma downloads, packing recalculation and catalog
//! import, all behind the signed-in guard.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::error::{QuoteError, QuoteResult, ValidationError};
use crate::core::shared::state::AppState;
use crate::core::shared::RecordId;
use crate::documents::{generate_proforma, DocumentFormat};
use crate::import::{import_from_store, sample_template, ImportOutcome, TableFormat, TEMPLATE_FILENAME};
use crate::quotes::{recalculate_packing, PackingReport};

pub const USER_HEADER: &str = "x-user-id";

/// The caller's user id, taken from the `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SignedInUser
where
    S: Send + Sync,
{
    type Rejection = QuoteError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| SignedInUser(value.to_string()))
            .ok_or_else(|| QuoteError::Unauthorized("Sign in required".to_string()))
    }
}

pub fn configure(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/quotations/:id/proforma/:format", get(download_proforma))
        .route("/api/quotations/:id/packing", post(repack_quotation))
        .route("/api/quotations/import", post(import_lines))
        .route("/api/import/template", get(download_template))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr: SocketAddr = state
        .config
        .bind_address()
        .parse()
        .map_err(std::io::Error::other)?;
    let app = configure(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down HTTP server...");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn attachment(filename: &str, mime_type: &'static str, bytes: Vec<u8>) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(mime_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

async fn download_proforma(
    State(state): State<Arc<AppState>>,
    SignedInUser(user_id): SignedInUser,
    Path((id, format)): Path<(RecordId, String)>,
) -> QuoteResult<Response> {
    let format: DocumentFormat = format
        .parse()
        .map_err(|e: String| ValidationError::new("format", e))?;

    let rendered = generate_proforma(&state, id, &user_id, format).await?;
    Ok(attachment(&rendered.filename, format.mime_type(), rendered.bytes))
}

async fn repack_quotation(
    State(state): State<Arc<AppState>>,
    SignedInUser(_user_id): SignedInUser,
    Path(id): Path<RecordId>,
) -> QuoteResult<Json<PackingReport>> {
    let report = recalculate_packing(state.store.as_ref(), id).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

async fn import_lines(
    State(state): State<Arc<AppState>>,
    SignedInUser(_user_id): SignedInUser,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> QuoteResult<Json<ImportOutcome>> {
    let format: TableFormat = query.format.as_deref().unwrap_or("xlsx").parse()?;
    let outcome = import_from_store(state.store.as_ref(), &body, format).await;
    Ok(Json(outcome))
}

async fn download_template(SignedInUser(_user_id): SignedInUser) -> QuoteResult<Response> {
    let bytes = sample_template()?;
    Ok(attachment(TEMPLATE_FILENAME, DocumentFormat::Xlsx.mime_type(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::documents::DocumentAssets;
    use crate::store::memory::{Fixture, MemoryStore};
    use crate::core::shared::CatalogReference;
    use crate::quotes::assembly::fixtures::quotation;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        let loaded = quotation(1, Some(4000.0));
        let fixture = Fixture {
            clients: loaded.client.clone().into_iter().collect(),
            references: vec![CatalogReference {
                id: 10,
                name: "AA-050A".to_string(),
                description: Some("Válvula".to_string()),
                family: Some("BOXFAM".to_string()),
                tariff_code: Some("8481.80.99".to_string()),
                price_cop: Some(40000.0),
                unit_weight: Some(0.5),
                box_capacity: Some(12),
                code: Some("V-10".to_string()),
            }],
            quotations: vec![loaded.quotation.clone()],
            lines: vec![crate::core::shared::QuotationLine {
                id: 1,
                fields: crate::core::shared::LineFields {
                    quotation_id: 1,
                    reference_id: 10,
                    quantity: 10,
                    price_override_cop: None,
                    box_number: None,
                },
            }],
            companies: Vec::new(),
        };
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryStore::from_fixture(fixture)))
            .with_assets(DocumentAssets::none());
        configure(Arc::new(state))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Response) {
        let response = app().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (status, _) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let (status, _) = send(
            Request::get("/api/quotations/1/proforma/pdf")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_download_sets_attachment_headers() {
        let (status, response) = send(
            Request::get("/api/quotations/1/proforma/excel")
                .header(USER_HEADER, "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Proforma_IP_001.xlsx\""
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_unknown_quotation_and_format() {
        let (status, _) = send(
            Request::get("/api/quotations/99/proforma/pdf")
                .header(USER_HEADER, "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            Request::get("/api/quotations/1/proforma/odt")
                .header(USER_HEADER, "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_packing_returns_report() {
        let (status, response) = send(
            Request::post("/api/quotations/1/packing")
                .header(USER_HEADER, "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["quotation_id"], 1);
        assert_eq!(report["totals"]["cargo_units"], 1);
    }

    #[tokio::test]
    async fn test_csv_import_reports_matches() {
        let (status, response) = send(
            Request::post("/api/quotations/import?format=csv")
                .header(USER_HEADER, "user-1")
                .body(Body::from("CODIGO,CANTIDAD\naa-050a,10\nZZ-999,5\n"))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let outcome: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["products"][0]["referencia_id"], 10);
        assert_eq!(outcome["unmatched"][0], "ZZ-999 (Fila 3)");
    }
}
