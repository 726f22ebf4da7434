//! Records exchanged with the external store.
//!
//! Field names on the wire are the column names of the hosted tables
//! (`clientes`, `referencias`, `cotizaciones`, `cotizacion_referencias`,
//! `empresa_config`); the Rust side uses English names and serde renames.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use super::enums::{Incoterm, TransportMode};

pub type RecordId = i64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: RecordId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "pais", default)]
    pub country: Option<String>,
    #[serde(rename = "ciudad", default)]
    pub city: Option<String>,
    #[serde(rename = "direccion", default)]
    pub address: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "nit", default)]
    pub tax_id: Option<String>,
}

/// A catalog product ("referencia").
///
/// `name` is the business key used by the bulk importer; `code` is a
/// secondary display code printed in front of it on documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogReference {
    pub id: RecordId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "familia", default)]
    pub family: Option<String>,
    #[serde(rename = "codigo_arancelario", default)]
    pub tariff_code: Option<String>,
    #[serde(rename = "precio_cop", default)]
    pub price_cop: Option<f64>,
    #[serde(rename = "peso_unitario", default)]
    pub unit_weight: Option<f64>,
    #[serde(rename = "cantidad_minima_caja", default)]
    pub box_capacity: Option<i64>,
    #[serde(rename = "codigo", default)]
    pub code: Option<String>,
}

impl CatalogReference {
    /// Packing family, if the reference takes part in shared boxes.
    pub fn family_key(&self) -> Option<&str> {
        self.family
            .as_deref()
            .map(str::trim)
            .filter(|family| !family.is_empty())
    }

    /// Units per shared box; zero means "always packed alone".
    pub fn units_per_box(&self) -> u32 {
        self.box_capacity
            .filter(|capacity| *capacity > 0)
            .and_then(|capacity| u32::try_from(capacity).ok())
            .unwrap_or(0)
    }
}

/// Catalog indexed for the lookups done while packing, pricing and importing.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_id: HashMap<RecordId, CatalogReference>,
}

impl Catalog {
    pub fn new(references: impl IntoIterator<Item = CatalogReference>) -> Self {
        Self {
            by_id: references
                .into_iter()
                .map(|reference| (reference.id, reference))
                .collect(),
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&CatalogReference> {
        self.by_id.get(&id)
    }

    /// Exact, case-insensitive match on the reference name.
    pub fn find_by_name(&self, name: &str) -> Option<&CatalogReference> {
        let wanted = name.trim().to_lowercase();
        let mut matches: Vec<&CatalogReference> = self
            .by_id
            .values()
            .filter(|reference| reference.name.trim().to_lowercase() == wanted)
            .collect();
        matches.sort_by_key(|reference| reference.id);
        matches.into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Editable header fields of a quotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotationHeader {
    #[serde(rename = "numero_cotizacion", default)]
    pub number: Option<String>,
    #[serde(rename = "cliente_id")]
    pub client_id: RecordId,
    #[serde(rename = "contacto_nombre", default)]
    pub contact_name: Option<String>,
    #[serde(rename = "tasa_cambio", default)]
    pub exchange_rate: Option<f64>,
    #[serde(rename = "vigencia", default, deserialize_with = "blank_as_none")]
    pub valid_until: Option<NaiveDate>,
    #[serde(rename = "modo_transporte", default, deserialize_with = "blank_as_none")]
    pub transport_mode: Option<TransportMode>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub incoterm: Option<Incoterm>,
    #[serde(rename = "peso_total", default)]
    pub total_weight: Option<f64>,
    #[serde(rename = "unidades_carga", default)]
    pub cargo_units: Option<i64>,
    #[serde(default)]
    pub dimension_l: Option<f64>,
    #[serde(default)]
    pub dimension_w: Option<f64>,
    #[serde(default)]
    pub dimension_h: Option<f64>,
    #[serde(rename = "observaciones", default)]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub header: QuotationHeader,
}

/// Editable fields of one quotation line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineFields {
    #[serde(rename = "cotizacion_id")]
    pub quotation_id: RecordId,
    #[serde(rename = "referencia_id")]
    pub reference_id: RecordId,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "precio_modificado_cop", default)]
    pub price_override_cop: Option<f64>,
    #[serde(rename = "numero_caja", default)]
    pub box_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: LineFields,
}

/// A quotation row with its client embedded (`select=*,clientes(*)`).
#[derive(Debug, Clone, Deserialize)]
pub struct QuotationWithClient {
    #[serde(flatten)]
    pub quotation: Quotation,
    #[serde(rename = "clientes", default)]
    pub client: Option<Client>,
}

/// A line row with its catalog reference embedded (`select=*,referencias(*)`).
#[derive(Debug, Clone, Deserialize)]
pub struct JoinedLine {
    #[serde(flatten)]
    pub line: QuotationLine,
    #[serde(rename = "referencias", default)]
    pub reference: Option<CatalogReference>,
}

/// Seller profile printed on proformas (`empresa_config`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    #[serde(rename = "nit")]
    pub tax_id: Option<String>,
    #[serde(rename = "vendedor")]
    pub seller: Option<String>,
    #[serde(rename = "direccion")]
    pub address: Option<String>,
    #[serde(rename = "ciudad")]
    pub city: Option<String>,
    #[serde(rename = "pais")]
    pub country: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "banco_nombre")]
    pub bank_name: Option<String>,
    #[serde(rename = "banco_cuenta")]
    pub bank_account: Option<String>,
    #[serde(rename = "banco_swift")]
    pub bank_swift: Option<String>,
    #[serde(rename = "banco_aba")]
    pub bank_aba: Option<String>,
}

impl CompanyProfile {
    /// Profile used when the signed-in user never saved one.
    pub fn builtin() -> Self {
        Self {
            user_id: None,
            name: Some("INDUSTRIA IP S.A.S.".to_string()),
            tax_id: Some("800.123.456-7".to_string()),
            seller: Some("Juan Pérez".to_string()),
            address: Some("Calle 10 # 20-30".to_string()),
            city: Some("Manizales, Caldas".to_string()),
            country: Some("Colombia".to_string()),
            phone: Some("+57 (6) 123-4567".to_string()),
            email: Some("ventas@industriaip.com".to_string()),
            bank_name: Some("Banco de Bogotá".to_string()),
            bank_account: Some("123456789".to_string()),
            bank_swift: Some("BBOOCOBB".to_string()),
            bank_aba: None,
        }
    }
}

/// Treats `null`, a missing value and a blank string alike.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_joined_line_reads_embedded_reference() {
        let row = json!({
            "id": 7,
            "cotizacion_id": 3,
            "referencia_id": 11,
            "cantidad": 4,
            "precio_modificado_cop": null,
            "numero_caja": 2,
            "referencias": {
                "id": 11,
                "nombre": "AA-050A",
                "familia": "BOXFAM",
                "precio_cop": 40000,
                "cantidad_minima_caja": 12
            }
        });

        let joined: JoinedLine = serde_json::from_value(row).unwrap();
        assert_eq!(joined.line.id, 7);
        assert_eq!(joined.line.fields.box_number, Some(2));
        let reference = joined.reference.unwrap();
        assert_eq!(reference.family_key(), Some("BOXFAM"));
        assert_eq!(reference.units_per_box(), 12);
    }

    #[test]
    fn test_quotation_header_tolerates_blank_enums() {
        let row = json!({
            "id": 1,
            "created_at": "2025-03-04T10:00:00+00:00",
            "cliente_id": 5,
            "tasa_cambio": 4000,
            "vigencia": "",
            "modo_transporte": "Aéreo",
            "incoterm": "",
            "clientes": { "id": 5, "nombre": "ACME" }
        });

        let loaded: QuotationWithClient = serde_json::from_value(row).unwrap();
        assert_eq!(loaded.quotation.header.transport_mode, Some(TransportMode::Air));
        assert_eq!(loaded.quotation.header.incoterm, None);
        assert_eq!(loaded.quotation.header.valid_until, None);
        assert_eq!(loaded.client.unwrap().name, "ACME");
    }

    #[test]
    fn test_family_key_ignores_blank_family_and_capacity() {
        let reference = CatalogReference {
            family: Some("   ".to_string()),
            box_capacity: Some(-3),
            ..Default::default()
        };
        assert_eq!(reference.family_key(), None);
        assert_eq!(reference.units_per_box(), 0);
    }
}
