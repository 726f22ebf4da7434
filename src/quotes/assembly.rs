//! Builds the single document-ready structure every renderer consumes.

use serde::Serialize;
use tracing::debug;

use crate::core::error::{QuoteError, QuoteResult};
use crate::core::shared::{
    CatalogReference, Client, CompanyProfile, JoinedLine, Quotation, QuotationLine,
    QuotationWithClient, RecordId,
};
use crate::packing::box_sort_key;
use crate::pricing::{effective_local_price, price_line, ExchangeRate, LinePrice, Money};
use crate::store::QuotationStore;

#[derive(Debug, Clone, Serialize)]
pub struct AssembledLine {
    pub line: QuotationLine,
    pub reference: CatalogReference,
    pub price: LinePrice,
}

impl AssembledLine {
    pub fn box_number(&self) -> Option<u32> {
        self.line.fields.box_number
    }

    pub fn quantity(&self) -> i64 {
        self.line.fields.quantity
    }
}

/// Quotation, parties and priced lines in display order.
#[derive(Debug, Clone, Serialize)]
pub struct ProformaDocument {
    pub quotation: Quotation,
    pub client: Client,
    pub company: CompanyProfile,
    pub exchange_rate: f64,
    pub lines: Vec<AssembledLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl ProformaDocument {
    /// Business number, or the internal id padded to three digits.
    pub fn proforma_number(&self) -> String {
        match self.quotation.header.number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => number.to_string(),
            _ => format!("{:03}", self.quotation.id),
        }
    }
}

/// Joins, prices and orders the lines of a loaded quotation.
///
/// `company` is the signed-in user's saved profile; `fallback` replaces it
/// when absent. A line without its catalog reference cannot be rendered and
/// fails the whole assembly.
pub fn build_document(
    loaded: QuotationWithClient,
    lines: Vec<JoinedLine>,
    company: Option<CompanyProfile>,
    fallback: CompanyProfile,
) -> QuoteResult<ProformaDocument> {
    let QuotationWithClient { quotation, client } = loaded;

    let rate = ExchangeRate::from_option(quotation.header.exchange_rate)?;
    let client = client.ok_or_else(|| {
        QuoteError::Lookup(format!(
            "Client {} of quotation {} not found",
            quotation.header.client_id, quotation.id
        ))
    })?;

    let mut assembled = Vec::with_capacity(lines.len());
    for JoinedLine { line, reference } in lines {
        let reference = reference.ok_or_else(|| {
            QuoteError::Lookup(format!(
                "Reference {} of line {} not found in catalog",
                line.fields.reference_id, line.id
            ))
        })?;
        let local_price = effective_local_price(reference.price_cop, line.fields.price_override_cop);
        let price = price_line(local_price, line.fields.quantity, &rate);
        assembled.push(AssembledLine {
            line,
            reference,
            price,
        });
    }
    assembled.sort_by_key(|line| box_sort_key(line.box_number()));

    let subtotal: Money = assembled.iter().map(|line| line.price.extended).sum();
    let discount = Money::ZERO;
    let total = subtotal + discount;

    debug!(
        quotation_id = quotation.id,
        lines = assembled.len(),
        subtotal = %subtotal,
        "Assembled proforma"
    );

    Ok(ProformaDocument {
        quotation,
        client,
        company: company.unwrap_or(fallback),
        exchange_rate: rate.value(),
        lines: assembled,
        subtotal,
        discount,
        total,
    })
}

/// Reads company profile, quotation with client, and joined lines, then
/// builds the document.
pub async fn assemble(
    store: &dyn QuotationStore,
    quotation_id: RecordId,
    user_id: &str,
    fallback: CompanyProfile,
) -> QuoteResult<ProformaDocument> {
    let company = store.company_profile(user_id).await?;
    let loaded = store
        .quotation(quotation_id)
        .await?
        .ok_or_else(|| QuoteError::NotFound(format!("Quotation {quotation_id}")))?;
    let lines = store.quotation_lines(quotation_id).await?;

    build_document(loaded, lines, company, fallback)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::core::shared::{Incoterm, LineFields, QuotationHeader, TransportMode};
    use chrono::{NaiveDate, TimeZone, Utc};

    pub fn quotation(id: RecordId, rate: Option<f64>) -> QuotationWithClient {
        QuotationWithClient {
            quotation: Quotation {
                id,
                created_at: Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap(),
                header: QuotationHeader {
                    number: None,
                    client_id: 5,
                    contact_name: Some("Ana Gómez".to_string()),
                    exchange_rate: rate,
                    valid_until: NaiveDate::from_ymd_opt(2025, 4, 4),
                    transport_mode: Some(TransportMode::Maritime),
                    incoterm: Some(Incoterm::Fob),
                    total_weight: Some(12.5),
                    cargo_units: Some(2),
                    dimension_l: Some(120.0),
                    dimension_w: Some(80.0),
                    dimension_h: Some(60.0),
                    observations: None,
                },
            },
            client: Some(Client {
                id: 5,
                name: "ACME Imports LLC".to_string(),
                country: Some("USA".to_string()),
                city: Some("Miami".to_string()),
                address: Some("200 Biscayne Blvd".to_string()),
                phone: Some("+1 305 555 0100".to_string()),
                tax_id: Some("US-99-123".to_string()),
            }),
        }
    }

    pub fn reference(id: RecordId, name: &str, price_cop: f64) -> CatalogReference {
        CatalogReference {
            id,
            name: name.to_string(),
            description: Some(format!("Descripción {name}")),
            family: Some("BOXFAM".to_string()),
            tariff_code: Some("8481.80.99".to_string()),
            price_cop: Some(price_cop),
            unit_weight: Some(0.5),
            box_capacity: Some(12),
            code: Some(format!("C{id}")),
        }
    }

    pub fn joined(
        id: RecordId,
        reference: Option<CatalogReference>,
        quantity: i64,
        box_number: Option<u32>,
    ) -> JoinedLine {
        JoinedLine {
            line: QuotationLine {
                id,
                fields: LineFields {
                    quotation_id: 1,
                    reference_id: reference.as_ref().map(|r| r.id).unwrap_or(999),
                    quantity,
                    price_override_cop: None,
                    box_number,
                },
            },
            reference,
        }
    }
}
