//! Quotation lifecycle against the store: create, update, delete, and
//! packing recalculation. Each call is a plain sequence of store requests;
//! concurrent edits are last write wins.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::core::error::{QuoteError, QuoteResult, ValidationError};
use crate::core::shared::{
    Catalog, Quotation, QuotationHeader, QuotationLine, RecordId,
};
use crate::packing::{allocate_boxes, BoxPlacement, LineSpan, ShipmentTotals, SkippedLine};
use crate::pricing::ExchangeRate;
use crate::store::QuotationStore;

use super::editor::{validate_line, DraftLine};

pub fn validate_header(header: &QuotationHeader) -> Result<(), ValidationError> {
    if header.client_id <= 0 {
        return Err(ValidationError::new("cliente_id", "Select a client"));
    }
    if ExchangeRate::from_option(header.exchange_rate).is_err() {
        return Err(ValidationError::new(
            "tasa_cambio",
            "Exchange rate must be a positive number",
        ));
    }
    Ok(())
}

/// Inserts the header, then its lines.
pub async fn create_quotation(
    store: &dyn QuotationStore,
    header: &QuotationHeader,
    lines: &[DraftLine],
) -> QuoteResult<(Quotation, Vec<QuotationLine>)> {
    validate_header(header)?;
    let catalog = Catalog::new(store.catalog().await?);
    for line in lines {
        validate_line(line, &catalog)?;
    }

    if let Some(number) = header.number.as_deref().filter(|n| !n.trim().is_empty()) {
        let existing = store.quotations_by_number(number).await?;
        if !existing.is_empty() {
            warn!(
                number,
                existing = existing.len(),
                "Quotation number already in use; saving anyway"
            );
        }
    }

    let quotation = store.insert_quotation(header).await?;
    let mut saved = Vec::with_capacity(lines.len());
    for line in lines {
        saved.push(store.insert_line(&line.to_fields(quotation.id)?).await?);
    }

    info!(quotation_id = quotation.id, lines = saved.len(), "Created quotation");
    Ok((quotation, saved))
}

/// Saves the header and upserts every line; stored lines missing from
/// `lines` are deleted.
pub async fn update_quotation(
    store: &dyn QuotationStore,
    quotation_id: RecordId,
    header: &QuotationHeader,
    lines: &[DraftLine],
) -> QuoteResult<Vec<QuotationLine>> {
    validate_header(header)?;
    let catalog = Catalog::new(store.catalog().await?);
    for line in lines {
        validate_line(line, &catalog)?;
    }

    store.update_quotation(quotation_id, header).await?;

    let kept: HashSet<RecordId> = lines.iter().filter_map(|line| line.id).collect();
    for stored in store.quotation_lines(quotation_id).await? {
        if !kept.contains(&stored.line.id) {
            store.delete_line(stored.line.id).await?;
        }
    }

    let mut saved = Vec::with_capacity(lines.len());
    for line in lines {
        let fields = line.to_fields(quotation_id)?;
        match line.id {
            Some(id) => {
                store.update_line(id, &fields).await?;
                saved.push(QuotationLine { id, fields });
            }
            None => saved.push(store.insert_line(&fields).await?),
        }
    }

    info!(quotation_id, lines = saved.len(), "Updated quotation");
    Ok(saved)
}

/// Removes every line first, then the header.
pub async fn delete_quotation(store: &dyn QuotationStore, quotation_id: RecordId) -> QuoteResult<()> {
    store.delete_lines_for(quotation_id).await?;
    store.delete_quotation(quotation_id).await?;
    info!(quotation_id, "Deleted quotation");
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct PackedLine {
    pub line_id: RecordId,
    pub reference_id: RecordId,
    pub quantity: i64,
    pub box_number: Option<u32>,
}

/// What a packing run changed, for callers that show it.
#[derive(Debug, Clone, Serialize)]
pub struct PackingReport {
    pub quotation_id: RecordId,
    pub lines: Vec<PackedLine>,
    pub placements: Vec<BoxPlacement>,
    pub spans: Vec<LineSpan>,
    pub skipped: Vec<SkippedLine>,
    pub totals: ShipmentTotals,
}

/// Re-packs the stored lines from fresh reads, saves every changed box
/// number, and writes `peso_total` / `unidades_carga` to the header.
pub async fn recalculate_packing(
    store: &dyn QuotationStore,
    quotation_id: RecordId,
) -> QuoteResult<PackingReport> {
    let loaded = store
        .quotation(quotation_id)
        .await?
        .ok_or_else(|| QuoteError::NotFound(format!("Quotation {quotation_id}")))?;
    let joined = store.quotation_lines(quotation_id).await?;

    let catalog = Catalog::new(joined.iter().filter_map(|line| line.reference.clone()));
    let current: Vec<QuotationLine> = joined.into_iter().map(|joined| joined.line).collect();

    let allocation = allocate_boxes(&current, &catalog);

    for (before, after) in current.iter().zip(&allocation.lines) {
        if before.fields.box_number != after.fields.box_number {
            store.update_line(after.id, &after.fields).await?;
        }
    }

    let mut header = loaded.quotation.header;
    header.total_weight = Some(allocation.totals.total_weight);
    header.cargo_units = Some(i64::from(allocation.totals.cargo_units));
    store.update_quotation(quotation_id, &header).await?;

    info!(
        quotation_id,
        boxes = allocation.totals.cargo_units,
        weight = allocation.totals.total_weight,
        "Recalculated packing"
    );

    Ok(PackingReport {
        quotation_id,
        lines: allocation
            .lines
            .iter()
            .map(|line| PackedLine {
                line_id: line.id,
                reference_id: line.fields.reference_id,
                quantity: line.fields.quantity,
                box_number: line.fields.box_number,
            })
            .collect(),
        placements: allocation.placements,
        spans: allocation.spans,
        skipped: allocation.skipped,
        totals: allocation.totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::{CatalogReference, Client};
    use crate::store::memory::Fixture;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::from_fixture(Fixture {
            clients: vec![Client {
                id: 1,
                name: "ACME".to_string(),
                ..Default::default()
            }],
            references: vec![
                CatalogReference {
                    id: 10,
                    name: "AA-050A".to_string(),
                    family: Some("BOXFAM".to_string()),
                    box_capacity: Some(12),
                    unit_weight: Some(0.5),
                    ..Default::default()
                },
                CatalogReference {
                    id: 11,
                    name: "AA-070".to_string(),
                    unit_weight: Some(2.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        })
    }

    fn header() -> QuotationHeader {
        QuotationHeader {
            number: Some("IP-001".to_string()),
            client_id: 1,
            exchange_rate: Some(4000.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_rate_before_writing() {
        let store = store();
        let mut bad = header();
        bad.exchange_rate = Some(0.0);

        let err = create_quotation(&store, &bad, &[]).await.unwrap_err();

        assert!(matches!(err, QuoteError::Validation(ref e) if e.field == "tasa_cambio"));
        assert!(store.quotations_by_number("IP-001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_numbers_are_allowed() {
        let store = store();
        create_quotation(&store, &header(), &[]).await.unwrap();
        create_quotation(&store, &header(), &[]).await.unwrap();

        assert_eq!(store.quotations_by_number("IP-001").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_upserts_and_deletes_removed_lines() {
        let store = store();
        let (quotation, saved) = create_quotation(
            &store,
            &header(),
            &[DraftLine::for_reference(10, 5), DraftLine::for_reference(11, 1)],
        )
        .await
        .unwrap();

        let mut kept = DraftLine::from(&saved[0]);
        kept.quantity = 8;
        let added = DraftLine::for_reference(11, 3);

        let updated = update_quotation(&store, quotation.id, &header(), &[kept, added])
            .await
            .unwrap();

        assert_eq!(updated[0].id, saved[0].id);
        let stored = store.quotation_lines(quotation.id).await.unwrap();
        let quantities: Vec<i64> = stored.iter().map(|line| line.line.fields.quantity).collect();
        assert_eq!(quantities, vec![8, 3]);
        assert!(stored.iter().all(|line| line.line.id != saved[1].id));
    }

    #[tokio::test]
    async fn test_delete_removes_lines_then_header() {
        let store = store();
        let (quotation, _) =
            create_quotation(&store, &header(), &[DraftLine::for_reference(10, 5)]).await.unwrap();

        delete_quotation(&store, quotation.id).await.unwrap();

        assert!(store.quotation(quotation.id).await.unwrap().is_none());
        assert!(store.quotation_lines(quotation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recalculate_packing_persists_boxes_and_totals() {
        let store = store();
        let (quotation, _) = create_quotation(
            &store,
            &header(),
            &[
                DraftLine::for_reference(10, 5),
                DraftLine::for_reference(10, 5),
                DraftLine::for_reference(10, 5),
                DraftLine::for_reference(11, 2),
            ],
        )
        .await
        .unwrap();

        let report = recalculate_packing(&store, quotation.id).await.unwrap();

        let boxes: Vec<Option<u32>> = report.lines.iter().map(|line| line.box_number).collect();
        assert_eq!(boxes, vec![Some(1), Some(1), Some(2), Some(3)]);
        assert_eq!(report.totals.cargo_units, 3);
        assert_eq!(report.spans.len(), 1);

        let stored = store.quotation_lines(quotation.id).await.unwrap();
        let persisted: Vec<Option<u32>> = stored.iter().map(|line| line.line.fields.box_number).collect();
        assert_eq!(persisted, boxes);

        let header = store.quotation(quotation.id).await.unwrap().unwrap().quotation.header;
        assert_eq!(header.cargo_units, Some(3));
        assert_eq!(header.total_weight, Some(11.5));
    }
}
