//! Line-list editing as a pure reducer: every action returns a new,
//! validated list and leaves its input untouched.

use serde::{Deserialize, Serialize};

use crate::core::error::ValidationError;
use crate::core::shared::{Catalog, JoinedLine, LineFields, QuotationLine, RecordId};
use crate::packing::{allocate_boxes, sort_by_box, PackableLine};

/// A line as edited, before it is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftLine {
    /// Stored id; `None` until first saved.
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub reference_id: Option<RecordId>,
    pub quantity: i64,
    #[serde(default)]
    pub price_override_cop: Option<f64>,
    #[serde(default)]
    pub box_number: Option<u32>,
}

impl Default for DraftLine {
    fn default() -> Self {
        Self {
            id: None,
            reference_id: None,
            quantity: 1,
            price_override_cop: None,
            box_number: None,
        }
    }
}

impl DraftLine {
    pub fn for_reference(reference_id: RecordId, quantity: i64) -> Self {
        Self {
            reference_id: Some(reference_id),
            quantity,
            ..Default::default()
        }
    }

    /// Storage fields for this line; fails when it has no reference yet.
    pub fn to_fields(&self, quotation_id: RecordId) -> Result<LineFields, ValidationError> {
        let reference_id = self
            .reference_id
            .ok_or_else(|| ValidationError::new("referencia_id", "Select a reference"))?;
        Ok(LineFields {
            quotation_id,
            reference_id,
            quantity: self.quantity,
            price_override_cop: self.price_override_cop,
            box_number: self.box_number,
        })
    }
}

impl From<&QuotationLine> for DraftLine {
    fn from(line: &QuotationLine) -> Self {
        Self {
            id: Some(line.id),
            reference_id: Some(line.fields.reference_id),
            quantity: line.fields.quantity,
            price_override_cop: line.fields.price_override_cop,
            box_number: line.fields.box_number,
        }
    }
}

impl From<&JoinedLine> for DraftLine {
    fn from(joined: &JoinedLine) -> Self {
        Self::from(&joined.line)
    }
}

impl PackableLine for DraftLine {
    fn reference_id(&self) -> Option<RecordId> {
        self.reference_id
    }

    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn box_number(&self) -> Option<u32> {
        self.box_number
    }

    fn set_box_number(&mut self, box_number: Option<u32>) {
        self.box_number = box_number;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorAction {
    AddLine,
    RemoveLine { index: usize },
    SetReference { index: usize, reference_id: RecordId },
    SetQuantity { index: usize, quantity: i64 },
    SetPriceOverride { index: usize, price_cop: Option<f64> },
    SetBoxNumber { index: usize, box_number: Option<i64> },
    AppendImported { lines: Vec<DraftLine> },
    AutoPack,
    SortByBox,
}

pub fn reduce(
    lines: &[DraftLine],
    action: EditorAction,
    catalog: &Catalog,
) -> Result<Vec<DraftLine>, ValidationError> {
    let mut next = lines.to_vec();

    match action {
        EditorAction::AddLine => next.push(DraftLine::default()),
        EditorAction::RemoveLine { index } => {
            check_index(&next, index)?;
            next.remove(index);
        }
        EditorAction::SetReference {
            index,
            reference_id,
        } => {
            check_index(&next, index)?;
            if catalog.get(reference_id).is_none() {
                return Err(ValidationError::new(
                    "referencia_id",
                    format!("Reference {reference_id} is not in the catalog"),
                ));
            }
            next[index].reference_id = Some(reference_id);
        }
        EditorAction::SetQuantity { index, quantity } => {
            check_index(&next, index)?;
            validate_quantity(quantity)?;
            next[index].quantity = quantity;
        }
        EditorAction::SetPriceOverride { index, price_cop } => {
            check_index(&next, index)?;
            validate_override(price_cop)?;
            next[index].price_override_cop = price_cop;
        }
        EditorAction::SetBoxNumber { index, box_number } => {
            check_index(&next, index)?;
            next[index].box_number = box_number.map(validate_box_number).transpose()?;
        }
        EditorAction::AppendImported { lines: imported } => {
            for line in &imported {
                validate_line(line, catalog)?;
            }
            next.extend(imported);
        }
        EditorAction::AutoPack => next = allocate_boxes(&next, catalog).lines,
        EditorAction::SortByBox => next = sort_by_box(&next),
    }

    Ok(next)
}

/// Full check of a line about to be saved.
pub fn validate_line(line: &DraftLine, catalog: &Catalog) -> Result<(), ValidationError> {
    match line.reference_id {
        None => return Err(ValidationError::new("referencia_id", "Select a reference")),
        Some(id) if catalog.get(id).is_none() => {
            return Err(ValidationError::new(
                "referencia_id",
                format!("Reference {id} is not in the catalog"),
            ))
        }
        Some(_) => {}
    }
    validate_quantity(line.quantity)?;
    validate_override(line.price_override_cop)?;
    if let Some(box_number) = line.box_number {
        validate_box_number(i64::from(box_number))?;
    }
    Ok(())
}

fn check_index(lines: &[DraftLine], index: usize) -> Result<(), ValidationError> {
    if index < lines.len() {
        Ok(())
    } else {
        Err(ValidationError::new(
            "line",
            format!("No line at position {index}"),
        ))
    }
}

fn validate_quantity(quantity: i64) -> Result<(), ValidationError> {
    if quantity >= 1 {
        Ok(())
    } else {
        Err(ValidationError::new("cantidad", "Quantity must be at least 1"))
    }
}

fn validate_override(price: Option<f64>) -> Result<(), ValidationError> {
    match price {
        Some(price) if !price.is_finite() || price < 0.0 => Err(ValidationError::new(
            "precio_modificado_cop",
            "Price override must be zero or more",
        )),
        _ => Ok(()),
    }
}

fn validate_box_number(box_number: i64) -> Result<u32, ValidationError> {
    u32::try_from(box_number)
        .ok()
        .filter(|number| *number >= 1)
        .ok_or_else(|| ValidationError::new("numero_caja", "Box number must be at least 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::CatalogReference;

    fn catalog() -> Catalog {
        Catalog::new([
            CatalogReference {
                id: 1,
                name: "AA-050A".to_string(),
                family: Some("BOXFAM".to_string()),
                box_capacity: Some(12),
                ..Default::default()
            },
            CatalogReference {
                id: 2,
                name: "AA-070".to_string(),
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_reduce_never_mutates_input() {
        let catalog = catalog();
        let lines = vec![DraftLine::for_reference(1, 5)];

        let next = reduce(
            &lines,
            EditorAction::SetQuantity {
                index: 0,
                quantity: 9,
            },
            &catalog,
        )
        .unwrap();

        assert_eq!(lines[0].quantity, 5);
        assert_eq!(next[0].quantity, 9);
    }

    #[test]
    fn test_add_set_and_remove_lines() {
        let catalog = catalog();
        let lines = reduce(&[], EditorAction::AddLine, &catalog).unwrap();
        assert_eq!(lines, vec![DraftLine::default()]);

        let lines = reduce(
            &lines,
            EditorAction::SetReference {
                index: 0,
                reference_id: 2,
            },
            &catalog,
        )
        .unwrap();
        assert_eq!(lines[0].reference_id, Some(2));

        let lines = reduce(&lines, EditorAction::RemoveLine { index: 0 }, &catalog).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_invalid_edits_are_rejected_with_field() {
        let catalog = catalog();
        let lines = vec![DraftLine::for_reference(1, 5)];

        let cases = [
            (EditorAction::SetQuantity { index: 0, quantity: 0 }, "cantidad"),
            (
                EditorAction::SetPriceOverride {
                    index: 0,
                    price_cop: Some(-1.0),
                },
                "precio_modificado_cop",
            ),
            (
                EditorAction::SetBoxNumber {
                    index: 0,
                    box_number: Some(0),
                },
                "numero_caja",
            ),
            (
                EditorAction::SetReference {
                    index: 0,
                    reference_id: 77,
                },
                "referencia_id",
            ),
            (EditorAction::RemoveLine { index: 3 }, "line"),
        ];

        for (action, field) in cases {
            let err = reduce(&lines, action, &catalog).unwrap_err();
            assert_eq!(err.field, field);
        }
    }

    #[test]
    fn test_zero_override_is_allowed() {
        let catalog = catalog();
        let lines = vec![DraftLine::for_reference(1, 5)];

        let next = reduce(
            &lines,
            EditorAction::SetPriceOverride {
                index: 0,
                price_cop: Some(0.0),
            },
            &catalog,
        )
        .unwrap();

        assert_eq!(next[0].price_override_cop, Some(0.0));
    }

    #[test]
    fn test_auto_pack_then_sort() {
        let catalog = catalog();
        let lines = vec![
            DraftLine::for_reference(2, 1),
            DraftLine::for_reference(1, 5),
            DraftLine::for_reference(1, 10),
        ];

        let packed = reduce(&lines, EditorAction::AutoPack, &catalog).unwrap();
        let boxes: Vec<Option<u32>> = packed.iter().map(|line| line.box_number).collect();
        assert_eq!(boxes, vec![Some(1), Some(2), Some(3)]);

        let mut shuffled = packed.clone();
        shuffled.reverse();
        let sorted = reduce(&shuffled, EditorAction::SortByBox, &catalog).unwrap();
        assert_eq!(sorted, packed);
    }

    #[test]
    fn test_append_imported_validates_every_line() {
        let catalog = catalog();
        let good = vec![DraftLine::for_reference(1, 10), DraftLine::for_reference(2, 5)];
        let next = reduce(&[], EditorAction::AppendImported { lines: good }, &catalog).unwrap();
        assert_eq!(next.len(), 2);

        let bad = vec![DraftLine::for_reference(1, 10), DraftLine::for_reference(1, 0)];
        let err = reduce(&next, EditorAction::AppendImported { lines: bad }, &catalog).unwrap_err();
        assert_eq!(err.field, "cantidad");
    }

    #[test]
    fn test_draft_to_fields_requires_reference() {
        assert!(DraftLine::default().to_fields(1).is_err());
        let fields = DraftLine::for_reference(2, 3).to_fields(9).unwrap();
        assert_eq!(fields.quotation_id, 9);
        assert_eq!(fields.reference_id, 2);
    }
}
