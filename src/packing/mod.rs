//! Box allocation: family-aware packing of quotation lines into numbered
//! boxes, plus the shipment totals derived from it.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::core::shared::{Catalog, LineFields, QuotationLine, RecordId};
use crate::pricing::round2;

/// A line the allocator can read and re-number.
pub trait PackableLine {
    fn reference_id(&self) -> Option<RecordId>;
    fn quantity(&self) -> i64;
    fn box_number(&self) -> Option<u32>;
    fn set_box_number(&mut self, box_number: Option<u32>);
}

impl PackableLine for LineFields {
    fn reference_id(&self) -> Option<RecordId> {
        Some(self.reference_id)
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

impl PackableLine for QuotationLine {
    fn reference_id(&self) -> Option<RecordId> {
        self.fields.reference_id()
    }

    fn quantity(&self) -> i64 {
        self.fields.quantity
    }

    fn box_number(&self) -> Option<u32> {
        self.fields.box_number
    }

    fn set_box_number(&mut self, box_number: Option<u32>) {
        self.fields.box_number = box_number;
    }
}

/// Portion of a line placed into one physical box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxPlacement {
    pub line_index: usize,
    pub box_number: u32,
    pub quantity: i64,
}

/// A line whose quantity ended up in more than one box. Only `last_box` is
/// persisted on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub line_index: usize,
    pub first_box: u32,
    pub last_box: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    MissingReference,
    NonPositiveQuantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line_index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ShipmentTotals {
    pub cargo_units: u32,
    pub total_weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Allocation<L> {
    pub lines: Vec<L>,
    pub placements: Vec<BoxPlacement>,
    pub spans: Vec<LineSpan>,
    pub skipped: Vec<SkippedLine>,
    pub boxes_opened: u32,
    pub totals: ShipmentTotals,
}

struct FamilyBucket {
    capacity: i64,
    filled: i64,
    active_box: u32,
}

/// Re-packs every line in its current order.
///
/// Lines of a family with a positive box capacity share boxes up to that
/// capacity (the capacity of the first reference seen for the family
/// applies); every other line gets a box of its own. A new box is only
/// opened when there is quantity left to place, so box numbers stay
/// contiguous from 1. Lines without a catalog match or with a
/// non-positive quantity keep their current box number.
pub fn allocate_boxes<L>(lines: &[L], catalog: &Catalog) -> Allocation<L>
where
    L: PackableLine + Clone,
{
    let mut packed: Vec<L> = lines.to_vec();
    let mut placements = Vec::new();
    let mut skipped = Vec::new();
    let mut buckets: HashMap<String, FamilyBucket> = HashMap::new();
    let mut next_box: u32 = 1;

    for (index, line) in packed.iter_mut().enumerate() {
        let Some(reference) = line.reference_id().and_then(|id| catalog.get(id)) else {
            warn!(
                line = index,
                reference_id = ?line.reference_id(),
                "Skipping line without catalog reference while packing"
            );
            skipped.push(SkippedLine {
                line_index: index,
                reason: SkipReason::MissingReference,
            });
            continue;
        };

        let mut remaining = line.quantity();
        if remaining <= 0 {
            warn!(line = index, quantity = remaining, "Skipping line with non-positive quantity while packing");
            skipped.push(SkippedLine {
                line_index: index,
                reason: SkipReason::NonPositiveQuantity,
            });
            continue;
        }

        let capacity = i64::from(reference.units_per_box());
        let family = reference.family_key().filter(|_| capacity > 0);

        let Some(family) = family else {
            let box_number = next_box;
            next_box += 1;
            line.set_box_number(Some(box_number));
            placements.push(BoxPlacement {
                line_index: index,
                box_number,
                quantity: remaining,
            });
            continue;
        };

        let bucket = buckets.entry(family.to_string()).or_insert_with(|| {
            debug!(family, capacity, box_number = next_box, "Opening family bucket");
            let bucket = FamilyBucket {
                capacity,
                filled: 0,
                active_box: next_box,
            };
            next_box += 1;
            bucket
        });

        while remaining > 0 {
            if bucket.filled >= bucket.capacity {
                bucket.active_box = next_box;
                bucket.filled = 0;
                next_box += 1;
            }
            let portion = remaining.min(bucket.capacity - bucket.filled);
            bucket.filled += portion;
            remaining -= portion;
            placements.push(BoxPlacement {
                line_index: index,
                box_number: bucket.active_box,
                quantity: portion,
            });
        }
        line.set_box_number(Some(bucket.active_box));
    }

    let spans = line_spans(&placements);
    for span in &spans {
        warn!(
            line = span.line_index,
            first_box = span.first_box,
            last_box = span.last_box,
            "Line spans several boxes; only the last box is recorded"
        );
    }

    let totals = shipment_totals(&packed, catalog);
    Allocation {
        lines: packed,
        placements,
        spans,
        skipped,
        boxes_opened: next_box - 1,
        totals,
    }
}

fn line_spans(placements: &[BoxPlacement]) -> Vec<LineSpan> {
    let mut spans: Vec<LineSpan> = Vec::new();
    for placement in placements {
        match spans.last_mut() {
            Some(span) if span.line_index == placement.line_index => {
                span.last_box = placement.box_number;
            }
            _ => spans.push(LineSpan {
                line_index: placement.line_index,
                first_box: placement.box_number,
                last_box: placement.box_number,
            }),
        }
    }
    spans.retain(|span| span.first_box != span.last_box);
    spans
}

/// Distinct assigned boxes, and the catalog weight of every valid line.
pub fn shipment_totals<L: PackableLine>(lines: &[L], catalog: &Catalog) -> ShipmentTotals {
    let boxes: BTreeSet<u32> = lines.iter().filter_map(|line| line.box_number()).collect();

    let weight: f64 = lines
        .iter()
        .filter(|line| line.quantity() > 0)
        .filter_map(|line| {
            let reference = line.reference_id().and_then(|id| catalog.get(id))?;
            Some(reference.unit_weight.unwrap_or(0.0) * line.quantity() as f64)
        })
        .sum();

    ShipmentTotals {
        cargo_units: u32::try_from(boxes.len()).unwrap_or(u32::MAX),
        total_weight: round2(weight),
    }
}

/// Ascending box number with unassigned boxes last. Stable.
pub fn sort_by_box<L: PackableLine + Clone>(lines: &[L]) -> Vec<L> {
    let mut sorted = lines.to_vec();
    sorted.sort_by_key(|line| box_sort_key(line.box_number()));
    sorted
}

pub fn box_sort_key(box_number: Option<u32>) -> (bool, u32) {
    match box_number {
        Some(number) => (false, number),
        None => (true, 0),
    }
}
