//! Declarative proforma layout: typed cells with style tags, built once
//! from the assembled document and consumed by every format writer.

use serde::Serialize;

use super::text::{
    dimension_string, format_date, format_number, join_place, observation_lines, or_blank, or_na,
    reference_description, NOT_AVAILABLE,
};
use crate::pricing::Money;
use crate::quotes::ProformaDocument;

pub const HEADER_FILL: &str = "#4472C4";
pub const HEADER_TEXT: &str = "#FFFFFF";
pub const TOTAL_FILL: &str = "#FFE599";
pub const MONEY_FORMAT: &str = "$#,##0.00";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Money(Money),
    Empty,
}

impl CellValue {
    /// Text shown by formats that only write strings.
    pub fn display(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Money(amount) => amount.to_string(),
            Self::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CellStyle {
    pub bold: bool,
    pub align: Align,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    pub wrap: bool,
    pub border: bool,
}

impl CellStyle {
    pub fn header() -> Self {
        Self {
            bold: true,
            align: Align::Center,
            background: Some(HEADER_FILL.to_string()),
            color: Some(HEADER_TEXT.to_string()),
            wrap: true,
            border: true,
            ..Default::default()
        }
    }

    pub fn grid(align: Align) -> Self {
        Self {
            align,
            border: true,
            ..Default::default()
        }
    }

    pub fn wrapped(mut self) -> Self {
        self.wrap = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(value: CellValue, style: CellStyle) -> Self {
        Self { value, style }
    }

    pub fn header(text: &str) -> Self {
        Self::new(CellValue::Text(text.to_string()), CellStyle::header())
    }
}

/// Grid table; `widths` are relative column weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub widths: Vec<f64>,
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn columns(&self) -> usize {
        self.widths.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Party {
    pub title: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalLine {
    pub label: String,
    pub amount: Money,
    pub emphasis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProformaLayout {
    pub title: String,
    pub number: String,
    pub date: String,
    pub seller: Party,
    pub buyer: Party,
    pub transport: Table,
    pub items: Table,
    pub totals: Vec<TotalLine>,
    pub observations_title: String,
    pub observations: Vec<String>,
}

impl ProformaLayout {
    pub fn from_document(document: &ProformaDocument) -> Self {
        let header = &document.quotation.header;

        let transport = Table {
            widths: vec![1.0, 0.8, 1.4, 1.0, 1.0],
            header: [
                "MODO DE TRANSPORTE / MODE OF TRANSPORT",
                "INCOTERM",
                "DIMENSIONES / DIMENSIONS L x W x H (m)",
                "PESO NETO / NET WEIGHT (kg)",
                "UNIDADES DE CARGA / CARGO UNITS",
            ]
            .into_iter()
            .map(Cell::header)
            .collect(),
            rows: vec![[
                header.transport_mode.map(|mode| mode.label().to_string()).unwrap_or_default(),
                header.incoterm.map(|term| term.code().to_string()).unwrap_or_default(),
                dimension_string(header.dimension_l, header.dimension_w, header.dimension_h),
                format_number(header.total_weight),
                header.cargo_units.map(|units| units.to_string()).unwrap_or_default(),
            ]
            .into_iter()
            .map(|text| Cell::new(CellValue::Text(text), CellStyle::grid(Align::Center)))
            .collect()],
        };

        let items = Table {
            widths: vec![0.8, 1.1, 3.2, 0.9, 1.1, 1.1],
            header: [
                "# CAJA / BOX #",
                "POSICIÓN ARANCELARIA / HTS CODE",
                "DESCRIPCIÓN / DESCRIPTION",
                "CANTIDAD / UNITS",
                "PRECIO UNITARIO / UNIT PRICE (USD)",
                "TOTAL USD",
            ]
            .into_iter()
            .map(Cell::header)
            .collect(),
            rows: document
                .lines
                .iter()
                .map(|line| {
                    let box_cell = match line.box_number() {
                        Some(number) => CellValue::Integer(i64::from(number)),
                        None => CellValue::Empty,
                    };
                    vec![
                        Cell::new(box_cell, CellStyle::grid(Align::Center)),
                        Cell::new(
                            CellValue::Text(or_blank(line.reference.tariff_code.as_deref())),
                            CellStyle::grid(Align::Center),
                        ),
                        Cell::new(
                            CellValue::Text(reference_description(&line.reference)),
                            CellStyle::grid(Align::Left).wrapped(),
                        ),
                        Cell::new(CellValue::Integer(line.quantity()), CellStyle::grid(Align::Center)),
                        Cell::new(CellValue::Money(line.price.unit), CellStyle::grid(Align::Right)),
                        Cell::new(CellValue::Money(line.price.extended), CellStyle::grid(Align::Right)),
                    ]
                })
                .collect(),
        };

        Self {
            title: "PROFORMA".to_string(),
            number: document.proforma_number(),
            date: format_date(&document.quotation.created_at),
            seller: seller_party(document),
            buyer: buyer_party(document),
            transport,
            items,
            totals: vec![
                TotalLine {
                    label: "SUBTOTAL USD".to_string(),
                    amount: document.subtotal,
                    emphasis: false,
                },
                TotalLine {
                    label: "DESCUENTO / DISCOUNT".to_string(),
                    amount: document.discount,
                    emphasis: false,
                },
                TotalLine {
                    label: "TOTAL USD".to_string(),
                    amount: document.total,
                    emphasis: true,
                },
            ],
            observations_title: "OBSERVACIONES / OBSERVATIONS".to_string(),
            observations: observation_lines(header.observations.as_deref(), &document.company),
        }
    }

    /// Grand total as printed in the totals block.
    pub fn total(&self) -> Money {
        self.totals
            .iter()
            .find(|line| line.emphasis)
            .map(|line| line.amount)
            .unwrap_or_default()
    }
}

fn seller_party(document: &ProformaDocument) -> Party {
    let company = &document.company;
    let place = join_place(company.city.as_deref(), company.country.as_deref());
    Party {
        title: "EXPORTADOR / MANUFACTURER".to_string(),
        fields: vec![
            ("Empresa / Company Name".to_string(), or_na(company.name.as_deref())),
            ("NIT / NIF / VAT Num".to_string(), or_na(company.tax_id.as_deref())),
            ("Nombre / Name".to_string(), or_na(company.seller.as_deref())),
            ("Dirección / Address".to_string(), or_na(company.address.as_deref())),
            (
                "Ciudad / City / País / Country".to_string(),
                if place.is_empty() { NOT_AVAILABLE.to_string() } else { place },
            ),
            ("Teléfono / Phone".to_string(), or_na(company.phone.as_deref())),
        ],
    }
}

fn buyer_party(document: &ProformaDocument) -> Party {
    let client = &document.client;
    Party {
        title: "DESTINATARIO / CONSIGNEE".to_string(),
        fields: vec![
            ("Empresa / Company Name".to_string(), client.name.clone()),
            ("NIT / NIF / VAT Num".to_string(), or_blank(client.tax_id.as_deref())),
            (
                "Nombre / Name".to_string(),
                or_blank(document.quotation.header.contact_name.as_deref()),
            ),
            ("Dirección / Address".to_string(), or_blank(client.address.as_deref())),
            (
                "Ciudad / City / País / Country".to_string(),
                join_place(client.city.as_deref(), client.country.as_deref()),
            ),
            ("Teléfono / Phone".to_string(), or_blank(client.phone.as_deref())),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::CompanyProfile;
    use crate::quotes::assembly::fixtures::{joined, quotation, reference};
    use crate::quotes::build_document;

    fn layout(company: CompanyProfile) -> ProformaLayout {
        let lines = vec![
            joined(1, Some(reference(11, "AA-050A", 40000.0)), 10, Some(2)),
            joined(2, Some(reference(12, "AA-070", 8000.0)), 3, Some(1)),
        ];
        let document = build_document(quotation(1, Some(4000.0)), lines, Some(company), CompanyProfile::builtin())
            .unwrap();
        ProformaLayout::from_document(&document)
    }

    #[test]
    fn test_items_follow_document_order_with_typed_cells() {
        let layout = layout(CompanyProfile::builtin());

        assert_eq!(layout.items.rows.len(), 2);
        assert_eq!(layout.items.header.len(), layout.items.columns());
        let first = &layout.items.rows[0];
        assert_eq!(first[0].value, CellValue::Integer(1));
        assert_eq!(first[2].value, CellValue::Text("C12 - AA-070 - Descripción AA-070".to_string()));
        assert_eq!(first[4].value.display(), "$2.00");
        assert_eq!(first[5].value.display(), "$6.00");
        assert_eq!(layout.total().to_string(), "$106.00");
    }

    #[test]
    fn test_title_block_and_transport_row() {
        let layout = layout(CompanyProfile::builtin());

        assert_eq!(layout.number, "001");
        assert_eq!(layout.date, "04/03/2025");
        let transport: Vec<String> = layout.transport.rows[0].iter().map(|c| c.value.display()).collect();
        assert_eq!(transport, vec!["Marítimo", "FOB", "120 x 80 x 60", "12.5", "2"]);
    }

    #[test]
    fn test_missing_company_fields_render_not_available() {
        let layout = layout(CompanyProfile {
            name: Some("Exportadora Andina".to_string()),
            ..Default::default()
        });

        assert_eq!(layout.seller.fields[0].1, "Exportadora Andina");
        assert!(layout.seller.fields[1..].iter().all(|(_, value)| value == "N/A"));
        assert!(layout.observations.contains(&"  Cuenta: N/A".to_string()));
        assert_eq!(layout.buyer.fields[4].1, "Miami, USA");
    }
}
