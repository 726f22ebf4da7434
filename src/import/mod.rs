//! Bulk match of an uploaded table (code, quantity) against the catalog,
//! producing quotation-line candidates.

pub mod template;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::core::shared::{Catalog, RecordId};
use crate::quotes::DraftLine;
use crate::store::QuotationStore;

pub use template::{sample_template, TEMPLATE_FILENAME};

const CODE_HEADERS: [&str; 4] = ["CODIGO", "CÓDIGO", "CODE", "REFERENCIA"];
const QUANTITY_HEADERS: [&str; 4] = ["CANTIDAD", "QUANTITY", "QTY", "CANT"];

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("No se encontró la columna {0} en el archivo")]
    MissingColumn(&'static str),
    #[error("El archivo está vacío o no tiene hojas")]
    Empty,
    #[error("Failed to parse file: {0}")]
    Parse(String),
    #[error("Unsupported import format: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Xlsx,
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl std::str::FromStr for TableFormat {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            other => Err(ImportError::Unsupported(other.to_string())),
        }
    }
}

/// Raw quantity cell as read from the file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawQuantity {
    Number(f64),
    Text(String),
    Missing,
}

impl RawQuantity {
    /// Whole number above zero, or `None`.
    pub fn parse(&self) -> Option<i64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(text) => {
                let text = text.trim();
                match text.parse::<i64>() {
                    Ok(n) => return (n > 0).then_some(n),
                    Err(_) => text.parse::<f64>().ok()?,
                }
            }
            Self::Missing => return None,
        };
        if value.is_finite() && value.fract() == 0.0 && value >= 1.0 && value <= i64::MAX as f64 {
            Some(value as i64)
        } else {
            None
        }
    }
}

/// One data row; `row` is the 1-based spreadsheet row (header is row 1).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row: usize,
    pub code: String,
    pub quantity: RawQuantity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedProduct {
    pub row: usize,
    pub code: String,
    #[serde(rename = "referencia_id")]
    pub reference_id: RecordId,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub products: Vec<ImportedProduct>,
    /// `"<code> (Fila <n>)"` for each code with no catalog match.
    pub unmatched: Vec<String>,
    /// Matched rows whose quantity was rejected.
    pub rejected: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportOutcome {
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            products: Vec::new(),
            unmatched: Vec::new(),
            rejected: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// Line candidates with empty price override and box number.
    pub fn draft_lines(&self) -> Vec<DraftLine> {
        self.products
            .iter()
            .map(|product| DraftLine::for_reference(product.reference_id, product.quantity))
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut message = format!("{} producto(s) importado(s) correctamente", self.products.len());
        if !self.unmatched.is_empty() {
            message.push_str(&format!(
                "; {} referencia(s) no encontrada(s): {}",
                self.unmatched.len(),
                self.unmatched.join(", ")
            ));
        }
        if !self.rejected.is_empty() {
            message.push_str(&format!("; {}", self.rejected.join("; ")));
        }
        message
    }
}

/// Matches parsed rows against the catalog by exact, case-insensitive name.
pub fn match_rows(rows: &[RawRow], catalog: &Catalog) -> ImportOutcome {
    let mut products = Vec::new();
    let mut unmatched = Vec::new();
    let mut rejected = Vec::new();

    for raw in rows {
        let code = raw.code.trim();
        if code.is_empty() {
            continue;
        }

        let Some(reference) = catalog.find_by_name(code) else {
            unmatched.push(format!("{code} (Fila {})", raw.row));
            continue;
        };

        match raw.quantity.parse() {
            Some(quantity) => products.push(ImportedProduct {
                row: raw.row,
                code: code.to_string(),
                reference_id: reference.id,
                quantity,
            }),
            None => rejected.push(format!("Fila {}: Cantidad inválida para {code}", raw.row)),
        }
    }

    let success = !products.is_empty();
    ImportOutcome {
        success,
        error: (!success).then(|| "No se pudo importar ningún producto válido".to_string()),
        products,
        unmatched,
        rejected,
    }
}

/// Reads the code and quantity columns out of a table file.
pub fn read_rows(bytes: &[u8], format: TableFormat) -> Result<Vec<RawRow>, ImportError> {
    match format {
        TableFormat::Csv => read_csv(bytes),
        #[cfg(feature = "sheet")]
        TableFormat::Xlsx => read_xlsx(bytes),
        #[cfg(not(feature = "sheet"))]
        TableFormat::Xlsx => Err(ImportError::Unsupported("xlsx".to_string())),
    }
}

/// Parses and matches a file; every failure comes back inside the outcome.
pub fn import_table(bytes: &[u8], format: TableFormat, catalog: &Catalog) -> ImportOutcome {
    let rows = match read_rows(bytes, format) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(?format, error = %e, "Import file rejected");
            return ImportOutcome::failed(format!("Error al procesar archivo: {e}"));
        }
    };

    let outcome = match_rows(&rows, catalog);
    info!(
        rows = rows.len(),
        matched = outcome.products.len(),
        unmatched = outcome.unmatched.len(),
        rejected = outcome.rejected.len(),
        "Import matched against catalog"
    );
    outcome
}

/// Loads the current catalog from the store and imports against it.
pub async fn import_from_store(store: &dyn QuotationStore, bytes: &[u8], format: TableFormat) -> ImportOutcome {
    match store.catalog().await {
        Ok(references) => import_table(bytes, format, &Catalog::new(references)),
        Err(e) => ImportOutcome::failed(e),
    }
}

fn column_index(headers: &[String], synonyms: &[&str], name: &'static str) -> Result<usize, ImportError> {
    headers
        .iter()
        .position(|header| {
            let header = header.trim().to_uppercase();
            synonyms.iter().any(|synonym| *synonym == header)
        })
        .ok_or(ImportError::MissingColumn(name))
}

fn header_columns(headers: &[String]) -> Result<(usize, usize), ImportError> {
    Ok((
        column_index(headers, &CODE_HEADERS, "CODIGO")?,
        column_index(headers, &QUANTITY_HEADERS, "CANTIDAD")?,
    ))
}

fn read_csv(bytes: &[u8]) -> Result<Vec<RawRow>, ImportError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| ImportError::Parse(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(ImportError::Empty),
    };
    let (code_col, quantity_col) = header_columns(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|e| ImportError::Parse(e.to_string()))?;
        let quantity = match record.get(quantity_col).map(str::trim) {
            None | Some("") => RawQuantity::Missing,
            Some(text) => RawQuantity::Text(text.to_string()),
        };
        rows.push(RawRow {
            row: index + 2,
            code: record.get(code_col).unwrap_or_default().trim().to_string(),
            quantity,
        });
    }
    Ok(rows)
}

#[cfg(feature = "sheet")]
fn read_xlsx(bytes: &[u8]) -> Result<Vec<RawRow>, ImportError> {
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

    let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes))
        .map_err(|e| ImportError::Parse(format!("Cannot open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::Empty)?
        .map_err(|e| ImportError::Parse(format!("Cannot read sheet: {e}")))?;

    // The range begins at the first used cell; keep spreadsheet coordinates.
    let (first_row, first_col) = range.start().ok_or(ImportError::Empty)?;
    if first_row != 0 {
        return Err(ImportError::MissingColumn("CODIGO"));
    }

    let mut sheet_rows = range.rows();
    let header_row = sheet_rows.next().ok_or(ImportError::Empty)?;
    let headers: Vec<String> = (0..first_col as usize)
        .map(|_| String::new())
        .chain(header_row.iter().map(|cell| cell.to_string()))
        .collect();
    let (code_col, quantity_col) = header_columns(&headers)?;

    let cell = |row: &[Data], col: usize| row.get(col.checked_sub(first_col as usize)?).cloned();

    let mut rows = Vec::new();
    for (index, row) in sheet_rows.enumerate() {
        let code = match cell(row, code_col) {
            Some(Data::Empty) | None => String::new(),
            Some(value) => value.to_string().trim().to_string(),
        };
        let quantity = match cell(row, quantity_col) {
            Some(Data::Float(n)) => RawQuantity::Number(n),
            Some(Data::Int(n)) => RawQuantity::Number(n as f64),
            Some(Data::String(text)) => RawQuantity::Text(text),
            Some(Data::Empty) | None => RawQuantity::Missing,
            Some(other) => RawQuantity::Text(other.to_string()),
        };
        rows.push(RawRow {
            row: index + 2,
            code,
            quantity,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::CatalogReference;

    fn catalog() -> Catalog {
        Catalog::new(["AA-050A", "AA-070"].into_iter().enumerate().map(|(i, name)| CatalogReference {
            id: 10 + i as RecordId,
            name: name.to_string(),
            description: None,
            family: None,
            tariff_code: None,
            price_cop: Some(1000.0),
            unit_weight: None,
            box_capacity: None,
            code: None,
        }))
    }

    fn row(row: usize, code: &str, quantity: RawQuantity) -> RawRow {
        RawRow {
            row,
            code: code.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_match_reports_unmatched_codes_with_row() {
        let rows = vec![
            row(2, "AA-050A", RawQuantity::Number(10.0)),
            row(3, "ZZ-999", RawQuantity::Number(5.0)),
        ];

        let outcome = match_rows(&rows, &catalog());

        assert!(outcome.success);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].reference_id, 10);
        assert_eq!(outcome.products[0].quantity, 10);
        assert_eq!(outcome.unmatched, vec!["ZZ-999 (Fila 3)"]);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_match_is_case_insensitive_and_skips_blank_codes() {
        let rows = vec![
            row(2, "  aa-070 ", RawQuantity::Text("4".to_string())),
            row(3, "", RawQuantity::Number(1.0)),
        ];

        let outcome = match_rows(&rows, &catalog());

        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].reference_id, 11);
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn test_invalid_quantities_are_rejected_per_row() {
        let rows = vec![
            row(2, "AA-050A", RawQuantity::Number(0.0)),
            row(3, "AA-050A", RawQuantity::Text("abc".to_string())),
            row(4, "AA-070", RawQuantity::Number(2.5)),
            row(5, "AA-070", RawQuantity::Missing),
        ];

        let outcome = match_rows(&rows, &catalog());

        assert!(!outcome.success);
        assert_eq!(outcome.rejected.len(), 4);
        assert_eq!(outcome.rejected[0], "Fila 2: Cantidad inválida para AA-050A");
        assert_eq!(outcome.error.as_deref(), Some("No se pudo importar ningún producto válido"));
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(RawQuantity::Text("10".to_string()).parse(), Some(10));
        assert_eq!(RawQuantity::Text(" 10.0 ".to_string()).parse(), Some(10));
        assert_eq!(RawQuantity::Number(10.0).parse(), Some(10));
        assert_eq!(RawQuantity::Text("-3".to_string()).parse(), None);
        assert_eq!(RawQuantity::Number(f64::NAN).parse(), None);
    }

    #[test]
    fn test_csv_with_header_synonyms() {
        let csv = "\u{feff}Referencia,Qty\n".to_string()
            + "AA-050A,10\n"
            + ",7\n"
            + "ZZ-999,5\n";

        let rows = read_rows(csv.as_bytes(), TableFormat::Csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].row, 4);

        let outcome = import_table(csv.as_bytes(), TableFormat::Csv, &catalog());
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.unmatched, vec!["ZZ-999 (Fila 4)"]);
        assert_eq!(outcome.draft_lines(), vec![DraftLine::for_reference(10, 10)]);
    }

    #[test]
    fn test_missing_column_fails_the_outcome() {
        let outcome = import_table(b"CODIGO,PRECIO\nAA-050A,10\n", TableFormat::Csv, &catalog());

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("CANTIDAD"));
    }

    #[cfg(feature = "sheet")]
    #[test]
    fn test_xlsx_template_round_trip() {
        let bytes = sample_template().unwrap();
        let rows = read_rows(&bytes, TableFormat::Xlsx).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], row(2, "AA-050A", RawQuantity::Number(10.0)));

        let outcome = import_table(&bytes, TableFormat::Xlsx, &catalog());
        assert_eq!(outcome.products.len(), 2);
        assert_eq!(outcome.unmatched, vec!["AA-050B (Fila 3)"]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TableFormat::from_path(Path::new("lista.XLSX")).unwrap(), TableFormat::Xlsx);
        assert_eq!(TableFormat::from_path(Path::new("lista.csv")).unwrap(), TableFormat::Csv);
        assert!(TableFormat::from_path(Path::new("lista.ods")).is_err());
    }
}
