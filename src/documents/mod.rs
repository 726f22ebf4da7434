//! Proforma generation: one layout, three format writers behind a common
//! renderer trait, and the export entry point that writes the file.

pub mod assets;
pub mod layout;
pub mod text;

#[cfg(feature = "pdf")]
pub mod pdf;
#[cfg(feature = "sheet")]
pub mod sheet;
#[cfg(feature = "docs")]
pub mod word;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::core::error::QuoteResult;
use crate::core::shared::state::AppState;
use crate::core::shared::RecordId;
use crate::quotes::{assemble, ProformaDocument};

pub use assets::{DocumentAssets, Logo};
pub use layout::ProformaLayout;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0} output is not enabled in this build")]
    Disabled(DocumentFormat),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("Spreadsheet error: {0}")]
    Sheet(String),
    #[error("Word document error: {0}")]
    Word(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Xlsx,
    Docx,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 3] = [Self::Pdf, Self::Xlsx, Self::Docx];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
            Self::Docx => "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "docx" | "word" => Ok(Self::Docx),
            _ => Err(format!("Unknown document format: {s}")),
        }
    }
}

/// Writes a laid-out proforma in one format.
pub trait ProformaRenderer: Send + Sync {
    fn format(&self) -> DocumentFormat;

    fn render(&self, layout: &ProformaLayout, assets: &DocumentAssets) -> Result<Vec<u8>, RenderError>;
}

pub fn renderer_for(format: DocumentFormat) -> Result<Box<dyn ProformaRenderer>, RenderError> {
    match format {
        #[cfg(feature = "pdf")]
        DocumentFormat::Pdf => Ok(Box::new(pdf::PdfRenderer)),
        #[cfg(feature = "sheet")]
        DocumentFormat::Xlsx => Ok(Box::new(sheet::SheetRenderer)),
        #[cfg(feature = "docs")]
        DocumentFormat::Docx => Ok(Box::new(word::WordRenderer)),
        #[allow(unreachable_patterns)]
        other => Err(RenderError::Disabled(other)),
    }
}

/// `Proforma_IP_<number>.<ext>`; characters unsafe in file names become `_`.
pub fn proforma_filename(number: &str, format: DocumentFormat) -> String {
    let safe: String = number
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("Proforma_IP_{safe}.{}", format.extension())
}

#[derive(Debug, Clone)]
pub struct RenderedProforma {
    pub filename: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

pub fn render_document(
    document: &ProformaDocument,
    format: DocumentFormat,
    assets: &DocumentAssets,
) -> Result<RenderedProforma, RenderError> {
    let layout = ProformaLayout::from_document(document);
    let renderer = renderer_for(format)?;
    let bytes = renderer.render(&layout, assets)?;
    Ok(RenderedProforma {
        filename: proforma_filename(&layout.number, format),
        format,
        bytes,
    })
}

/// Uniform result of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderOutcome {
    pub fn written(filename: String, path: PathBuf) -> Self {
        Self {
            success: true,
            filename: Some(filename),
            path: Some(path),
            error: None,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            filename: None,
            path: None,
            error: Some(error.to_string()),
        }
    }
}

/// Assembles and renders a proforma in memory.
pub async fn generate_proforma(
    state: &AppState,
    quotation_id: RecordId,
    user_id: &str,
    format: DocumentFormat,
) -> QuoteResult<RenderedProforma> {
    info!(quotation_id, %format, "Generating proforma");
    let document = assemble(state.store.as_ref(), quotation_id, user_id, state.fallback_company()).await?;
    let assets = state.assets.clone();

    let rendered = tokio::task::spawn_blocking(move || render_document(&document, format, &assets))
        .await
        .map_err(|e| RenderError::Io(std::io::Error::other(e.to_string())))??;

    info!(
        quotation_id,
        filename = %rendered.filename,
        bytes = rendered.bytes.len(),
        "Generated proforma"
    );
    Ok(rendered)
}

/// Generates a proforma and writes it into the configured output
/// directory. Never fails: errors come back inside the outcome and no
/// partial file is left behind.
pub async fn export_proforma(
    state: &AppState,
    quotation_id: RecordId,
    user_id: &str,
    format: DocumentFormat,
) -> RenderOutcome {
    let result = async {
        let rendered = generate_proforma(state, quotation_id, user_id, format).await?;
        let path = write_atomically(&state.config.documents.output_dir, &rendered.filename, &rendered.bytes).await?;
        QuoteResult::Ok((rendered.filename, path))
    }
    .await;

    match result {
        Ok((filename, path)) => {
            info!(quotation_id, path = %path.display(), "Proforma written");
            RenderOutcome::written(filename, path)
        }
        Err(e) => {
            error!(quotation_id, %format, error = %e, "Proforma generation failed");
            RenderOutcome::failed(e)
        }
    }
}

/// Writes to a hidden temporary file next to the target, then renames it
/// into place.
pub async fn write_atomically(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.partial"));

    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&temp, &target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing_accepts_aliases() {
        assert_eq!("PDF".parse::<DocumentFormat>().unwrap(), DocumentFormat::Pdf);
        assert_eq!("excel".parse::<DocumentFormat>().unwrap(), DocumentFormat::Xlsx);
        assert_eq!("word".parse::<DocumentFormat>().unwrap(), DocumentFormat::Docx);
        assert!("odt".parse::<DocumentFormat>().is_err());
    }

    #[test]
    fn test_filenames() {
        assert_eq!(proforma_filename("007", DocumentFormat::Pdf), "Proforma_IP_007.pdf");
        assert_eq!(proforma_filename("IP-2025-014", DocumentFormat::Xlsx), "Proforma_IP_IP-2025-014.xlsx");
        assert_eq!(proforma_filename("A/B 1", DocumentFormat::Docx), "Proforma_IP_A_B_1.docx");
    }

    #[test]
    fn test_outcome_serialises_uniform_shape() {
        let ok = serde_json::to_value(RenderOutcome::written(
            "Proforma_IP_001.pdf".to_string(),
            PathBuf::from("/tmp/Proforma_IP_001.pdf"),
        ))
        .unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["filename"], "Proforma_IP_001.pdf");
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(RenderOutcome::failed("boom")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "boom");
    }

    #[tokio::test]
    async fn test_write_atomically_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");

        let path = write_atomically(&out, "Proforma_IP_001.pdf", b"%PDF-1.5").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        let names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Proforma_IP_001.pdf"]);
    }
}
