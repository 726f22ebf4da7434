//! Text fragments shared by every proforma format.

use chrono::{DateTime, Utc};

use crate::core::shared::{CatalogReference, CompanyProfile};

pub const NO_DESCRIPTION: &str = "Sin descripción";
pub const NOT_AVAILABLE: &str = "N/A";

/// `code - name - description`, skipping empty parts.
pub fn composite_description(code: &str, name: &str, description: &str) -> String {
    let parts: Vec<&str> = [code, name, description]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        parts.join(" - ")
    }
}

pub fn reference_description(reference: &CatalogReference) -> String {
    composite_description(
        reference.code.as_deref().unwrap_or(""),
        &reference.name,
        reference.description.as_deref().unwrap_or(""),
    )
}

/// Custom observations split into lines, or the payment and banking
/// boilerplate when none were written.
pub fn observation_lines(custom: Option<&str>, company: &CompanyProfile) -> Vec<String> {
    if let Some(custom) = custom.filter(|text| !text.trim().is_empty()) {
        return custom.lines().map(|line| line.trim_end().to_string()).collect();
    }

    let mut lines = vec![
        "FORMA DE PAGO / PAYMENT METHOD: Bank transfer".to_string(),
        "DATOS BANCO / BANK INFORMATION:".to_string(),
        format!("  Banco: {}", or_na(company.bank_name.as_deref())),
        format!("  Cuenta: {}", or_na(company.bank_account.as_deref())),
        format!("  SWIFT: {}", or_na(company.bank_swift.as_deref())),
    ];
    if let Some(aba) = non_empty(company.bank_aba.as_deref()) {
        lines.push(format!("  ABA/Routing: {aba}"));
    }
    lines.extend(
        [
            "FLETE / FREIGHT:",
            "SEGURO / INSURANCE:",
            "PUERTO DE SALIDA / PORT OF DEPARTURE:",
            "PUERTO DE LLEGADA / PORT OF ARRIVAL:",
        ]
        .map(str::to_string),
    );
    lines
}

/// `L x W x H`, only when all three dimensions are known.
pub fn dimension_string(l: Option<f64>, w: Option<f64>, h: Option<f64>) -> String {
    match (positive(l), positive(w), positive(h)) {
        (Some(l), Some(w), Some(h)) => format!("{l} x {w} x {h}"),
        _ => String::new(),
    }
}

/// Plain number without trailing zeros (`12.5`, `120`).
pub fn format_number(value: Option<f64>) -> String {
    value
        .filter(|value| value.is_finite())
        .map(|value| value.to_string())
        .unwrap_or_default()
}

pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%d/%m/%Y").to_string()
}

pub fn or_na(value: Option<&str>) -> String {
    non_empty(value).unwrap_or(NOT_AVAILABLE).to_string()
}

pub fn or_blank(value: Option<&str>) -> String {
    non_empty(value).unwrap_or("").to_string()
}

/// Non-empty parts joined with `", "`.
pub fn join_place(city: Option<&str>, country: Option<&str>) -> String {
    [city, country]
        .into_iter()
        .filter_map(non_empty)
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite() && *value > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_composite_description() {
        assert_eq!(composite_description("A", "B", "C"), "A - B - C");
        assert_eq!(composite_description("", "B", ""), "B");
        assert_eq!(composite_description("A", "", "C"), "A - C");
        assert_eq!(composite_description("", "", ""), "Sin descripción");
        assert_eq!(composite_description("  ", "B", " "), "B");
    }

    #[test]
    fn test_default_observations_fill_missing_bank_fields() {
        let company = CompanyProfile {
            bank_name: Some("Banco de Bogotá".to_string()),
            bank_swift: Some("".to_string()),
            ..Default::default()
        };

        let lines = observation_lines(None, &company);

        assert_eq!(lines[0], "FORMA DE PAGO / PAYMENT METHOD: Bank transfer");
        assert_eq!(lines[2], "  Banco: Banco de Bogotá");
        assert_eq!(lines[3], "  Cuenta: N/A");
        assert_eq!(lines[4], "  SWIFT: N/A");
        assert_eq!(lines[5], "FLETE / FREIGHT:");
        assert_eq!(lines.len(), 9);
    }

    #[test]
    fn test_aba_line_only_when_present() {
        let company = CompanyProfile {
            bank_aba: Some("026009593".to_string()),
            ..Default::default()
        };
        let lines = observation_lines(Some("   "), &company);
        assert_eq!(lines[5], "  ABA/Routing: 026009593");
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_custom_observations_replace_boilerplate() {
        let lines = observation_lines(Some("Pago 50% anticipado\nEntrega 30 días"), &CompanyProfile::builtin());
        assert_eq!(lines, vec!["Pago 50% anticipado", "Entrega 30 días"]);
    }

    #[test]
    fn test_dimensions_need_all_three_values() {
        assert_eq!(dimension_string(Some(1.2), Some(0.8), Some(1.0)), "1.2 x 0.8 x 1");
        assert_eq!(dimension_string(Some(1.2), None, Some(1.0)), "");
    }

    #[test]
    fn test_small_formatters() {
        assert_eq!(format_number(Some(12.5)), "12.5");
        assert_eq!(format_number(Some(120.0)), "120");
        assert_eq!(format_number(None), "");
        assert_eq!(join_place(Some("Miami"), Some("USA")), "Miami, USA");
        assert_eq!(join_place(None, Some("USA")), "USA");
        let date = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
        assert_eq!(format_date(&date), "04/03/2025");
    }
}
