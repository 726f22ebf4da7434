use super::ImportError;

pub const TEMPLATE_FILENAME: &str = "plantilla_productos_cotizacion.xlsx";

/// Downloadable import template: `CODIGO` / `CANTIDAD` plus sample rows.
#[cfg(feature = "sheet")]
pub fn sample_template() -> Result<Vec<u8>, ImportError> {
    use rust_xlsxwriter::{Color, Format, Workbook};

    const SAMPLE_ROWS: [(&str, f64); 3] = [("AA-050A", 10.0), ("AA-050B", 5.0), ("AA-070", 20.0)];

    let build = || -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Productos")?;
        worksheet.set_column_width(0, 20)?;
        worksheet.set_column_width(1, 10)?;

        let header = Format::new().set_bold().set_background_color(Color::RGB(0xD3D3D3));
        worksheet.write_string_with_format(0, 0, "CODIGO", &header)?;
        worksheet.write_string_with_format(0, 1, "CANTIDAD", &header)?;

        for (row, (code, quantity)) in SAMPLE_ROWS.iter().enumerate() {
            let row = row as u32 + 1;
            worksheet.write_string(row, 0, *code)?;
            worksheet.write_number(row, 1, *quantity)?;
        }

        workbook.save_to_buffer()
    };

    build().map_err(|e| ImportError::Parse(format!("Failed to build template: {e}")))
}

#[cfg(not(feature = "sheet"))]
pub fn sample_template() -> Result<Vec<u8>, ImportError> {
    Err(ImportError::Unsupported("xlsx".to_string()))
}
