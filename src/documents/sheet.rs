use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Image, Workbook, Worksheet, XlsxError};

use super::assets::DocumentAssets;
use super::layout::{Align, Cell, CellStyle, CellValue, ProformaLayout, Table, MONEY_FORMAT, TOTAL_FILL};
use super::{DocumentFormat, ProformaRenderer, RenderError};

const FONT: &str = "Arial";
const COLUMN_WIDTHS: [f64; 6] = [14.0, 18.0, 50.0, 14.0, 18.0, 18.0];
const LAST_COLUMN: u16 = 5;

pub struct SheetRenderer;

impl ProformaRenderer for SheetRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Xlsx
    }

    fn render(&self, layout: &ProformaLayout, assets: &DocumentAssets) -> Result<Vec<u8>, RenderError> {
        export_to_xlsx(layout, assets).map_err(|e| RenderError::Sheet(e.to_string()))
    }
}

pub fn export_to_xlsx(layout: &ProformaLayout, assets: &DocumentAssets) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Proforma")?;

    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    if let Some(logo) = &assets.logo {
        let image = Image::new_from_buffer(&logo.png)?.set_scale_to_size(150, 57, true);
        worksheet.insert_image(0, 0, &image)?;
    }

    let mut row: u32 = 3;
    let title = base_format().set_bold().set_font_size(18).set_align(FormatAlign::Center);
    worksheet.merge_range(row, 0, row, LAST_COLUMN, &layout.title, &title)?;
    row += 2;

    let bold = base_format().set_bold();
    let plain = base_format();
    for (label, value) in [("PROFORMA N°:", &layout.number), ("FECHA / DATE:", &layout.date)] {
        worksheet.write_string_with_format(row, 0, label, &bold)?;
        worksheet.write_string_with_format(row, 1, value.as_str(), &plain)?;
        row += 1;
    }
    row += 1;

    let section = base_format().set_bold().set_font_size(12);
    for party in [&layout.seller, &layout.buyer] {
        worksheet.write_string_with_format(row, 0, &party.title, &section)?;
        row += 1;
        for (label, value) in &party.fields {
            worksheet.merge_range(row, 0, row, 1, label, &plain)?;
            worksheet.merge_range(row, 2, row, LAST_COLUMN, value, &plain)?;
            row += 1;
        }
        row += 1;
    }

    row = write_table(worksheet, row, &layout.transport)?;
    row += 1;
    row = write_table(worksheet, row, &layout.items)?;
    row += 1;

    for line in &layout.totals {
        let mut label = base_format().set_bold().set_align(FormatAlign::Right);
        let mut amount = base_format().set_num_format(MONEY_FORMAT);
        if line.emphasis {
            label = label.set_font_size(12);
            amount = amount.set_bold().set_font_size(12);
            if let Some(fill) = parse_color(TOTAL_FILL) {
                amount = amount.set_background_color(fill);
            }
        }
        worksheet.write_string_with_format(row, LAST_COLUMN - 1, &line.label, &label)?;
        worksheet.write_number_with_format(row, LAST_COLUMN, line.amount.as_f64(), &amount)?;
        row += 1;
    }
    row += 1;

    worksheet.write_string_with_format(row, 0, &layout.observations_title, &section)?;
    row += 1;
    for line in &layout.observations {
        worksheet.write_string_with_format(row, 0, line, &plain)?;
        row += 1;
    }

    workbook.save_to_buffer()
}

fn write_table(worksheet: &mut Worksheet, mut row: u32, table: &Table) -> Result<u32, XlsxError> {
    for (col, cell) in table.header.iter().enumerate() {
        write_cell(worksheet, row, col as u16, cell)?;
    }
    worksheet.set_row_height(row, 30)?;
    row += 1;

    for cells in &table.rows {
        for (col, cell) in cells.iter().enumerate() {
            write_cell(worksheet, row, col as u16, cell)?;
        }
        row += 1;
    }
    Ok(row)
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    let format = apply_style_to_format(base_format(), &cell.style);
    match &cell.value {
        CellValue::Text(text) => {
            worksheet.write_string_with_format(row, col, text, &format)?;
        }
        CellValue::Integer(value) => {
            worksheet.write_number_with_format(row, col, *value as f64, &format)?;
        }
        CellValue::Money(amount) => {
            let format = format.set_num_format(MONEY_FORMAT);
            worksheet.write_number_with_format(row, col, amount.as_f64(), &format)?;
        }
        CellValue::Empty => {
            worksheet.write_blank(row, col, &format)?;
        }
    }
    Ok(())
}

fn base_format() -> Format {
    Format::new().set_font_name(FONT)
}

fn apply_style_to_format(mut format: Format, style: &CellStyle) -> Format {
    if let Some(ref bg) = style.background {
        if let Some(color) = parse_color(bg) {
            format = format.set_background_color(color);
        }
    }
    if let Some(ref fg) = style.color {
        if let Some(color) = parse_color(fg) {
            format = format.set_font_color(color);
        }
    }
    if style.bold {
        format = format.set_bold();
    }
    format = match style.align {
        Align::Center => format.set_align(FormatAlign::Center),
        Align::Right => format.set_align(FormatAlign::Right),
        Align::Left => format.set_align(FormatAlign::Left),
    };
    format = format.set_align(FormatAlign::VerticalCenter);
    if let Some(size) = style.font_size {
        format = format.set_font_size(size);
    }
    if style.wrap {
        format = format.set_text_wrap();
    }
    if style.border {
        format = format.set_border(FormatBorder::Thin);
    }
    format
}

fn parse_color(color_str: &str) -> Option<Color> {
    let hex = color_str.trim_start_matches('#');
    if hex.len() == 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Color::RGB(
            ((r as u32) << 16) | ((g as u32) << 8) | (b as u32),
        ))
    } else {
        None
    }
}
