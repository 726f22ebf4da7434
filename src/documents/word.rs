use docx_rs::{
    AlignmentType, Docx, Paragraph, Pic, Run, RunFonts, Shading, ShdType, Table, TableCell, TableRow,
    VAlignType, WidthType,
};
use std::io::Cursor;

use super::assets::DocumentAssets;
use super::layout::{Align, Cell, CellStyle, Party, ProformaLayout, Table as LayoutTable};
use super::{DocumentFormat, ProformaRenderer, RenderError};

const FONT: &str = "Arial";
/// Usable width of an A4 page with default margins, in twentieths of a point.
const CONTENT_WIDTH: usize = 9000;
const EMU_PER_PIXEL: u32 = 9525;
const LOGO_WIDTH_PX: u32 = 150;

pub struct WordRenderer;

impl ProformaRenderer for WordRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn render(&self, layout: &ProformaLayout, assets: &DocumentAssets) -> Result<Vec<u8>, RenderError> {
        let docx = build_docx(layout, assets);

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| RenderError::Word(format!("Failed to build DOCX: {e}")))?;
        Ok(buf.into_inner())
    }
}

fn build_docx(layout: &ProformaLayout, assets: &DocumentAssets) -> Docx {
    let mut docx = Docx::new();

    if let Some(logo) = &assets.logo {
        let height = logo.scaled_height(f64::from(LOGO_WIDTH_PX)).round() as u32;
        let pic = Pic::new(&logo.png).size(LOGO_WIDTH_PX * EMU_PER_PIXEL, height * EMU_PER_PIXEL);
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic)));
    }

    docx = docx.add_paragraph(
        Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(text_run(&layout.title).bold().size(36)),
    );
    docx = docx
        .add_paragraph(labelled("PROFORMA N°: ", &layout.number))
        .add_paragraph(labelled("FECHA / DATE: ", &layout.date))
        .add_paragraph(Paragraph::new());

    docx = docx.add_table(parties_table(&layout.seller, &layout.buyer));
    docx = docx.add_paragraph(Paragraph::new());

    docx = docx.add_table(grid_table(&layout.transport));
    docx = docx.add_paragraph(Paragraph::new());

    docx = docx.add_table(grid_table(&layout.items));
    docx = docx.add_paragraph(Paragraph::new());

    for line in &layout.totals {
        let size = if line.emphasis { 24 } else { 20 };
        docx = docx.add_paragraph(
            Paragraph::new()
                .align(AlignmentType::Right)
                .add_run(text_run(&format!("{}: ", line.label)).bold().size(size))
                .add_run(text_run(&line.amount.to_string()).bold().size(size)),
        );
    }
    docx = docx.add_paragraph(Paragraph::new());

    docx = docx.add_paragraph(Paragraph::new().add_run(text_run(&layout.observations_title).bold().size(22)));
    for line in &layout.observations {
        docx = docx.add_paragraph(Paragraph::new().add_run(text_run(line).size(18)));
    }

    docx
}

fn text_run(text: &str) -> Run {
    Run::new().add_text(text).fonts(RunFonts::new().ascii(FONT).hi_ansi(FONT))
}

fn labelled(label: &str, value: &str) -> Paragraph {
    Paragraph::new()
        .add_run(text_run(label).bold())
        .add_run(text_run(value))
}

/// Seller and buyer side by side, half the width each.
fn parties_table(seller: &Party, buyer: &Party) -> Table {
    let half = CONTENT_WIDTH / 2;
    let cell = |party: &Party| {
        let mut cell = TableCell::new()
            .width(half, WidthType::Dxa)
            .add_paragraph(Paragraph::new().add_run(text_run(&party.title).bold().size(22)));
        for (label, value) in &party.fields {
            cell = cell.add_paragraph(
                Paragraph::new()
                    .add_run(text_run(&format!("{label}: ")).bold().size(18))
                    .add_run(text_run(value).size(18)),
            );
        }
        cell
    };

    Table::new(vec![TableRow::new(vec![cell(seller), cell(buyer)])]).set_grid(vec![half, half])
}

fn grid_table(table: &LayoutTable) -> Table {
    let total: f64 = table.widths.iter().sum();
    let widths: Vec<usize> = table
        .widths
        .iter()
        .map(|w| (w / total * CONTENT_WIDTH as f64).round() as usize)
        .collect();

    let row = |cells: &[Cell]| {
        TableRow::new(
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| table_cell(cell, *width))
                .collect(),
        )
    };

    let mut rows = vec![row(&table.header)];
    rows.extend(table.rows.iter().map(|cells| row(cells)));
    Table::new(rows).set_grid(widths.clone())
}

fn table_cell(cell: &Cell, width: usize) -> TableCell {
    let mut cell_out = TableCell::new()
        .width(width, WidthType::Dxa)
        .vertical_align(VAlignType::Center)
        .add_paragraph(
            Paragraph::new()
                .align(alignment(&cell.style))
                .add_run(styled_run(&cell.value.display(), &cell.style)),
        );
    if let Some(fill) = &cell.style.background {
        cell_out = cell_out.shading(
            Shading::new()
                .shd_type(ShdType::Clear)
                .color("auto")
                .fill(fill.trim_start_matches('#')),
        );
    }
    cell_out
}

fn styled_run(text: &str, style: &CellStyle) -> Run {
    let size = style.font_size.map(|pt| (pt * 2.0).round() as usize).unwrap_or(18);
    let mut run = text_run(text).size(size);
    if style.bold {
        run = run.bold();
    }
    if let Some(color) = &style.color {
        run = run.color(color.trim_start_matches('#'));
    }
    run
}

fn alignment(style: &CellStyle) -> AlignmentType {
    match style.align {
        Align::Left => AlignmentType::Left,
        Align::Center => AlignmentType::Center,
        Align::Right => AlignmentType::Right,
    }
}
