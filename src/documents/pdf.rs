//! PDF writer: an A4 page canvas over `lopdf` using the standard Helvetica
//! fonts, with wrapped table cells and the item header repeated on every
//! page the table continues on.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;

use super::assets::{DocumentAssets, Logo};
use super::layout::{Align, Cell, ProformaLayout, Table, TOTAL_FILL};
use super::{DocumentFormat, ProformaRenderer, RenderError};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CELL_PADDING: f32 = 3.0;
const TABLE_FONT: f32 = 7.0;
const BODY_FONT: f32 = 8.0;
const LOGO_WIDTH: f32 = 110.0;
const LOGO_MAX_HEIGHT: f32 = 45.0;

pub struct PdfRenderer;

impl ProformaRenderer for PdfRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn render(&self, layout: &ProformaLayout, assets: &DocumentAssets) -> Result<Vec<u8>, RenderError> {
        let mut canvas = Canvas::new(assets.logo.as_deref().map(logo_size));
        draw_proforma(&mut canvas, layout);
        canvas.finish(assets.logo.as_deref())
    }
}

fn draw_proforma(canvas: &mut Canvas, layout: &ProformaLayout) {
    canvas.logo_at(MARGIN, 30.0);

    canvas.text_aligned(&layout.title, MARGIN, CONTENT_WIDTH, 55.0, 20.0, true, Align::Center);

    let box_width = 170.0;
    let box_x = PAGE_WIDTH - MARGIN - box_width;
    for (row, (label, value)) in [("PROFORMA N°:", &layout.number), ("FECHA / DATE:", &layout.date)]
        .into_iter()
        .enumerate()
    {
        let top = 30.0 + row as f32 * 16.0;
        canvas.stroke_rect(box_x, top, box_width, 16.0);
        canvas.text(label, box_x + 4.0, top + 11.0, BODY_FONT, true);
        canvas.text(value, box_x + 80.0, top + 11.0, BODY_FONT, false);
    }

    canvas.y = 100.0;
    draw_parties(canvas, layout);

    canvas.y += 10.0;
    draw_table(canvas, &layout.transport, false);

    canvas.y += 8.0;
    draw_table(canvas, &layout.items, true);

    draw_totals(canvas, layout);

    canvas.y += 14.0;
    canvas.ensure_space(24.0);
    canvas.text(&layout.observations_title, MARGIN, canvas.y, 9.0, true);
    canvas.y += 12.0;
    for line in &layout.observations {
        for wrapped in wrap_text(line, CONTENT_WIDTH, BODY_FONT, false) {
            canvas.ensure_space(10.0);
            canvas.text(&wrapped, MARGIN, canvas.y, BODY_FONT, false);
            canvas.y += 10.0;
        }
    }
}

fn draw_parties(canvas: &mut Canvas, layout: &ProformaLayout) {
    let column_width = CONTENT_WIDTH / 2.0 - 6.0;
    let label_width = 112.0;
    let start = canvas.y;
    let mut bottom = start;

    for (index, party) in [&layout.seller, &layout.buyer].into_iter().enumerate() {
        let x = MARGIN + index as f32 * (column_width + 12.0);
        let mut y = start;
        canvas.text(&party.title, x, y, 9.0, true);
        y += 12.0;
        for (label, value) in &party.fields {
            canvas.text(label, x, y, TABLE_FONT, true);
            let lines = wrap_text(value, column_width - label_width, TABLE_FONT, false);
            for line in &lines {
                canvas.text(line, x + label_width, y, TABLE_FONT, false);
                y += 9.0;
            }
            if lines.is_empty() {
                y += 9.0;
            }
        }
        bottom = bottom.max(y);
    }
    canvas.y = bottom;
}

fn draw_table(canvas: &mut Canvas, table: &Table, repeat_header: bool) {
    let total: f64 = table.widths.iter().sum();
    let widths: Vec<f32> = table
        .widths
        .iter()
        .map(|w| (*w / total) as f32 * CONTENT_WIDTH)
        .collect();

    let header_height = row_height(&table.header, &widths);
    canvas.ensure_space(header_height + 12.0);
    draw_row(canvas, &table.header, &widths, header_height);

    for row in &table.rows {
        let height = row_height(row, &widths);
        if canvas.needs_break(height) {
            canvas.new_page();
            if repeat_header {
                draw_row(canvas, &table.header, &widths, header_height);
            }
        }
        draw_row(canvas, row, &widths, height);
    }
}

fn row_height(cells: &[Cell], widths: &[f32]) -> f32 {
    let lines = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| cell_lines(cell, *width).len().max(1))
        .max()
        .unwrap_or(1);
    lines as f32 * line_height(TABLE_FONT) + 2.0 * CELL_PADDING
}

fn cell_lines(cell: &Cell, width: f32) -> Vec<String> {
    let text = cell.value.display();
    if cell.style.wrap {
        wrap_text(&text, width - 2.0 * CELL_PADDING, TABLE_FONT, cell.style.bold)
    } else {
        vec![text]
    }
}

fn draw_row(canvas: &mut Canvas, cells: &[Cell], widths: &[f32], height: f32) {
    let top = canvas.y;
    let mut x = MARGIN;
    for (cell, width) in cells.iter().zip(widths) {
        if let Some(fill) = cell.style.background.as_deref().and_then(parse_color) {
            canvas.fill_rect(x, top, *width, height, fill);
        }
        if cell.style.border {
            canvas.stroke_rect(x, top, *width, height);
        }

        let colour = cell.style.color.as_deref().and_then(parse_color);
        if let Some(colour) = colour {
            canvas.set_fill(colour);
        }
        let mut baseline = top + CELL_PADDING + TABLE_FONT;
        for line in cell_lines(cell, *width) {
            canvas.text_aligned(
                &line,
                x + CELL_PADDING,
                width - 2.0 * CELL_PADDING,
                baseline,
                TABLE_FONT,
                cell.style.bold,
                cell.style.align,
            );
            baseline += line_height(TABLE_FONT);
        }
        if colour.is_some() {
            canvas.set_fill((0.0, 0.0, 0.0));
        }
        x += width;
    }
    canvas.y = top + height;
}

fn draw_totals(canvas: &mut Canvas, layout: &ProformaLayout) {
    let value_width = 90.0;
    let label_width = 160.0;
    let value_x = PAGE_WIDTH - MARGIN - value_width;
    let label_x = value_x - label_width - 6.0;
    let height = 14.0;

    for line in &layout.totals {
        canvas.ensure_space(height);
        let top = canvas.y;
        if line.emphasis {
            if let Some(fill) = parse_color(TOTAL_FILL) {
                canvas.fill_rect(value_x, top, value_width, height, fill);
            }
        }
        canvas.text_aligned(&line.label, label_x, label_width, top + 10.0, 9.0, true, Align::Right);
        canvas.text_aligned(
            &line.amount.to_string(),
            value_x + CELL_PADDING,
            value_width - 2.0 * CELL_PADDING,
            top + 10.0,
            9.0,
            line.emphasis,
            Align::Right,
        );
        canvas.y = top + height;
    }
}

fn line_height(size: f32) -> f32 {
    size * 1.25
}

/// Page content built top-down; converted to PDF coordinates on write.
struct Canvas {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f32,
    logo: Option<(f32, f32)>,
}

impl Canvas {
    fn new(logo: Option<(f32, f32)>) -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: MARGIN,
            logo,
        }
    }

    fn needs_break(&self, height: f32) -> bool {
        self.y + height > PAGE_HEIGHT - MARGIN
    }

    fn ensure_space(&mut self, height: f32) {
        if self.needs_break(height) {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.y = MARGIN;
    }

    fn text(&mut self, text: &str, x: f32, baseline: f32, size: f32, bold: bool) {
        if text.is_empty() {
            return;
        }
        let font = if bold { "F2" } else { "F1" };
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), (PAGE_HEIGHT - baseline).into()]),
            Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    #[allow(clippy::too_many_arguments)]
    fn text_aligned(
        &mut self,
        text: &str,
        x: f32,
        width: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        align: Align,
    ) {
        let text_width = measure(text, size, bold);
        let start = match align {
            Align::Left => x,
            Align::Center => x + (width - text_width).max(0.0) / 2.0,
            Align::Right => x + (width - text_width).max(0.0),
        };
        self.text(text, start, baseline, size, bold);
    }

    fn set_fill(&mut self, (r, g, b): (f32, f32, f32)) {
        self.current
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    }

    fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, colour: (f32, f32, f32)) {
        self.set_fill(colour);
        self.current.extend([
            Operation::new(
                "re",
                vec![x.into(), (PAGE_HEIGHT - top - height).into(), width.into(), height.into()],
            ),
            Operation::new("f", vec![]),
        ]);
        self.set_fill((0.0, 0.0, 0.0));
    }

    fn stroke_rect(&mut self, x: f32, top: f32, width: f32, height: f32) {
        self.current.extend([
            Operation::new("w", vec![0.5f32.into()]),
            Operation::new(
                "re",
                vec![x.into(), (PAGE_HEIGHT - top - height).into(), width.into(), height.into()],
            ),
            Operation::new("S", vec![]),
        ]);
    }

    fn logo_at(&mut self, x: f32, top: f32) {
        let Some((width, height)) = self.logo else {
            return;
        };
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    (PAGE_HEIGHT - top - height).into(),
                ],
            ),
            Operation::new("Do", vec!["Logo".into()]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn finish(mut self, logo: Option<&Logo>) -> Result<Vec<u8>, RenderError> {
        if !self.current.is_empty() || self.pages.is_empty() {
            let last = std::mem::take(&mut self.current);
            self.pages.push(last);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(font_dictionary("Helvetica"));
        let bold = doc.add_object(font_dictionary("Helvetica-Bold"));

        let mut resources = dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
        };
        if let Some(logo) = logo {
            let image_id = add_image(&mut doc, logo)?;
            resources.set("XObject", dictionary! { "Logo" => image_id });
        }
        let resources_id = doc.add_object(resources);

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| RenderError::Pdf(format!("Failed to encode page: {e}")))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| RenderError::Pdf(format!("Failed to write PDF: {e}")))?;
        Ok(buffer)
    }
}

/// Logo box: fixed width, capped height, aspect ratio kept.
fn logo_size(logo: &Logo) -> (f32, f32) {
    let height = (logo.scaled_height(f64::from(LOGO_WIDTH)) as f32).min(LOGO_MAX_HEIGHT);
    if logo.height == 0 {
        return (LOGO_WIDTH, height);
    }
    (height * logo.width as f32 / logo.height as f32, height)
}

fn font_dictionary(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn add_image(doc: &mut Document, logo: &Logo) -> Result<ObjectId, RenderError> {
    let mut image = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(logo.width),
        "Height" => i64::from(logo.height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &logo.alpha {
        let mask = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(logo.width),
            "Height" => i64::from(logo.height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        let mask_id = doc.add_object(Stream::new(mask, deflate(alpha)?));
        image.set("SMask", mask_id);
    }

    Ok(doc.add_object(Stream::new(image, deflate(&logo.rgb)?)))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Text as WinAnsi bytes; characters outside the code page become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let (encoded, _, unmappable) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut buf));
        if unmappable {
            bytes.push(b'?');
        } else {
            bytes.extend_from_slice(&encoded);
        }
    }
    bytes
}

fn parse_color(color: &str) -> Option<(f32, f32, f32)> {
    let hex = color.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0))
}

/// Greedy word wrap; words longer than the width are split.
fn wrap_text(text: &str, width: f32, size: f32, bold: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if measure(&candidate, size, bold) <= width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let mut piece = String::new();
            for c in word.chars() {
                piece.push(c);
                if measure(&piece, size, bold) > width && piece.chars().count() > 1 {
                    piece.pop();
                    lines.push(std::mem::take(&mut piece));
                    piece.push(c);
                }
            }
            line = piece;
        }
        if !line.is_empty() || lines.is_empty() {
            lines.push(line);
        }
    }
    lines.retain(|line| !line.is_empty());
    lines
}

fn measure(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_width(c, bold)).sum();
    units as f32 * size / 1000.0
}

/// Advance widths from the Helvetica and Helvetica-Bold metrics, in
/// thousandths of the font size.
fn glyph_width(c: char, bold: bool) -> u32 {
    const REGULAR: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
        722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
        556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500,
        500, 334, 260, 334, 584,
    ];
    const BOLD: [u16; 95] = [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722,
        722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611,
        611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556,
        500, 389, 280, 389, 584,
    ];

    let base = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        '°' => return 400,
        'º' => return 365,
        other => other,
    };

    let table = if bold { &BOLD } else { &REGULAR };
    match base as u32 {
        code @ 32..=126 => u32::from(table[(code - 32) as usize]),
        _ => 556,
    }
}
