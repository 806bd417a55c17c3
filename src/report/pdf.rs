//! PDF rendering of query results.
//!
//! Lays the report out top to bottom on A4 pages using the built-in PDF
//! fonts. The results table is set in Courier so padded columns line up.

use async_trait::async_trait;
use chrono::Local;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};
use tracing::{debug, error, info};

use crate::error::{AppError, Result};
use crate::query::QueryResult;
use crate::report::{ReportGenerator, ReportTable};

const REPORT_TYPE: &str = "PDF";
const REPORT_TITLE: &str = "AI SQL Assistant Report";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const USABLE_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

/// Millimetres per typographic point.
const MM_PER_PT: f32 = 0.3528;
/// Courier glyph advance as a fraction of the font size.
const COURIER_ADVANCE: f32 = 0.6;

const TABLE_FONT_SIZE: f32 = 8.0;
const MIN_TABLE_FONT_SIZE: f32 = 4.0;
const COLUMN_SEPARATOR: &str = " | ";

/// Renders reports with `printpdf`.
#[derive(Debug, Clone, Default)]
pub struct PdfReportGenerator;

impl PdfReportGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportGenerator for PdfReportGenerator {
    async fn generate_report(&self, result: &QueryResult) -> Result<Vec<u8>> {
        let table = ReportTable::from_query_result(result);
        let has_data = table.has_rows();

        let bytes = tokio::task::spawn_blocking(move || render(&table))
            .await
            .map_err(|e| {
                AppError::report_generation_failed(REPORT_TYPE)
                    .with_detail("error_type", "JoinError")
                    .with_detail("has_data", has_data)
                    .with_source(e)
            })?
            .map_err(|e| {
                error!("PDF generation error: {}", e);
                AppError::report_generation_failed(REPORT_TYPE)
                    .with_detail("error_type", "PdfError")
                    .with_detail("error", e)
                    .with_detail("has_data", has_data)
            })?;

        if bytes.is_empty() {
            return Err(AppError::report_generation_failed(REPORT_TYPE)
                .with_detail("reason", "PDF generation returned empty result")
                .with_detail("has_data", has_data));
        }

        info!("PDF generated successfully, size: {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Renders `table` into PDF bytes.
fn render(table: &ReportTable) -> std::result::Result<Vec<u8>, String> {
    let (doc, page, layer) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = |builtin: BuiltinFont| doc.add_builtin_font(builtin).map_err(|e| e.to_string());
    let fonts = Fonts {
        regular: font(BuiltinFont::Helvetica)?,
        bold: font(BuiltinFont::HelveticaBold)?,
        mono: font(BuiltinFont::Courier)?,
        mono_bold: font(BuiltinFont::CourierBold)?,
    };
    let layer = doc.get_page(page).get_layer(layer);
    let mut writer = PageWriter::new(doc, layer);

    writer.set_color(0.145, 0.388, 0.922);
    writer.line(REPORT_TITLE, 18.0, &fonts.bold);
    writer.set_color(0.5, 0.5, 0.5);
    let generated_on = Local::now().format("%Y-%m-%d %H:%M:%S");
    writer.line(&format!("Generated on: {generated_on}"), 10.0, &fonts.regular);
    writer.set_color(0.0, 0.0, 0.0);
    writer.gap(6.0);

    if let Some(question) = &table.question {
        writer.line("Question:", 14.0, &fonts.bold);
        writer.wrapped(question, 10.0, &fonts.regular, chars_per_line(10.0, 0.5));
        writer.gap(4.0);
    }

    if let Some(sql) = &table.sql {
        writer.line("Generated SQL:", 14.0, &fonts.bold);
        let width = chars_per_line(9.0, COURIER_ADVANCE);
        for sql_line in sql.lines() {
            writer.wrapped(sql_line, 9.0, &fonts.mono, width);
        }
        writer.gap(6.0);
    }

    if table.has_rows() {
        writer.line("Query Results:", 14.0, &fonts.bold);

        let lines = table_lines(&table.headers, &table.rows);
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(1).max(1);
        let fitted = USABLE_WIDTH / (widest as f32 * COURIER_ADVANCE * MM_PER_PT);
        let font_size = fitted.clamp(MIN_TABLE_FONT_SIZE, TABLE_FONT_SIZE);

        for (index, line) in lines.iter().enumerate() {
            let font = if index == 0 { &fonts.mono_bold } else { &fonts.mono };
            writer.line(line, font_size, font);
        }

        writer.gap(6.0);
        if let Some(summary) = &table.summary {
            writer.set_color(0.5, 0.5, 0.5);
            writer.line(summary, 10.0, &fonts.regular);
        }
    } else {
        writer.line("No results to display", 10.0, &fonts.regular);
    }

    debug!("Rendered report on {} page(s)", writer.pages);
    writer.doc.save_to_bytes().map_err(|e| e.to_string())
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
    mono_bold: IndirectFontRef,
}

/// Writes lines top to bottom, starting a new page when the bottom margin
/// is reached.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    /// Baseline of the next line, from the page bottom.
    y: f32,
    /// Fill colour, carried over to every new page.
    color: (f32, f32, f32),
    pages: usize,
}

impl PageWriter {
    fn new(doc: PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT - MARGIN,
            color: (0.0, 0.0, 0.0),
            pages: 1,
        }
    }

    fn line(&mut self, text: &str, font_size: f32, font: &IndirectFontRef) {
        let height = font_size * MM_PER_PT * 1.4;
        if self.y - height < MARGIN {
            self.new_page();
        }
        self.y -= height;
        self.layer
            .use_text(text, font_size, Mm(MARGIN), Mm(self.y), font);
    }

    fn wrapped(&mut self, text: &str, font_size: f32, font: &IndirectFontRef, width: usize) {
        for chunk in wrap(text, width) {
            self.line(&chunk, font_size, font);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
        self.pages += 1;
        self.apply_color();
    }

    fn set_color(&mut self, r: f32, g: f32, b: f32) {
        self.color = (r, g, b);
        self.apply_color();
    }

    fn apply_color(&self) {
        let (r, g, b) = self.color;
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }
}

/// Approximate characters per line for a font whose average advance is
/// `advance` times its size.
fn chars_per_line(font_size: f32, advance: f32) -> usize {
    ((USABLE_WIDTH / (font_size * advance * MM_PER_PT)) as usize).max(1)
}

/// Splits `text` into lines of at most `width` characters, breaking at
/// spaces where possible.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
        }

        if word_len > width {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(width) {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current = piece.iter().collect();
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lays out the header row, a rule and the body rows with padded columns.
fn table_lines(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| {
        widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let pad = width.saturating_sub(cell.chars().count());
                format!("{}{}", cell, " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join(COLUMN_SEPARATOR)
            .trim_end()
            .to_string()
    };

    let header = format_row(headers);
    let rule_width = widths.iter().sum::<usize>() + COLUMN_SEPARATOR.len() * widths.len().saturating_sub(1);

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(header);
    lines.push("-".repeat(rule_width));
    lines.extend(rows.iter().map(|row| format_row(row)));
    lines
}
