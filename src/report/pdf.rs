//! PDF report rendering with the printpdf built-in fonts

use crate::error::{Result, VantageError};
use crate::models::{Lead, Scan};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};
use std::path::Path;
use tracing::info;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const BODY_SIZE: f32 = 10.0;
/// Characters per body line at BODY_SIZE in Helvetica across the text width
const WRAP_COLUMNS: usize = 95;

fn pdf_err(e: impl std::fmt::Display) -> VantageError {
    VantageError::ReportError(format!("PDF rendering failed: {e}"))
}

/// Built-in PDF fonts only cover Latin-1 reliably; anything else is replaced
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap at `width` characters. Over-long words are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word);
            word = rest;
        }
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cursor over the document that starts a new page when the current one fills
struct Writer {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl Writer {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_err)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_err)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn line(&mut self, text: &str, size: f32, bold: bool) {
        let height = size * 0.5;
        self.ensure_space(height);
        self.y -= height;
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(sanitize(text), size, Mm(MARGIN), Mm(self.y), font);
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap(&sanitize(text), WRAP_COLUMNS) {
            self.line(&line, BODY_SIZE, false);
        }
    }

    fn colored_line(&mut self, text: &str, rgb: (f32, f32, f32)) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(rgb.0, rgb.1, rgb.2, None)));
        self.line(text, BODY_SIZE + 1.0, true);
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc.save_to_bytes().map_err(pdf_err)
    }
}

fn status_rgb(hex: &str) -> (f32, f32, f32) {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map_or(0.0, |v| f32::from(v) / 255.0)
    };
    (channel(1), channel(3), channel(5))
}

/// Renders the report for a completed scan as PDF bytes
pub fn render(scan: &Scan, lead: Option<&Lead>) -> Result<Vec<u8>> {
    let scores = scan.scores.as_ref().ok_or_else(|| {
        VantageError::ReportError(format!("Scan {} has no scores yet", scan.id))
    })?;

    let mut w = Writer::new(&format!("Website Audit - {}", scan.target))?;
    w.line("Website Audit", 22.0, true);
    w.gap(2.0);
    if let Some(lead) = lead {
        w.line(&format!("Prepared for {}", lead.display_name()), 12.0, false);
    }
    w.line(&scan.target, 12.0, false);
    if let Some(finished) = scan.finished_at {
        w.line(&finished.format("%Y-%m-%d %H:%M UTC").to_string(), 9.0, false);
    }
    w.gap(4.0);

    w.line(
        &format!("Overall score: {}/100 (grade {})", scores.overall, scores.grade),
        16.0,
        true,
    );
    w.gap(2.0);
    for (category, score) in &scores.categories {
        w.line(&format!("{category}: {score}/100"), BODY_SIZE + 1.0, false);
    }
    w.gap(4.0);

    if let Some(ref narrative) = scan.narrative {
        w.line("Summary", 14.0, true);
        w.gap(1.0);
        for paragraph in narrative.split("\n\n") {
            for line in paragraph.lines() {
                w.paragraph(line);
            }
            w.gap(2.0);
        }
    }

    w.line("Checks", 14.0, true);
    w.gap(1.0);
    for check in &scan.checks {
        w.colored_line(
            &format!("[{}] {} ({})", check.status, check.title, check.category),
            status_rgb(check.status.html_color()),
        );
        if !check.detail.is_empty() {
            w.paragraph(&check.detail);
        }
        if !check.recommendation.is_empty() {
            w.paragraph(&format!("Recommendation: {}", check.recommendation));
        }
        w.gap(2.0);
    }

    w.gap(4.0);
    w.line(
        &format!("Vantage v{} | Scan {}", env!("CARGO_PKG_VERSION"), scan.id),
        8.0,
        false,
    );
    w.finish()
}

/// Writes the PDF report to `output_path`
pub fn generate(scan: &Scan, lead: Option<&Lead>, output_path: &Path) -> Result<()> {
    let bytes = render(scan, lead)?;
    std::fs::write(output_path, bytes)?;
    info!("PDF report saved to {}", output_path.display());
    Ok(())
}
