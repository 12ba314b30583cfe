//! Monthly PDF statements
//!
//! `Statement::build` is pure: it copies and sorts the rows and computes the
//! total. `render_pdf` lays the result out on A4 pages with the builtin
//! Helvetica font, so no font files ship with the binary.

use std::io::Write;

use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::models::Expense;

/// File name offered to chat clients and browsers
pub const STATEMENT_FILENAME: &str = "Monthly_Report.pdf";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const ROW_HEIGHT: f32 = 7.0;
const COLUMNS: [(&str, f32); 5] = [
    ("Date", MARGIN),
    ("Item", 42.0),
    ("Category", 105.0),
    ("Mode", 140.0),
    ("Amount", 163.0),
];
const MAX_TITLE_CHARS: usize = 32;

/// "Rs. 100" for whole amounts, "Rs. 99.50" otherwise
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("Rs. {:.0}", amount)
    } else {
        format!("Rs. {:.2}", amount)
    }
}

/// One table row: date, title, category, mode, amount
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRow {
    pub date: String,
    pub title: String,
    pub category: String,
    pub mode: String,
    pub amount: String,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub user_name: String,
    pub generated_on: NaiveDate,
    /// Newest first
    pub rows: Vec<StatementRow>,
    pub total: f64,
}

impl Statement {
    /// Build a statement; `expenses` itself is left untouched
    pub fn build(user_name: &str, expenses: &[Expense], generated_on: NaiveDate) -> Self {
        let mut sorted: Vec<&Expense> = expenses.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));

        let rows = sorted
            .into_iter()
            .map(|e| StatementRow {
                date: e.date.format("%Y-%m-%d").to_string(),
                title: e.title.clone(),
                category: e.category.to_string(),
                mode: e.mode.to_string(),
                amount: format_amount(e.amount),
            })
            .collect();

        Self {
            user_name: user_name.to_string(),
            generated_on,
            rows,
            total: expenses.iter().map(|e| e.amount).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_line(&self) -> String {
        format!("Total Expense: {}", format_amount(self.total))
    }

    /// Render to PDF bytes
    pub fn render_pdf(&self) -> Result<Vec<u8>> {
        let (doc, page, layer) = PdfDocument::new(
            "FinBot Monthly Statement",
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| Error::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| Error::Pdf(e.to_string()))?;

        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT - MARGIN - 5.0;

        current.use_text("FinBot Monthly Statement", 20.0, Mm(62.0), Mm(y), &bold);
        y -= 14.0;
        current.use_text(
            format!("Name: {}", pdf_safe(&self.user_name)),
            12.0,
            Mm(MARGIN),
            Mm(y),
            &regular,
        );
        y -= 6.0;
        current.use_text(
            format!("Date: {}", self.generated_on.format("%d/%m/%Y")),
            12.0,
            Mm(MARGIN),
            Mm(y),
            &regular,
        );
        y -= 12.0;
        current.use_text("Expense Details", 14.0, Mm(MARGIN), Mm(y), &bold);
        y -= 9.0;
        draw_header(&current, y, &bold);
        y -= ROW_HEIGHT;

        for row in &self.rows {
            if y < MARGIN + ROW_HEIGHT {
                let (next_page, next_layer) =
                    doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                current = doc.get_page(next_page).get_layer(next_layer);
                y = PAGE_HEIGHT - MARGIN - 5.0;
                draw_header(&current, y, &bold);
                y -= ROW_HEIGHT;
            }

            let cells = [
                row.date.clone(),
                truncate_title(&row.title),
                row.category.clone(),
                row.mode.clone(),
                row.amount.clone(),
            ];
            for ((_, x), cell) in COLUMNS.iter().zip(cells) {
                current.use_text(cell, 10.0, Mm(*x), Mm(y), &regular);
            }
            y -= ROW_HEIGHT;
        }

        if y < MARGIN + 10.0 {
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            current = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT - MARGIN - 5.0;
        }
        y -= 5.0;
        current.use_text(self.total_line(), 14.0, Mm(130.0), Mm(y), &bold);

        doc.save_to_bytes().map_err(|e| Error::Pdf(e.to_string()))
    }
}

fn draw_header(layer: &PdfLayerReference, y: f32, font: &IndirectFontRef) {
    for (label, x) in COLUMNS {
        layer.use_text(label, 11.0, Mm(x), Mm(y), font);
    }
}

/// Builtin fonts only cover Latin-1; anything else prints as '?'
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

fn truncate_title(title: &str) -> String {
    let safe = pdf_safe(title);
    if safe.chars().count() > MAX_TITLE_CHARS {
        format!("{}...", safe.chars().take(MAX_TITLE_CHARS - 3).collect::<String>())
    } else {
        safe
    }
}

/// Write PDF bytes to a temp file that is deleted when dropped
pub fn write_transient(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("Statement_")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}
