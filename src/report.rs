// 📄 Report Renderer - fixed-layout PDF for a ledger summary over a period
//
// Layout (US Letter landscape, millimetres from the bottom-left corner):
//   195  title (16pt bold)
//   185  period line
//   180  rule
//   168  Total Income      value at x=90
//   158  Total Expenses    value at x=90
//   148  Balance           value at x=90 (signed)
//    12  footer
//
// The text content is a pure function of (period, summary, renderer settings). The PDF
// bytes carry printpdf's own creation metadata and are not compared.

use crate::entities::LedgerEntry;
use crate::error::ReportError;
use crate::ledger::{sum_amounts, LedgerSummary};
use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::BufWriter;
use tracing::info;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const PAGE_WIDTH_MM: f32 = 279.4;
const PAGE_HEIGHT_MM: f32 = 215.9;
const MARGIN_X_MM: f32 = 20.0;
const VALUE_X_MM: f32 = 90.0;
const RULE_Y_MM: f32 = 180.0;
const FOOTER_Y_MM: f32 = 12.0;

/// Printed at the bottom of every report
pub const REPORT_FOOTER: &str = "Generated by COSTA School Administration";

// ============================================================================
// AMOUNT FORMATTING
// ============================================================================

fn to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Thousands-grouped magnitude, 2dp, ".00" dropped: 500000 -> "500,000", 1250.5 -> "1,250.50"
pub fn format_amount(value: Decimal) -> String {
    let rounded = to_cents(value.abs());
    let whole = rounded.trunc();
    let cents = ((rounded - whole) * Decimal::ONE_HUNDRED)
        .trunc()
        .to_u32()
        .unwrap_or(0);

    let digits = whole.to_string();
    let digits = digits.split('.').next().unwrap_or("0");

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if cents == 0 {
        grouped
    } else {
        format!("{}.{:02}", grouped, cents)
    }
}

/// Explicit sign for non-zero values: "+380,000", "-1,250.50", "0"
pub fn format_signed_amount(value: Decimal) -> String {
    let magnitude = format_amount(value);
    if to_cents(value).is_zero() {
        magnitude
    } else if value.is_sign_negative() {
        format!("-{}", magnitude)
    } else {
        format!("+{}", magnitude)
    }
}

/// Download name for a report covering [start, end]
pub fn report_filename(start: NaiveDate, end: NaiveDate) -> String {
    format!("costa_report_{}_to_{}.pdf", start, end)
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Refuse aggregates that could not have come out of the ledger aggregator.
pub fn validate_summary(summary: &LedgerSummary) -> Result<(), ReportError> {
    if summary.total_income.is_sign_negative() && !summary.total_income.is_zero() {
        return Err(ReportError::InvalidSummary(format!(
            "total income is negative ({})",
            summary.total_income
        )));
    }
    if summary.total_expense.is_sign_negative() && !summary.total_expense.is_zero() {
        return Err(ReportError::InvalidSummary(format!(
            "total expense is negative ({})",
            summary.total_expense
        )));
    }

    let negative_record = summary
        .income_records
        .iter()
        .map(|r| r.amount())
        .chain(summary.expense_records.iter().map(|r| r.amount()))
        .find(|a| a.is_sign_negative() && !a.is_zero());
    if let Some(amount) = negative_record {
        return Err(ReportError::InvalidSummary(format!(
            "record with negative amount ({})",
            amount
        )));
    }

    let itemised_income = sum_amounts(&summary.income_records)
        .map_err(|e| ReportError::InvalidSummary(format!("income records: {}", e)))?;
    if itemised_income != summary.total_income {
        return Err(ReportError::InvalidSummary(format!(
            "total income {} does not match itemised records {}",
            summary.total_income, itemised_income
        )));
    }

    let itemised_expense = sum_amounts(&summary.expense_records)
        .map_err(|e| ReportError::InvalidSummary(format!("expense records: {}", e)))?;
    if itemised_expense != summary.total_expense {
        return Err(ReportError::InvalidSummary(format!(
            "total expense {} does not match itemised records {}",
            summary.total_expense, itemised_expense
        )));
    }

    if summary.total_income.checked_sub(summary.total_expense) != Some(summary.balance) {
        return Err(ReportError::InvalidSummary(format!(
            "balance {} is not income {} minus expense {}",
            summary.balance, summary.total_income, summary.total_expense
        )));
    }

    Ok(())
}

// ============================================================================
// RENDERED DOCUMENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub filename: String,
    /// Text content in page order
    pub lines: Vec<String>,
    pub bytes: Vec<u8>,
}

impl ReportDocument {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// One positioned line; `value` is drawn in the value column when present.
#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    value: Option<String>,
    y: f32,
    size: f32,
    bold: bool,
}

impl PlacedLine {
    fn plain(&self) -> String {
        match &self.value {
            Some(v) => format!("{} {}", self.text, v),
            None => self.text.clone(),
        }
    }
}

// ============================================================================
// REPORT RENDERER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReportRenderer {
    pub title: String,
    pub currency_label: String,
}

impl ReportRenderer {
    pub fn new(title: &str, currency_label: &str) -> Self {
        ReportRenderer {
            title: title.to_string(),
            currency_label: currency_label.to_string(),
        }
    }

    fn layout(&self, start: NaiveDate, end: NaiveDate, summary: &LedgerSummary) -> Vec<PlacedLine> {
        let money = |v: String| format!("{} {}", self.currency_label, v);

        vec![
            PlacedLine {
                text: self.title.clone(),
                value: None,
                y: 195.0,
                size: 16.0,
                bold: true,
            },
            PlacedLine {
                text: format!("Period: {} to {}", start, end),
                value: None,
                y: 185.0,
                size: 11.0,
                bold: false,
            },
            PlacedLine {
                text: "Total Income:".to_string(),
                value: Some(money(format_amount(summary.total_income))),
                y: 168.0,
                size: 12.0,
                bold: false,
            },
            PlacedLine {
                text: "Total Expenses:".to_string(),
                value: Some(money(format_amount(summary.total_expense))),
                y: 158.0,
                size: 12.0,
                bold: false,
            },
            PlacedLine {
                text: "Balance:".to_string(),
                value: Some(money(format_signed_amount(summary.balance))),
                y: 148.0,
                size: 12.0,
                bold: true,
            },
            PlacedLine {
                text: REPORT_FOOTER.to_string(),
                value: None,
                y: FOOTER_Y_MM,
                size: 8.0,
                bold: false,
            },
        ]
    }

    /// Text content only; identical inputs always give identical lines.
    pub fn render_text(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        summary: &LedgerSummary,
    ) -> Result<Vec<String>, ReportError> {
        validate_summary(summary)?;
        Ok(self
            .layout(start, end, summary)
            .iter()
            .map(PlacedLine::plain)
            .collect())
    }

    pub fn render(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        summary: &LedgerSummary,
    ) -> Result<ReportDocument, ReportError> {
        validate_summary(summary)?;

        let placed = self.layout(start, end, summary);
        let bytes = self.encode_pdf(&placed)?;
        let filename = report_filename(start, end);

        info!(
            filename = %filename,
            size = bytes.len(),
            records = summary.record_count(),
            "financial report rendered"
        );

        Ok(ReportDocument {
            filename,
            lines: placed.iter().map(PlacedLine::plain).collect(),
            bytes,
        })
    }

    fn encode_pdf(&self, placed: &[PlacedLine]) -> Result<Vec<u8>, ReportError> {
        let (doc, page1, layer1) = PdfDocument::new(
            self.title.as_str(),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Layer 1",
        );
        let layer = doc.get_page(page1).get_layer(layer1);

        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        for line in placed {
            let face = if line.bold { &font_bold } else { &font };
            push_text(&layer, face, &line.text, line.size, MARGIN_X_MM, line.y);
            if let Some(value) = &line.value {
                push_text(&layer, face, value, line.size, VALUE_X_MM, line.y);
            }
        }

        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_X_MM), Mm(RULE_Y_MM)), false),
                (Point::new(Mm(PAGE_WIDTH_MM - MARGIN_X_MM), Mm(RULE_Y_MM)), false),
            ],
            is_closed: false,
        });

        let mut writer = BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| ReportError::Pdf(e.to_string()))
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        ReportRenderer::new("COSTA School Financial Report", "USh")
    }
}

fn push_text(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    text: &str,
    size: f32,
    x: f32,
    y: f32,
) {
    layer.use_text(text, size, Mm(x), Mm(y), font);
}

/// Render with the default title and currency.
pub fn render_report(
    period_start: NaiveDate,
    period_end: NaiveDate,
    summary: &LedgerSummary,
) -> Result<ReportDocument, ReportError> {
    ReportRenderer::default().render(period_start, period_end, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ExpenseRecord, IncomeRecord};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scenario_summary() -> LedgerSummary {
        LedgerSummary::from_records(
            vec![IncomeRecord {
                id: 1,
                date: day(2024, 2, 1),
                amount: Decimal::from(500_000),
                source: "Tuition Fees".to_string(),
            }],
            vec![ExpenseRecord {
                id: 1,
                date: day(2024, 2, 10),
                amount: Decimal::from(120_000),
                category: "Utilities".to_string(),
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(500_000)), "500,000");
        assert_eq!(format_amount(Decimal::from(999)), "999");
        assert_eq!(format_amount(Decimal::from(1_000)), "1,000");
        assert_eq!(format_amount(Decimal::from(1_234_567)), "1,234,567");
        assert_eq!(format_amount(Decimal::new(125050, 2)), "1,250.50");
        assert_eq!(format_amount(Decimal::new(50000000, 2)), "500,000");
        assert_eq!(format_amount(Decimal::new(1005, 3)), "1.01");
        assert_eq!(format_amount(Decimal::ZERO), "0");
    }

    #[test]
    fn test_format_signed_amount() {
        assert_eq!(format_signed_amount(Decimal::from(380_000)), "+380,000");
        assert_eq!(format_signed_amount(Decimal::new(-125050, 2)), "-1,250.50");
        assert_eq!(format_signed_amount(Decimal::ZERO), "0");
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename(day(2024, 1, 1), day(2024, 12, 31)),
            "costa_report_2024-01-01_to_2024-12-31.pdf"
        );
    }

    #[test]
    fn test_end_to_end_report_text() {
        let summary = scenario_summary();
        let doc = render_report(day(2024, 1, 1), day(2024, 12, 31), &summary).unwrap();

        let text = doc.text();
        assert!(text.contains("500,000"));
        assert!(text.contains("120,000"));
        assert!(text.contains("380,000"));
        assert_eq!(doc.filename, "costa_report_2024-01-01_to_2024-12-31.pdf");
        assert!(doc.bytes.starts_with(b"%PDF"));

        println!("✅ Report rendered:\n{}", text);
    }

    #[test]
    fn test_line_order() {
        let summary = scenario_summary();
        let lines = ReportRenderer::default()
            .render_text(day(2024, 1, 1), day(2024, 12, 31), &summary)
            .unwrap();

        assert_eq!(lines[0], "COSTA School Financial Report");
        assert_eq!(lines[1], "Period: 2024-01-01 to 2024-12-31");
        assert_eq!(lines[2], "Total Income: USh 500,000");
        assert_eq!(lines[3], "Total Expenses: USh 120,000");
        assert_eq!(lines[4], "Balance: USh +380,000");
        assert_eq!(lines.last().map(String::as_str), Some(REPORT_FOOTER));
    }

    #[test]
    fn test_text_is_deterministic() {
        let summary = scenario_summary();
        let renderer = ReportRenderer::default();

        let a = renderer.render(day(2024, 1, 1), day(2024, 12, 31), &summary).unwrap();
        let b = renderer.render(day(2024, 1, 1), day(2024, 12, 31), &summary).unwrap();

        assert_eq!(a.lines, b.lines);
        assert_eq!(a.filename, b.filename);
    }

    #[test]
    fn test_empty_summary_renders_zeroes() {
        let lines = ReportRenderer::new("Term Report", "UGX")
            .render_text(day(2024, 5, 1), day(2024, 4, 1), &LedgerSummary::empty())
            .unwrap();

        assert_eq!(lines[0], "Term Report");
        assert_eq!(lines[2], "Total Income: UGX 0");
        assert_eq!(lines[4], "Balance: UGX 0");
    }

    #[test]
    fn test_rejects_inconsistent_balance() {
        let mut summary = scenario_summary();
        summary.balance = Decimal::from(1);

        let result = render_report(day(2024, 1, 1), day(2024, 12, 31), &summary);
        assert!(matches!(result, Err(ReportError::InvalidSummary(_))));
    }

    #[test]
    fn test_rejects_total_not_matching_records() {
        let mut summary = scenario_summary();
        summary.total_income = Decimal::from(400_000);
        summary.balance = summary.total_income - summary.total_expense;

        let result = render_report(day(2024, 1, 1), day(2024, 12, 31), &summary);
        assert!(matches!(result, Err(ReportError::InvalidSummary(_))));
    }

    #[test]
    fn test_rejects_negative_totals() {
        let mut summary = LedgerSummary::empty();
        summary.total_expense = Decimal::from(-10);
        summary.balance = Decimal::from(10);

        let result = ReportRenderer::default().render_text(day(2024, 1, 1), day(2024, 1, 31), &summary);
        assert!(matches!(result, Err(ReportError::InvalidSummary(_))));
    }

    #[test]
    fn test_rejects_summary_missing_total() {
        // A summary arriving from outside without a total does not even deserialize,
        // and one with a zeroed-out total fails the itemised cross-check.
        let json = serde_json::json!({
            "total_expense": "120000",
            "balance": "380000",
            "income_records": [],
            "expense_records": []
        });
        assert!(serde_json::from_value::<LedgerSummary>(json).is_err());

        let mut summary = scenario_summary();
        summary.total_income = Decimal::ZERO;
        summary.balance = -summary.total_expense;
        assert!(render_report(day(2024, 1, 1), day(2024, 12, 31), &summary).is_err());
    }

    #[test]
    fn test_rejects_overflowing_records() {
        let huge = Decimal::from_str_exact("50000000000000000000000000000").unwrap();
        let record = |id| IncomeRecord {
            id,
            date: day(2024, 2, 1),
            amount: huge,
            source: "Imported".to_string(),
        };
        let summary = LedgerSummary {
            total_income: huge,
            total_expense: Decimal::ZERO,
            balance: huge,
            income_records: vec![record(1), record(2)],
            expense_records: Vec::new(),
        };

        let result = render_report(day(2024, 2, 1), day(2024, 2, 1), &summary);
        assert!(matches!(result, Err(ReportError::InvalidSummary(_))));
    }
}
