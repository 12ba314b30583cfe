//! Report command implementations

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use finbot_core::db::Database;
use finbot_core::{format_amount, MonthRange, Statement, StatsEngine};

use super::find_user;

/// Width of the widest bar in the stats output
const BAR_WIDTH: f64 = 30.0;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    "█".repeat(((value / max) * BAR_WIDTH).round() as usize)
}

pub async fn cmd_stats(
    db: &Database,
    email: &str,
    month: Option<u32>,
    year: Option<i32>,
) -> Result<()> {
    let user = find_user(db, email)?;
    let range = MonthRange::from_parts(month, year)?;
    let stats = StatsEngine::new(db.clone())
        .compute_stats(user.id, range)
        .await?;

    println!("📊 {} - {}", user.name, range.label());
    println!();

    if stats.category_stats.is_empty() {
        println!("   No expenses recorded this month.");
        return Ok(());
    }

    let max = stats
        .category_stats
        .iter()
        .map(|c| c.total)
        .fold(0.0, f64::max);

    println!("   By category");
    for entry in &stats.category_stats {
        println!(
            "   {:14} {:>14}  {}",
            entry.category.as_str(),
            format_amount(entry.total),
            bar(entry.total, max)
        );
    }

    println!();
    println!("   By payment mode");
    for entry in &stats.mode_stats {
        println!("   {:14} {:>14}", entry.mode.to_string(), format_amount(entry.total));
    }

    println!();
    println!("   By day");
    for entry in &stats.daily_stats {
        println!("   {:14} {:>14}", entry.date, format_amount(entry.total));
    }

    println!("   ─────────────────────────────");
    println!("   {:14} {:>14}", "Total", format_amount(stats.total_expense));

    Ok(())
}

pub fn cmd_report(
    db: &Database,
    email: &str,
    month: Option<u32>,
    year: Option<i32>,
    out: &Path,
) -> Result<()> {
    let user = find_user(db, email)?;
    let range = MonthRange::from_parts(month, year)?;
    let expenses = db.list_expenses_in_range(user.id, &range)?;

    if expenses.is_empty() {
        anyhow::bail!("No expenses found for {}", range.label());
    }

    let statement = Statement::build(&user.name, &expenses, Utc::now().date_naive());
    let pdf = statement.render_pdf()?;
    std::fs::write(out, &pdf)
        .with_context(|| format!("Failed to write statement to {}", out.display()))?;

    println!("📄 Statement for {} ({})", user.name, range.label());
    println!("   Rows: {}", statement.rows.len());
    println!("   {}", statement.total_line());
    println!("   Written to {}", out.display());

    Ok(())
}
