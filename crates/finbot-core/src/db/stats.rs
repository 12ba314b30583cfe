//! Month-scoped grouping queries

use rusqlite::params;

use super::{format_datetime, Database};
use crate::error::Result;
use crate::models::{Category, CategoryTotal, DailyTotal, ModeTotal, MonthRange, PaymentMode};

impl Database {
    /// Totals per category, largest first
    pub fn category_totals(&self, user_id: i64, range: &MonthRange) -> Result<Vec<CategoryTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category, SUM(amount) AS total
            FROM expenses
            WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
            GROUP BY category
            ORDER BY total DESC, category ASC
            "#,
        )?;

        let totals = stmt
            .query_map(
                params![user_id, format_datetime(&range.start), format_datetime(&range.end)],
                |row| {
                    let category: String = row.get(0)?;
                    Ok(CategoryTotal {
                        category: Category::normalize(&category),
                        total: row.get(1)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Totals per calendar day (`YYYY-MM-DD`), oldest first
    pub fn daily_totals(&self, user_id: i64, range: &MonthRange) -> Result<Vec<DailyTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT substr(date, 1, 10) AS day, SUM(amount)
            FROM expenses
            WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
            GROUP BY day
            ORDER BY day ASC
            "#,
        )?;

        let totals = stmt
            .query_map(
                params![user_id, format_datetime(&range.start), format_datetime(&range.end)],
                |row| {
                    Ok(DailyTotal {
                        date: row.get(0)?,
                        total: row.get(1)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Totals per payment mode, largest first
    pub fn mode_totals(&self, user_id: i64, range: &MonthRange) -> Result<Vec<ModeTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT mode, SUM(amount) AS total
            FROM expenses
            WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
            GROUP BY mode
            ORDER BY total DESC, mode ASC
            "#,
        )?;

        let totals = stmt
            .query_map(
                params![user_id, format_datetime(&range.start), format_datetime(&range.end)],
                |row| {
                    let mode: String = row.get(0)?;
                    Ok(ModeTotal {
                        mode: PaymentMode::normalize(&mode),
                        total: row.get(1)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }
}
