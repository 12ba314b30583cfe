//! Expense operations

use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, Expense, MonthRange, NewExpense, PaymentMode};

const EXPENSE_COLUMNS: &str = "id, user_id, title, amount, category, mode, date, source, created_at";

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let category: String = row.get(4)?;
    let mode: String = row.get(5)?;
    let date: String = row.get(6)?;
    let source: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        amount: row.get(3)?,
        category: Category::normalize(&category),
        mode: PaymentMode::normalize(&mode),
        date: parse_datetime(&date),
        source: source.parse().unwrap_or_default(),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Insert an expense and return the stored row
    pub fn insert_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let conn = self.conn()?;
        let created_at = chrono::Utc::now();

        conn.execute(
            "INSERT INTO expenses (user_id, title, amount, category, mode, date, source, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                expense.user_id,
                expense.title,
                expense.amount,
                expense.category.as_str(),
                expense.mode.as_str(),
                format_datetime(&expense.date),
                expense.source.as_str(),
                format_datetime(&created_at),
            ],
        )?;

        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_expense(id)?
            .ok_or_else(|| Error::Internal(format!("Expense {} vanished after insert", id)))
    }

    pub fn get_expense(&self, id: i64) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let expense = conn
            .query_row(
                &format!("SELECT {} FROM expenses WHERE id = ?", EXPENSE_COLUMNS),
                params![id],
                row_to_expense,
            )
            .optional()?;
        Ok(expense)
    }

    /// A user's expenses within a month, newest first
    pub fn list_expenses_in_range(&self, user_id: i64, range: &MonthRange) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM expenses
             WHERE user_id = ? AND date >= ? AND date <= ?
             ORDER BY date DESC, id DESC",
            EXPENSE_COLUMNS
        ))?;

        let expenses = stmt
            .query_map(
                params![
                    user_id,
                    format_datetime(&range.start),
                    format_datetime(&range.end)
                ],
                row_to_expense,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    pub fn count_expenses(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM expenses WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete an expense only if `user_id` owns it
    ///
    /// Returns false when no row matched, without revealing whether the
    /// expense exists for another user.
    pub fn delete_owned_expense(&self, expense_id: i64, user_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM expenses WHERE id = ? AND user_id = ?",
            params![expense_id, user_id],
        )?;
        Ok(rows == 1)
    }
}

