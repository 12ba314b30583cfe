//! Month-scoped dashboard statistics

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{ExpenseStats, MonthRange};

/// Runs the three groupings concurrently on the blocking pool
#[derive(Clone)]
pub struct StatsEngine {
    db: Database,
}

impl StatsEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn compute_stats(&self, user_id: i64, range: MonthRange) -> Result<ExpenseStats> {
        let db = self.db.clone();
        let categories =
            tokio::task::spawn_blocking(move || db.category_totals(user_id, &range));
        let db = self.db.clone();
        let daily = tokio::task::spawn_blocking(move || db.daily_totals(user_id, &range));
        let db = self.db.clone();
        let modes = tokio::task::spawn_blocking(move || db.mode_totals(user_id, &range));

        let (category_stats, daily_stats, mode_stats) =
            tokio::try_join!(categories, daily, modes)
                .map_err(|e| Error::Internal(format!("Stats task failed: {}", e)))?;

        let category_stats = category_stats?;
        let total_expense = category_stats.iter().map(|c| c.total).sum();

        Ok(ExpenseStats {
            category_stats,
            daily_stats: daily_stats?,
            mode_stats: mode_stats?,
            total_expense,
        })
    }
}
