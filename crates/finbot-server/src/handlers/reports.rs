//! Statement download handler

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use tracing::info;

use super::expenses::MonthQuery;
use crate::{AppError, AppState, AuthUser};
use finbot_core::statement::STATEMENT_FILENAME;
use finbot_core::{Error, Statement};

/// GET /api/reports/pdf - Monthly statement as a PDF download
pub async fn report_pdf(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Response, AppError> {
    let range = params.range()?;
    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;

    let expenses = state.db.list_expenses_in_range(user_id, &range)?;
    if expenses.is_empty() {
        return Err(AppError::not_found(&format!(
            "No expenses found for {}",
            range.label()
        )));
    }

    let statement = Statement::build(&user.name, &expenses, Utc::now().date_naive());
    let pdf = tokio::task::spawn_blocking(move || statement.render_pdf()).await??;

    info!(user_id, rows = expenses.len(), month = %range.label(), "Statement downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", STATEMENT_FILENAME),
            ),
        ],
        pdf,
    )
        .into_response())
}
