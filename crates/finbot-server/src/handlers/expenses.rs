//! Expense handlers

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{json_rejection, AppError, AppState, AuthUser, MessageResponse, MAX_UPLOAD_SIZE};
use finbot_core::ingest::parse_amount;
use finbot_core::{Category, Expense, ExpenseStats, ManualEntry, MonthRange};

/// Amount as sent by the web form: a number, or a string when posted as text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    fn into_amount(self) -> Result<Option<f64>, AppError> {
        match self {
            AmountInput::Number(n) => Ok(Some(n)),
            AmountInput::Text(s) => Ok(parse_amount(&s)?),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddExpenseRequest {
    pub title: Option<String>,
    pub amount: Option<AmountInput>,
    pub category: Option<String>,
    pub mode: Option<String>,
    /// YYYY-MM-DD or RFC 3339
    pub date: Option<String>,
}

impl AddExpenseRequest {
    fn into_entry(self) -> Result<ManualEntry, AppError> {
        Ok(ManualEntry {
            title: self.title,
            amount: self.amount.map(AmountInput::into_amount).transpose()?.flatten(),
            category: self.category,
            mode: self.mode,
            date: self.date,
        })
    }
}

#[derive(Serialize)]
pub struct ExpenseResponse {
    pub expense: Expense,
}

#[derive(Serialize)]
pub struct ExpenseListResponse {
    pub expenses: Vec<Expense>,
}

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<&'static str>,
}

/// Month selector shared by list, stats and report endpoints
#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl MonthQuery {
    pub fn range(&self) -> Result<MonthRange, AppError> {
        Ok(MonthRange::from_parts(self.month, self.year)?)
    }
}

/// POST /api/expense/add - Manual entry, as JSON or multipart with an optional receipt
pub async fn add_expense(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    request: Request,
) -> Result<(StatusCode, Json<ExpenseResponse>), AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let expense = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::bad_request(&format!("Invalid form data: {}", e)))?;
        let (entry, receipt) = read_expense_form(multipart).await?;

        match receipt {
            Some(image) => {
                state
                    .ingestor
                    .ingest_receipt_upload(user_id, image, entry)
                    .await?
            }
            None => state.ingestor.ingest_manual(user_id, entry)?,
        }
    } else {
        let Json(req) = Json::<AddExpenseRequest>::from_request(request, &state)
            .await
            .map_err(json_rejection)?;
        state.ingestor.ingest_manual(user_id, req.into_entry()?)?
    };

    Ok((StatusCode::CREATED, Json(ExpenseResponse { expense })))
}

/// Collect the text fields and the optional `receipt` file
async fn read_expense_form(
    mut multipart: Multipart,
) -> Result<(ManualEntry, Option<Vec<u8>>), AppError> {
    let mut entry = ManualEntry::default();
    let mut receipt: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "receipt" {
            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("Failed to read receipt image"))?;
            if bytes.len() > MAX_UPLOAD_SIZE {
                return Err(AppError::bad_request(&format!(
                    "File too large. Maximum size is {} MB",
                    MAX_UPLOAD_SIZE / 1024 / 1024
                )));
            }
            if !bytes.is_empty() {
                receipt = Some(bytes.to_vec());
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| AppError::bad_request(&format!("Failed to read {}", name)))?;
        let value = Some(value).filter(|v| !v.trim().is_empty());

        match name.as_str() {
            "title" => entry.title = value,
            "amount" => entry.amount = value.as_deref().map(parse_amount).transpose()?.flatten(),
            "category" => entry.category = value,
            "mode" => entry.mode = value,
            "date" => entry.date = value,
            other => {
                return Err(AppError::bad_request(&format!("Unknown field: {}", other)));
            }
        }
    }

    Ok((entry, receipt))
}

/// GET /api/expense/user-expenses - One month of expenses, newest first
pub async fn user_expenses(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<ExpenseListResponse>, AppError> {
    let range = params.range()?;
    let expenses = state.db.list_expenses_in_range(user_id, &range)?;
    Ok(Json(ExpenseListResponse { expenses }))
}

/// GET /api/expense/stats - Category, daily and mode totals for one month
pub async fn expense_stats(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<ExpenseStats>, AppError> {
    let range = params.range()?;
    let stats = state.stats.compute_stats(user_id, range).await?;
    Ok(Json(stats))
}

/// GET /api/expense/categories - The closed category set, in display order
pub async fn list_categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: Category::ALL.iter().map(Category::as_str).collect(),
    })
}

/// DELETE /api/expense/delete/:id - Delete one of the caller's expenses
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.ingestor.delete_expense(id, user_id)?;
    Ok(MessageResponse::new("Expense Deleted Successfully!"))
}
