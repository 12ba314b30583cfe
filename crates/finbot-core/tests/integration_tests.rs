//! Integration tests for finbot-core
//!
//! These tests exercise the full signup → link → chat ingest → report workflow.

use std::time::Duration;

use chrono::Utc;
use finbot_core::{
    auth::{hash_password, verify_password},
    linking::{consume_link_code, generate_link_code, request_password_reset, reset_password},
    AIClient, Category, Database, Error, ExpenseEvent, ExpenseSource, ExtractionSource, Extractor,
    Ingestor, ManualEntry, MonthRange, Notifier, PaymentMode, Statement, StatsEngine,
};

const CHAT_ID: &str = "998877";

fn setup() -> (Ingestor, i64) {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let user = db
        .create_user(
            "Asha",
            "asha@example.com",
            &hash_password("Str0ng!pass").unwrap(),
        )
        .expect("Failed to create user");
    let extractor = Extractor::new(AIClient::mock(), Duration::from_secs(5));
    (Ingestor::new(db, Some(extractor), Notifier::new()), user.id)
}

fn link(ingestor: &Ingestor, user_id: i64) {
    let code = generate_link_code(ingestor.db(), user_id, chrono::Duration::minutes(10))
        .expect("Failed to issue link code");
    consume_link_code(ingestor.db(), &code.code, CHAT_ID).expect("Failed to link chat");
}

// =============================================================================
// End-to-end Workflow
// =============================================================================

#[tokio::test]
async fn test_chat_expense_to_statement_workflow() {
    let (ingestor, user_id) = setup();
    link(&ingestor, user_id);

    let mut events = ingestor.notifier().subscribe(user_id);

    let expense = ingestor
        .ingest_chat_text(CHAT_ID, "100 momos")
        .await
        .expect("Chat ingestion failed");
    assert_eq!(expense.title, "momos");
    assert_eq!(expense.amount, 100.0);
    assert_eq!(expense.category, Category::Food);
    assert_eq!(expense.mode, PaymentMode::Cash);
    assert_eq!(expense.source, ExpenseSource::ChatText);

    assert_eq!(
        events.recv().await.unwrap(),
        ExpenseEvent::Created { id: expense.id }
    );

    // The /report path: current month, owner's rows only
    let range = MonthRange::current();
    let rows = ingestor
        .db()
        .list_expenses_in_range(user_id, &range)
        .unwrap();
    let statement = Statement::build("Asha", &rows, Utc::now().date_naive());
    assert_eq!(statement.rows.len(), 1);
    assert_eq!(statement.rows[0].amount, "Rs. 100");
    assert_eq!(statement.total_line(), "Total Expense: Rs. 100");
    assert!(statement.render_pdf().unwrap().starts_with(b"%PDF"));

    let stats = StatsEngine::new(ingestor.db().clone())
        .compute_stats(user_id, range)
        .await
        .unwrap();
    assert_eq!(stats.total_expense, 100.0);
    assert_eq!(stats.category_stats.len(), 1);
    assert_eq!(stats.category_stats[0].category, Category::Food);
}

#[tokio::test]
async fn test_unlinked_chat_is_rejected() {
    let (ingestor, user_id) = setup();

    let result = ingestor.ingest_chat_text(CHAT_ID, "100 momos").await;
    assert!(matches!(result, Err(Error::NotLinked)));
    assert_eq!(ingestor.db().count_expenses(user_id).unwrap(), 0);
}

#[tokio::test]
async fn test_unparseable_chat_text_writes_nothing() {
    let (ingestor, user_id) = setup();
    link(&ingestor, user_id);

    let result = ingestor.ingest_chat_text(CHAT_ID, "hello there").await;
    assert!(matches!(
        result,
        Err(Error::ExtractionFailed(ExtractionSource::Text))
    ));
    assert_eq!(ingestor.db().count_expenses(user_id).unwrap(), 0);
}

#[test]
fn test_manual_entry_then_delete() {
    let (ingestor, user_id) = setup();
    let other = ingestor
        .db()
        .create_user("Ravi", "ravi@example.com", "hash")
        .unwrap();

    let expense = ingestor
        .ingest_manual(
            user_id,
            ManualEntry {
                title: Some("Rent".into()),
                amount: Some(12000.0),
                category: Some("Bills".into()),
                mode: Some("Online".into()),
                date: None,
            },
        )
        .unwrap();
    assert_eq!(expense.category, Category::Bills);

    // Someone else's id cannot delete it
    assert!(matches!(
        ingestor.delete_expense(expense.id, other.id),
        Err(Error::NotFoundOrUnauthorized)
    ));
    ingestor.delete_expense(expense.id, user_id).unwrap();
    assert!(ingestor.db().get_expense(expense.id).unwrap().is_none());
}

// =============================================================================
// Account Flows
// =============================================================================

#[test]
fn test_link_code_is_single_use() {
    let (ingestor, user_id) = setup();
    let code = generate_link_code(ingestor.db(), user_id, chrono::Duration::minutes(10)).unwrap();

    consume_link_code(ingestor.db(), &code.code, CHAT_ID).unwrap();
    assert!(matches!(
        consume_link_code(ingestor.db(), &code.code, "another-chat"),
        Err(Error::InvalidOrExpiredCode)
    ));
}

#[test]
fn test_password_reset_flow() {
    let (ingestor, user_id) = setup();
    link(&ingestor, user_id);

    let (user, otp) = request_password_reset(ingestor.db(), "asha@example.com").unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(otp.len(), 4);

    reset_password(ingestor.db(), "asha@example.com", &otp, "N3w!password").unwrap();
    let updated = ingestor.db().get_user(user_id).unwrap().unwrap();
    assert!(verify_password("N3w!password", &updated.password_hash));
    assert!(updated.reset_password_otp.is_none());

    // Second use of the same OTP fails
    assert!(matches!(
        reset_password(ingestor.db(), "asha@example.com", &otp, "An0ther!pass"),
        Err(Error::InvalidOrExpiredCode)
    ));
}

#[test]
fn test_password_reset_requires_linked_chat() {
    let (ingestor, _) = setup();
    assert!(matches!(
        request_password_reset(ingestor.db(), "asha@example.com"),
        Err(Error::NotLinked)
    ));
}

// =============================================================================
// Encrypted Storage
// =============================================================================

#[test]
fn test_encrypted_database_persists_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("finbot.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new_with_key(path, Some("integration-secret")).unwrap();
        db.create_user("Asha", "asha@example.com", "hash").unwrap();
    }

    let reopened = Database::new_with_key(path, Some("integration-secret")).unwrap();
    assert!(reopened
        .get_user_by_email("asha@example.com")
        .unwrap()
        .is_some());

    assert!(Database::new_with_key(path, Some("wrong-secret")).is_err());
}
