//! Database tests

use super::*;
use crate::models::*;
use chrono::{Duration, TimeZone};

fn new_user(db: &Database, email: &str) -> User {
    db.create_user("Test User", email, "$argon2id$placeholder")
        .unwrap()
}

fn expense_on(user_id: i64, title: &str, amount: f64, category: Category, day: u32) -> NewExpense {
    NewExpense {
        user_id,
        title: title.into(),
        amount,
        category,
        mode: PaymentMode::Cash,
        date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        source: ExpenseSource::Manual,
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_users().unwrap().is_empty());
}

#[test]
fn test_category_check_matches_closed_set() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "set@example.com");

    for category in Category::ALL {
        db.insert_expense(&expense_on(user.id, "x", 1.0, category, 3))
            .unwrap();
    }

    let conn = db.conn().unwrap();
    let result = conn.execute(
        "INSERT INTO expenses (user_id, title, amount, category, mode, date) VALUES (?, 'x', 1, 'Misc', 'Cash', '2024-01-01 00:00:00')",
        rusqlite::params![user.id],
    );
    assert!(result.is_err(), "category outside the set must be rejected");

    let result = conn.execute(
        "INSERT INTO expenses (user_id, title, amount, category, mode, date) VALUES (?, 'x', 1, 'Food', 'Card', '2024-01-01 00:00:00')",
        rusqlite::params![user.id],
    );
    assert!(result.is_err(), "mode outside Cash/Online must be rejected");
}

#[test]
fn test_user_email_normalized_and_unique() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "  Asha@Example.COM ");
    assert_eq!(user.email, "asha@example.com");

    let found = db.get_user_by_email("ASHA@example.com").unwrap().unwrap();
    assert_eq!(found.id, user.id);

    let dup = db.create_user("Other", "asha@example.com", "hash");
    assert!(matches!(dup, Err(Error::Conflict(_))));
}

#[test]
fn test_expense_crud_and_month_listing() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "crud@example.com");

    let first = db
        .insert_expense(&expense_on(user.id, "Tea", 20.0, Category::Food, 1))
        .unwrap();
    db.insert_expense(&expense_on(user.id, "Bus", 30.0, Category::Travel, 15))
        .unwrap();
    let mut february = expense_on(user.id, "Rent", 900.0, Category::Bills, 1);
    february.date = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    db.insert_expense(&february).unwrap();

    assert_eq!(first.title, "Tea");
    assert_eq!(first.category, Category::Food);
    assert_eq!(first.source, ExpenseSource::Manual);

    let january = MonthRange::new(2024, 1).unwrap();
    let listed = db.list_expenses_in_range(user.id, &january).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].title, "Bus", "newest first");
    assert_eq!(listed[1].title, "Tea");
    assert_eq!(db.count_expenses(user.id).unwrap(), 3);
}

#[test]
fn test_delete_requires_ownership() {
    let db = Database::in_memory().unwrap();
    let owner = new_user(&db, "a@example.com");
    let other = new_user(&db, "b@example.com");

    let expense = db
        .insert_expense(&expense_on(owner.id, "Lunch", 120.0, Category::Food, 4))
        .unwrap();

    assert!(!db.delete_owned_expense(expense.id, other.id).unwrap());
    assert!(db.get_expense(expense.id).unwrap().is_some());

    assert!(db.delete_owned_expense(expense.id, owner.id).unwrap());
    assert!(db.get_expense(expense.id).unwrap().is_none());
    assert!(!db.delete_owned_expense(expense.id, owner.id).unwrap());
}

#[test]
fn test_grouping_queries() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "stats@example.com");

    db.insert_expense(&expense_on(user.id, "Momos", 100.0, Category::Food, 2))
        .unwrap();
    db.insert_expense(&expense_on(user.id, "Thali", 250.0, Category::Food, 2))
        .unwrap();
    let mut cab = expense_on(user.id, "Cab", 400.0, Category::Travel, 1);
    cab.mode = PaymentMode::Online;
    db.insert_expense(&cab).unwrap();

    let range = MonthRange::new(2024, 1).unwrap();

    let categories = db.category_totals(user.id, &range).unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].category, Category::Travel);
    assert_eq!(categories[1].category, Category::Food);
    assert_eq!(categories[1].total, 350.0);

    let daily = db.daily_totals(user.id, &range).unwrap();
    assert_eq!(daily.len(), 2);
    assert_eq!(daily[0].date, "2024-01-01");
    assert_eq!(daily[1].date, "2024-01-02");
    assert_eq!(daily[1].total, 350.0);

    let modes = db.mode_totals(user.id, &range).unwrap();
    assert_eq!(modes.len(), 2);
    assert_eq!(modes[0].mode, PaymentMode::Online);
    assert_eq!(modes[1].total, 350.0);
}

#[test]
fn test_link_chat_is_compare_and_clear() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "link@example.com");
    let expires = Utc::now() + Duration::minutes(10);

    db.set_verification_code(user.id, "123456", expires).unwrap();
    let pending = db
        .find_user_by_pending_code("123456", Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!(pending.id, user.id);

    assert!(db.link_chat(user.id, "123456", "chat-1").unwrap());
    assert!(!db.link_chat(user.id, "123456", "chat-2").unwrap());

    let linked = db.get_user(user.id).unwrap().unwrap();
    assert_eq!(linked.telegram_chat_id.as_deref(), Some("chat-1"));
    assert!(linked.verification_code.is_none());
    assert!(linked.verification_expires.is_none());
}

#[test]
fn test_expired_code_not_found() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "old@example.com");

    db.set_verification_code(user.id, "654321", Utc::now() - Duration::minutes(1))
        .unwrap();
    assert!(db
        .find_user_by_pending_code("654321", Utc::now())
        .unwrap()
        .is_none());
}

#[test]
fn test_chat_id_unique_across_users() {
    let db = Database::in_memory().unwrap();
    let first = new_user(&db, "one@example.com");
    let second = new_user(&db, "two@example.com");
    let expires = Utc::now() + Duration::minutes(10);

    db.set_verification_code(first.id, "111111", expires).unwrap();
    db.set_verification_code(second.id, "222222", expires).unwrap();
    assert!(db.link_chat(first.id, "111111", "shared-chat").unwrap());

    let result = db.link_chat(second.id, "222222", "shared-chat");
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[test]
fn test_consume_reset_otp() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "otp@example.com");

    db.set_reset_otp(user.id, "4321", Utc::now() + Duration::minutes(5))
        .unwrap();
    assert!(!db
        .consume_reset_otp(user.id, "0000", Utc::now(), "new-hash")
        .unwrap());
    assert!(db
        .consume_reset_otp(user.id, "4321", Utc::now(), "new-hash")
        .unwrap());
    assert!(!db
        .consume_reset_otp(user.id, "4321", Utc::now(), "newer-hash")
        .unwrap());

    let updated = db.get_user(user.id).unwrap().unwrap();
    assert_eq!(updated.password_hash, "new-hash");
    assert!(updated.reset_password_otp.is_none());
}

#[test]
fn test_encrypted_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encrypted.db");
    let path = path.to_string_lossy();

    {
        let db = Database::new_with_key(&path, Some("test-passphrase")).unwrap();
        new_user(&db, "enc@example.com");
    }

    {
        let db = Database::new_with_key(&path, Some("test-passphrase")).unwrap();
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    assert!(
        Database::new_with_key(&path, None).is_err(),
        "Should fail to open encrypted db without key"
    );
    assert!(
        Database::new_with_key(&path, Some("wrong-passphrase")).is_err(),
        "Should fail to open encrypted db with wrong key"
    );
}

#[test]
fn test_key_derivation_is_deterministic() {
    let key1 = derive_key("my-secret").unwrap();
    let key2 = derive_key("my-secret").unwrap();
    assert_eq!(key1, key2);
    assert_ne!(key1, derive_key("other-secret").unwrap());
}

#[test]
fn test_datetime_roundtrip() {
    let dt = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
    assert_eq!(format_datetime(&dt), "2024-03-09 08:07:06");
    assert_eq!(parse_datetime("2024-03-09 08:07:06"), dt);
}
