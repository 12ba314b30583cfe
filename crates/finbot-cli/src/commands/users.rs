//! User listing command

use anyhow::Result;
use finbot_core::db::Database;

use super::truncate;

pub fn cmd_users(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users yet. Sign up through the web app first.");
        return Ok(());
    }

    println!("👤 Users");
    println!();
    println!(
        "  {:>4}  {:20}  {:30}  {:8}  {:>8}",
        "ID", "Name", "Email", "Telegram", "Expenses"
    );
    println!("  {}", "─".repeat(78));

    for user in &users {
        let expenses = db.count_expenses(user.id)?;
        println!(
            "  {:>4}  {:20}  {:30}  {:8}  {:>8}",
            user.id,
            truncate(&user.name, 20),
            truncate(&user.email, 30),
            if user.is_linked() { "linked" } else { "-" },
            expenses
        );
    }

    println!();
    println!("  {} users", users.len());

    Ok(())
}
