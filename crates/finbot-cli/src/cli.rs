//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// FinBot - Track expenses from chat messages, receipts and the web
#[derive(Parser)]
#[command(name = "finbot")]
#[command(about = "Self-hosted expense tracker with a Telegram bot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "finbot.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FINBOT_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server and the Telegram bot
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Do not poll Telegram for chat updates
        ///
        /// The bot token is still used to deliver password-reset codes.
        #[arg(long)]
        no_bot: bool,
    },

    /// List registered users and their chat link status
    Users,

    /// Show a month of category, daily and payment-mode totals
    Stats {
        /// Email of the user
        #[arg(short, long)]
        email: String,

        /// Month (1-12), defaults to the current month
        #[arg(short, long)]
        month: Option<u32>,

        /// Year, defaults to the current year
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Write a monthly PDF statement
    Report {
        /// Email of the user
        #[arg(short, long)]
        email: String,

        /// Month (1-12), defaults to the current month
        #[arg(short, long)]
        month: Option<u32>,

        /// Year, defaults to the current year
        #[arg(short, long)]
        year: Option<i32>,

        /// Output file
        #[arg(short, long, default_value = "Monthly_Report.pdf")]
        out: PathBuf,
    },
}
