//! Learnfront CLI - course management against the catalog backend.
//!
//! # Usage
//!
//! ```bash
//! # List every course in the catalog
//! lf-cli courses list
//!
//! # Show one course by id
//! lf-cli courses show 65f0c0ffee
//!
//! # Create a course
//! lf-cli courses create --title "Async Rust" --slug async-rust --price 49.99 --currency USD
//!
//! # Change the price of an existing course
//! lf-cli courses update 65f0c0ffee --price 39.99
//!
//! # Delete a course
//! lf-cli courses delete 65f0c0ffee
//! ```
//!
//! # Environment Variables
//!
//! - `BACKEND_URL` - Base URL of the catalog backend
//! - `BACKEND_API_KEY` - Optional bearer token for write operations
//! - `BACKEND_TIMEOUT_SECS` - Request timeout (default 15)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use learnfront_core::{CourseLevel, CurrencyCode};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "lf-cli")]
#[command(author, version, about = "Learnfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage catalog courses
    Courses {
        #[command(subcommand)]
        action: CourseAction,
    },
}

#[derive(Subcommand)]
enum CourseAction {
    /// List all courses
    List,
    /// Show a single course
    Show {
        /// Course id
        id: String,
    },
    /// Create a new course
    Create {
        #[command(flatten)]
        fields: CourseFields,
    },
    /// Update fields of an existing course
    Update {
        /// Course id
        id: String,

        #[command(flatten)]
        fields: CourseFields,
    },
    /// Delete a course
    Delete {
        /// Course id
        id: String,
    },
}

/// Course fields accepted on the command line.
///
/// Every field is optional so the same set serves `create` and `update`;
/// `create` checks that the required ones are present.
#[derive(Args, Debug, Default)]
pub struct CourseFields {
    /// Course title
    #[arg(short, long)]
    pub title: Option<String>,

    /// URL slug (lowercase letters, digits, hyphens)
    #[arg(short, long)]
    pub slug: Option<String>,

    /// Price, e.g. 49.99 (0 for a free course)
    #[arg(short, long)]
    pub price: Option<Decimal>,

    /// Three-letter currency code
    #[arg(short, long)]
    pub currency: Option<CurrencyCode>,

    /// Course description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Instructor name
    #[arg(short, long)]
    pub instructor: Option<String>,

    /// Level (`beginner`, `intermediate`, `advanced`)
    #[arg(short, long)]
    pub level: Option<CourseLevel>,

    /// Human-readable duration, e.g. "6 hours"
    #[arg(long)]
    pub duration: Option<String>,

    /// Preview text shown on the course page
    #[arg(long)]
    pub preview_content: Option<String>,

    /// Preview image URL (repeatable)
    #[arg(long = "preview-image")]
    pub preview_images: Vec<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Courses { action } => {
            let client = commands::courses::connect()?;
            match action {
                CourseAction::List => commands::courses::list(&client).await?,
                CourseAction::Show { id } => commands::courses::show(&client, &id).await?,
                CourseAction::Create { fields } => {
                    commands::courses::create(&client, fields).await?;
                }
                CourseAction::Update { id, fields } => {
                    commands::courses::update(&client, &id, fields).await?;
                }
                CourseAction::Delete { id } => commands::courses::delete(&client, &id).await?,
            }
        }
    }
    Ok(())
}
