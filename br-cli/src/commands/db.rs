//! Database maintenance commands.

use clap::Subcommand;
use console::style;

use br_core::config::ConfigHandle;
use br_core::error::BrResult;
use br_models::Database;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum DbAction {
    /// Show row counts and storage details.
    Stats,
    /// Run integrity and foreign key checks.
    Check,
    /// Show the database file path.
    Path,
}

async fn open_database(config: &ConfigHandle) -> BrResult<(Database, std::path::PathBuf)> {
    let config = config.read().await;
    let path = config.effective_db_path()?;
    let db = Database::init(&path, &config.database)?;
    Ok((db, path))
}

pub async fn run(config: ConfigHandle, action: DbAction, format: OutputFormat) -> BrResult<()> {
    match action {
        DbAction::Stats => {
            let (db, db_path) = open_database(&config).await?;
            let stats = db.stats()?;
            let file_size = std::fs::metadata(&db_path).ok().map(|m| m.len());

            let conn = db.conn()?;
            let journal_mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap_or_else(|_| "unknown".to_string());
            let schema_version = br_models::migrations::get_schema_version(&conn)?;

            let rows = [
                ("roles", stats.roles),
                ("photos", stats.photos),
                ("users", stats.users),
                ("incidents", stats.incidents),
                ("messages", stats.messages),
                ("recipient_copies", stats.recipient_copies),
                ("conversations", stats.conversations),
            ];

            match format {
                OutputFormat::Json => {
                    let tables: serde_json::Map<String, serde_json::Value> = rows
                        .iter()
                        .map(|(name, count)| (name.to_string(), serde_json::Value::from(*count)))
                        .collect();
                    super::print_json(&serde_json::json!({
                        "path": db_path.display().to_string(),
                        "tables": tables,
                        "file_size_bytes": file_size,
                        "journal_mode": journal_mode,
                        "schema_version": schema_version,
                    }));
                }
                OutputFormat::Text => {
                    println!("{}", style("Database Statistics").bold().underlined());
                    println!("  Path:          {}", db_path.display());
                    println!("  Journal mode:  {journal_mode}");
                    println!("  Schema:        v{schema_version}");
                    if let Some(size) = file_size {
                        println!("  Size:          {size} bytes");
                    }
                    println!();

                    let mut table = super::new_table(vec!["Table", "Row Count"]);
                    for (name, count) in rows {
                        table.add_row(vec![name.to_string(), count.to_string()]);
                    }
                    println!("{table}");
                }
            }
        }
        DbAction::Check => {
            let (db, _) = open_database(&config).await?;
            let integrity = db.run_integrity_check();

            let conn = db.conn()?;
            let violations: Vec<String> = match conn.prepare("PRAGMA foreign_key_check") {
                Ok(mut stmt) => stmt
                    .query_map([], |row| {
                        let table: String = row.get(0)?;
                        let rowid: i64 = row.get(1)?;
                        let parent: String = row.get(2)?;
                        Ok(format!("{table} row {rowid} -> {parent}"))
                    })
                    .map(|rows| rows.filter_map(|r| r.ok()).collect())
                    .unwrap_or_default(),
                Err(_) => Vec::new(),
            };

            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "integrity_ok": integrity.is_ok(),
                    "foreign_key_violations": violations,
                })),
                OutputFormat::Text => {
                    match &integrity {
                        Ok(()) => println!("  {} Integrity check passed.", style("OK").green().bold()),
                        Err(e) => println!("  {} Integrity check failed: {e}", style("FAIL").red().bold()),
                    }
                    if violations.is_empty() {
                        println!("  {} Foreign key constraints OK.", style("OK").green().bold());
                    } else {
                        println!(
                            "  {} {} foreign key violation(s):",
                            style("WARN").yellow().bold(),
                            violations.len()
                        );
                        for v in violations.iter().take(10) {
                            println!("    - {v}");
                        }
                    }
                }
            }
            integrity?;
        }
        DbAction::Path => {
            let db_path = config.read().await.effective_db_path()?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "path": db_path.display().to_string() })),
                OutputFormat::Text => println!("{}", db_path.display()),
            }
        }
    }
    Ok(())
}
