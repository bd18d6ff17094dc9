//! Store initialization.

use br_core::config::ConfigHandle;
use br_core::error::BrResult;

use crate::OutputFormat;

pub async fn run(config: ConfigHandle, format: OutputFormat) -> BrResult<()> {
    let db_path = config.read().await.effective_db_path()?;
    let (ctx, events) = super::open_context(&config).await?;
    let stats = ctx.database.stats()?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "path": db_path.display().to_string(),
            "users": stats.users,
            "incidents": stats.incidents,
            "healthy": ctx.is_healthy(),
        })),
        OutputFormat::Text => {
            super::success(&format!("store ready at {}", db_path.display()));
            println!("{stats}");
            if ctx.config.seed.demo_data {
                println!("Demo login: a@a.cl / Admin123!");
            }
        }
    }
    super::close_context(ctx, events).await;
    Ok(())
}
