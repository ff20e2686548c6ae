use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use engine::{LogNotifier, Notifier};
use migration::{Migrator, MigratorTrait};

mod cli;
mod notifier;
mod settings;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let cli = cli::Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "spleet={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = connect(&url).await?;

    let notifier: Arc<dyn Notifier> = match &settings.notifications {
        Some(push) => {
            tracing::info!("Found notification settings...");
            Arc::new(notifier::WebhookNotifier::new(
                &push.endpoint,
                Duration::from_secs(push.timeout_secs),
            )?)
        }
        None => Arc::new(LogNotifier),
    };

    let engine = engine::Engine::builder()
        .database(db)
        .notifier(notifier)
        .build()
        .await?;

    match cli::run(&engine, cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::debug!("command failed: {err:?}");
            eprintln!("error: {err}");
            Ok(ExitCode::from(cli::exit_code(&err)))
        }
    }
}

async fn connect(
    url: &str,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
