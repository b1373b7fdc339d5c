mod bootstrap;

use a2m_core::formatting::format_count;
use a2m_core::models::RecordType;
use a2m_core::settings::Settings;
use a2m_runtime::jsonl_importer::JsonlImporter;
use a2m_runtime::Config;
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(settings.effective_log_level())?;
    tracing::info!("amplitude-to-mixpanel v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_settings(&settings)?;
    if config.logs {
        if let Some(dir) = bootstrap::prepare_logs_dir(settings.logs_dir.as_deref()) {
            config.logs_dir = Some(dir);
        }
    }
    if config.dir.is_none() && config.file.is_none() {
        config.stream = Some(Box::new(tokio::io::stdin()));
    }

    let importer = JsonlImporter::to_dir(&settings.out_dir);
    tracing::info!("writing converted records to {}", settings.out_dir.display());

    let results = a2m_runtime::run(config, &importer).await?;

    for record_type in RecordType::ALL {
        let outcome = results.get(record_type);
        if outcome.total > 0 {
            tracing::info!(
                "{}: {} of {} records converted",
                record_type,
                format_count(outcome.success),
                format_count(outcome.total)
            );
        }
    }
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
