use anyhow::{Context, Result};
use storefront_core::collector::{self, CollectorState};
use storefront_core::config::Config;
use storefront_core::i18n::{Dictionary, TranslationValidator, Translator};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storefront_core=info".parse()?),
        )
        .init();

    info!("Starting storefront collector");

    let config = Config::from_env()?;

    // Translation drift is reported but never blocks startup
    let report = TranslationValidator::check(Dictionary::builtin());
    for problem in &report.errors {
        error!("Translation error: {}", problem);
    }
    for warning in &report.warnings {
        warn!("Translation warning: {}", warning);
    }
    if report.is_clean() {
        info!("✓ Built-in translations are consistent");
    }

    let translator = Translator::builtin(config.default_language);
    info!(
        "Default language: {} ({})",
        config.default_language.native_name(),
        translator.t("navigation.home")
    );

    let state = CollectorState::new(config.ingest_token.clone());
    if config.ingest_token.is_some() {
        info!("Ingest token required on all ingestion endpoints");
    }

    let app = collector::router(
        state,
        &config.telemetry.endpoints,
        &config.telemetry.metrics_endpoint,
    );

    let addr = format!("0.0.0.0:{}", config.collector_port);
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("✓ Collector listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Collector server failed")?;

    info!("Collector stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
