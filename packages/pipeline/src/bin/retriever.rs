use tracing_subscriber::EnvFilter;

use pfr_pipeline::config::RetrieverConfig;
use pfr_pipeline::retriever::run_retriever;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match RetrieverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    match run_retriever(config).await {
        Ok(report) => {
            tracing::info!(
                from = %report.from,
                pages = report.pages,
                records = report.records,
                "retrieval finished"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "retriever exited with error");
            std::process::exit(1);
        }
    }
}
