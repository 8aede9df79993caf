use anyhow::{Context, Result};
use kgquiz::generation::GenerationClient;
use kgquiz::server::HttpServer;
use kgquiz::wikidata::WikidataClient;
use kgquiz::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.explorer.log_level.as_str()),
    )
    .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "check" => run_check(&config).await?,
        "serve" => run_http_server(&config).await?,
        other => anyhow::bail!("Unknown command '{}'. Usage: kgquiz [serve|check]", other),
    }

    Ok(())
}

/// Run the HTTP API server
async fn run_http_server(config: &Config) -> Result<()> {
    log::info!("Starting kgquiz v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Traversal mode {:?}, root limit {}, expand limit {}",
        config.wikidata.mode,
        config.wikidata.limit_relations,
        config.wikidata.expand_limit
    );

    let server = HttpServer::new(config)?;
    server.run(config.http_server.port).await?;

    Ok(())
}

/// Verify configuration and probe both upstream services
async fn run_check(config: &Config) -> Result<()> {
    log::info!("Configuration loaded successfully");

    let wikidata = WikidataClient::new(config.wikidata.clone())?;
    let hits = wikidata
        .search_entities("Douglas Adams")
        .await
        .context("Wikidata search failed")?;
    log::info!("Wikidata reachable ({} search hits)", hits.len());

    let generator = GenerationClient::new(&config.generation)?;
    match generator.list_models().await {
        Ok(models) if models.iter().any(|m| m == generator.default_model()) => {
            log::info!("Generator reachable, model {} available", generator.default_model());
        }
        Ok(models) => {
            log::warn!(
                "Generator reachable but model {} is not installed (have: {})",
                generator.default_model(),
                models.join(", ")
            );
        }
        Err(e) => log::warn!("Generator not reachable at {}: {}", generator.endpoint(), e),
    }

    Ok(())
}
