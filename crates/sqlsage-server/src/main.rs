//! SQLSage — text-to-SQL assistant backend.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sqlsage_core::SqlSageConfig;
use sqlsage_embed::EmbeddingBackend;
use sqlsage_generate::{HttpLlmClient, LlmClient, LlmConfig};
use sqlsage_server::routes;
use sqlsage_server::state::AppState;
use sqlsage_store::{migrate, EmbeddingMigrator, MemoryStore, SqliteStore, VectorStore};

fn resolve_data_dir() -> PathBuf {
    std::env::var("SQLSAGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn open_stores(
    config: &SqlSageConfig,
) -> anyhow::Result<(Arc<SqliteStore>, Arc<dyn VectorStore>, Arc<dyn EmbeddingBackend>)> {
    let relational = Arc::new(SqliteStore::open(
        &config.data_paths.database,
        config.embedding_dim,
    )?);
    let embedder = sqlsage_embed::create_embedder(&config.data_paths.models, config.embedding_dim);

    let vectors: Arc<dyn VectorStore> = match std::env::var("SQLSAGE_VECTOR_BACKEND").as_deref() {
        Ok("memory") => {
            info!("Using in-memory vector store");
            Arc::new(MemoryStore::new(embedder.dimension()))
        }
        _ => relational.clone(),
    };

    Ok((relational, vectors, embedder))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--migrate" | "migrate" => {
                let data_dir = if args.len() > 2 {
                    PathBuf::from(&args[2])
                } else {
                    resolve_data_dir()
                };
                let config = SqlSageConfig::from_env(&data_dir)?;
                let (_relational, vectors, embedder) = open_stores(&config)?;
                let report = EmbeddingMigrator::new(vectors.as_ref()).migrate(embedder.as_ref())?;
                migrate::print_report(&report);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("SQLSage — text-to-SQL assistant backend");
                println!();
                println!("Usage: sqlsage [command]");
                println!();
                println!("Commands:");
                println!("  (none)               Start the server");
                println!("  migrate [data-dir]   Re-embed stored records with the active embedder");
                println!("  help                 Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'sqlsage help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = SqlSageConfig::from_env(&data_dir)?;
    let port = config.port;

    let (relational, vectors, embedder) = open_stores(&config)?;

    // The migrator mutates embeddings in place, so it runs to completion
    // before the router accepts its first request.
    let migrator = EmbeddingMigrator::new(vectors.as_ref());
    if migrator.needs_migration(embedder.as_ref())? {
        warn!("Embedding provider changed since the store was written; migrating");
        let report = migrator.migrate(embedder.as_ref())?;
        info!(
            "Migration finished: migrated={}, failed={}, removed={}",
            report.migrated(),
            report.failed(),
            report.removed()
        );
    }

    let llm_config = Arc::new(RwLock::new(LlmConfig::load(
        &config.data_paths.llm_config_file,
    )));
    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(llm_config.clone()));

    let state = Arc::new(AppState::new(
        config,
        relational,
        vectors,
        embedder,
        llm_config,
        llm,
    ));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("SQLSage server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
