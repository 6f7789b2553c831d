mod importer;
mod model;
mod queries;

use anyhow::{Context, Result};
use importer::{Config, Importer};
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::{error, info, warn};

/// Connect to Neo4j with exponential backoff retry logic
async fn connect_neo4j_with_retry(
    uri: &str,
    user: &str,
    password: &str,
    max_retries: u32,
) -> Result<neo4rs::Graph> {
    use tokio::time::{sleep, Duration};

    for attempt in 1..=max_retries {
        info!(
            "Attempting to connect to Neo4j at {}... (attempt {}/{})",
            uri, attempt, max_retries
        );

        match neo4rs::Graph::new(uri, user, password).await {
            Ok(graph) => {
                info!("Successfully connected to Neo4j");
                return Ok(graph);
            }
            Err(e) => {
                if attempt < max_retries {
                    let wait_time = 2u64.pow(attempt - 1); // 1s, 2s, 4s, 8s
                    warn!(
                        "Failed to connect to Neo4j: {}. Retrying in {}s (attempt {}/{})...",
                        e, wait_time, attempt, max_retries
                    );
                    sleep(Duration::from_secs(wait_time)).await;
                } else {
                    error!("Failed to connect to Neo4j after {} attempts: {}", max_retries, e);
                    return Err(anyhow::anyhow!(
                        "Neo4j connection failed after {} retries: {}",
                        max_retries,
                        e
                    ));
                }
            }
        }
    }

    Err(anyhow::anyhow!("Failed to connect to Neo4j"))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Blocking yes/no prompt on stdin. Lives here so the importer itself
/// never reads the console.
fn confirm_import() -> Result<bool> {
    print!("\nProceed with import? (yes/no): ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation from stdin")?;

    Ok(is_affirmative(&answer))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("FoodData Central Importer starting...");

    let config = Config::from_env()?;

    info!("{}", "=".repeat(50));
    info!("Neo4j URI:  {}", config.uri);
    info!("User:       {}", config.user);
    info!("JSON File:  {}", config.json_file.display());
    info!("{}", "=".repeat(50));

    if !config.assume_yes && !confirm_import()? {
        info!("Import cancelled");
        return Ok(());
    }

    let graph = connect_neo4j_with_retry(&config.uri, &config.user, &config.password, 4).await?;

    let start = Instant::now();
    let importer = Importer::new(graph, &config);

    match importer.run(&config.json_file).await {
        Ok(_summary) => {
            info!("Import completed in {:.2} seconds", start.elapsed().as_secs_f64());
            Ok(())
        }
        Err(e) => {
            error!("Error during import: {:#}", e);
            Err(e)
        }
    }
}
