//! Batch Importer
//!
//! Sequential import phases over a Neo4j connection: schema setup,
//! nutrient upserts, food/category creation, measurement relationships,
//! then a verification pass with count queries. Each data phase runs in
//! its own transaction and any query error rolls that phase back and
//! aborts the run.

use crate::model::{self, Food, Nutrient};
use crate::queries::{self, CountTarget};
use anyhow::{Context, Result};
use neo4rs::Graph;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DEFAULT_FOOD_BATCH_SIZE: usize = 100;
pub const DEFAULT_NUTRIENT_BATCH_SIZE: usize = 1000;

/// Progress line interval for the per-food measurement phase.
const MEASUREMENT_PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub json_file: PathBuf,
    pub food_batch_size: usize,
    pub nutrient_batch_size: usize,
    /// Skip the interactive confirmation prompt.
    pub assume_yes: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            uri: env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
            user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
            password: env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "password".to_string()),
            json_file: env::var("FDC_JSON_FILE")
                .unwrap_or_else(|_| {
                    "FoodData_Central_foundation_food_json_2025-04-24.json".to_string()
                })
                .into(),
            food_batch_size: parse_batch_size("FOOD_BATCH_SIZE", DEFAULT_FOOD_BATCH_SIZE)?,
            nutrient_batch_size: parse_batch_size(
                "NUTRIENT_BATCH_SIZE",
                DEFAULT_NUTRIENT_BATCH_SIZE,
            )?,
            assume_yes: env::var("ASSUME_YES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn parse_batch_size(var: &str, default: usize) -> Result<usize> {
    match env::var(var) {
        Ok(raw) => {
            let size: usize = raw
                .parse()
                .with_context(|| format!("{var} must be a positive integer, got '{raw}'"))?;
            anyhow::ensure!(size > 0, "{var} must be greater than zero");
            Ok(size)
        }
        Err(_) => Ok(default),
    }
}

/// Node and relationship counts reported by the verification phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub foods: i64,
    pub nutrients: i64,
    pub categories: i64,
    pub nutrient_relationships: i64,
    pub category_relationships: i64,
}

pub struct Importer {
    graph: Graph,
    food_batch_size: usize,
    nutrient_batch_size: usize,
}

impl Importer {
    pub fn new(graph: Graph, config: &Config) -> Self {
        Self {
            graph,
            food_batch_size: config.food_batch_size,
            nutrient_batch_size: config.nutrient_batch_size,
        }
    }

    /// Run the complete import against the given source file.
    pub async fn run(&self, json_file: &std::path::Path) -> Result<ImportSummary> {
        let foods = model::load_foods(json_file)?;

        self.create_constraints_and_indexes().await?;
        self.upsert_nutrients(&foods).await?;
        self.create_foods_and_categories(&foods).await?;
        self.create_measurements(&foods).await?;

        let summary = self.verify().await?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Uniqueness constraints and lookup indexes. Schema statements are
    /// auto-commit; Neo4j refuses to mix them with data writes in one
    /// transaction.
    pub async fn create_constraints_and_indexes(&self) -> Result<()> {
        info!("Creating constraints and indexes...");

        for statement in queries::schema_statements() {
            self.graph
                .run(statement)
                .await
                .context("Failed to create constraint or index")?;
        }

        info!("Constraints and indexes created");
        Ok(())
    }

    /// Deduplicate the nutrients referenced across all foods and MERGE
    /// them in batches.
    pub async fn upsert_nutrients(&self, foods: &[Food]) -> Result<usize> {
        info!("Creating nutrient nodes...");

        let nutrients = model::dedup_nutrients(foods);
        info!("Found {} unique nutrients", nutrients.len());

        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to start transaction")?;

        let result = run_nutrient_batches(&mut txn, &nutrients, self.nutrient_batch_size).await;

        match result {
            Ok(()) => {
                txn.commit().await.context("Failed to commit transaction")?;
                info!("Created {} nutrient nodes", nutrients.len());
                Ok(nutrients.len())
            }
            Err(e) => {
                warn!("Error during nutrient upsert, rolling back: {}", e);
                txn.rollback()
                    .await
                    .context("Failed to rollback transaction")?;
                Err(e)
            }
        }
    }

    /// CREATE food nodes (never MERGE: a re-run is meant to fail on the
    /// fdcId constraint), MERGE their categories, link the two.
    pub async fn create_foods_and_categories(&self, foods: &[Food]) -> Result<()> {
        info!("Creating food and category nodes...");

        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to start transaction")?;

        let result = run_food_batches(&mut txn, foods, self.food_batch_size).await;

        match result {
            Ok(()) => {
                txn.commit().await.context("Failed to commit transaction")?;
                info!("Created {} food nodes and their categories", foods.len());
                Ok(())
            }
            Err(e) => {
                warn!("Error during food creation, rolling back: {}", e);
                txn.rollback()
                    .await
                    .context("Failed to rollback transaction")?;
                Err(e)
            }
        }
    }

    /// One statement per food, UNWINDing its nutrient measurements.
    /// Both endpoints are MATCHed first, so nothing is written for a
    /// nutrient that was never created.
    pub async fn create_measurements(&self, foods: &[Food]) -> Result<()> {
        info!("Creating nutrient relationships...");

        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to start transaction")?;

        let result = run_measurement_statements(&mut txn, foods).await;

        match result {
            Ok(()) => {
                txn.commit().await.context("Failed to commit transaction")?;
                info!("Created nutrient relationships for {} foods", foods.len());
                Ok(())
            }
            Err(e) => {
                warn!("Error during measurement creation, rolling back: {}", e);
                txn.rollback()
                    .await
                    .context("Failed to rollback transaction")?;
                Err(e)
            }
        }
    }

    /// Count every node and relationship kind the import writes.
    pub async fn verify(&self) -> Result<ImportSummary> {
        info!("Verifying import...");

        let mut summary = ImportSummary::default();
        for target in CountTarget::ALL {
            let count = self.count(target).await?;
            match target {
                CountTarget::Foods => summary.foods = count,
                CountTarget::Nutrients => summary.nutrients = count,
                CountTarget::Categories => summary.categories = count,
                CountTarget::NutrientRelationships => summary.nutrient_relationships = count,
                CountTarget::CategoryRelationships => summary.category_relationships = count,
            }
        }

        Ok(summary)
    }

    async fn count(&self, target: CountTarget) -> Result<i64> {
        let mut result = self
            .graph
            .execute(queries::count_query(target))
            .await
            .with_context(|| format!("Count query for {} failed", target.label()))?;

        let row = result
            .next()
            .await
            .with_context(|| format!("Count query for {} returned an error", target.label()))?
            .with_context(|| format!("Count query for {} returned no rows", target.label()))?;

        let count: i64 = row
            .get("count")
            .with_context(|| format!("Count query for {} had no 'count' field", target.label()))?;
        Ok(count)
    }
}

async fn run_nutrient_batches(
    txn: &mut neo4rs::Txn,
    nutrients: &[Nutrient],
    batch_size: usize,
) -> Result<()> {
    for chunk in nutrients.chunks(batch_size) {
        txn.run(queries::upsert_nutrient_batch(chunk))
            .await
            .context("Failed to upsert nutrient batch")?;
    }
    Ok(())
}

async fn run_food_batches(txn: &mut neo4rs::Txn, foods: &[Food], batch_size: usize) -> Result<()> {
    let mut processed = 0usize;

    for chunk in foods.chunks(batch_size) {
        txn.run(queries::create_food_batch(chunk))
            .await
            .context("Failed to create food batch")?;

        processed += chunk.len();
        info!("  Processed {} foods...", processed);
    }
    Ok(())
}

async fn run_measurement_statements(txn: &mut neo4rs::Txn, foods: &[Food]) -> Result<()> {
    for (i, food) in foods.iter().enumerate() {
        if !food.food_nutrients.is_empty() {
            txn.run(queries::create_measurement_batch(food))
                .await
                .with_context(|| {
                    format!("Failed to create measurements for food {}", food.fdc_id)
                })?;
        }

        if (i + 1) % MEASUREMENT_PROGRESS_EVERY == 0 {
            info!("  Processed {} foods...", i + 1);
        }
    }
    Ok(())
}

fn log_summary(summary: &ImportSummary) {
    info!("{}", "=".repeat(50));
    info!("IMPORT SUMMARY");
    info!("{}", "=".repeat(50));
    info!("Foods:                    {}", fmt_count(summary.foods));
    info!("Nutrients:                {}", fmt_count(summary.nutrients));
    info!("Food Categories:          {}", fmt_count(summary.categories));
    info!(
        "Nutrient Relationships:   {}",
        fmt_count(summary.nutrient_relationships)
    );
    info!(
        "Category Relationships:   {}",
        fmt_count(summary.category_relationships)
    );
    info!("{}", "=".repeat(50));
}

/// Thousands-separated count, e.g. 1234567 -> "1,234,567".
fn fmt_count(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::new();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_count_groups_thousands() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(1_000), "1,000");
        assert_eq!(fmt_count(1_234_567), "1,234,567");
        assert_eq!(fmt_count(-42_000), "-42,000");
    }

    #[test]
    fn batch_size_parser_rejects_garbage() {
        // Unset vars fall back to the default.
        std::env::remove_var("TEST_BATCH_SIZE_UNSET");
        assert_eq!(
            parse_batch_size("TEST_BATCH_SIZE_UNSET", 100).unwrap(),
            100
        );

        std::env::set_var("TEST_BATCH_SIZE_BAD", "not-a-number");
        assert!(parse_batch_size("TEST_BATCH_SIZE_BAD", 100).is_err());

        std::env::set_var("TEST_BATCH_SIZE_ZERO", "0");
        assert!(parse_batch_size("TEST_BATCH_SIZE_ZERO", 100).is_err());

        std::env::set_var("TEST_BATCH_SIZE_OK", "250");
        assert_eq!(parse_batch_size("TEST_BATCH_SIZE_OK", 100).unwrap(), 250);
    }

    #[test]
    fn summary_defaults_to_zero() {
        let summary = ImportSummary::default();
        assert_eq!(summary.foods, 0);
        assert_eq!(summary.nutrient_relationships, 0);
    }
}
