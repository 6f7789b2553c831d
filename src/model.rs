//! FoodData Central JSON Model
//!
//! Deserialization types for the Foundation Foods export and the
//! pure transformations applied before anything touches the database.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Key holding the food array at the top of the export document.
const FOODS_KEY: &str = "FoundationFoods";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document has no top-level '{FOODS_KEY}' key")]
    MissingFoodsKey,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub fdc_id: i64,
    pub description: String,
    #[serde(default)]
    pub food_class: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub ndb_number: Option<i64>,
    #[serde(default)]
    pub publication_date: Option<String>,
    pub food_category: FoodCategory,
    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodCategory {
    pub id: i64,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One measured nutrient within a food record. The numeric fields are
/// optional in the source data; absence must survive into the graph as
/// null rather than collapsing to zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodNutrient {
    pub nutrient: Nutrient,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub data_points: Option<i64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub food_nutrient_derivation: Option<NutrientDerivation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrient {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientDerivation {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Read and parse the export file, returning the food records under
/// the `FoundationFoods` key.
pub fn load_foods(path: &Path) -> Result<Vec<Food>, LoadError> {
    info!("Loading JSON data from {}...", path.display());

    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let foods = parse_foods(&raw)?;
    info!("Loaded {} foods", foods.len());
    Ok(foods)
}

/// Parse the document body. Split out from [`load_foods`] so the format
/// handling is testable without touching the filesystem.
pub fn parse_foods(raw: &str) -> Result<Vec<Food>, LoadError> {
    let document: serde_json::Value = serde_json::from_str(raw)?;
    let foods_value = document
        .get(FOODS_KEY)
        .ok_or(LoadError::MissingFoodsKey)?
        .clone();
    let foods: Vec<Food> = serde_json::from_value(foods_value)?;
    Ok(foods)
}

/// Collect the distinct nutrients referenced across all foods, first
/// occurrence wins. Guarantees one row per nutrient id no matter how
/// often it repeats between foods.
pub fn dedup_nutrients(foods: &[Food]) -> Vec<Nutrient> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut nutrients = Vec::new();

    for food in foods {
        for food_nutrient in &food.food_nutrients {
            if seen.insert(food_nutrient.nutrient.id) {
                nutrients.push(food_nutrient.nutrient.clone());
            }
        }
    }

    nutrients
}
