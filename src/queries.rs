//! Cypher Statement Builders
//!
//! One builder per operation the importer performs, each taking the
//! structured records and returning a parameterized [`neo4rs::Query`].
//! Batches ride a single UNWIND statement; nothing here interpolates
//! values into query text.

use crate::model::{Food, FoodNutrient, Nutrient};
use neo4rs::{query, BoltType, Query};
use std::collections::HashMap;

type BoltRow = HashMap<String, BoltType>;

/// Schema statements, all `IF NOT EXISTS` so re-running is a no-op.
pub fn schema_statements() -> Vec<Query> {
    vec![
        query(
            "CREATE CONSTRAINT food_fdc_id IF NOT EXISTS \
             FOR (f:Food) REQUIRE f.fdcId IS UNIQUE",
        ),
        query(
            "CREATE CONSTRAINT nutrient_id IF NOT EXISTS \
             FOR (n:Nutrient) REQUIRE n.id IS UNIQUE",
        ),
        query(
            "CREATE CONSTRAINT category_id IF NOT EXISTS \
             FOR (c:FoodCategory) REQUIRE c.id IS UNIQUE",
        ),
        query(
            "CREATE INDEX food_description IF NOT EXISTS \
             FOR (f:Food) ON (f.description)",
        ),
        query(
            "CREATE INDEX nutrient_name IF NOT EXISTS \
             FOR (n:Nutrient) ON (n.name)",
        ),
    ]
}

fn nutrient_row(nutrient: &Nutrient) -> BoltRow {
    let mut m: BoltRow = HashMap::new();
    m.insert("id".to_string(), nutrient.id.into());
    m.insert("name".to_string(), nutrient.name.clone().into());
    m.insert("number".to_string(), nutrient.number.clone().into());
    m.insert("unitName".to_string(), nutrient.unit_name.clone().into());
    m.insert("rank".to_string(), nutrient.rank.into());
    m
}

/// MERGE one batch of nutrients; descriptive fields are written only
/// when the node is first created.
pub fn upsert_nutrient_batch(batch: &[Nutrient]) -> Query {
    let rows: Vec<BoltRow> = batch.iter().map(nutrient_row).collect();

    query(
        "UNWIND $nutrients AS nutrient
         MERGE (n:Nutrient {id: nutrient.id})
         ON CREATE SET
             n.name = nutrient.name,
             n.number = nutrient.number,
             n.unitName = nutrient.unitName,
             n.rank = nutrient.rank",
    )
    .param("nutrients", rows)
}

fn food_row(food: &Food) -> BoltRow {
    let mut m: BoltRow = HashMap::new();
    m.insert("fdcId".to_string(), food.fdc_id.into());
    m.insert("description".to_string(), food.description.clone().into());
    m.insert("foodClass".to_string(), food.food_class.clone().into());
    m.insert("dataType".to_string(), food.data_type.clone().into());
    m.insert("ndbNumber".to_string(), food.ndb_number.into());
    m.insert(
        "publicationDate".to_string(),
        food.publication_date.clone().into(),
    );
    m.insert("categoryId".to_string(), food.food_category.id.into());
    m.insert(
        "categoryCode".to_string(),
        food.food_category.code.clone().into(),
    );
    m.insert(
        "categoryDescription".to_string(),
        food.food_category.description.clone().into(),
    );
    m
}

/// Batch of foods: MERGE the category, CREATE the food (a second run
/// trips the fdcId uniqueness constraint, intentionally), link them.
pub fn create_food_batch(batch: &[Food]) -> Query {
    let rows: Vec<BoltRow> = batch.iter().map(food_row).collect();

    query(
        "UNWIND $foods AS food
         MERGE (fc:FoodCategory {id: food.categoryId})
         ON CREATE SET
             fc.code = food.categoryCode,
             fc.description = food.categoryDescription
         CREATE (f:Food {fdcId: food.fdcId})
         SET f.description = food.description,
             f.foodClass = food.foodClass,
             f.dataType = food.dataType,
             f.ndbNumber = food.ndbNumber,
             f.publicationDate = food.publicationDate
         CREATE (f)-[:BELONGS_TO]->(fc)",
    )
    .param("foods", rows)
}

fn measurement_row(food_nutrient: &FoodNutrient) -> BoltRow {
    let derivation = food_nutrient.food_nutrient_derivation.as_ref();

    let mut m: BoltRow = HashMap::new();
    m.insert(
        "nutrientId".to_string(),
        food_nutrient.nutrient.id.into(),
    );
    m.insert("amount".to_string(), food_nutrient.amount.into());
    m.insert("dataPoints".to_string(), food_nutrient.data_points.into());
    m.insert(
        "derivationCode".to_string(),
        derivation.and_then(|d| d.code.clone()).into(),
    );
    m.insert(
        "derivationDescription".to_string(),
        derivation.and_then(|d| d.description.clone()).into(),
    );
    m.insert("min".to_string(), food_nutrient.min.into());
    m.insert("max".to_string(), food_nutrient.max.into());
    m.insert("median".to_string(), food_nutrient.median.into());
    m
}

/// All measurements for one food in a single statement. Both endpoints
/// are MATCHed, so a measurement only exists once food and nutrient do.
/// `toFloat(null)` stays null, which is how absent amounts pass through.
pub fn create_measurement_batch(food: &Food) -> Query {
    let rows: Vec<BoltRow> = food.food_nutrients.iter().map(measurement_row).collect();

    query(
        "MATCH (f:Food {fdcId: $fdcId})
         UNWIND $nutrients AS nutrientData
         MATCH (n:Nutrient {id: nutrientData.nutrientId})
         CREATE (f)-[r:HAS_NUTRIENT]->(n)
         SET r.amount = toFloat(nutrientData.amount),
             r.dataPoints = nutrientData.dataPoints,
             r.derivationCode = nutrientData.derivationCode,
             r.derivationDescription = nutrientData.derivationDescription,
             r.min = toFloat(nutrientData.min),
             r.max = toFloat(nutrientData.max),
             r.median = toFloat(nutrientData.median)",
    )
    .param("fdcId", food.fdc_id)
    .param("nutrients", rows)
}

/// Node and relationship kinds the verification phase counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountTarget {
    Foods,
    Nutrients,
    Categories,
    NutrientRelationships,
    CategoryRelationships,
}

impl CountTarget {
    pub const ALL: [CountTarget; 5] = [
        CountTarget::Foods,
        CountTarget::Nutrients,
        CountTarget::Categories,
        CountTarget::NutrientRelationships,
        CountTarget::CategoryRelationships,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CountTarget::Foods => "Foods",
            CountTarget::Nutrients => "Nutrients",
            CountTarget::Categories => "Food Categories",
            CountTarget::NutrientRelationships => "Nutrient Relationships",
            CountTarget::CategoryRelationships => "Category Relationships",
        }
    }

    fn cypher(self) -> &'static str {
        match self {
            CountTarget::Foods => "MATCH (f:Food) RETURN count(f) AS count",
            CountTarget::Nutrients => "MATCH (n:Nutrient) RETURN count(n) AS count",
            CountTarget::Categories => "MATCH (fc:FoodCategory) RETURN count(fc) AS count",
            CountTarget::NutrientRelationships => {
                "MATCH ()-[r:HAS_NUTRIENT]->() RETURN count(r) AS count"
            }
            CountTarget::CategoryRelationships => {
                "MATCH ()-[r:BELONGS_TO]->() RETURN count(r) AS count"
            }
        }
    }
}

pub fn count_query(target: CountTarget) -> Query {
    query(target.cypher())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_foods;
    use serde_json::json;

    fn sample_food() -> Food {
        let document = json!({
            "FoundationFoods": [{
                "fdcId": 1105904,
                "description": "Beans, snap, green, raw",
                "foodClass": "FinalFood",
                "foodCategory": {
                    "id": 11,
                    "code": "1100",
                    "description": "Vegetables and Vegetable Products"
                },
                "foodNutrients": [
                    {
                        "nutrient": {"id": 1051, "name": "Water", "unitName": "g"},
                        "amount": 90.3,
                        "foodNutrientDerivation": {"code": "A", "description": "Analytical"}
                    },
                    {
                        "nutrient": {"id": 1008, "name": "Energy", "unitName": "kcal"}
                    }
                ]
            }]
        })
        .to_string();

        parse_foods(&document).expect("sample parse failed")[0].clone()
    }

    // BoltType has no Eq, so the row tests verify key presence the same
    // way the values are consumed: by map lookup.
    #[test]
    fn nutrient_row_carries_all_fields() {
        let food = sample_food();
        let row = nutrient_row(&food.food_nutrients[0].nutrient);

        for key in ["id", "name", "number", "unitName", "rank"] {
            assert!(row.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn food_row_flattens_category_fields() {
        let row = food_row(&sample_food());

        for key in [
            "fdcId",
            "description",
            "foodClass",
            "dataType",
            "ndbNumber",
            "publicationDate",
            "categoryId",
            "categoryCode",
            "categoryDescription",
        ] {
            assert!(row.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn measurement_row_keeps_absent_values_as_null() {
        let food = sample_food();
        let row = measurement_row(&food.food_nutrients[1]);

        for key in ["amount", "min", "max", "median", "dataPoints"] {
            assert!(
                matches!(row.get(key), Some(BoltType::Null(_))),
                "{key} should be null"
            );
        }
    }

    #[test]
    fn measurement_row_with_values_is_not_null() {
        let food = sample_food();
        let row = measurement_row(&food.food_nutrients[0]);

        assert!(matches!(row.get("amount"), Some(BoltType::Float(_))));
        assert!(matches!(row.get("derivationCode"), Some(BoltType::String(_))));
        assert!(matches!(
            row.get("derivationDescription"),
            Some(BoltType::String(_))
        ));
    }

    #[test]
    fn schema_statement_count_matches_constraints_plus_indexes() {
        // Three uniqueness constraints, two lookup indexes.
        assert_eq!(schema_statements().len(), 5);
    }

    #[test]
    fn count_targets_cover_every_kind() {
        assert_eq!(CountTarget::ALL.len(), 5);
        for target in CountTarget::ALL {
            assert!(target.cypher().contains("count"));
            assert!(!target.label().is_empty());
        }
    }
}
