//! Ingredient, bowl and request fixtures

use bowl_common::{
    Allergen, BowlComposition, DietaryRestriction, Ingredient, IngredientCategory, Nutrition,
    RecommendationCandidate, RecommendationRequest,
};

pub fn ingredient(
    id: &str,
    category: IngredientCategory,
    allergens: &[Allergen],
    suitable_for: &[DietaryRestriction],
) -> Ingredient {
    Ingredient {
        id: id.to_string(),
        name: id.replace('-', " "),
        category,
        allergens: allergens.iter().copied().collect(),
        suitable_for: suitable_for.iter().copied().collect(),
        weight_g: 100,
        price_cents: 200,
        nutrition: Nutrition {
            calories: 150,
            protein_g: 5.0,
            carbs_g: 15.0,
            fat_g: 5.0,
        },
    }
}

/// Allergen-free ingredient suitable for every restriction
pub fn plant(id: &str, category: IngredientCategory) -> Ingredient {
    ingredient(id, category, &[], &DietaryRestriction::ALL)
}

pub fn feta() -> Ingredient {
    ingredient(
        "feta",
        IngredientCategory::Garnish,
        &[Allergen::Dairy],
        &[
            DietaryRestriction::Vegetarian,
            DietaryRestriction::Pescatarian,
            DietaryRestriction::GlutenFree,
        ],
    )
}

pub fn salmon() -> Ingredient {
    ingredient(
        "salmon",
        IngredientCategory::Protein,
        &[Allergen::Fish],
        &[
            DietaryRestriction::Pescatarian,
            DietaryRestriction::GlutenFree,
            DietaryRestriction::DairyFree,
        ],
    )
}

pub fn tofu() -> Ingredient {
    ingredient("tofu", IngredientCategory::Protein, &[Allergen::Soy], &DietaryRestriction::ALL)
}

/// Rice bowl with greens plus the given extras
pub fn bowl(id: &str, extras: Vec<Ingredient>) -> BowlComposition {
    let mut bowl = BowlComposition::new(id, id, plant("rice", IngredientCategory::Base))
        .with_side(plant("greens", IngredientCategory::Side));
    for extra in extras {
        bowl = match extra.category {
            IngredientCategory::Protein => bowl.with_protein(extra),
            IngredientCategory::Sauce => bowl.with_sauce(extra),
            IngredientCategory::Garnish => bowl.with_garnish(extra),
            IngredientCategory::Base | IngredientCategory::Side => bowl.with_side(extra),
        };
    }
    bowl
}

/// Candidates with descending confidence starting at `top`
pub fn candidates(bowls: Vec<BowlComposition>, top: f32) -> Vec<RecommendationCandidate> {
    bowls
        .into_iter()
        .enumerate()
        .map(|(i, bowl)| RecommendationCandidate::new(bowl, top - 0.05 * i as f32, "personalized"))
        .collect()
}

pub fn request(location: &str) -> RecommendationRequest {
    RecommendationRequest::builder(location).build().unwrap()
}
