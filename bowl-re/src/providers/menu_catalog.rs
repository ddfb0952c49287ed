//! In-memory menu catalog
//!
//! Serves the three catalog tiers from a menu loaded at startup:
//! - `cached`: bowls the ML service recommended recently for the same
//!   filters at the same location (TTL-bounded)
//! - `popular`: bowls with a sales rank, best seller first
//! - `signature`: the curated house list
//!
//! Menu file format (TOML):
//!
//! ```toml
//! [[ingredients]]
//! id = "brown-rice"
//! name = "Brown Rice"
//! category = "base"
//! suitable_for = ["vegan", "gluten_free"]
//! weight_g = 180
//! price_cents = 250
//!
//! [[bowls]]
//! id = "plain-rice"
//! name = "Plain Rice"
//! base = "brown-rice"
//! popular_rank = 1
//! signature = true
//! locations = ["downtown"]   # optional, default: every location
//! ```

use crate::engine::cache::TtlCache;
use crate::engine::clock::Clock;
use crate::error::TierError;
use crate::providers::CatalogProvider;
use async_trait::async_trait;
use bowl_common::{
    Allergen, BowlComposition, DietaryRestriction, Error, Ingredient, RecommendationCandidate,
    RecommendationRequest, Result,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Menu compiled into the binary
pub const BUNDLED_MENU: &str = include_str!("../../menu.toml");

#[derive(Debug, Deserialize)]
struct MenuFile {
    #[serde(default)]
    ingredients: Vec<Ingredient>,
    #[serde(default)]
    bowls: Vec<BowlEntry>,
}

#[derive(Debug, Deserialize)]
struct BowlEntry {
    id: String,
    name: String,
    base: String,
    protein: Option<String>,
    #[serde(default)]
    sides: Vec<String>,
    sauce: Option<String>,
    #[serde(default)]
    garnishes: Vec<String>,
    popular_rank: Option<u32>,
    #[serde(default)]
    signature: bool,
    #[serde(default)]
    locations: BTreeSet<String>,
}

/// Where and how a bowl is listed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuListing {
    /// Sales rank, 1 = best seller; `None` keeps it out of the popular tier
    pub popular_rank: Option<u32>,
    pub signature: bool,
    /// Locations serving the bowl; empty means every location
    pub locations: BTreeSet<String>,
}

impl MenuListing {
    fn served_at(&self, location_id: &str) -> bool {
        self.locations.is_empty() || self.locations.contains(location_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecentKey {
    location_id: String,
    dietary_restrictions: BTreeSet<DietaryRestriction>,
    allergens: BTreeSet<Allergen>,
}

impl RecentKey {
    fn for_request(request: &RecommendationRequest) -> Self {
        Self {
            location_id: request.location_id().to_string(),
            dietary_restrictions: request.dietary_restrictions().clone(),
            allergens: request.allergens().clone(),
        }
    }
}

pub struct MenuCatalog {
    bowls: Vec<(BowlComposition, MenuListing)>,
    recent: TtlCache<RecentKey, Vec<BowlComposition>>,
    recent_ttl: Duration,
}

impl MenuCatalog {
    /// Empty catalog; add bowls with [`MenuCatalog::add_bowl`]
    pub fn new(clock: Arc<dyn Clock>, recent_ttl: Duration) -> Self {
        Self {
            bowls: Vec::new(),
            recent: TtlCache::new(clock),
            recent_ttl,
        }
    }

    pub fn add_bowl(&mut self, bowl: BowlComposition, listing: MenuListing) -> Result<()> {
        if self.bowls.iter().any(|(existing, _)| existing.id == bowl.id) {
            return Err(Error::InvalidInput(format!("duplicate bowl id {}", bowl.id)));
        }
        self.bowls.push((bowl, listing));
        Ok(())
    }

    /// Parse a TOML menu, resolving every ingredient reference
    pub fn from_toml_str(content: &str, clock: Arc<dyn Clock>, recent_ttl: Duration) -> Result<Self> {
        let menu: MenuFile = toml::from_str(content)?;

        let mut ingredients: HashMap<&str, &Ingredient> = HashMap::new();
        for ingredient in &menu.ingredients {
            if ingredients.insert(ingredient.id.as_str(), ingredient).is_some() {
                return Err(Error::Config(format!("duplicate ingredient id {}", ingredient.id)));
            }
        }

        let lookup = |bowl: &str, id: &str| -> Result<Ingredient> {
            ingredients
                .get(id)
                .map(|ingredient| (*ingredient).clone())
                .ok_or_else(|| Error::Config(format!("bowl {} references unknown ingredient {}", bowl, id)))
        };

        let mut catalog = Self::new(clock, recent_ttl);
        for entry in &menu.bowls {
            let mut bowl = BowlComposition::new(&entry.id, &entry.name, lookup(&entry.id, &entry.base)?);
            if let Some(protein) = &entry.protein {
                bowl = bowl.with_protein(lookup(&entry.id, protein)?);
            }
            for side in &entry.sides {
                bowl = bowl.with_side(lookup(&entry.id, side)?);
            }
            if let Some(sauce) = &entry.sauce {
                bowl = bowl.with_sauce(lookup(&entry.id, sauce)?);
            }
            for garnish in &entry.garnishes {
                bowl = bowl.with_garnish(lookup(&entry.id, garnish)?);
            }

            let listing = MenuListing {
                popular_rank: entry.popular_rank,
                signature: entry.signature,
                locations: entry.locations.clone(),
            };
            catalog
                .add_bowl(bowl, listing)
                .map_err(|e| Error::Config(e.to_string()))?;
        }

        debug!(
            ingredients = menu.ingredients.len(),
            bowls = catalog.len(),
            "Parsed menu"
        );
        Ok(catalog)
    }

    pub fn load(path: &Path, clock: Arc<dyn Clock>, recent_ttl: Duration) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&content, clock, recent_ttl)?;
        info!("Loaded {} bowls from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn bundled(clock: Arc<dyn Clock>, recent_ttl: Duration) -> Result<Self> {
        Self::from_toml_str(BUNDLED_MENU, clock, recent_ttl)
    }

    pub fn len(&self) -> usize {
        self.bowls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bowls.is_empty()
    }

    fn served_at<'a>(
        &'a self,
        location_id: &'a str,
    ) -> impl Iterator<Item = &'a (BowlComposition, MenuListing)> + 'a {
        self.bowls
            .iter()
            .filter(move |(_, listing)| listing.served_at(location_id))
    }
}

#[async_trait]
impl CatalogProvider for MenuCatalog {
    async fn cached(&self, request: &RecommendationRequest) -> std::result::Result<Vec<BowlComposition>, TierError> {
        Ok(self
            .recent
            .get(&RecentKey::for_request(request))
            .unwrap_or_default())
    }

    async fn popular(&self, request: &RecommendationRequest) -> std::result::Result<Vec<BowlComposition>, TierError> {
        let mut ranked: Vec<(u32, &BowlComposition)> = self
            .served_at(request.location_id())
            .filter_map(|(bowl, listing)| listing.popular_rank.map(|rank| (rank, bowl)))
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        Ok(ranked.into_iter().map(|(_, bowl)| bowl.clone()).collect())
    }

    async fn signature(&self, request: &RecommendationRequest) -> std::result::Result<Vec<BowlComposition>, TierError> {
        Ok(self
            .served_at(request.location_id())
            .filter(|(_, listing)| listing.signature)
            .map(|(bowl, _)| bowl.clone())
            .collect())
    }

    fn record_success(&self, request: &RecommendationRequest, candidates: &[RecommendationCandidate]) {
        let mut seen = HashSet::new();
        let bowls: Vec<BowlComposition> = candidates
            .iter()
            .filter(|c| seen.insert(c.bowl.id.clone()))
            .map(|c| c.bowl.clone())
            .collect();
        if !bowls.is_empty() {
            self.recent
                .set(RecentKey::for_request(request), bowls, self.recent_ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;

    fn bundled(clock: Arc<ManualClock>) -> MenuCatalog {
        MenuCatalog::bundled(clock, Duration::from_secs(3600)).unwrap()
    }

    fn request(location: &str) -> RecommendationRequest {
        RecommendationRequest::builder(location).build().unwrap()
    }

    #[test]
    fn test_bundled_menu_parses() {
        let catalog = bundled(Arc::new(ManualClock::new()));
        assert_eq!(catalog.len(), 6);

        let (poke, _) = &catalog.bowls[0];
        assert_eq!(poke.id, "salmon-poke");
        assert_eq!(poke.sides.len(), 3);
        assert_eq!(poke.total_weight_g, 180 + 110 + 50 + 50 + 20 + 25 + 5);
    }

    #[tokio::test]
    async fn test_popular_ordered_by_rank_and_location() {
        let catalog = bundled(Arc::new(ManualClock::new()));

        let uptown: Vec<String> = catalog
            .popular(&request("uptown"))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(uptown, vec!["salmon-poke", "tofu-power", "chicken-mediterranean", "peanut-soba"]);

        let downtown = catalog.popular(&request("downtown")).await.unwrap();
        assert_eq!(downtown.len(), 5);
        assert_eq!(downtown[4].id, "chicken-miso");
    }

    #[tokio::test]
    async fn test_signature_list() {
        let catalog = bundled(Arc::new(ManualClock::new()));
        let ids: Vec<String> = catalog
            .signature(&request("uptown"))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["salmon-poke", "peanut-soba", "green-goddess"]);
    }

    #[tokio::test]
    async fn test_recent_picks_expire() {
        let clock = Arc::new(ManualClock::new());
        let catalog = bundled(clock.clone());
        let request = request("uptown");
        assert!(catalog.cached(&request).await.unwrap().is_empty());

        let signature = catalog.signature(&request).await.unwrap();
        let candidates: Vec<RecommendationCandidate> = signature
            .into_iter()
            .map(|bowl| RecommendationCandidate::new(bowl, 0.9, "ml"))
            .collect();
        catalog.record_success(&request, &candidates);
        assert_eq!(catalog.cached(&request).await.unwrap().len(), 3);

        // Different location does not share recent picks
        assert!(catalog.cached(&self::request("downtown")).await.unwrap().is_empty());

        clock.advance(Duration::from_secs(3600));
        assert!(catalog.cached(&request).await.unwrap().is_empty());
    }

    #[test]
    fn test_unknown_ingredient_reference_is_rejected() {
        let menu = r#"
[[ingredients]]
id = "rice"
name = "Rice"
category = "base"
weight_g = 100
price_cents = 100

[[bowls]]
id = "mystery"
name = "Mystery"
base = "rice"
protein = "unicorn"
"#;
        let err = MenuCatalog::from_toml_str(menu, Arc::new(ManualClock::new()), Duration::from_secs(60))
            .err()
            .unwrap();
        assert!(err.to_string().contains("unicorn"));
    }

    #[tokio::test]
    async fn test_load_menu_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.toml");
        std::fs::write(
            &path,
            r#"
[[ingredients]]
id = "rice"
name = "Rice"
category = "base"
suitable_for = ["vegan"]
weight_g = 150
price_cents = 200

[[bowls]]
id = "rice-bowl"
name = "Rice Bowl"
base = "rice"
popular_rank = 1
locations = ["harbour"]
"#,
        )
        .unwrap();

        let catalog = MenuCatalog::load(&path, Arc::new(ManualClock::new()), Duration::from_secs(60)).unwrap();
        assert_eq!(catalog.len(), 1);

        let harbour = catalog.popular(&request("harbour")).await.unwrap();
        assert_eq!(harbour[0].id, "rice-bowl");
        assert!(catalog.popular(&request("uptown")).await.unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = MenuCatalog::load(
            &dir.path().join("absent.toml"),
            Arc::new(ManualClock::new()),
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(bowl_common::Error::Io(_))));
    }

    #[test]
    fn test_duplicate_bowl_is_rejected() {
        let clock = Arc::new(ManualClock::new());
        let mut catalog = MenuCatalog::new(clock, Duration::from_secs(60));
        let bowl = crate::engine::fallback::emergency_bowl();
        catalog.add_bowl(bowl.clone(), MenuListing::default()).unwrap();
        assert!(catalog.add_bowl(bowl, MenuListing::default()).is_err());
    }
}
