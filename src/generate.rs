//! Random dataset generation.
//!
//! Datasets are built from a seed through a [`ChaCha8Rng`], so the same seed
//! always produces the same dataset. Buyers and owners get random interest
//! sets first; bids and buildings are then drawn from those interests, which
//! keeps the dataset internally consistent.

use std::collections::HashMap;
use std::ops::Range;

use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::{
    Bid, Building, Buyer, City, Dataset, EntitySet, Id, IdAllocator, Material, Owner,
};

/// Material catalog. Buyers never want the last one, owners never use the
/// first one.
pub const MATERIALS: [&str; 10] = [
    "stone",
    "marble",
    "gold",
    "wood",
    "concrete",
    "brick",
    "sandstone",
    "glass",
    "obsidian",
    "bedrock",
];

/// City catalog. Buyers never bid in the last one.
pub const CITIES: [&str; 10] = [
    "Novosibirsk",
    "Moscow",
    "St. Petersburg",
    "Gelendzhik",
    "Vladivostok",
    "Petrozavodsk",
    "Ekaterinburg",
    "Sevastopol",
    "Sochi",
    "Perm",
];

/// Sizes and value ranges of a generated dataset.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of buyers.
    pub buyers: usize,
    /// Number of owners.
    pub owners: usize,
    /// Number of bids.
    pub bids: usize,
    /// Number of buildings.
    pub buildings: usize,
    /// Trailing owners that never receive a building.
    pub skipped_owners: usize,
    /// Range of areas, prices, minimum areas and maximum prices.
    pub value_range: Range<i64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            buyers: 100,
            owners: 100,
            bids: 500,
            buildings: 500,
            skipped_owners: 3,
            value_range: 1..100,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),
}

/// What a buyer or owner is interested in.
#[derive(Debug, Clone)]
pub struct Interests {
    pub cities: Vec<Id<City>>,
    pub materials: Vec<Id<Material>>,
}

/// A dataset together with the hidden state it was generated from.
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub dataset: Dataset,
    pub buyer_interests: HashMap<Id<Buyer>, Interests>,
    pub owner_interests: HashMap<Id<Owner>, Interests>,
    /// Building ids in generation order; `building_order[i]` is "Object i".
    pub building_order: Vec<Id<Building>>,
}

/// Builds random datasets.
#[derive(Debug, Clone)]
pub struct DatasetGenerator {
    config: GeneratorConfig,
}

impl Default for DatasetGenerator {
    fn default() -> Self {
        Self {
            config: GeneratorConfig::default(),
        }
    }
}

impl DatasetGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerateError> {
        if config.buyers == 0 && config.bids > 0 {
            return Err(GenerateError::InvalidConfig(
                "bids need at least one buyer".into(),
            ));
        }
        if config.owners <= config.skipped_owners && config.buildings > 0 {
            return Err(GenerateError::InvalidConfig(format!(
                "buildings need more than {} owners, got {}",
                config.skipped_owners, config.owners
            )));
        }
        if config.value_range.is_empty() {
            return Err(GenerateError::InvalidConfig(format!(
                "empty value range {:?}",
                config.value_range
            )));
        }
        Ok(Self { config })
    }

    /// Generate the dataset for `seed`.
    pub fn generate(&self, seed: u64) -> Dataset {
        self.generate_detailed(seed).dataset
    }

    /// Generate the dataset for `seed`, keeping the interest sets and the
    /// generation order of buildings.
    pub fn generate_detailed(&self, seed: u64) -> GeneratedDataset {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ids = IdAllocator::new();
        let config = &self.config;

        let cities: Vec<City> = CITIES
            .iter()
            .map(|name| City {
                id: ids.allocate(),
                name: name.to_string(),
            })
            .collect();
        let materials: Vec<Material> = MATERIALS
            .iter()
            .map(|name| Material {
                id: ids.allocate(),
                name: name.to_string(),
            })
            .collect();
        let buyers: Vec<Buyer> = (0..config.buyers)
            .map(|i| Buyer {
                id: ids.allocate(),
                name: format!("R2D{i}"),
                surname: format!("C{i}PO"),
            })
            .collect();
        let owners: Vec<Owner> = (0..config.owners)
            .map(|i| Owner {
                id: ids.allocate(),
                name: format!("X AE-{i}"),
                surname: "Musk".to_string(),
            })
            .collect();

        let city_ids: Vec<Id<City>> = cities.iter().map(|c| c.id).collect();
        let material_ids: Vec<Id<Material>> = materials.iter().map(|m| m.id).collect();

        let buyer_interests: HashMap<Id<Buyer>, Interests> = buyers
            .iter()
            .map(|buyer| {
                let interests = Interests {
                    materials: sample(
                        &mut rng,
                        &material_ids[..material_ids.len() - 1],
                        1..material_ids.len() / 2,
                    ),
                    cities: sample(
                        &mut rng,
                        &city_ids[..city_ids.len() - 1],
                        1..city_ids.len() / 2,
                    ),
                };
                (buyer.id, interests)
            })
            .collect();

        let bids: Vec<Bid> = (0..config.bids)
            .map(|_| {
                let buyer = pick(&mut rng, &buyers).id;
                let interests = &buyer_interests[&buyer];
                Bid {
                    id: ids.allocate(),
                    min_area: rng.random_range(config.value_range.clone()),
                    max_price: rng.random_range(config.value_range.clone()),
                    city: *pick(&mut rng, &interests.cities),
                    buyer,
                    materials: sample(&mut rng, &interests.materials, 0..interests.materials.len()),
                }
            })
            .collect();

        let owner_interests: HashMap<Id<Owner>, Interests> = owners
            .iter()
            .map(|owner| {
                let interests = Interests {
                    materials: sample(&mut rng, &material_ids[1..], 1..material_ids.len()),
                    cities: sample(&mut rng, &city_ids, 1..city_ids.len()),
                };
                (owner.id, interests)
            })
            .collect();

        let eligible_owners = &owners[..owners.len().saturating_sub(config.skipped_owners)];
        let buildings: Vec<Building> = (0..config.buildings)
            .map(|i| {
                let owner = pick(&mut rng, eligible_owners).id;
                let interests = &owner_interests[&owner];
                Building {
                    id: ids.allocate(),
                    name: format!("Object {i}"),
                    area: rng.random_range(config.value_range.clone()),
                    price: rng.random_range(config.value_range.clone()),
                    city: *pick(&mut rng, &interests.cities),
                    owner,
                    materials: sample(&mut rng, &interests.materials, 0..interests.materials.len()),
                }
            })
            .collect();
        let building_order = buildings.iter().map(|b| b.id).collect();

        let mut dataset = Dataset {
            cities: EntitySet::new(cities),
            materials: EntitySet::new(materials),
            buyers: EntitySet::new(buyers),
            owners: EntitySet::new(owners),
            bids: EntitySet::new(bids),
            buildings: EntitySet::new(buildings),
        };
        dataset.shuffle(&mut rng);

        tracing::debug!(
            seed,
            entities = dataset.entity_count(),
            "generated dataset"
        );

        GeneratedDataset {
            dataset,
            buyer_interests,
            owner_interests,
            building_order,
        }
    }
}

/// Pick one item uniformly. `items` must not be empty, which the config
/// validation and the interest sampling ranges guarantee.
fn pick<'a, T>(rng: &mut ChaCha8Rng, items: &'a [T]) -> &'a T {
    &items[rng.random_range(0..items.len())]
}

/// Sample distinct items, with the sample size drawn uniformly from `size`.
/// An empty size range yields an empty sample.
fn sample<T: Copy>(rng: &mut ChaCha8Rng, items: &[T], size: Range<usize>) -> Vec<T> {
    if size.is_empty() {
        return Vec::new();
    }
    let amount = rng.random_range(size);
    items.choose_multiple(rng, amount).copied().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_default_sizes() {
        let dataset = DatasetGenerator::default().generate(1);
        assert_eq!(dataset.cities.len(), 10);
        assert_eq!(dataset.materials.len(), 10);
        assert_eq!(dataset.buyers.len(), 100);
        assert_eq!(dataset.owners.len(), 100);
        assert_eq!(dataset.bids.len(), 500);
        assert_eq!(dataset.buildings.len(), 500);
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let generator = DatasetGenerator::default();
        let a = generator.generate(1234);
        let b = generator.generate(1234);

        let names = |d: &Dataset| -> Vec<String> {
            d.buildings.iter().map(|b| b.name.clone()).collect()
        };
        assert_eq!(names(&a), names(&b));
        let bids = |d: &Dataset| -> Vec<(i64, i64, u32)> {
            d.bids
                .iter()
                .map(|b| (b.min_area, b.max_price, b.city.raw()))
                .collect()
        };
        assert_eq!(bids(&a), bids(&b));
    }

    #[test]
    fn test_different_seeds_differ() {
        let generator = DatasetGenerator::default();
        let a = generator.generate(1);
        let b = generator.generate(2);
        let areas = |d: &Dataset| -> Vec<i64> { d.buildings.iter().map(|b| b.area).collect() };
        assert_ne!(areas(&a), areas(&b));
    }

    #[test]
    fn test_object_101_keeps_identity_after_shuffle() {
        let generated = DatasetGenerator::default().generate_detailed(42);
        let dataset = &generated.dataset;

        let named: Vec<_> = dataset
            .buildings
            .iter()
            .filter(|b| b.name == "Object 101")
            .collect();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].id, generated.building_order[101]);
        assert_eq!(dataset.buildings[generated.building_order[101]].name, "Object 101");
    }

    #[test]
    fn test_collections_are_shuffled() {
        let dataset = DatasetGenerator::default().generate(42);
        let in_order = dataset
            .buildings
            .iter()
            .enumerate()
            .all(|(i, b)| b.name == format!("Object {i}"));
        assert!(!in_order);
    }

    #[test]
    fn test_buyers_never_want_last_city_or_material() {
        let generated = DatasetGenerator::default().generate_detailed(9);
        let dataset = &generated.dataset;
        for interests in generated.buyer_interests.values() {
            assert!(!interests.materials.is_empty());
            assert!(!interests.cities.is_empty());
            for &m in &interests.materials {
                assert_ne!(dataset.materials[m].name, "bedrock");
            }
            for &c in &interests.cities {
                assert_ne!(dataset.cities[c].name, "Perm");
            }
        }
    }

    #[test]
    fn test_owners_never_use_first_material() {
        let generated = DatasetGenerator::default().generate_detailed(9);
        let dataset = &generated.dataset;
        for building in &dataset.buildings {
            for &m in &building.materials {
                assert_ne!(dataset.materials[m].name, "stone");
            }
        }
    }

    #[test]
    fn test_skipped_owners_have_no_buildings() {
        let generated = DatasetGenerator::default().generate_detailed(5);
        let dataset = &generated.dataset;
        let skipped: HashSet<String> = (97..100).map(|i| format!("X AE-{i}")).collect();
        for building in &dataset.buildings {
            assert!(!skipped.contains(&dataset.owners[building.owner].name));
        }
    }

    #[test]
    fn test_material_lists_have_no_duplicates() {
        let dataset = DatasetGenerator::default().generate(77);
        for building in &dataset.buildings {
            let unique: HashSet<_> = building.materials.iter().collect();
            assert_eq!(unique.len(), building.materials.len());
        }
        for bid in &dataset.bids {
            let unique: HashSet<_> = bid.materials.iter().collect();
            assert_eq!(unique.len(), bid.materials.len());
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = GeneratorConfig {
            owners: 3,
            ..GeneratorConfig::default()
        };
        assert!(DatasetGenerator::new(config).is_err());

        let config = GeneratorConfig {
            value_range: 5..5,
            ..GeneratorConfig::default()
        };
        assert!(DatasetGenerator::new(config).is_err());

        let config = GeneratorConfig {
            buyers: 0,
            bids: 0,
            ..GeneratorConfig::default()
        };
        assert!(DatasetGenerator::new(config).is_ok());
    }
}
