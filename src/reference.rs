//! Reference answers for the numbered problems.
//!
//! Each problem is answered directly over the object model, without any SQL.
//! These answers are the ground truth that submitted queries are checked
//! against.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::{Building, Buyer, City, Dataset, Id, Material, Owner};
use crate::row;
use crate::value::Row;

/// Computes the expected answer of one problem.
pub type AnswerFn = fn(&Dataset) -> Vec<Row>;

/// A numbered problem with its reference solution.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceQuery {
    pub index: usize,
    pub name: &'static str,
    pub description: &'static str,
    pub answer: AnswerFn,
}

impl ReferenceQuery {
    pub fn answer(&self, dataset: &Dataset) -> Vec<Row> {
        (self.answer)(dataset)
    }
}

/// All problems, in ascending index order.
pub static REFERENCE_QUERIES: &[ReferenceQuery] = &[
    ReferenceQuery {
        index: 1,
        name: "simple_select",
        description: "buildings with area > 30 and price < 50: name, area, price, city",
        answer: simple_select,
    },
    ReferenceQuery {
        index: 2,
        name: "gold_or_marble",
        description: "buildings containing gold or marble: name",
        answer: gold_or_marble,
    },
    ReferenceQuery {
        index: 3,
        name: "no_gelendzhik",
        description: "buyers without bids in Gelendzhik: name, surname",
        answer: no_gelendzhik,
    },
    ReferenceQuery {
        index: 4,
        name: "unused_material",
        description: "materials absent from all bids of a buyer: name, surname, material",
        answer: unused_material,
    },
    ReferenceQuery {
        index: 5,
        name: "area_above_avg",
        description: "cities whose average building area exceeds the global average: name",
        answer: area_above_avg,
    },
    ReferenceQuery {
        index: 6,
        name: "most_expensive_building",
        description: "maximum building price per owner, NULL without buildings: name, surname, price",
        answer: most_expensive_building,
    },
    ReferenceQuery {
        index: 7,
        name: "object_101",
        description: "buyers with a bid satisfied by \"Object 101\": name, surname",
        answer: object_101,
    },
    ReferenceQuery {
        index: 8,
        name: "sellable_count_by_city",
        description: "buildings satisfying at least one bid, per city: name, count",
        answer: sellable_count_by_city,
    },
];

/// Look up a problem by index.
pub fn reference_query(index: usize) -> Option<&'static ReferenceQuery> {
    REFERENCE_QUERIES.iter().find(|q| q.index == index)
}

fn simple_select(d: &Dataset) -> Vec<Row> {
    d.buildings
        .iter()
        .filter(|b| b.area > 30 && b.price < 50)
        .map(|b| row![&b.name, b.area, b.price, &d.cities[b.city].name])
        .collect()
}

fn gold_or_marble(d: &Dataset) -> Vec<Row> {
    d.buildings
        .iter()
        .filter(|b| {
            b.materials
                .iter()
                .any(|&m| matches!(d.materials[m].name.as_str(), "gold" | "marble"))
        })
        .map(|b| row![&b.name])
        .collect()
}

fn no_gelendzhik(d: &Dataset) -> Vec<Row> {
    let excluded: HashSet<Id<Buyer>> = d
        .bids
        .iter()
        .filter(|bid| d.cities[bid.city].name == "Gelendzhik")
        .map(|bid| bid.buyer)
        .collect();
    d.buyers
        .iter()
        .filter(|b| !excluded.contains(&b.id))
        .map(|b| row![&b.name, &b.surname])
        .collect()
}

fn unused_material(d: &Dataset) -> Vec<Row> {
    let mut used: HashMap<Id<Buyer>, HashSet<Id<Material>>> = HashMap::new();
    for bid in &d.bids {
        used.entry(bid.buyer)
            .or_default()
            .extend(bid.materials.iter().copied());
    }
    let nothing = HashSet::new();
    d.buyers
        .iter()
        .flat_map(|buyer| {
            let used = used.get(&buyer.id).unwrap_or(&nothing);
            d.materials
                .iter()
                .filter(move |m| !used.contains(&m.id))
                .map(move |m| row![&buyer.name, &buyer.surname, &m.name])
        })
        .collect()
}

fn area_above_avg(d: &Dataset) -> Vec<Row> {
    if d.buildings.is_empty() {
        return Vec::new();
    }
    // i128 keeps sums and cross products exact for any i64 area
    let total: i128 = d.buildings.iter().map(|b| i128::from(b.area)).sum();
    let count = d.buildings.len() as i128;

    let mut per_city: HashMap<Id<City>, (i128, i128)> = HashMap::new();
    for building in &d.buildings {
        let (sum, n) = per_city.entry(building.city).or_default();
        *sum += i128::from(building.area);
        *n += 1;
    }

    // sum / n > total / count, cross-multiplied to stay exact
    d.cities
        .iter()
        .filter(|city| {
            per_city
                .get(&city.id)
                .is_some_and(|&(sum, n)| sum * count > total * n)
        })
        .map(|city| row![&city.name])
        .collect()
}

fn most_expensive_building(d: &Dataset) -> Vec<Row> {
    let mut max_price: HashMap<Id<Owner>, i64> = HashMap::new();
    for building in &d.buildings {
        max_price
            .entry(building.owner)
            .and_modify(|p| *p = (*p).max(building.price))
            .or_insert(building.price);
    }
    d.owners
        .iter()
        .map(|o| row![&o.name, &o.surname, max_price.get(&o.id).copied()])
        .collect()
}

fn object_101(d: &Dataset) -> Vec<Row> {
    let Some(building) = d.building_named("Object 101") else {
        return Vec::new();
    };
    let buyers: BTreeSet<Id<Buyer>> = d
        .bids
        .iter()
        .filter(|bid| bid.is_satisfied_by(building))
        .map(|bid| bid.buyer)
        .collect();
    buyers
        .into_iter()
        .map(|id| {
            let buyer = &d.buyers[id];
            row![&buyer.name, &buyer.surname]
        })
        .collect()
}

fn sellable_count_by_city(d: &Dataset) -> Vec<Row> {
    let is_sellable = |building: &Building| d.bids.iter().any(|bid| bid.is_satisfied_by(building));
    let mut counts: HashMap<Id<City>, i64> = HashMap::new();
    for building in d.buildings.iter().filter(|&b| is_sellable(b)) {
        *counts.entry(building.city).or_default() += 1;
    }
    d.cities
        .iter()
        .map(|city| row![&city.name, counts.get(&city.id).copied().unwrap_or(0)])
        .collect()
}
