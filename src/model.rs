//! Entity model for the real estate domain.
//!
//! Entities have identity semantics: two buildings with the same name, area
//! and price are still different buildings. Identity is carried by a typed
//! [`Id`] allocated once per entity, and every reference between entities is
//! such an id. Ids never change after allocation, so shuffling a collection
//! does not affect what a reference points to.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Index;

use rand::seq::SliceRandom;
use rand::Rng;

/// Opaque identity of an entity of type `T`.
pub struct Id<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// The raw id, unique within the dataset that allocated it.
    pub fn raw(self) -> u32 {
        self.raw
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: Entity> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", T::KIND.table_name(), self.raw)
    }
}

/// Hands out ids from a single counter, so ids are unique across all entity
/// types of one dataset.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate<T>(&mut self) -> Id<T> {
        let id = Id::new(self.next);
        self.next += 1;
        id
    }
}

/// The entity types of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    City,
    Material,
    Buyer,
    Owner,
    Bid,
    Building,
}

impl EntityKind {
    /// Name of the relational table holding entities of this kind.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::City => "city",
            EntityKind::Material => "material",
            EntityKind::Buyer => "buyer",
            EntityKind::Owner => "owner",
            EntityKind::Bid => "bid",
            EntityKind::Building => "building",
        }
    }
}

/// Implemented by every record type of the model.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn id(&self) -> Id<Self>;
}

#[derive(Debug, Clone)]
pub struct City {
    pub id: Id<City>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub id: Id<Material>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Buyer {
    pub id: Id<Buyer>,
    pub name: String,
    pub surname: String,
}

#[derive(Debug, Clone)]
pub struct Owner {
    pub id: Id<Owner>,
    pub name: String,
    pub surname: String,
}

/// A buyer's request for a building.
#[derive(Debug, Clone)]
pub struct Bid {
    pub id: Id<Bid>,
    pub min_area: i64,
    pub max_price: i64,
    pub city: Id<City>,
    pub buyer: Id<Buyer>,
    /// Materials the building must contain. Never holds duplicates.
    pub materials: Vec<Id<Material>>,
}

#[derive(Debug, Clone)]
pub struct Building {
    pub id: Id<Building>,
    pub name: String,
    pub area: i64,
    pub price: i64,
    pub city: Id<City>,
    pub owner: Id<Owner>,
    /// Materials the building is made of. Never holds duplicates.
    pub materials: Vec<Id<Material>>,
}

impl Bid {
    /// Whether `building` satisfies this bid: big enough, cheap enough, in the
    /// right city and made of every material the bid asks for.
    pub fn is_satisfied_by(&self, building: &Building) -> bool {
        building.area >= self.min_area
            && building.price <= self.max_price
            && building.city == self.city
            && self.materials.iter().all(|m| building.materials.contains(m))
    }
}

macro_rules! impl_entity {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn id(&self) -> Id<Self> {
                    self.id
                }
            }
        )*
    };
}

impl_entity!(City, Material, Buyer, Owner, Bid, Building);

/// An ordered collection of entities with id lookup.
///
/// The position index is rebuilt on every reorder, so `set[id]` keeps
/// resolving to the same entity no matter how the set is shuffled.
#[derive(Debug, Clone)]
pub struct EntitySet<T: Entity> {
    items: Vec<T>,
    positions: HashMap<Id<T>, usize>,
}

impl<T: Entity> EntitySet<T> {
    pub fn new(items: Vec<T>) -> Self {
        let mut set = Self {
            items,
            positions: HashMap::new(),
        };
        set.reindex();
        set
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.positions.get(&id).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, id: Id<T>) -> bool {
        self.positions.contains_key(&id)
    }

    /// Shuffle the entities in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.items.shuffle(rng);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.positions = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id(), pos))
            .collect();
    }
}

impl<T: Entity> Default for EntitySet<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Entity> Index<Id<T>> for EntitySet<T> {
    type Output = T;

    /// Panics if the id does not belong to this set. References inside a
    /// generated dataset always resolve.
    fn index(&self, id: Id<T>) -> &T {
        match self.get(id) {
            Some(item) => item,
            None => panic!("{id:?} is not part of this entity set"),
        }
    }
}

impl<'a, T: Entity> IntoIterator for &'a EntitySet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// One complete instance of the model.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub cities: EntitySet<City>,
    pub materials: EntitySet<Material>,
    pub buyers: EntitySet<Buyer>,
    pub owners: EntitySet<Owner>,
    pub bids: EntitySet<Bid>,
    pub buildings: EntitySet<Building>,
}

impl Dataset {
    /// Shuffle every collection independently.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cities.shuffle(rng);
        self.materials.shuffle(rng);
        self.buyers.shuffle(rng);
        self.owners.shuffle(rng);
        self.bids.shuffle(rng);
        self.buildings.shuffle(rng);
    }

    /// Look up a building by name.
    pub fn building_named(&self, name: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.name == name)
    }

    /// Total number of entities across all collections.
    pub fn entity_count(&self) -> usize {
        self.cities.len()
            + self.materials.len()
            + self.buyers.len()
            + self.owners.len()
            + self.bids.len()
            + self.buildings.len()
    }
}
