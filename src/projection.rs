//! Projection of a dataset onto relational tables.
//!
//! Every entity gets a surrogate integer key that is unique across all tables.
//! Scalar fields become columns, single references become `<field>_id`
//! foreign keys and material lists become rows of a join table.

use std::collections::HashMap;

use crate::model::{
    Bid, Building, Buyer, City, Dataset, Entity, EntityKind, EntitySet, Id, Material, Owner,
};
use crate::value::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectionError {
    #[error("reference to {table}#{id}, which is not part of the dataset")]
    DanglingReference { table: &'static str, id: u32 },
}

/// Surrogate keys of every entity of a dataset.
#[derive(Debug, Clone, Default)]
pub struct SurrogateKeys {
    keys: HashMap<(EntityKind, u32), i64>,
}

impl SurrogateKeys {
    /// Number keys from 1 across cities, materials, buyers, owners, bids and
    /// buildings, each in dataset order.
    pub fn assign(dataset: &Dataset) -> Self {
        let mut keys = Self::default();
        let mut next = 1;
        keys.extend(&dataset.cities, &mut next);
        keys.extend(&dataset.materials, &mut next);
        keys.extend(&dataset.buyers, &mut next);
        keys.extend(&dataset.owners, &mut next);
        keys.extend(&dataset.bids, &mut next);
        keys.extend(&dataset.buildings, &mut next);
        keys
    }

    fn extend<T: Entity>(&mut self, set: &EntitySet<T>, next: &mut i64) {
        for item in set {
            self.keys.insert((T::KIND, item.id().raw()), *next);
            *next += 1;
        }
    }

    pub fn get<T: Entity>(&self, id: Id<T>) -> Option<i64> {
        self.keys.get(&(T::KIND, id.raw())).copied()
    }

    /// Key of `id`, or an error for an id that is not part of the dataset.
    pub fn key<T: Entity>(&self, id: Id<T>) -> Result<i64, ProjectionError> {
        self.get(id).ok_or_else(|| ProjectionError::DanglingReference {
            table: T::KIND.table_name(),
            id: id.raw(),
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// How an entity type maps to its table.
trait Relational: Entity {
    /// Columns after `id`.
    const COLUMNS: &'static [&'static str];

    fn values(&self, keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError>;
}

/// Entity types owning a material list stored in a join table.
trait HasMaterials: Entity {
    const JOIN_TABLE: &'static str;
    const OWNER_COLUMN: &'static str;

    fn materials(&self) -> &[Id<Material>];
}

impl Relational for City {
    const COLUMNS: &'static [&'static str] = &["name"];

    fn values(&self, _keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError> {
        Ok(vec![Value::from(&self.name)])
    }
}

impl Relational for Material {
    const COLUMNS: &'static [&'static str] = &["name"];

    fn values(&self, _keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError> {
        Ok(vec![Value::from(&self.name)])
    }
}

impl Relational for Buyer {
    const COLUMNS: &'static [&'static str] = &["name", "surname"];

    fn values(&self, _keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError> {
        Ok(vec![Value::from(&self.name), Value::from(&self.surname)])
    }
}

impl Relational for Owner {
    const COLUMNS: &'static [&'static str] = &["name", "surname"];

    fn values(&self, _keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError> {
        Ok(vec![Value::from(&self.name), Value::from(&self.surname)])
    }
}

impl Relational for Bid {
    const COLUMNS: &'static [&'static str] = &["min_area", "max_price", "city_id", "buyer_id"];

    fn values(&self, keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError> {
        Ok(vec![
            Value::from(self.min_area),
            Value::from(self.max_price),
            Value::from(keys.key(self.city)?),
            Value::from(keys.key(self.buyer)?),
        ])
    }
}

impl Relational for Building {
    const COLUMNS: &'static [&'static str] =
        &["name", "area", "price", "city_id", "owner_id"];

    fn values(&self, keys: &SurrogateKeys) -> Result<Vec<Value>, ProjectionError> {
        Ok(vec![
            Value::from(&self.name),
            Value::from(self.area),
            Value::from(self.price),
            Value::from(keys.key(self.city)?),
            Value::from(keys.key(self.owner)?),
        ])
    }
}

impl HasMaterials for Bid {
    const JOIN_TABLE: &'static str = "bid_material";
    const OWNER_COLUMN: &'static str = "bid_id";

    fn materials(&self) -> &[Id<Material>] {
        &self.materials
    }
}

impl HasMaterials for Building {
    const JOIN_TABLE: &'static str = "building_material";
    const OWNER_COLUMN: &'static str = "building_id";

    fn materials(&self) -> &[Id<Material>] {
        &self.materials
    }
}

/// Rows of one table, in insertion order.
#[derive(Debug, Clone)]
pub struct TableRows {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
}

impl TableRows {
    /// `INSERT` statement with one positional parameter per column.
    pub fn insert_sql(&self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(",");
        format!(
            "INSERT INTO {}({}) VALUES ({placeholders})",
            self.name,
            self.columns.join(",")
        )
    }

    fn entities<T: Relational>(
        set: &EntitySet<T>,
        keys: &SurrogateKeys,
    ) -> Result<Self, ProjectionError> {
        let mut columns = vec!["id"];
        columns.extend_from_slice(T::COLUMNS);
        let rows = set
            .iter()
            .map(|item| {
                let mut row = vec![Value::from(keys.key(item.id())?)];
                row.extend(item.values(keys)?);
                Ok(row)
            })
            .collect::<Result<_, ProjectionError>>()?;
        Ok(Self {
            name: T::KIND.table_name(),
            columns,
            rows,
        })
    }

    fn join<T: HasMaterials>(
        set: &EntitySet<T>,
        keys: &SurrogateKeys,
    ) -> Result<Self, ProjectionError> {
        let rows = set
            .iter()
            .flat_map(|item| item.materials().iter().map(move |&m| (item, m)))
            .enumerate()
            .map(|(row_id, (item, material))| {
                Ok(vec![
                    Value::from(row_id),
                    Value::from(keys.key(item.id())?),
                    Value::from(keys.key(material)?),
                ])
            })
            .collect::<Result<_, ProjectionError>>()?;
        Ok(Self {
            name: T::JOIN_TABLE,
            columns: vec!["id", T::OWNER_COLUMN, "material_id"],
            rows,
        })
    }
}

/// A dataset in relational form.
#[derive(Debug, Clone)]
pub struct Projection {
    pub keys: SurrogateKeys,
    pub tables: Vec<TableRows>,
}

impl Projection {
    /// Fails when an entity references an id missing from `dataset`, which
    /// only happens for hand-built datasets.
    pub fn of(dataset: &Dataset) -> Result<Self, ProjectionError> {
        let keys = SurrogateKeys::assign(dataset);
        let tables = vec![
            TableRows::entities(&dataset.cities, &keys)?,
            TableRows::entities(&dataset.materials, &keys)?,
            TableRows::entities(&dataset.buyers, &keys)?,
            TableRows::entities(&dataset.owners, &keys)?,
            TableRows::entities(&dataset.bids, &keys)?,
            TableRows::entities(&dataset.buildings, &keys)?,
            TableRows::join(&dataset.buildings, &keys)?,
            TableRows::join(&dataset.bids, &keys)?,
        ];
        Ok(Self { keys, tables })
    }

    pub fn table(&self, name: &str) -> Option<&TableRows> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}
