//! Differential checker for SQL answers to the real estate problem set.
//!
//! Random datasets of cities, materials, buyers, owners, bids and buildings
//! are generated from a seed. Each submitted query is run on a SQLite
//! projection of the dataset and its answer is compared, as a set of rows,
//! with the answer computed directly over the object model.

pub mod engine;
pub mod generate;
pub mod model;
pub mod projection;
pub mod queries;
pub mod reference;
pub mod report;
pub mod runner;
pub mod value;

pub use engine::{EngineError, QueryEngine, SqliteEngine};
pub use generate::{DatasetGenerator, GenerateError, GeneratorConfig};
pub use model::{Dataset, Id};
pub use queries::{parse_queries, read_queries, ParseError, QueryMap};
pub use reference::{reference_query, ReferenceQuery, REFERENCE_QUERIES};
pub use report::RunReport;
pub use runner::{CheckError, Checker, CheckerConfig, ConfigError, RunSummary};
pub use value::{Row, Value};
