//! Differential check runner.
//!
//! For every problem the runner:
//! 1. Draws a seed and generates a dataset from it
//! 2. Computes the reference answer over the object model
//! 3. Runs the submitted query on the relational projection
//! 4. Compares both answers as sets of rows
//!
//! The first failing trial stops the whole run. Before returning, the dataset
//! and both answers are written to the configured diagnostic paths so the
//! failure can be inspected and replayed from the logged seed.

use std::path::PathBuf;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::engine::{EngineError, QueryEngine};
use crate::generate::{DatasetGenerator, GenerateError, GeneratorConfig};
use crate::model::Dataset;
use crate::queries::QueryMap;
use crate::reference::{reference_query, ReferenceQuery, REFERENCE_QUERIES};
use crate::report::{write_answers, GotAnswer};
use crate::value::{same_answer, AnswerDiff, Row};

/// Configuration for the checker.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Trials per query.
    pub trials: usize,
    /// Replay a single seed instead of drawing `trials` random ones.
    pub seed: Option<u64>,
    /// Seed of the RNG the trial seeds are drawn from. Random when unset.
    pub master_seed: Option<u64>,
    /// Where the failing dataset is dumped.
    pub debug_db: PathBuf,
    /// Where the expected and actual answers of a failing trial are written.
    pub debug_answers: PathBuf,
    /// Dataset sizes.
    pub generator: GeneratorConfig,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            seed: None,
            master_seed: None,
            debug_db: "debug.db".into(),
            debug_answers: "debug.txt".into(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Errors rejecting a [`CheckerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Generator(#[from] GenerateError),

    #[error("trials must be at least 1")]
    NoTrials,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("failed to find query #{index}")]
    MissingQuery { index: usize },

    #[error("there is no query #{index} to check")]
    UnknownQuery { index: usize },

    #[error("query #{index} failed to execute (seed {seed}): {source}")]
    Execution {
        index: usize,
        seed: u64,
        #[source]
        source: EngineError,
    },

    #[error(
        "wrong answer for query #{index} (seed {seed}), see {} and {}",
        .answers.display(),
        .database.display()
    )]
    Mismatch {
        index: usize,
        seed: u64,
        answers: PathBuf,
        database: PathBuf,
    },
}

impl CheckError {
    /// Index of the query the error is about.
    pub fn index(&self) -> usize {
        match self {
            CheckError::MissingQuery { index }
            | CheckError::UnknownQuery { index }
            | CheckError::Execution { index, .. }
            | CheckError::Mismatch { index, .. } => *index,
        }
    }

    /// Seed of the failing trial, if a trial ran.
    pub fn seed(&self) -> Option<u64> {
        match self {
            CheckError::Execution { seed, .. } | CheckError::Mismatch { seed, .. } => Some(*seed),
            CheckError::MissingQuery { .. } | CheckError::UnknownQuery { .. } => None,
        }
    }
}

/// A query whose trials all passed.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub index: usize,
    pub name: &'static str,
    pub seeds: Vec<u64>,
}

/// Progress of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub master_seed: u64,
    pub passed: Vec<QueryOutcome>,
}

/// Runs submitted queries against the reference answers.
pub struct Checker<E: QueryEngine> {
    config: CheckerConfig,
    generator: DatasetGenerator,
    engine: E,
    master_seed: u64,
}

impl<E: QueryEngine> Checker<E> {
    pub fn new(config: CheckerConfig, engine: E) -> Result<Self, ConfigError> {
        if config.trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        let generator = DatasetGenerator::new(config.generator.clone())?;
        let master_seed = config
            .master_seed
            .unwrap_or_else(|| rand::rng().next_u64());
        Ok(Self {
            config,
            generator,
            engine,
            master_seed,
        })
    }

    /// Check every query (or only `selected`), stopping at the first failure.
    pub fn run(&self, queries: &QueryMap, selected: Option<usize>) -> Result<RunSummary, CheckError> {
        let (summary, result) = self.run_with_summary(queries, selected);
        result.map(|()| summary)
    }

    /// Like [`Checker::run`], but also returns the queries that passed before
    /// a failure.
    pub fn run_with_summary(
        &self,
        queries: &QueryMap,
        selected: Option<usize>,
    ) -> (RunSummary, Result<(), CheckError>) {
        let mut summary = RunSummary {
            master_seed: self.master_seed,
            passed: Vec::new(),
        };
        let result = self.run_inner(queries, selected, &mut summary);
        (summary, result)
    }

    fn run_inner(
        &self,
        queries: &QueryMap,
        selected: Option<usize>,
        summary: &mut RunSummary,
    ) -> Result<(), CheckError> {
        if let Some(index) = selected {
            if reference_query(index).is_none() {
                return Err(CheckError::UnknownQuery { index });
            }
        }

        tracing::info!(
            "Starting check with master seed={}, trials={}, engine={}",
            self.master_seed,
            self.config.trials,
            self.engine.name(),
        );

        let mut seeds = ChaCha8Rng::seed_from_u64(self.master_seed);
        for query in REFERENCE_QUERIES
            .iter()
            .filter(|q| selected.map_or(true, |index| index == q.index))
        {
            let sql = queries
                .get(&query.index)
                .ok_or(CheckError::MissingQuery { index: query.index })?;

            let trial_seeds: Vec<u64> = match self.config.seed {
                Some(seed) => vec![seed],
                None => (0..self.config.trials).map(|_| seeds.next_u64()).collect(),
            };
            for (trial, &seed) in trial_seeds.iter().enumerate() {
                tracing::debug!("Query #{} trial {} seed {}", query.index, trial, seed);
                self.check_trial(query, sql, seed)?;
            }

            tracing::info!("Passed test #{}", query.index);
            summary.passed.push(QueryOutcome {
                index: query.index,
                name: query.name,
                seeds: trial_seeds,
            });
        }

        tracing::info!("OK!");
        Ok(())
    }

    fn check_trial(&self, query: &ReferenceQuery, sql: &str, seed: u64) -> Result<(), CheckError> {
        let dataset = self.generator.generate(seed);
        let expected = query.answer(&dataset);

        match self.engine.execute(&dataset, sql) {
            Ok(got) if same_answer(&expected, &got) => Ok(()),
            Ok(got) => {
                let diff = AnswerDiff::between(&expected, &got);
                self.log_failure(query, sql, seed);
                tracing::error!(
                    "{} expected rows missing, {} unexpected rows",
                    diff.only_in_expected.len(),
                    diff.only_in_got.len()
                );
                self.write_diagnostics(&dataset, &expected, GotAnswer::Rows(&got));
                Err(CheckError::Mismatch {
                    index: query.index,
                    seed,
                    answers: self.config.debug_answers.clone(),
                    database: self.config.debug_db.clone(),
                })
            }
            Err(source) => {
                self.log_failure(query, sql, seed);
                tracing::error!("Execution error: {source}");
                let message = source.to_string();
                self.write_diagnostics(&dataset, &expected, GotAnswer::Error(&message));
                Err(CheckError::Execution {
                    index: query.index,
                    seed,
                    source,
                })
            }
        }
    }

    fn log_failure(&self, query: &ReferenceQuery, sql: &str, seed: u64) {
        tracing::error!("Test #{} failed, seed: {}", query.index, seed);
        tracing::error!("Parsed query:\n{sql}\n");
    }

    /// Diagnostics are best effort: a failure to write them must not hide the
    /// failure being reported.
    fn write_diagnostics(&self, dataset: &Dataset, expected: &[Row], got: GotAnswer<'_>) {
        if let Err(e) = self.engine.dump(dataset, &self.config.debug_db) {
            tracing::warn!(
                "Failed to write {}: {e}",
                self.config.debug_db.display()
            );
        }
        match write_answers(&self.config.debug_answers, expected, got) {
            Ok(()) => tracing::info!(
                "Wrote answers to {}",
                self.config.debug_answers.display()
            ),
            Err(e) => tracing::warn!(
                "Failed to write {}: {e}",
                self.config.debug_answers.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use super::*;
    use crate::engine::SqliteEngine;

    /// Engine answering from the reference library itself, optionally
    /// tampering with the answer.
    struct ScriptedEngine {
        mode: Mode,
        calls: RefCell<usize>,
        dumps: RefCell<usize>,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Correct,
        Reversed,
        DropFirstRow,
        Fail,
    }

    impl ScriptedEngine {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                calls: RefCell::new(0),
                dumps: RefCell::new(0),
            }
        }
    }

    impl QueryEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        fn execute(&self, dataset: &Dataset, sql: &str) -> Result<Vec<Row>, EngineError> {
            *self.calls.borrow_mut() += 1;
            let index: usize = sql.parse().unwrap();
            let mut rows = reference_query(index).unwrap().answer(dataset);
            match self.mode {
                Mode::Correct => {}
                Mode::Reversed => {
                    rows.reverse();
                    let copy = rows.clone();
                    rows.extend(copy);
                }
                Mode::DropFirstRow => {
                    rows.sort();
                    rows.remove(0);
                }
                Mode::Fail => return Err(EngineError::Other("no such table: buildings".into())),
            }
            Ok(rows)
        }

        fn dump(&self, _dataset: &Dataset, path: &Path) -> Result<(), EngineError> {
            *self.dumps.borrow_mut() += 1;
            std::fs::write(path, b"dump").map_err(|source| EngineError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    fn all_queries() -> QueryMap {
        REFERENCE_QUERIES
            .iter()
            .map(|q| (q.index, q.index.to_string()))
            .collect()
    }

    fn config(dir: &Path) -> CheckerConfig {
        CheckerConfig {
            trials: 2,
            master_seed: Some(99),
            debug_db: dir.join("debug.db"),
            debug_answers: dir.join("debug.txt"),
            ..CheckerConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = CheckerConfig::default();
        assert_eq!(config.trials, 10);
        assert_eq!(config.debug_db, PathBuf::from("debug.db"));
        assert_eq!(config.debug_answers, PathBuf::from("debug.txt"));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_zero_trials_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckerConfig {
            trials: 0,
            ..config(dir.path())
        };
        let result = Checker::new(config, ScriptedEngine::new(Mode::DropFirstRow));
        assert!(matches!(result, Err(ConfigError::NoTrials)));
    }

    #[test]
    fn test_invalid_generator_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.generator.value_range = 5..5;
        let result = Checker::new(config, ScriptedEngine::new(Mode::Correct));
        assert!(matches!(result, Err(ConfigError::Generator(_))));
    }

    #[test]
    fn test_all_queries_pass() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Correct)).unwrap();
        let summary = checker.run(&all_queries(), None).unwrap();

        let indexes: Vec<usize> = summary.passed.iter().map(|o| o.index).collect();
        assert_eq!(indexes, (1..=8).collect::<Vec<_>>());
        assert!(summary.passed.iter().all(|o| o.seeds.len() == 2));
        assert_eq!(*checker.engine.calls.borrow(), 16);
        assert!(!dir.path().join("debug.txt").exists());
    }

    #[test]
    fn test_order_and_duplicates_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Reversed)).unwrap();
        assert!(checker.run(&all_queries(), None).is_ok());
    }

    #[test]
    fn test_selected_query_only() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Correct)).unwrap();
        let queries: QueryMap = [(3, "3".to_string())].into_iter().collect();
        let summary = checker.run(&queries, Some(3)).unwrap();
        assert_eq!(summary.passed.len(), 1);
        assert_eq!(summary.passed[0].index, 3);
        assert_eq!(*checker.engine.calls.borrow(), 2);
    }

    #[test]
    fn test_missing_query_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Correct)).unwrap();
        let mut queries = all_queries();
        queries.remove(&4);

        let (summary, result) = checker.run_with_summary(&queries, None);
        let err = result.unwrap_err();
        assert!(matches!(err, CheckError::MissingQuery { index: 4 }));
        assert_eq!(err.to_string(), "failed to find query #4");
        assert_eq!(summary.passed.len(), 3);
        assert_eq!(*checker.engine.dumps.borrow(), 0);
    }

    #[test]
    fn test_unknown_selected_query() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Correct)).unwrap();
        let err = checker.run(&all_queries(), Some(9)).unwrap_err();
        assert!(matches!(err, CheckError::UnknownQuery { index: 9 }));
        assert_eq!(*checker.engine.calls.borrow(), 0);
    }

    #[test]
    fn test_mismatch_stops_at_first_trial() {
        let dir = tempfile::tempdir().unwrap();
        let checker =
            Checker::new(config(dir.path()), ScriptedEngine::new(Mode::DropFirstRow)).unwrap();
        let err = checker.run(&all_queries(), None).unwrap_err();

        assert!(matches!(err, CheckError::Mismatch { index: 1, .. }));
        assert!(err.seed().is_some());
        assert_eq!(*checker.engine.calls.borrow(), 1);
        assert_eq!(*checker.engine.dumps.borrow(), 1);

        let answers = std::fs::read_to_string(dir.path().join("debug.txt")).unwrap();
        assert!(answers.starts_with(">>> EXPECTED ANSWER:\n"));
        assert!(answers.contains("\n>>> GOT ANSWER:\n"));
    }

    #[test]
    fn test_execution_error_writes_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Fail)).unwrap();
        let err = checker.run(&all_queries(), Some(2)).unwrap_err();

        assert!(matches!(err, CheckError::Execution { index: 2, .. }));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(*checker.engine.dumps.borrow(), 1);
        let answers = std::fs::read_to_string(dir.path().join("debug.txt")).unwrap();
        assert!(answers.contains("error: no such table: buildings"));
    }

    #[test]
    fn test_master_seed_makes_runs_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let first = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Correct))
            .unwrap()
            .run(&all_queries(), None)
            .unwrap();
        let second = Checker::new(config(dir.path()), ScriptedEngine::new(Mode::Correct))
            .unwrap()
            .run(&all_queries(), None)
            .unwrap();
        let seeds = |s: &RunSummary| -> Vec<u64> {
            s.passed.iter().flat_map(|o| o.seeds.clone()).collect()
        };
        assert_eq!(seeds(&first), seeds(&second));
    }

    #[test]
    fn test_replay_seed() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckerConfig {
            seed: Some(42),
            ..config(dir.path())
        };
        let checker = Checker::new(config, ScriptedEngine::new(Mode::Correct)).unwrap();
        let summary = checker.run(&all_queries(), Some(7)).unwrap();
        assert_eq!(summary.passed[0].seeds, vec![42]);
    }

    #[test]
    fn test_sqlite_inverted_comparison_fails() {
        let dir = tempfile::tempdir().unwrap();
        let checker = Checker::new(config(dir.path()), SqliteEngine::new()).unwrap();
        let queries: QueryMap = [(
            1,
            "SELECT b.name, b.area, b.price, c.name FROM building b \
             JOIN city c ON c.id = b.city_id WHERE b.area < 30 AND b.price < 50"
                .to_string(),
        )]
        .into_iter()
        .collect();
        let err = checker.run(&queries, Some(1)).unwrap_err();
        assert!(matches!(err, CheckError::Mismatch { index: 1, .. }));
        assert!(dir.path().join("debug.db").exists());
    }
}
