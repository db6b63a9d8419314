//! Output of a check run: the answers file of a failing trial, the summary
//! table printed at the end and the optional JSON report.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::queries::QueryMap;
use crate::runner::{CheckError, QueryOutcome, RunSummary};
use crate::value::Row;

/// What the submitted query produced.
#[derive(Debug, Clone, Copy)]
pub enum GotAnswer<'a> {
    Rows(&'a [Row]),
    Error(&'a str),
}

/// Write both answers, one sorted row per line, replacing `path`.
pub fn write_answers(path: &Path, expected: &[Row], got: GotAnswer<'_>) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, ">>> EXPECTED ANSWER:")?;
    write_rows(&mut out, expected)?;

    writeln!(out, "\n>>> GOT ANSWER:")?;
    match got {
        GotAnswer::Rows(rows) => write_rows(&mut out, rows)?,
        GotAnswer::Error(message) => writeln!(out, "error: {message}")?,
    }

    out.flush()
}

fn write_rows(out: &mut impl Write, rows: &[Row]) -> io::Result<()> {
    let mut sorted: Vec<&Row> = rows.iter().collect();
    sorted.sort();
    for row in sorted {
        writeln!(out, "{row}")?;
    }
    Ok(())
}

impl RunSummary {
    /// Create a colorful table displaying the results of a run.
    pub fn to_table(&self, failure: Option<&CheckError>) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let status = if failure.is_none() {
            Cell::new("PASSED")
                .fg(Color::Green)
                .add_attribute(Attribute::Bold)
        } else {
            Cell::new("FAILED")
                .fg(Color::Red)
                .add_attribute(Attribute::Bold)
        };
        table.set_header(vec![
            Cell::new("Check Results").add_attribute(Attribute::Bold),
            status,
        ]);

        table.add_row(vec![
            Cell::new("Master Seed").fg(Color::Cyan),
            Cell::new(self.master_seed),
        ]);

        for outcome in &self.passed {
            table.add_row(vec![
                Cell::new(format!("#{} {}", outcome.index, outcome.name)).fg(Color::Blue),
                Cell::new(format!("passed ({} trials)", outcome.seeds.len())).fg(Color::Green),
            ]);
        }

        if let Some(err) = failure {
            let label = match err.seed() {
                Some(seed) => format!("#{} (seed {seed})", err.index()),
                None => format!("#{}", err.index()),
            };
            table.add_row(vec![
                Cell::new(label).fg(Color::Red),
                Cell::new(err)
                    .fg(Color::Red)
                    .add_attribute(Attribute::Bold),
            ]);
        }

        table
    }

    /// Print the results as a colorful table to stdout.
    pub fn print_table(&self, failure: Option<&CheckError>) {
        println!("\n{}", self.to_table(failure));
    }
}

/// The failure that stopped a run.
#[derive(Debug, Serialize)]
pub struct FailureRecord {
    pub index: usize,
    pub seed: Option<u64>,
    pub query: Option<String>,
    pub error: String,
}

/// Summary written to the JSON report file.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub master_seed: u64,
    pub passed: Vec<QueryOutcome>,
    pub failure: Option<FailureRecord>,
}

impl RunReport {
    pub fn new(summary: &RunSummary, failure: Option<&CheckError>, queries: &QueryMap) -> Self {
        Self {
            master_seed: summary.master_seed,
            passed: summary.passed.clone(),
            failure: failure.map(|err| FailureRecord {
                index: err.index(),
                seed: err.seed(),
                query: queries.get(&err.index()).cloned(),
                error: err.to_string(),
            }),
        }
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Wrote report to {}", path.display());
        Ok(())
    }
}
