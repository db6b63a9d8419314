//! Parser for query files.
//!
//! A query file holds numbered blocks:
//!
//! ```text
//! 1.---
//! SELECT ...
//! ---
//! 2.---
//! ...
//! ---
//! ```
//!
//! Lines are trimmed and blank lines ignored. Blocks are discovered as `1`,
//! `2`, ... until the first missing number.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Query text by problem index.
pub type QueryMap = BTreeMap<usize, String>;

const FOOTER: &str = "---";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to find '---' footer for query #{index}")]
    MissingFooter { index: usize },
}

/// Parse query blocks from file contents.
pub fn parse_queries(input: &str) -> Result<QueryMap, ParseError> {
    let lines: Vec<&str> = input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut queries = QueryMap::new();
    for index in 1.. {
        let header = format!("{index}.---");
        let Some(start) = lines.iter().position(|l| *l == header) else {
            break;
        };
        let body = &lines[start + 1..];
        let end = body
            .iter()
            .position(|l| *l == FOOTER)
            .ok_or(ParseError::MissingFooter { index })?;
        queries.insert(index, body[..end].join("\n"));
    }

    tracing::debug!(count = queries.len(), "parsed queries");
    Ok(queries)
}

/// Read and parse a query file.
pub fn read_queries(path: &Path) -> Result<QueryMap, ParseError> {
    let input = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_queries(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_block() {
        let input = "1.---\nSELECT name, area, price, city FROM building WHERE area > 30 AND price < 50;\n---\n";
        let queries = parse_queries(input).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[&1],
            "SELECT name, area, price, city FROM building WHERE area > 30 AND price < 50;"
        );
    }

    #[test]
    fn test_parse_multiline_blocks() {
        let input = r#"
Some notes before the answers.

1.---
    SELECT name
    FROM building

    WHERE area > 30;
---

2.---
SELECT 2;
---
"#;
        let queries = parse_queries(input).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[&1], "SELECT name\nFROM building\nWHERE area > 30;");
        assert_eq!(queries[&2], "SELECT 2;");
    }

    #[test]
    fn test_gap_ends_discovery() {
        let input = "1.---\nSELECT 1;\n---\n3.---\nSELECT 3;\n---\n";
        let queries = parse_queries(input).unwrap();
        assert_eq!(queries.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_blocks_out_of_order() {
        let input = "2.---\nSELECT 2;\n---\n1.---\nSELECT 1;\n---\n";
        let queries = parse_queries(input).unwrap();
        assert_eq!(queries[&1], "SELECT 1;");
        assert_eq!(queries[&2], "SELECT 2;");
    }

    #[test]
    fn test_missing_footer() {
        let input = "1.---\nSELECT 1;\n---\n2.---\nSELECT 2;\n";
        let err = parse_queries(input).unwrap_err();
        assert!(matches!(err, ParseError::MissingFooter { index: 2 }));
        assert_eq!(err.to_string(), "failed to find '---' footer for query #2");
    }

    #[test]
    fn test_empty_block() {
        let queries = parse_queries("1.---\n---\n").unwrap();
        assert_eq!(queries[&1], "");
    }

    #[test]
    fn test_no_blocks() {
        assert!(parse_queries("").unwrap().is_empty());
        assert!(parse_queries("SELECT 1;").unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_queries(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
