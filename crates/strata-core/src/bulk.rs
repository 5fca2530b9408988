//! CSV bulk units.
//!
//! A file named `table.csv` or `schema.table.csv` is imported into that table.
//! The header row names the columns and every following record becomes one
//! `INSERT`.  Empty fields are `NULL`; everything else is written as a string
//! literal and left to the engine to convert to the column type.
use crate::dialect::Dialect;
use crate::error::SourceError;
use crate::token::sql_literal;

use std::path::Path;

/// The table a bulk file is imported into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkTarget {
    pub schema: Option<String>,
    pub table: String,
}

impl BulkTarget {
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parts = stem.split('.').collect::<Vec<_>>();
        match parts[..] {
            [table] if !table.is_empty() => Ok(Self {
                schema: None,
                table: table.to_string(),
            }),
            [schema, table] if !schema.is_empty() && !table.is_empty() => Ok(Self {
                schema: Some(schema.to_string()),
                table: table.to_string(),
            }),
            _ => Err(SourceError::BulkName(path.to_path_buf())),
        }
    }

    fn qualified(&self, dialect: Dialect) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(&self.table)
            ),
            None => dialect.quote_identifier(&self.table),
        }
    }
}

/// One `INSERT` statement per record of the CSV file at `path`.
pub fn insert_statements(dialect: Dialect, path: &Path) -> Result<Vec<String>, SourceError> {
    let target = BulkTarget::from_path(path)?;
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|source| SourceError::Bulk {
            path: path.to_path_buf(),
            source,
        })?;
    read_statements(dialect, &target, reader).map_err(|source| SourceError::Bulk {
        path: path.to_path_buf(),
        source,
    })
}

fn read_statements<R: std::io::Read>(
    dialect: Dialect,
    target: &BulkTarget,
    mut reader: csv::Reader<R>,
) -> Result<Vec<String>, csv::Error> {
    let columns = reader
        .headers()?
        .iter()
        .map(|c| dialect.quote_identifier(c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let table = target.qualified(dialect);

    let mut statements = Vec::new();
    for record in reader.records() {
        let values = record?
            .iter()
            .map(|field| {
                if field.is_empty() {
                    "NULL".to_string()
                } else {
                    format!("'{}'", sql_literal(field))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        statements.push(format!("INSERT INTO {table} ({columns}) VALUES ({values});"));
    }

    Ok(statements)
}
