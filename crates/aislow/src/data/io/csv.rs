//! CSV population loader.
//!
//! Reads one or more CSV files with a header row, concatenates them by column
//! name (columns missing from a file read as missing values), optionally drops
//! repeated pages, splits off the target and id columns and types every
//! remaining column Numeric or Categorical.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;

use crate::config::DiagnosisConfig;
use crate::data::{DataError, FeatureMeta, FeatureSchema, Population};

/// Cell spellings read as a missing value.
const MISSING_TOKENS: &[&str] = &["", "NaN", "nan", "NA", "N/A", "null", "NULL", "None", "<NA>"];

/// What to do with the columns of the loaded files.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvOptions {
    /// Split off as population targets, if present.
    pub target_column: Option<String>,
    /// Split off as row ids, if present.
    pub id_column: Option<String>,
    /// Columns typed Categorical.
    pub categorical: Vec<String>,
    /// Columns dropped entirely.
    pub excluded: Vec<String>,
    /// Keep only the first row of each id.
    pub dedup: bool,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            target_column: None,
            id_column: None,
            categorical: Vec::new(),
            excluded: Vec::new(),
            dedup: false,
            delimiter: b',',
        }
    }
}

/// Builds a [`Population`] from CSV files.
#[derive(Clone, Debug, Default)]
pub struct CsvLoader {
    options: CsvOptions,
}

impl CsvLoader {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    /// Loader using the target, id, categorical and excluded columns of `config`.
    pub fn from_config(config: &DiagnosisConfig) -> Self {
        Self::new(CsvOptions {
            target_column: Some(config.target_column.clone()),
            id_column: Some(config.id_column.clone()),
            categorical: config.categorical_features.clone(),
            excluded: config.excluded_features.clone(),
            ..CsvOptions::default()
        })
    }

    /// Enable or disable dropping repeated ids.
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.options.dedup = dedup;
        self
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Load a single file.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Population, DataError> {
        self.load_many(&[path])
    }

    /// Load and concatenate several files.
    ///
    /// # Errors
    ///
    /// - [`DataError::NoInput`] for an empty path list.
    /// - [`DataError::Csv`] if a file cannot be read or parsed as CSV.
    /// - [`DataError::InvalidValue`] for a cell that is neither a number, a
    ///   boolean nor a missing-value token.
    pub fn load_many<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Population, DataError> {
        if paths.is_empty() {
            return Err(DataError::NoInput);
        }

        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            let table = read_table(path.as_ref(), self.options.delimiter)?;
            tracing::debug!(
                path = %path.as_ref().display(),
                n_rows = table.rows.len(),
                n_columns = table.headers.len(),
                "read csv"
            );
            tables.push(table);
        }
        let combined = Combined::concat(&tables);
        let combined = if self.options.dedup {
            self.dedup(combined)
        } else {
            combined
        };
        self.to_population(combined)
    }

    fn dedup<'t>(&self, combined: Combined<'t>) -> Combined<'t> {
        let Some(id_col) = self
            .options
            .id_column
            .as_deref()
            .and_then(|id| combined.column_index(id))
        else {
            tracing::warn!("dedup requested but the id column is absent");
            return combined;
        };
        let before = combined.rows.len();
        let mut seen = HashSet::new();
        let rows: Vec<_> = combined
            .rows
            .into_iter()
            .filter(|row| seen.insert(row.get(id_col).unwrap_or("").to_string()))
            .collect();
        let removed = before - rows.len();
        if removed > 0 {
            tracing::info!(removed, "dropped duplicate pages");
        }
        Combined {
            columns: combined.columns,
            rows,
        }
    }

    fn to_population(&self, combined: Combined<'_>) -> Result<Population, DataError> {
        let opts = &self.options;
        let is_special = |name: &str| {
            opts.target_column.as_deref() == Some(name) || opts.id_column.as_deref() == Some(name)
        };
        let feature_cols: Vec<usize> = (0..combined.columns.len())
            .filter(|&c| {
                let name = combined.columns[c].as_str();
                !is_special(name) && !opts.excluded.iter().any(|e| e == name)
            })
            .collect();

        for name in &opts.categorical {
            if combined.column_index(name).is_none() {
                tracing::debug!(column = %name, "categorical column not present");
            }
        }

        let schema = Arc::new(FeatureSchema::from_features(
            feature_cols
                .iter()
                .map(|&c| {
                    let name = combined.columns[c].clone();
                    if opts.categorical.contains(&name) {
                        FeatureMeta::categorical(name)
                    } else {
                        FeatureMeta::numeric(name)
                    }
                })
                .collect(),
        ));

        let n_rows = combined.rows.len();
        let mut features = Array2::from_elem((n_rows, feature_cols.len()), f64::NAN);
        for (r, row) in combined.rows.iter().enumerate() {
            for (j, &c) in feature_cols.iter().enumerate() {
                if let Some(cell) = row.get(c) {
                    features[[r, j]] = parse_cell(cell, &combined.columns[c], r)?;
                }
            }
        }

        let mut population = Population::new(schema, features)?;

        if let Some(c) = opts.id_column.as_deref().and_then(|id| combined.column_index(id)) {
            let ids = combined
                .rows
                .iter()
                .map(|row| row.get(c).unwrap_or("").to_string())
                .collect();
            population = population.with_ids(ids)?;
        }
        if let Some(c) = opts
            .target_column
            .as_deref()
            .and_then(|t| combined.column_index(t))
        {
            let targets = combined
                .rows
                .iter()
                .enumerate()
                .map(|(r, row)| row.get(c).map_or(Ok(f64::NAN), |cell| parse_cell(cell, &combined.columns[c], r)))
                .collect::<Result<Vec<_>, _>>()?;
            population = population.with_targets(targets)?;
        }

        tracing::info!(
            n_samples = population.n_samples(),
            n_features = population.n_features(),
            "loaded population"
        );
        Ok(population)
    }
}

/// Parse one cell: a number, `true`/`false`, or a missing-value token.
pub fn parse_cell(cell: &str, column: &str, row: usize) -> Result<f64, DataError> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Ok(f64::NAN);
    }
    if let Ok(v) = cell.parse::<f64>() {
        return Ok(v);
    }
    match cell {
        "true" | "True" | "TRUE" => Ok(1.0),
        "false" | "False" | "FALSE" => Ok(0.0),
        _ => Err(DataError::InvalidValue {
            column: column.to_string(),
            row,
            value: cell.to_string(),
        }),
    }
}

// =============================================================================
// Raw tables
// =============================================================================

struct Table {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

fn read_table(path: &Path, delimiter: u8) -> Result<Table, DataError> {
    let wrap = |source: csv::Error| DataError::Csv {
        path: PathBuf::from(path),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(wrap)?;
    let headers = reader.headers().map_err(wrap)?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(wrap)?;
    Ok(Table { headers, rows })
}

/// Rows of every table over the union of their columns, in first-seen order.
struct Combined<'a> {
    columns: Vec<String>,
    rows: Vec<Row<'a>>,
}

/// One row viewed through a union-column → file-column mapping.
struct Row<'a> {
    record: &'a csv::StringRecord,
    mapping: Arc<Vec<Option<usize>>>,
}

impl<'a> Row<'a> {
    /// Cell of union column `c`; `None` if the row's file lacks the column.
    fn get(&self, c: usize) -> Option<&'a str> {
        self.mapping[c].and_then(|i| self.record.get(i))
    }
}

impl<'a> Combined<'a> {
    fn concat(tables: &'a [Table]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for table in tables {
            for header in &table.headers {
                if !index.contains_key(header) {
                    index.insert(header.clone(), columns.len());
                    columns.push(header.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let mut mapping = vec![None; columns.len()];
            for (i, header) in table.headers.iter().enumerate() {
                // First occurrence wins for repeated headers
                let slot = &mut mapping[index[header]];
                if slot.is_none() {
                    *slot = Some(i);
                }
            }
            let mapping = Arc::new(mapping);
            rows.extend(table.rows.iter().map(|record| Row {
                record,
                mapping: Arc::clone(&mapping),
            }));
        }
        Self { columns, rows }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
