use arrow2::{
    array::{Array, Float64Array, Int64Array, MutableUtf8Array, Utf8Array},
    chunk::Chunk,
    datatypes::{DataType, Field, Schema},
};
use memchr::{memchr, memchr_iter, memchr2_iter};
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::{collections::HashSet, fs::File, path::Path};
use tracing::{debug, info, warn};

use crate::processor::{
    ParseError, ParseSummary, ProcessorError,
    column::{Column, ColumnType, clean_field},
};

/// Loader settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Field delimiter byte
    pub delimiter: u8,
    /// Number of data lines inspected to infer column types
    pub schema_sample_rows: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            schema_sample_rows: 1000,
        }
    }
}

/// Per-chunk output of the parallel parse
#[derive(Debug)]
struct BatchResult {
    columns: Vec<Column>,
    row_count: usize,
    /// Lines seen in the chunk, including blank and rejected ones
    line_count: usize,
    /// Errors with chunk-relative 0-based line numbers
    errors: Vec<ParseError>,
}

/// Immutable, columnar table of listings.
///
/// Every transformation (filter, derived column) returns a new table; a loaded
/// table can be shared between sessions behind an `Arc`.
///
/// # Examples
///
/// ```rust
/// # use listings_processor::processor::{column::Column, listings_table::ListingsTable};
/// let table = ListingsTable::from_columns(vec![
///     ("Distrito", Column::from_strs(vec!["Moema", "Pinheiros"])),
///     ("Preço", Column::from_i64(vec![900_000, 750_000])),
/// ])
/// .unwrap();
/// assert_eq!(table.row_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingsTable {
    headers: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl ListingsTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from named columns.
    ///
    /// # Errors
    /// [`ProcessorError::DuplicateColumn`] on repeated names and
    /// [`ProcessorError::LengthMismatch`] when columns differ in length.
    pub fn from_columns<S: Into<String>>(
        columns: Vec<(S, Column)>,
    ) -> Result<Self, ProcessorError> {
        let mut table = ListingsTable::new();
        let mut seen = HashSet::new();

        for (idx, (name, column)) in columns.into_iter().enumerate() {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(ProcessorError::DuplicateColumn(name));
            }
            if idx == 0 {
                table.row_count = column.len();
            } else if column.len() != table.row_count {
                return Err(ProcessorError::LengthMismatch {
                    column: name,
                    expected: table.row_count,
                    actual: column.len(),
                });
            }
            table.headers.push(name);
            table.columns.push(column);
        }

        Ok(table)
    }

    /// Loads a CSV file with default [`LoadOptions`]
    pub fn load_csv(path: &Path) -> Result<(Self, ParseSummary), ProcessorError> {
        Self::load_csv_with(path, &LoadOptions::default())
    }

    /// Loads a CSV file into memory using memory mapping
    ///
    /// Infers column types from a sample of the first data lines (Int, Float, Str) and
    /// parses newline-aligned chunks in parallel.
    ///
    /// # Errors
    /// Returns a [`ProcessorError`] if:
    /// - File cannot be opened or mapped
    /// - The header line is missing or there are no data lines
    ///
    /// Field-level problems do not fail the load: the field becomes null (or the row is
    /// skipped on a field-count mismatch) and the problem is listed in the [`ParseSummary`].
    pub fn load_csv_with(
        path: &Path,
        options: &LoadOptions,
    ) -> Result<(Self, ParseSummary), ProcessorError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let buf: &[u8] = &mmap[..];
        let buf = buf.strip_prefix(b"\xef\xbb\xbf").unwrap_or(buf);

        // Parse header
        let header_end = memchr(b'\n', buf).unwrap_or(buf.len());
        let header_line = trim_cr(&buf[..header_end]);
        if header_line.trim_ascii().is_empty() {
            return Err(ProcessorError::Parse("Missing header line".into()));
        }
        let headers = split_fields(header_line, options.delimiter)
            .into_iter()
            .map(|f| std::str::from_utf8(clean_field(f)).map(str::to_string))
            .collect::<Result<Vec<String>, _>>()?;

        let mut seen = HashSet::new();
        for h in &headers {
            if !seen.insert(h.as_str()) {
                return Err(ProcessorError::DuplicateColumn(h.clone()));
            }
        }

        let data = if header_end < buf.len() {
            &buf[header_end + 1..]
        } else {
            &[][..]
        };
        if data.trim_ascii().is_empty() {
            return Err(ProcessorError::Parse("No data rows".into()));
        }

        let schema = Self::infer_schema(data, headers.len(), options);

        // Find chunk boundaries (split by newlines)
        let num_threads = rayon::current_num_threads().max(1);
        let chunks = Self::find_chunk_boundaries(data, num_threads);

        let estimated_rows_per_chunk = {
            let avg_line_len = memchr(b'\n', data).unwrap_or(data.len()) + 1;
            data.len() / num_threads / avg_line_len + 16
        };

        // Parse chunks in parallel
        let batch_results: Vec<BatchResult> = chunks
            .par_iter()
            .map(|(start, end)| {
                Self::parse_chunk(
                    &data[*start..*end],
                    &schema,
                    &headers,
                    options.delimiter,
                    estimated_rows_per_chunk,
                )
            })
            .collect();

        // Merge batch results in file order
        let mut columns: Vec<Column> = schema
            .iter()
            .map(|col_type| Column::with_capacity(*col_type, 0))
            .collect();

        let mut total_rows = 0;
        let mut lines_before = 0;
        let mut all_errors = Vec::new();

        for batch in batch_results {
            total_rows += batch.row_count;
            // header is line 1, chunk lines are 0-based
            all_errors.extend(batch.errors.into_iter().map(|mut e| {
                e.row += lines_before + 2;
                e
            }));
            lines_before += batch.line_count;

            // numeric chunks may disagree after a promotion; append widens them
            for (col, chunk_col) in columns.iter_mut().zip(batch.columns) {
                if col.append(chunk_col).is_err() {
                    return Err(ProcessorError::Parse(
                        "chunk column type diverged from schema".into(),
                    ));
                }
            }
        }

        if !all_errors.is_empty() {
            warn!(
                path = %path.display(),
                errors = all_errors.len(),
                "CSV loaded with field errors"
            );
        }
        info!(
            path = %path.display(),
            rows = total_rows,
            columns = headers.len(),
            "loaded listings table"
        );

        let table = ListingsTable {
            headers,
            columns,
            row_count: total_rows,
        };

        Ok((
            table,
            ParseSummary {
                rows_processed: total_rows,
                errors: all_errors,
            },
        ))
    }

    fn infer_schema(data: &[u8], num_cols: usize, options: &LoadOptions) -> Vec<ColumnType> {
        // (all ints so far, all floats so far, saw a non-empty value)
        let mut state = vec![(true, true, false); num_cols];

        let lines = data
            .split(|&b| b == b'\n')
            .map(trim_cr)
            .filter(|l| !l.trim_ascii().is_empty())
            .take(options.schema_sample_rows);

        for line in lines {
            let fields = split_fields(line, options.delimiter);
            if fields.len() != num_cols {
                continue;
            }
            for (field, (is_int, is_float, seen)) in fields.iter().zip(state.iter_mut()) {
                let field = clean_field(field);
                if field.is_empty() {
                    continue;
                }
                *seen = true;
                if *is_int && atoi_simd::parse::<i64>(field).is_err() {
                    *is_int = false;
                }
                if *is_float
                    && !fast_float::parse::<f64, _>(field).is_ok_and(|v: f64| v.is_finite())
                {
                    *is_float = false;
                }
            }
        }

        let schema: Vec<ColumnType> = state
            .into_iter()
            .map(|(is_int, is_float, seen)| match (seen, is_int, is_float) {
                (false, _, _) => ColumnType::Float64,
                (true, true, _) => ColumnType::Int64,
                (true, false, true) => ColumnType::Float64,
                _ => ColumnType::Str,
            })
            .collect();

        debug!(?schema, "inferred schema");
        schema
    }

    fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
        if data.is_empty() {
            return vec![];
        }

        let chunk_size = data.len() / num_chunks;
        let mut boundaries = Vec::with_capacity(num_chunks);
        let mut start = 0;

        for i in 0..num_chunks.saturating_sub(1) {
            let mut end = ((i + 1) * chunk_size).max(start);

            // Find next newline
            end = match memchr(b'\n', &data[end.min(data.len())..]) {
                Some(pos) => end + pos + 1, // Include the newline
                None => data.len(),
            };

            if start < end {
                boundaries.push((start, end));
            }
            start = end;
        }

        // Last chunk gets everything remaining
        if start < data.len() {
            boundaries.push((start, data.len()));
        }

        boundaries
    }

    fn parse_chunk(
        chunk: &[u8],
        schema: &[ColumnType],
        headers: &[String],
        delimiter: u8,
        estimated_rows: usize,
    ) -> BatchResult {
        let num_cols = schema.len();

        let mut columns: Vec<Column> = schema
            .iter()
            .map(|t| Column::with_capacity(*t, estimated_rows))
            .collect();

        let mut errors = Vec::new();
        let mut row_count = 0;
        let mut line_count = 0;

        // Iterate lines, including a final line without a trailing newline
        let mut start = 0;
        let ends = memchr_iter(b'\n', chunk).chain(
            (chunk.last() != Some(&b'\n') && !chunk.is_empty()).then_some(chunk.len()),
        );

        for end in ends {
            let line = trim_cr(&chunk[start..end]);
            start = end + 1;
            let line_idx = line_count;
            line_count += 1;

            if line.trim_ascii().is_empty() {
                continue;
            }

            let fields = split_fields(line, delimiter);
            if fields.len() != num_cols {
                errors.push(ParseError {
                    row: line_idx,
                    column: "".to_string(),
                    value: String::from_utf8_lossy(line).into_owned(),
                    error: Some(format!(
                        "Expected {} fields, got {}",
                        num_cols,
                        fields.len()
                    )),
                });
                continue;
            }

            for (col_idx, field) in fields.iter().enumerate() {
                if let Err(e) = columns[col_idx].push_field(field) {
                    errors.push(ParseError {
                        row: line_idx,
                        column: headers[col_idx].clone(),
                        value: String::from_utf8_lossy(field).into_owned(),
                        error: Some(e),
                    });
                }
            }

            row_count += 1;
        }

        BatchResult {
            columns,
            row_count,
            line_count,
            errors,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn has_column(&self, col_name: &str) -> bool {
        self.headers.iter().any(|h| h == col_name)
    }

    pub fn get_col(&self, col_name: &str) -> Result<&Column, ProcessorError> {
        let col_pos = self
            .headers
            .iter()
            .position(|cn| cn == col_name)
            .ok_or_else(|| ProcessorError::MissingColumn(col_name.to_string()))?;

        let col = self
            .columns
            .get(col_pos)
            .ok_or_else(|| ProcessorError::MissingColumn(col_name.to_string()))?;

        Ok(col)
    }

    /// Named columns in header order
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }

    /// New table holding the given rows, in the given order
    pub fn take(&self, rows: &[usize]) -> ListingsTable {
        ListingsTable {
            headers: self.headers.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            row_count: rows.len(),
        }
    }

    /// Adds a column, replacing any column with the same name.
    ///
    /// # Errors
    /// [`ProcessorError::LengthMismatch`] when the column length differs from the table.
    pub fn with_column(&self, name: &str, column: Column) -> Result<ListingsTable, ProcessorError> {
        if !self.headers.is_empty() && column.len() != self.row_count {
            return Err(ProcessorError::LengthMismatch {
                column: name.to_string(),
                expected: self.row_count,
                actual: column.len(),
            });
        }

        let mut out = self.clone();
        if out.headers.is_empty() {
            out.row_count = column.len();
        }
        match out.headers.iter().position(|h| h == name) {
            Some(pos) => out.columns[pos] = column,
            None => {
                out.headers.push(name.to_string());
                out.columns.push(column);
            }
        }
        Ok(out)
    }

    /// Exports the table as an Arrow chunk with nullable fields
    pub fn to_arrow(&self) -> (Schema, Chunk<Box<dyn Array>>) {
        let fields: Vec<Field> = self
            .iter_columns()
            .map(|(h, col)| {
                let dtype = match col.column_type() {
                    ColumnType::Int64 => DataType::Int64,
                    ColumnType::Float64 => DataType::Float64,
                    ColumnType::Str => DataType::Utf8,
                };
                Field::new(h, dtype, true)
            })
            .collect();

        let schema = Schema::from(fields);

        let arrays: Vec<Box<dyn Array>> = self
            .columns
            .par_iter()
            .map(|col| match col {
                Column::Int64 { .. } => {
                    let arrow_array = Int64Array::from(col.iter_i64().collect::<Vec<_>>());
                    Box::new(arrow_array) as Box<dyn Array>
                }
                Column::Float64 { .. } => {
                    let arrow_array = Float64Array::from(col.iter_f64().collect::<Vec<_>>());
                    Box::new(arrow_array) as Box<dyn Array>
                }
                Column::Str { .. } => {
                    let mut arr = MutableUtf8Array::<i32>::with_capacity(col.len());
                    for s in col.iter_str() {
                        arr.push(s);
                    }

                    let array: Utf8Array<i32> = arr.into();
                    Box::new(array) as Box<dyn Array>
                }
            })
            .collect();

        (schema, Chunk::new(arrays))
    }
}

impl Serialize for ListingsTable {
    /// Column-major map of header to values, nulls as `null`
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (name, col) in self.iter_columns() {
            map.serialize_entry(name, col)?;
        }
        map.end()
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits a line on `delimiter`, ignoring delimiters inside double quotes.
/// A doubled quote toggles twice, so `""` escapes stay inside the field.
fn split_fields(line: &[u8], delimiter: u8) -> Vec<&[u8]> {
    let mut fields = Vec::new();
    let mut field_start = 0;
    let mut in_quotes = false;
    for pos in memchr2_iter(delimiter, b'"', line) {
        if line[pos] == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            fields.push(&line[field_start..pos]);
            field_start = pos + 1;
        }
    }
    fields.push(&line[field_start..]);
    fields
}
