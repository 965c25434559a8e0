use serde::Deserialize;

use crate::cells::{Cell, RawCell};

pub type StringTable = Vec<Vec<Option<String>>>;

/// One result row keyed by column name, in column order
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The type of a column in the result set
///
/// In most cases Cell should already expose the data you need,
/// but if you use the raw strings or need additional information like nullability, etc,
/// this can be useful.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnType {
    /// The name of the column
    pub name: String,
    /// The database the column is in
    #[serde(default)]
    pub database: String,
    /// The schema the column is in
    #[serde(default)]
    pub schema: String,
    /// The table the column is in
    #[serde(default)]
    pub table: String,
    /// How many decimal digits of precision the column has
    pub precision: Option<u32>,
    /// The length of the column in bytes
    pub byte_length: Option<usize>,
    /// The format used when serializing the type to String before returning it
    #[serde(rename = "type")]
    pub data_type: RawCell,
    /// The number of decimal digits after the decimal point
    pub scale: Option<i32>,
    #[serde(default = "nullable_default")]
    pub nullable: bool,
}

fn nullable_default() -> bool {
    true
}

/// Every row a statement returned, already gathered from all partitions or chunks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    columns: Vec<ColumnType>,
    data: StringTable,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnType>, data: StringTable) -> QueryResult {
        QueryResult { columns, data }
    }

    pub fn num_rows(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.columns
    }

    /// The cells as strings just as they were returned from Snowflake
    pub fn raw_cells(&self) -> &[Vec<Option<String>>] {
        &self.data
    }

    /// Convert the response into `Cell`s in a list of lists format
    pub fn cells(&self) -> Vec<Vec<Cell>> {
        self.data.iter().map(|row| self.row_cells(row)).collect()
    }

    /// Convert the response into `serde_json::Value`s in a list of lists format
    pub fn json_table(&self) -> Vec<Vec<serde_json::Value>> {
        self.cells()
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.into()).collect())
            .collect()
    }

    /// Convert the response into one record per row
    pub fn records(&self) -> Vec<Record> {
        self.data.iter().map(|row| self.record(row)).collect()
    }

    /// The first row as a record, if there is one
    pub fn first_record(&self) -> Option<Record> {
        self.data.first().map(|row| self.record(row))
    }

    /// Keep only the first `n` rows
    pub fn truncate(&mut self, n: usize) {
        self.data.truncate(n);
    }

    fn row_cells(&self, row: &[Option<String>]) -> Vec<Cell> {
        row.iter()
            .zip(&self.columns)
            .map(|(value, column)| column.data_type.to_cell(value))
            .collect()
    }

    fn record(&self, row: &[Option<String>]) -> Record {
        self.row_cells(row)
            .into_iter()
            .zip(&self.columns)
            .map(|(cell, column)| (column.name.clone(), cell.into()))
            .collect()
    }
}
