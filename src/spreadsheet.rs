//
// spreadsheet.rs
// Pet2Bids-rs
//
// Reads the investigator metadata sheet into a positional grid, dispatching on an explicit format tag.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::layout::CellPosition;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MetadataFormat {
    Excel,
    OpenDocument,
    Csv,
    Tsv,
}

impl MetadataFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            ext if ext.contains("xls") => Ok(MetadataFormat::Excel),
            "ods" => Ok(MetadataFormat::OpenDocument),
            "csv" => Ok(MetadataFormat::Csv),
            "tsv" => Ok(MetadataFormat::Tsv),
            _ => Err(ConvertError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    fn from_text(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Cell::Empty
        } else if let Ok(n) = raw.parse::<f64>() {
            Cell::Number(n)
        } else {
            Cell::Text(raw.to_string())
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) => Cell::from_text(s),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Investigator-supplied values. The first sheet row is treated as column headers and
/// positions index the rows beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl MetadataTable {
    pub fn open(path: &Path) -> Result<Self> {
        let format = MetadataFormat::from_path(path)?;
        info!(file = %path.display(), ?format, "reading metadata spreadsheet");
        let grid = match format {
            MetadataFormat::Excel | MetadataFormat::OpenDocument => read_workbook(path)?,
            MetadataFormat::Csv => read_delimited(path, b',')?,
            MetadataFormat::Tsv => read_delimited(path, b'\t')?,
        };
        Ok(Self::from_grid(path, grid))
    }

    pub fn from_grid(path: &Path, mut grid: Vec<Vec<Cell>>) -> Self {
        let headers = if grid.is_empty() {
            Vec::new()
        } else {
            grid.remove(0)
                .into_iter()
                .map(|c| match c {
                    Cell::Empty => String::new(),
                    Cell::Number(n) => n.to_string(),
                    Cell::Text(s) => s,
                    Cell::Bool(b) => b.to_string(),
                })
                .collect()
        };
        Self {
            path: path.to_path_buf(),
            headers,
            rows: grid,
        }
    }

    pub fn cell(&self, pos: CellPosition) -> Option<&Cell> {
        self.rows.get(pos.row).and_then(|r| r.get(pos.column))
    }

    /// Numeric value at `pos`; empty or out-of-range cells count as missing.
    pub fn number(&self, pos: CellPosition, label: &str) -> Result<f64> {
        match self.cell(pos) {
            None | Some(Cell::Empty) => Err(ConvertError::missing(
                format!("{label} (row {}, column {})", pos.row, pos.column),
                "metadata spreadsheet",
            )),
            Some(Cell::Number(n)) => Ok(*n),
            Some(other) => Err(ConvertError::InvalidFormat(format!(
                "{label} at row {}, column {} of {} is not numeric: {other:?}",
                pos.row,
                pos.column,
                self.path.display()
            ))),
        }
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let spreadsheet_error = |message: String| ConvertError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };
    if !path.is_file() {
        return Err(ConvertError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        ));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_error("workbook has no sheets".to_string()))?
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    // Ranges start at the first used cell; pad back to A1 so positions stay absolute.
    let (row_offset, col_offset) = range
        .start()
        .map_or((0, 0), |(r, c)| (r as usize, c as usize));
    let mut grid = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(Cell::from_data));
        grid.push(cells);
    }
    Ok(grid)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(Cell::from_text).collect())
                .map_err(|e| csv_error(path, e))
        })
        .collect()
}

pub(crate) fn csv_error(path: &Path, err: csv::Error) -> ConvertError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => ConvertError::io(path, io),
        _ => ConvertError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn format_tags_follow_extension() {
        assert_eq!(
            MetadataFormat::from_path(Path::new("session.xlsx")).unwrap(),
            MetadataFormat::Excel
        );
        assert_eq!(
            MetadataFormat::from_path(Path::new("session.XLS")).unwrap(),
            MetadataFormat::Excel
        );
        assert_eq!(
            MetadataFormat::from_path(Path::new("session.tsv")).unwrap(),
            MetadataFormat::Tsv
        );
        assert!(matches!(
            MetadataFormat::from_path(Path::new("session.txt")),
            Err(ConvertError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            MetadataFormat::from_path(Path::new("session")),
            Err(ConvertError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn csv_positions_skip_header_row() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("meta.csv");
        std::fs::write(&path, "a,b,c\n1,2,3\n4,,six\n").expect("write csv");

        let table = MetadataTable::open(&path).expect("table");
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.number(CellPosition::new(1, 0), "x").unwrap(), 4.0);
        assert!(matches!(
            table.number(CellPosition::new(1, 1), "x"),
            Err(ConvertError::MissingField { .. })
        ));
        assert!(matches!(
            table.number(CellPosition::new(1, 2), "x"),
            Err(ConvertError::InvalidFormat(_))
        ));
        assert!(matches!(
            table.number(CellPosition::new(9, 9), "x"),
            Err(ConvertError::MissingField { .. })
        ));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = MetadataTable::open(Path::new("/definitely/not/here.csv")).unwrap_err();
        match err {
            ConvertError::Io { path, .. } => assert_eq!(path, Path::new("/definitely/not/here.csv")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_workbook_names_the_path() {
        let err = MetadataTable::open(Path::new("/definitely/not/here.xlsx")).unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }
}
