//! Row/column grid the URL list is read from and the report is appended to.
//! Coordinates are 1-based, matching how people address spreadsheet cells.

use crate::util::write_atomic;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

pub trait Sheet {
    /// Last row holding a non-empty cell, 0 for an empty sheet.
    fn last_row(&self) -> Result<usize>;
    /// Last column holding a non-empty cell, 0 for an empty sheet.
    fn last_column(&self) -> Result<usize>;
    /// Rectangular read, padded with empty strings past the data.
    fn read_range(&self, row: usize, col: usize, rows: usize, cols: usize)
        -> Result<Vec<Vec<String>>>;
    fn write_range(&self, row: usize, col: usize, block: &[Vec<String>]) -> Result<()>;
    fn set_bold(&self, range: CellRange) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub cells: Vec<Vec<String>>,
    pub bold: Vec<CellRange>,
}

fn check_origin(row: usize, col: usize) -> Result<()> {
    if row == 0 || col == 0 {
        bail!("sheet coordinates are 1-based, got row={row} col={col}");
    }
    Ok(())
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            cells: rows,
            bold: Vec::new(),
        }
    }

    pub fn last_row(&self) -> usize {
        self.cells
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn last_column(&self) -> usize {
        self.cells
            .iter()
            .filter_map(|r| r.iter().rposition(|c| !c.is_empty()))
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn read(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<Vec<Vec<String>>> {
        check_origin(row, col)?;
        Ok((0..rows)
            .map(|r| {
                let src = self.cells.get(row - 1 + r);
                (0..cols)
                    .map(|c| {
                        src.and_then(|cells| cells.get(col - 1 + c))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect())
    }

    pub fn write(&mut self, row: usize, col: usize, block: &[Vec<String>]) -> Result<()> {
        check_origin(row, col)?;
        for (r, values) in block.iter().enumerate() {
            let ri = row - 1 + r;
            if self.cells.len() <= ri {
                self.cells.resize_with(ri + 1, Vec::new);
            }
            let target = &mut self.cells[ri];
            let needed = col - 1 + values.len();
            if target.len() < needed {
                target.resize(needed, String::new());
            }
            for (c, v) in values.iter().enumerate() {
                target[col - 1 + c] = v.clone();
            }
        }
        Ok(())
    }

    pub fn is_bold(&self, row: usize, col: usize) -> bool {
        self.bold.iter().any(|b| {
            row >= b.row && row < b.row + b.rows && col >= b.col && col < b.col + b.cols
        })
    }
}

/// CSV file with bold ranges kept in a `<file>.format.json` sidecar, since
/// CSV has no formatting of its own.
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn format_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(".format.json");
        PathBuf::from(p)
    }

    pub fn load(&self) -> Result<Grid> {
        let mut cells = Vec::new();
        if self.path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&self.path)
                .with_context(|| format!("open sheet: {}", self.path.display()))?;
            for record in reader.records() {
                let record =
                    record.with_context(|| format!("read sheet: {}", self.path.display()))?;
                cells.push(record.iter().map(str::to_string).collect());
            }
        }

        let fmt_path = self.format_path();
        let bold = if fmt_path.exists() {
            let raw = std::fs::read_to_string(&fmt_path)
                .with_context(|| format!("reading {}", fmt_path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", fmt_path.display()))?
        } else {
            Vec::new()
        };

        Ok(Grid { cells, bold })
    }

    fn save_cells(&self, grid: &Grid) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());
        for row in &grid.cells {
            // csv cannot write a zero-field record; a lone empty field keeps the row
            if row.is_empty() {
                writer.write_record([""])?;
            } else {
                writer.write_record(row)?;
            }
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush sheet: {e}"))?;
        write_atomic(&self.path, &bytes)
    }

    fn save_format(&self, grid: &Grid) -> Result<()> {
        write_atomic(&self.format_path(), &serde_json::to_vec_pretty(&grid.bold)?)
    }
}

impl Sheet for CsvSheet {
    fn last_row(&self) -> Result<usize> {
        Ok(self.load()?.last_row())
    }

    fn last_column(&self) -> Result<usize> {
        Ok(self.load()?.last_column())
    }

    fn read_range(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<String>>> {
        self.load()?.read(row, col, rows, cols)
    }

    fn write_range(&self, row: usize, col: usize, block: &[Vec<String>]) -> Result<()> {
        let mut grid = self.load()?;
        grid.write(row, col, block)?;
        self.save_cells(&grid)
    }

    fn set_bold(&self, range: CellRange) -> Result<()> {
        check_origin(range.row, range.col)?;
        let mut grid = self.load()?;
        grid.bold.push(range);
        self.save_format(&grid)
    }
}

#[derive(Default)]
pub struct MemorySheet {
    grid: Mutex<Grid>,
}

impl MemorySheet {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            grid: Mutex::new(Grid::from_rows(rows)),
        }
    }

    pub fn snapshot(&self) -> Grid {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Sheet for MemorySheet {
    fn last_row(&self) -> Result<usize> {
        Ok(self.lock().last_row())
    }

    fn last_column(&self) -> Result<usize> {
        Ok(self.lock().last_column())
    }

    fn read_range(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<String>>> {
        self.lock().read(row, col, rows, cols)
    }

    fn write_range(&self, row: usize, col: usize, block: &[Vec<String>]) -> Result<()> {
        self.lock().write(row, col, block)
    }

    fn set_bold(&self, range: CellRange) -> Result<()> {
        check_origin(range.row, range.col)?;
        self.lock().bold.push(range);
        Ok(())
    }
}
