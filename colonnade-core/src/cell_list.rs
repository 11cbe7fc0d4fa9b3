//! Ordered cell lists and their persisted form.
//!
//! The persisted layout is a JSON array of `{"type", "value"}` objects in
//! column order. Decoding is best effort: entries that no longer build are
//! dropped and the result is flagged dirty so the caller can persist the
//! shorter list.

use crate::{Cell, CellDict, CellRegistry, ColonnadeResult, RecordTypeId, Services, StorageError};

/// An ordered list of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellList {
    cells: Vec<Cell>,
}

impl CellList {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Every cell, including excluded ones.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cells consumers should display: excluded ones are skipped.
    pub fn filtered_cells(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .filter(|c| !c.is_excluded())
            .cloned()
            .collect()
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.cells.iter().map(Cell::key).collect()
    }

    pub fn to_dicts(&self, portable: bool) -> Vec<CellDict> {
        self.cells.iter().map(|c| c.to_dict(portable)).collect()
    }

    pub fn encode(&self, portable: bool) -> ColonnadeResult<String> {
        encode(&self.cells, portable)
    }
}

impl From<Vec<Cell>> for CellList {
    fn from(cells: Vec<Cell>) -> Self {
        Self::new(cells)
    }
}

/// Serialize cells to the persisted layout.
pub fn encode(cells: &[Cell], portable: bool) -> ColonnadeResult<String> {
    let dicts: Vec<CellDict> = cells.iter().map(|c| c.to_dict(portable)).collect();
    serde_json::to_string(&dicts).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Outcome of decoding a persisted cell list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedCells {
    pub cells: CellList,
    /// True when the persisted form differs from `cells` and should be
    /// rewritten.
    pub dirty: bool,
    /// Number of entries that could not be rebuilt.
    pub dropped: usize,
}

/// Rebuild cells from the persisted layout. Never fails.
pub fn decode(
    registry: &CellRegistry,
    services: &Services,
    record_type: &RecordTypeId,
    stored: &str,
) -> DecodedCells {
    if stored.trim().is_empty() {
        return DecodedCells::default();
    }

    let entries: Vec<serde_json::Value> = match serde_json::from_str(stored) {
        Ok(entries) => entries,
        Err(_) => {
            return DecodedCells {
                cells: CellList::default(),
                dirty: true,
                dropped: 0,
            };
        }
    };

    let (cells, _) = registry.build_many_from_json_values(services, record_type, &entries);
    let dropped = entries.len() - cells.len();
    DecodedCells {
        cells: CellList::new(cells),
        dirty: dropped > 0,
        dropped,
    }
}
