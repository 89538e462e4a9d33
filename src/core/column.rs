//! A `Column` in HTM represents one feature detector or receptive field.
//!
//! Biological inspiration:
//! Columns in HTM are inspired by cortical mini-columns found in the brain.
//! They consist of a group of neurons, which in HTM are modeled as "cells".
//!
//! Meaning in HTM:
//! In the Spatial Pooler each column owns one proximal dendrite, a potential pool of input bits,
//! and competes with the other columns to become active. In the Temporal Memory its cells
//! represent the same feed-forward input in different temporal contexts.
//!
//! Cells are not stored in the column: a cell is identified by its flat index
//! `column * cells_per_column + ordinal`, and the column only knows its range of cell indices.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Represents a cortical column in the HTM model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// The flat index of the column in the column topology.
    pub index: usize,

    cells_per_column: usize,
}

impl Column {
    /// Creates a new Column.
    pub fn new(index: usize, cells_per_column: usize) -> Self {
        Self {
            index,
            cells_per_column,
        }
    }

    /// The flat indices of the cells in this column.
    #[inline]
    pub fn cells(&self) -> Range<usize> {
        let first = self.index * self.cells_per_column;
        first..first + self.cells_per_column
    }

    /// The flat index of the cell with the given ordinal within this column.
    #[inline]
    pub fn cell(&self, ordinal: usize) -> usize {
        debug_assert!(ordinal < self.cells_per_column);
        self.index * self.cells_per_column + ordinal
    }

    /// The column owning the cell with flat index `cell`.
    #[inline]
    pub fn index_of_cell(cell: usize, cells_per_column: usize) -> usize {
        cell / cells_per_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_are_disjoint_per_column() {
        let a = Column::new(3, 4);
        let b = Column::new(4, 4);
        assert_eq!(a.cells(), 12..16);
        assert_eq!(b.cells(), 16..20);
        assert_eq!(a.cell(2), 14);
        assert!(a.cells().all(|cell| Column::index_of_cell(cell, 4) == 3));
    }
}
