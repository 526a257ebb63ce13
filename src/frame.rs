//! Encoding of a pixel grid into the bit vectors the register chain expects.
//!
//! Each physical row gets its own vector of `rows + cols` bits:
//!
//! ```text
//!  index:  0 .. rows           rows .. rows+cols
//!          one-hot row select  column bits, active low
//! ```
//!
//! The row outputs source current into the common row line, and a column
//! output at `0` sinks it, so a lit pixel is a `0` in the column half.

use crate::grid::Grid;

/// The register vectors for every row of one grid, in row order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    rows: Vec<Vec<bool>>,
}

impl Frame {
    pub fn encode(grid: &Grid) -> Self {
        let rows = (0..grid.rows()).map(|row| encode_row(grid, row)).collect();
        Self { rows }
    }

    /// Register vector for physical row `row`.
    pub fn row(&self, row: usize) -> &[bool] {
        &self.rows[row]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[bool]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

fn encode_row(grid: &Grid, row: usize) -> Vec<bool> {
    let mut bits = vec![false; grid.rows() + grid.cols()];
    bits[row] = true;
    for (col, &on) in grid.row(row).iter().enumerate() {
        bits[grid.rows() + col] = !on;
    }
    bits
}
