//! The logical pixel grid: a rows × cols field of on/off cells.
//!
//! A `Grid` is immutable once built. Every `draw` installs a whole new grid,
//! and animations derive the next grid from the current one.
//!
//! ## Rust concepts
//! - `TryFrom` for validated conversions
//! - `#[serde(try_from, into)]` so the JSON form goes through the same checks

use crate::MatrixError;
use serde::{Deserialize, Serialize};

/// A rectangular grid of binary pixels, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// A grid with every pixel off. Both dimensions must be non-zero.
    pub fn blank(rows: usize, cols: usize) -> Result<Self, MatrixError> {
        ensure_not_empty(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            cells: vec![false; rows * cols],
        })
    }

    /// Build a grid from nested rows. Every row must have the same,
    /// non-zero length.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        ensure_not_empty(rows.len(), cols)?;
        if let Some((r, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(MatrixError::Pattern(format!(
                "row {r} has {} cells, expected {cols}",
                row.len()
            )));
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.cols + col]
    }

    /// One row of pixels, left to right.
    pub fn row(&self, row: usize) -> &[bool] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|&&on| on).count()
    }

    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        self.cells.chunks(self.cols).map(<[bool]>::to_vec).collect()
    }

    /// Every row rotated one column to the right: the last column wraps
    /// around to column 0.
    pub fn shifted_right(&self) -> Self {
        let mut cells = self.cells.clone();
        for row in cells.chunks_mut(self.cols) {
            row.rotate_right(1);
        }
        Self {
            rows: self.rows,
            cols: self.cols,
            cells,
        }
    }
}

fn ensure_not_empty(rows: usize, cols: usize) -> Result<(), MatrixError> {
    if rows == 0 || cols == 0 {
        return Err(MatrixError::Pattern("grid must not be empty".to_string()));
    }
    Ok(())
}

impl TryFrom<Vec<Vec<u8>>> for Grid {
    type Error = MatrixError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::from_rows(
            rows.into_iter()
                .map(|row| row.into_iter().map(|cell| cell != 0).collect())
                .collect(),
        )
    }
}

impl From<Grid> for Vec<Vec<u8>> {
    fn from(grid: Grid) -> Self {
        grid.cells
            .chunks(grid.cols)
            .map(|row| row.iter().map(|&on| u8::from(on)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn grid(rows: &[&[u8]]) -> Grid {
        Grid::try_from(rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn blank_grid_is_all_off() {
        let g = Grid::blank(3, 5).unwrap();
        assert_eq!(g.dimensions(), (3, 5));
        assert_eq!(g.lit_count(), 0);
        assert_eq!(g.to_rows(), vec![vec![false; 5]; 3]);
    }

    #[rstest]
    #[case(3, 0)]
    #[case(0, 3)]
    #[case(0, 0)]
    fn blank_grid_needs_rows_and_columns(#[case] rows: usize, #[case] cols: usize) {
        assert!(matches!(Grid::blank(rows, cols), Err(MatrixError::Pattern(_))));
    }

    #[test]
    fn nonzero_cells_are_on() {
        let g = grid(&[&[0, 2], &[1, 0]]);
        assert!(!g.get(0, 0));
        assert!(g.get(0, 1));
        assert!(g.get(1, 0));
        assert_eq!(g.row(1), &[true, false]);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![vec![]])]
    #[case(vec![vec![1, 0], vec![1]])]
    fn malformed_rows_are_rejected(#[case] rows: Vec<Vec<u8>>) {
        assert!(matches!(Grid::try_from(rows), Err(MatrixError::Pattern(_))));
    }

    #[test]
    fn shifted_right_wraps_last_column() {
        let g = grid(&[&[1, 0, 0, 1, 1], &[0, 1, 0, 0, 0]]);
        let shifted = g.shifted_right();
        assert_eq!(shifted, grid(&[&[1, 1, 0, 0, 1], &[0, 0, 1, 0, 0]]));

        for r in 0..g.rows() {
            assert_eq!(shifted.get(r, 0), g.get(r, g.cols() - 1));
            for x in 1..g.cols() {
                assert_eq!(shifted.get(r, x), g.get(r, x - 1));
            }
        }
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(8)]
    fn shifting_cols_times_is_identity(#[case] cols: usize) {
        let rows: Vec<Vec<bool>> = (0..3)
            .map(|r| (0..cols).map(|c| (r * 7 + c * 3) % 5 == 0).collect())
            .collect();
        let original = Grid::from_rows(rows).unwrap();

        let mut g = original.clone();
        for _ in 0..cols {
            g = g.shifted_right();
        }
        assert_eq!(g, original);
    }

    #[test]
    fn json_form_is_nested_zeros_and_ones() {
        let g: Grid = serde_json::from_str("[[1,0,0],[0,0,1]]").unwrap();
        assert_eq!(g.dimensions(), (2, 3));
        assert_eq!(serde_json::to_string(&g).unwrap(), "[[1,0,0],[0,0,1]]");
    }

    #[test]
    fn ragged_json_fails_to_parse() {
        let parsed: Result<Grid, _> = serde_json::from_str("[[1,0],[1]]");
        assert!(parsed.is_err());
    }
}
