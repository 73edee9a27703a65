//! Core shared types.
//!
//! Point sets are stored column-wise: a `dim x N` matrix holds `N` points of
//! dimension `dim` (2 for image coordinates, 3 for Euclidean points). Two
//! point sets with the same number of columns form a correspondence set,
//! column `i` of the first matching column `i` of the second.

use nalgebra::DMatrix;

/// Dynamic matrix of `f64` holding one point per column.
pub type DataMatrix = DMatrix<f64>;

/// Gather the columns selected by `indices` into a new matrix, in order.
pub fn extract_columns(data: &DataMatrix, indices: &[usize]) -> DataMatrix {
    DataMatrix::from_fn(data.nrows(), indices.len(), |r, c| data[(r, indices[c])])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_columns_keeps_sample_order() {
        let data = DataMatrix::from_row_slice(2, 4, &[0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0]);
        let picked = extract_columns(&data, &[3, 1]);

        assert_eq!(picked.shape(), (2, 2));
        assert_eq!(picked[(0, 0)], 3.0);
        assert_eq!(picked[(1, 0)], 13.0);
        assert_eq!(picked[(0, 1)], 1.0);
        assert_eq!(picked[(1, 1)], 11.0);
    }
}
