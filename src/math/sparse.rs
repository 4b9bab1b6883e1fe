//! Triplet assembly of the global tangent stiffness
//!
//! Element contributions are collected as (row, col, value) triplets and
//! consolidated through CSR, which sums duplicate entries coming from
//! elements that share a node.

use nalgebra::DMatrix;
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use super::Mat6;

/// Sparse matrix builder using COO format
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new sparse matrix builder
    pub fn new(size: usize) -> Self {
        // 3 DOFs per node, a frame node rarely joins more than 4 elements
        let estimated_nnz = size * 15;
        Self {
            size,
            entries: Vec::with_capacity(estimated_nnz),
        }
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    /// Scatter a 6x6 element matrix; `None` entries in `dofs` are skipped
    pub fn add_element_matrix(&mut self, dofs: &[Option<usize>; 6], k_elem: &Mat6) {
        for (i, di) in dofs.iter().enumerate() {
            let Some(di) = *di else { continue };
            for (j, dj) in dofs.iter().enumerate() {
                let Some(dj) = *dj else { continue };
                self.add(di, dj, k_elem[(i, j)]);
            }
        }
    }

    /// Convert to CSR format, summing duplicates
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);

        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }

        CsrMatrix::from(&coo)
    }

    /// Convert to a dense matrix for the direct solve
    pub fn to_dense(&self) -> DMatrix<f64> {
        convert_csr_dense(&self.to_csr())
    }

    /// Number of stored triplets (before duplicate consolidation)
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Get sparsity ratio
    pub fn sparsity(&self) -> f64 {
        let total = self.size * self.size;
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.entries.len() as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_builder_sums_duplicates() {
        let mut builder = SparseMatrixBuilder::new(3);
        builder.add(0, 0, 4.0);
        builder.add(0, 0, 1.5);
        builder.add(1, 2, -1.0);
        builder.add(2, 1, -1.0);
        builder.add(2, 2, 0.0);

        let dense = builder.to_dense();
        assert!((dense[(0, 0)] - 5.5).abs() < 1e-12);
        assert!((dense[(1, 2)] + 1.0).abs() < 1e-12);
        assert_eq!(dense[(2, 2)], 0.0);
        assert_eq!(builder.nnz(), 4);
    }

    #[test]
    fn test_element_scatter_skips_unnumbered() {
        let mut builder = SparseMatrixBuilder::new(2);
        let k = Mat6::identity();
        let dofs = [None, None, None, Some(0), None, Some(1)];
        builder.add_element_matrix(&dofs, &k);

        let dense = builder.to_dense();
        assert_eq!(dense[(0, 0)], 1.0);
        assert_eq!(dense[(1, 1)], 1.0);
        assert_eq!(dense[(0, 1)], 0.0);
        assert_eq!(builder.nnz(), 2);
    }
}
