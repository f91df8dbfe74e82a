use itertools::Itertools;
use nalgebra::DMatrix;
use std::mem;
use std::ops::{Add, Mul};

#[allow(non_camel_case_types)]
type float = f64;

/// Sparse matrix under construction, stored as (row, col, value) triplets.
#[derive(Clone, Debug)]
pub struct Builder {
    coords: Vec<(usize, usize, float)>,
    nrows: usize,
    ncols: usize,
}

impl Builder {
    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Builder {
        Builder {
            coords: Vec::with_capacity(nnz),
            nrows,
            ncols,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn nnz(&self) -> usize {
        self.coords.len()
    }

    pub fn push(&mut self, r: usize, c: usize, val: float) {
        assert!(r < self.nrows && c < self.ncols, "entry ({}, {}) out of bounds", r, c);
        self.coords.push((r, c, val));
    }

    /// Drops every entry below the diagonal. OSQP only reads the upper triangle of P.
    pub fn upper_triangle(mut self) -> Builder {
        assert_eq!(self.nrows, self.ncols, "upper_triangle requires a square matrix");
        self.coords.retain(|&(r, c, _)| r <= c);
        self
    }

    pub fn build_csc(&mut self) -> CscMatrix {
        // Sort and sum any duplicates in the same cell
        let mut coords = mem::take(&mut self.coords);
        coords.sort_unstable_by_key(|&(r, c, _)| (c, r));
        self.coords = coords
            .into_iter()
            .coalesce(|l, r| {
                if l.0 == r.0 && l.1 == r.1 {
                    Ok((l.0, l.1, l.2 + r.2))
                } else {
                    Err((l, r))
                }
            })
            .collect();

        let mut indptr = vec![0; self.ncols + 1];
        let mut indices = vec![0; self.coords.len()];
        let mut data = vec![0.0; self.coords.len()];

        // Fill in CSC column start and end pointer and row index
        let mut last_c = 0;
        for (i, &(r, c, val)) in self.coords.iter().enumerate() {
            while last_c < c {
                last_c += 1;
                indptr[last_c] = i;
            }
            indices[i] = r;
            data[i] = val;
        }
        // Set the remaining column index pointers to one past the end of the data array
        while last_c < self.ncols {
            last_c += 1;
            indptr[last_c] = self.coords.len();
        }

        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
        }
    }
}

impl AsRef<Builder> for Builder {
    fn as_ref(&self) -> &Builder {
        self
    }
}

impl Add for Builder {
    type Output = Builder;

    fn add(mut self, other: Builder) -> Builder {
        assert_eq!(
            self.shape(),
            other.shape(),
            "matrices being added must have the same shape"
        );
        self.coords.extend_from_slice(&other.coords);
        self
    }
}

impl Mul<float> for Builder {
    type Output = Builder;

    fn mul(mut self, rhs: float) -> Builder {
        for (_, _, val) in &mut self.coords {
            *val *= rhs;
        }
        self
    }
}

pub fn zeros(nrows: usize, ncols: usize) -> Builder {
    Builder::with_capacity(nrows, ncols, 0)
}

pub fn eye(n: usize) -> Builder {
    let mut builder = Builder::with_capacity(n, n, n);
    for i in 0..n {
        builder.coords.push((i, i, 1.0));
    }
    builder
}

/// Converts a dense block, dropping exact zeros.
pub fn block(block: &DMatrix<float>) -> Builder {
    let (nrows, ncols) = block.shape();

    let coords = (0..ncols)
        .flat_map(move |c| (0..nrows).map(move |r| (r, c, block[(r, c)])))
        .filter(|&(_, _, val)| val != 0.0)
        .collect();

    Builder {
        coords,
        nrows,
        ncols,
    }
}

pub fn vstack<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let ncols = blocks.first().map(|b| b.as_ref().ncols).unwrap_or(0);
    let nnz = blocks.iter().map(|b| b.as_ref().nnz()).sum();
    let mut acc = Builder::with_capacity(0, ncols, nnz);
    for block in blocks.iter().map(AsRef::as_ref) {
        assert_eq!(
            ncols, block.ncols,
            "vstack requires matrices to have the same number of columns"
        );
        let row_shift = acc.nrows;
        block_merge(&mut acc, block, row_shift);
        acc.nrows += block.nrows;
    }
    acc
}

fn block_merge(left: &mut Builder, right: &Builder, row_shift: usize) {
    left.coords.extend(
        right
            .coords
            .iter()
            .map(|&(r, c, val)| (r + row_shift, c, val)),
    );
}

#[derive(Clone, Debug)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<float>,
}

impl CscMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[float] {
        &self.data
    }

    pub fn to_dense(&self) -> DMatrix<float> {
        let mut mat = DMatrix::zeros(self.nrows, self.ncols);

        for c in 0..self.ncols {
            for i in self.indptr[c]..self.indptr[c + 1] {
                let r = self.indices[i];
                mat[(r, c)] = self.data[i];
            }
        }

        mat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ops_should_not_panic() {
        vstack::<Builder>(&[]);
        let csc = zeros(3, 2).build_csc();
        assert_eq!(csc.indptr(), &[0, 0, 0]);
    }

    #[test]
    fn add_simple() {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(3, 3, &[
            14.0, 0.0, 9.0,
            0.0, 0.0, 0.0,
            1.0, 0.0, 7.0,
        ]);
        #[rustfmt::skip]
        let b = DMatrix::from_row_slice(3, 3, &[
            2.0, 0.0, 5.0,
            0.0, 4.0, 6.0,
            0.0, 0.0, 3.0,
        ]);

        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(3, 3, &[
            16.0, 0.0, 14.0,
            0.0, 4.0, 6.0,
            1.0, 0.0, 10.0,
        ]);

        let comparison = (block(&a) + block(&b)).build_csc().to_dense();

        assert_eq!(expected, comparison);
    }

    #[test]
    #[should_panic]
    fn add_panic() {
        let a = DMatrix::<float>::identity(3, 3);
        let b = DMatrix::<float>::identity(2, 3);
        let _ = block(&a) + block(&b);
    }

    #[test]
    fn csc_layout() {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(2, 3, &[
            1.0, 0.0, 2.0,
            0.0, 3.0, 4.0,
        ]);
        let csc = block(&a).build_csc();
        assert_eq!(csc.indptr(), &[0, 1, 2, 4]);
        assert_eq!(csc.indices(), &[0, 1, 0, 1]);
        assert_eq!(csc.data(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn vstack_with_eye() {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(1, 2, &[
            5.0, -1.0,
        ]);
        let stacked = vstack(&[block(&a), eye(2)]).build_csc();
        assert_eq!(stacked.shape(), (3, 2));

        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(3, 2, &[
            5.0, -1.0,
            1.0, 0.0,
            0.0, 1.0,
        ]);
        assert_eq!(expected, stacked.to_dense());
    }

    #[test]
    fn scaled_sum_with_eye() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let sum = (block(&a) * 2.0 + eye(2) * 0.5).build_csc();
        let expected = DMatrix::from_row_slice(2, 2, &[2.5, 4.0, 6.0, 8.5]);
        assert_eq!(expected, sum.to_dense());
    }

    #[test]
    fn upper_triangle_keeps_diagonal() {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(2, 2, &[
            4.0, 1.0,
            1.0, 2.0,
        ]);
        let upper = block(&a).upper_triangle().build_csc().to_dense();
        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(2, 2, &[
            4.0, 1.0,
            0.0, 2.0,
        ]);
        assert_eq!(expected, upper);
    }

    #[test]
    fn duplicates_are_summed() {
        let mut b = zeros(2, 2);
        b.push(1, 0, 1.5);
        b.push(1, 0, 2.5);
        let csc = b.build_csc();
        assert_eq!(csc.data(), &[4.0]);
        assert_eq!(csc.indptr(), &[0, 1, 1]);
    }
}
