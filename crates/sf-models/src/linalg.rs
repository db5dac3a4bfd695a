// =============================================================================
// ndarray ↔ nalgebra bridge
// =============================================================================
//
// Vectors and matrices are stored as ndarray arrays throughout the crate;
// factorizations run on nalgebra. Every solver goes through these helpers.
//
// =============================================================================

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::base::{ModelError, Result};

/// Convert an ndarray Array2 to a nalgebra DMatrix.
#[inline]
pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = a.dim();
    DMatrix::from_fn(nrows, ncols, |i, j| a[[i, j]])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
#[inline]
pub fn to_dvector(v: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.iter().copied())
}

/// Convert a nalgebra DMatrix to an ndarray Array2.
#[inline]
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    let (nrows, ncols) = m.shape();
    Array2::from_shape_fn((nrows, ncols), |(i, j)| m[(i, j)])
}

/// Convert a nalgebra DVector to an ndarray Array1.
#[inline]
pub fn to_array1(v: &DVector<f64>) -> Array1<f64> {
    Array1::from_vec(v.as_slice().to_vec())
}

/// Least-squares solution of Xβ ≈ y via SVD.
pub fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    let svd = to_dmatrix(x).svd(true, true);
    let tol = svd.singular_values.max() * f64::EPSILON * x.nrows().max(x.ncols()) as f64;

    // A vanishing singular value means the design is rank deficient
    if svd.singular_values.min() <= tol {
        return Err(ModelError::SingularMatrix("least_squares"));
    }

    svd.solve(&to_dvector(y), tol)
        .map(|beta| to_array1(&beta))
        .map_err(|e| ModelError::NumericalError {
            message: format!("SVD least squares failed: {}", e),
            operation: "least_squares".to_string(),
        })
}

/// Invert a symmetric positive-definite matrix.
///
/// Tries Cholesky first, falls back to LU.
pub fn invert_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    let a_nalg = to_dmatrix(a);
    let p = a_nalg.nrows();

    if let Some(chol) = a_nalg.clone().cholesky() {
        return Ok(to_array2(&chol.solve(&DMatrix::identity(p, p))));
    }

    a_nalg
        .try_inverse()
        .map(|inv| to_array2(&inv))
        .ok_or(ModelError::SingularMatrix("invert_spd"))
}

/// Solve the symmetric system Aβ = b and return (β, A⁻¹).
pub fn solve_and_invert(a: &Array2<f64>, b: &Array1<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let a_nalg = to_dmatrix(a);
    let b_nalg = to_dvector(b);
    let p = a_nalg.nrows();

    if let Some(chol) = a_nalg.clone().cholesky() {
        let solution = chol.solve(&b_nalg);
        let inverse = chol.solve(&DMatrix::identity(p, p));
        return Ok((to_array1(&solution), to_array2(&inverse)));
    }

    let solution = a_nalg
        .clone()
        .lu()
        .solve(&b_nalg)
        .ok_or(ModelError::SingularMatrix("solve_and_invert"))?;
    let inverse = a_nalg
        .try_inverse()
        .ok_or(ModelError::SingularMatrix("solve_and_invert"))?;

    Ok((to_array1(&solution), to_array2(&inverse)))
}
