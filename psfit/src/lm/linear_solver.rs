//! Dense linear solve for the damped normal equations.
//!
//! Gaussian elimination with partial pivoting on a row-major n×n system.
//! Systems here are at most 6×6.

/// Pivots smaller than this fraction of the largest diagonal entry are
/// treated as singular.
const RELATIVE_PIVOT_EPS: f64 = 1e-14;

/// Solve `a x = b`. `a` is row-major with `b.len()` rows.
///
/// Returns None if the matrix is singular.
#[allow(clippy::needless_range_loop)]
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    debug_assert_eq!(a.len(), n);
    let mut matrix: Vec<Vec<f64>> = a.to_vec();
    let mut rhs = b.to_vec();

    let scale = (0..n).map(|i| matrix[i][i].abs()).fold(0.0f64, f64::max);
    if !(scale > 0.0) || !scale.is_finite() {
        return None;
    }
    let threshold = scale * RELATIVE_PIVOT_EPS;

    // Forward elimination with partial pivoting
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = matrix[col][col].abs();
        for row in (col + 1)..n {
            if matrix[row][col].abs() > max_val {
                max_val = matrix[row][col].abs();
                max_row = row;
            }
        }

        if max_val < threshold {
            return None;
        }

        if max_row != col {
            matrix.swap(col, max_row);
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..n {
            let factor = matrix[row][col] / matrix[col][col];
            for j in col..n {
                matrix[row][j] -= factor * matrix[col][j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= matrix[i][j] * x[j];
        }
        x[i] = sum / matrix[i][i];
    }

    Some(x)
}
