use thiserror::Error;

/// Errors raised while building or evaluating spline interpolants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplineError {
    /// Knot abscissae must be strictly increasing
    #[error("{axis} knots are not strictly increasing at index {index} ({previous} >= {value})")]
    NonMonotonic {
        axis: &'static str,
        index: usize,
        previous: f64,
        value: f64,
    },

    /// Need at least `required` knots along an axis
    #[error("{axis} axis has {len} knots, need at least {required}")]
    TooFewPoints {
        axis: &'static str,
        len: usize,
        required: usize,
    },

    /// Inconsistent data dimensions
    #[error("data length {data_len} does not match knot layout {nx} x {ny}")]
    DimensionMismatch {
        nx: usize,
        ny: usize,
        data_len: usize,
    },

    /// A knot or sample is NaN or infinite
    #[error("non-finite {what} at index {index}")]
    NonFinite { what: &'static str, index: usize },

    /// Coordinate is outside the valid interpolation domain
    #[error("{axis} coordinate {value} is outside valid range [{min}, {max}]")]
    OutOfBounds {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Check that knots along one axis are finite and strictly increasing.
pub(crate) fn validate_knots(
    axis: &'static str,
    knots: &[f64],
    required: usize,
) -> Result<(), SplineError> {
    if knots.len() < required {
        return Err(SplineError::TooFewPoints {
            axis,
            len: knots.len(),
            required,
        });
    }
    for (index, value) in knots.iter().enumerate() {
        if !value.is_finite() {
            return Err(SplineError::NonFinite {
                what: "knot",
                index,
            });
        }
    }
    for index in 1..knots.len() {
        if knots[index] <= knots[index - 1] {
            return Err(SplineError::NonMonotonic {
                axis,
                index,
                previous: knots[index - 1],
                value: knots[index],
            });
        }
    }
    Ok(())
}

/// Locate the segment `[x[i], x[i+1]]` containing `value` by binary search.
///
/// `value` must already be known to lie inside `[x[0], x[n-1]]`; the last
/// knot maps onto the final segment.
pub(crate) fn find_segment(x: &[f64], value: f64) -> usize {
    let mut left = 0;
    let mut right = x.len() - 1;

    while left < right - 1 {
        let mid = (left + right) / 2;
        if value < x[mid] {
            right = mid;
        } else {
            left = mid;
        }
    }
    left
}

/// Natural cubic spline through a set of knots
///
/// Piecewise cubic polynomials between adjacent knots with C² continuity and
/// zero second derivative at both ends. Each segment has the form
///
/// S(x) = a + b(x-xi) + c(x-xi)² + d(x-xi)³
///
/// Evaluation outside the knot range is an error rather than a clamp, so
/// callers decide how to continue a curve past its ends.
///
/// # Examples
///
/// ```rust
/// use powerspec::algo::spline::CubicSpline;
///
/// let x = vec![0.0, 1.0, 2.0, 3.0];
/// let y = vec![0.0, 1.0, 4.0, 9.0];
/// let spline = CubicSpline::new(x, y).unwrap();
///
/// let value = spline.evaluate(1.5).unwrap();
/// let slope = spline.derivative(1.5).unwrap();
/// assert!(value > 1.0 && value < 4.0);
/// assert!(slope > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>, // a, b, c, d coefficients for each segment
}

impl CubicSpline {
    /// Build a natural cubic spline through `(x, y)`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the vectors differ in length
    /// - `TooFewPoints` for fewer than 2 knots
    /// - `NonMonotonic` if x is not strictly increasing
    /// - `NonFinite` for NaN or infinite samples
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::DimensionMismatch {
                nx: x.len(),
                ny: 1,
                data_len: y.len(),
            });
        }
        validate_knots("x", &x, 2)?;
        if let Some(index) = y.iter().position(|v| !v.is_finite()) {
            return Err(SplineError::NonFinite {
                what: "sample",
                index,
            });
        }

        let coeffs = natural_coefficients(&x, &y);
        Ok(Self { x, coeffs })
    }

    /// Lower end of the knot range
    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    /// Upper end of the knot range
    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    /// Knot abscissae
    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    fn locate(&self, x: f64) -> Result<(usize, f64), SplineError> {
        if !(x >= self.x_min() && x <= self.x_max()) {
            return Err(SplineError::OutOfBounds {
                axis: "x",
                value: x,
                min: self.x_min(),
                max: self.x_max(),
            });
        }
        let segment = find_segment(&self.x, x);
        Ok((segment, x - self.x[segment]))
    }

    /// Evaluate the spline at `x`.
    pub fn evaluate(&self, x: f64) -> Result<f64, SplineError> {
        let (segment, dx) = self.locate(x)?;
        let [a, b, c, d] = self.coeffs[segment];
        Ok(a + dx * (b + dx * (c + dx * d)))
    }

    /// First derivative at `x`.
    pub fn derivative(&self, x: f64) -> Result<f64, SplineError> {
        let (segment, dx) = self.locate(x)?;
        let [_, b, c, d] = self.coeffs[segment];
        Ok(b + dx * (2.0 * c + 3.0 * d * dx))
    }

    /// Second derivative at `x`.
    pub fn second_derivative(&self, x: f64) -> Result<f64, SplineError> {
        let (segment, dx) = self.locate(x)?;
        let [_, _, c, d] = self.coeffs[segment];
        Ok(2.0 * c + 6.0 * d * dx)
    }

    /// First derivative at every knot, including the last one.
    pub fn knot_slopes(&self) -> Vec<f64> {
        slopes_from(&self.x, &self.coeffs)
    }
}

/// Natural-spline slopes at every knot without keeping the spline around.
pub(crate) fn natural_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    slopes_from(x, &natural_coefficients(x, y))
}

fn slopes_from(x: &[f64], coeffs: &[[f64; 4]]) -> Vec<f64> {
    let n = x.len();
    let mut slopes: Vec<f64> = coeffs.iter().map(|c| c[1]).collect();
    let h = x[n - 1] - x[n - 2];
    let [_, b, c, d] = coeffs[n - 2];
    slopes.push(b + 2.0 * c * h + 3.0 * d * h * h);
    slopes
}

/// Solve the tridiagonal system for natural boundary conditions (Thomas
/// algorithm) and return `[a, b, c, d]` per segment.
fn natural_coefficients(x: &[f64], y: &[f64]) -> Vec<[f64; 4]> {
    let n = x.len();
    let mut h = vec![0.0; n - 1];
    let mut alpha = vec![0.0; n - 1];

    for i in 0..n - 1 {
        h[i] = x[i + 1] - x[i];
    }

    for i in 1..n - 1 {
        alpha[i] = (3.0 / h[i]) * (y[i + 1] - y[i]) - (3.0 / h[i - 1]) * (y[i] - y[i - 1]);
    }

    let mut l = vec![1.0; n];
    let mut mu = vec![0.0; n];
    let mut z = vec![0.0; n];

    for i in 1..n - 1 {
        l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
        mu[i] = h[i] / l[i];
        z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
    }

    let mut c = vec![0.0; n];
    let mut b = vec![0.0; n - 1];
    let mut d = vec![0.0; n - 1];

    // Back substitution
    for j in (0..n - 1).rev() {
        c[j] = z[j] - mu[j] * c[j + 1];
        b[j] = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
        d[j] = (c[j + 1] - c[j]) / (3.0 * h[j]);
    }

    (0..n - 1).map(|i| [y[i], b[i], c[i], d[i]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_interpolation() {
        let spline = CubicSpline::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        assert_relative_eq!(spline.evaluate(0.5).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(spline.derivative(0.25).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_passes_through_knots() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![0.0, 1.0, 0.0, -1.0, 0.0];
        let spline = CubicSpline::new(x.clone(), y.clone()).unwrap();

        for i in 0..x.len() {
            assert_relative_eq!(spline.evaluate(x[i]).unwrap(), y[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_natural_ends_have_zero_curvature() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![0.0, 1.0, 4.0, 9.0];
        let spline = CubicSpline::new(x, y).unwrap();

        assert_relative_eq!(spline.second_derivative(0.0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(spline.second_derivative(3.0).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_knot_slopes_match_derivative() {
        let x: Vec<f64> = (0..12).map(|i| i as f64 * 0.3).collect();
        let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
        let spline = CubicSpline::new(x.clone(), y.clone()).unwrap();
        let slopes = spline.knot_slopes();

        assert_eq!(slopes.len(), x.len());
        for (xi, si) in x.iter().zip(&slopes) {
            assert_relative_eq!(spline.derivative(*xi).unwrap(), *si, epsilon = 1e-12);
        }
        assert_eq!(natural_slopes(&x, &y), slopes);
    }

    #[test]
    fn test_smooth_function_accuracy() {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
        let spline = CubicSpline::new(x, y).unwrap();

        assert_relative_eq!(spline.evaluate(2.05).unwrap(), 2.05f64.sin(), epsilon = 1e-5);
        assert_relative_eq!(spline.derivative(2.05).unwrap(), 2.05f64.cos(), epsilon = 1e-3);
    }

    #[test]
    fn test_mismatched_lengths() {
        let result = CubicSpline::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0]);
        assert!(matches!(result, Err(SplineError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_unsorted_x() {
        let result = CubicSpline::new(vec![0.0, 2.0, 1.0], vec![0.0, 4.0, 1.0]);
        assert!(matches!(
            result,
            Err(SplineError::NonMonotonic { index: 2, .. })
        ));
    }

    #[test]
    fn test_duplicate_knot_rejected() {
        let result = CubicSpline::new(vec![0.0, 1.0, 1.0], vec![0.0, 1.0, 2.0]);
        assert!(matches!(result, Err(SplineError::NonMonotonic { .. })));
    }

    #[test]
    fn test_out_of_range_is_error() {
        let spline = CubicSpline::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 4.0]).unwrap();
        assert!(matches!(
            spline.evaluate(-0.1),
            Err(SplineError::OutOfBounds { .. })
        ));
        assert!(spline.evaluate(2.0).is_ok());
        assert!(spline.evaluate(f64::NAN).is_err());
    }
}
