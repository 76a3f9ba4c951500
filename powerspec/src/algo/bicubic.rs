//! Bicubic spline interpolation on rectilinear 2D grids.
//!
//! Samples are stored in an `Array2` indexed `[y_index, x_index]`, so the
//! sample for x-knot `i` and y-knot `j` sits at flat offset `j * nx + i` in
//! standard layout. Knot derivatives along each axis are taken from natural
//! cubic splines through every row and column, and each cell is a bicubic
//! Hermite patch. Values and x-derivatives are continuous across cells.

use ndarray::Array2;

use super::spline::{find_segment, natural_slopes, validate_knots, SplineError};

/// Order of the x-derivative requested from a patch evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum XOrder {
    Value,
    First,
    Second,
}

/// Bicubic spline over a rectilinear grid.
#[derive(Debug, Clone)]
pub struct BicubicSpline {
    /// X-axis knots (strictly ascending)
    x_coords: Vec<f64>,
    /// Y-axis knots (strictly ascending)
    y_coords: Vec<f64>,
    /// Samples indexed as [y_index, x_index]
    z: Array2<f64>,
    /// ∂z/∂x at the knots
    zx: Array2<f64>,
    /// ∂z/∂y at the knots
    zy: Array2<f64>,
    /// ∂²z/∂x∂y at the knots
    zxy: Array2<f64>,
}

impl BicubicSpline {
    /// Build a spline from knots and a `(y_coords.len(), x_coords.len())` array.
    ///
    /// # Errors
    /// `DimensionMismatch` if the array shape disagrees with the knots,
    /// `NonMonotonic`/`TooFewPoints` for malformed axes and `NonFinite` for
    /// NaN or infinite samples.
    pub fn new(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        data: Array2<f64>,
    ) -> Result<Self, SplineError> {
        let (ny, nx) = data.dim();
        if nx != x_coords.len() || ny != y_coords.len() {
            return Err(SplineError::DimensionMismatch {
                nx: x_coords.len(),
                ny: y_coords.len(),
                data_len: data.len(),
            });
        }
        validate_knots("x", &x_coords, 2)?;
        validate_knots("y", &y_coords, 2)?;
        if let Some(index) = data.iter().position(|v| !v.is_finite()) {
            return Err(SplineError::NonFinite {
                what: "sample",
                index,
            });
        }

        let mut zx = Array2::zeros((ny, nx));
        for j in 0..ny {
            let row = data.row(j).to_vec();
            let slopes = natural_slopes(&x_coords, &row);
            zx.row_mut(j).assign(&ndarray::Array1::from(slopes));
        }

        let mut zy = Array2::zeros((ny, nx));
        let mut zxy = Array2::zeros((ny, nx));
        for i in 0..nx {
            let column = data.column(i).to_vec();
            let slopes = natural_slopes(&y_coords, &column);
            zy.column_mut(i).assign(&ndarray::Array1::from(slopes));

            let column_x = zx.column(i).to_vec();
            let cross = natural_slopes(&y_coords, &column_x);
            zxy.column_mut(i).assign(&ndarray::Array1::from(cross));
        }

        Ok(Self {
            x_coords,
            y_coords,
            z: data,
            zx,
            zy,
            zxy,
        })
    }

    /// X-axis knots
    pub fn x_coords(&self) -> &[f64] {
        &self.x_coords
    }

    /// Y-axis knots
    pub fn y_coords(&self) -> &[f64] {
        &self.y_coords
    }

    /// Raw samples indexed as [y_index, x_index]
    pub fn data(&self) -> &Array2<f64> {
        &self.z
    }

    /// Domain as `(x_min, x_max, y_min, y_max)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.x_coords[0],
            self.x_coords[self.x_coords.len() - 1],
            self.y_coords[0],
            self.y_coords[self.y_coords.len() - 1],
        )
    }

    /// Find the cell containing `value` along one axis.
    fn locate(
        axis: &'static str,
        coords: &[f64],
        value: f64,
    ) -> Result<(usize, f64, f64), SplineError> {
        let min = coords[0];
        let max = coords[coords.len() - 1];
        if !(value >= min && value <= max) {
            return Err(SplineError::OutOfBounds {
                axis,
                value,
                min,
                max,
            });
        }
        let index = find_segment(coords, value);
        let width = coords[index + 1] - coords[index];
        Ok((index, (value - coords[index]) / width, width))
    }

    fn patch(&self, x: f64, y: f64, order: XOrder) -> Result<f64, SplineError> {
        let (i, t, hx) = Self::locate("x", &self.x_coords, x)?;
        let (j, u, hy) = Self::locate("y", &self.y_coords, y)?;

        let (bx, scale) = match order {
            XOrder::Value => (hermite(t), 1.0),
            XOrder::First => (hermite_d1(t), 1.0 / hx),
            XOrder::Second => (hermite_d2(t), 1.0 / (hx * hx)),
        };
        let by = hermite(u);

        let mut value = 0.0;
        for q in 0..2 {
            for p in 0..2 {
                let (jj, ii) = (j + q, i + p);
                value += self.z[[jj, ii]] * bx[p] * by[q]
                    + hx * self.zx[[jj, ii]] * bx[2 + p] * by[q]
                    + hy * self.zy[[jj, ii]] * bx[p] * by[2 + q]
                    + hx * hy * self.zxy[[jj, ii]] * bx[2 + p] * by[2 + q];
            }
        }
        Ok(value * scale)
    }

    /// Interpolated value at `(x, y)`.
    pub fn evaluate(&self, x: f64, y: f64) -> Result<f64, SplineError> {
        self.patch(x, y, XOrder::Value)
    }

    /// ∂/∂x at `(x, y)`.
    pub fn deriv_x(&self, x: f64, y: f64) -> Result<f64, SplineError> {
        self.patch(x, y, XOrder::First)
    }

    /// ∂²/∂x² at `(x, y)`.
    pub fn deriv_xx(&self, x: f64, y: f64) -> Result<f64, SplineError> {
        self.patch(x, y, XOrder::Second)
    }
}

/// Cubic Hermite basis `[h00, h01, h10, h11]` at `t ∈ [0, 1]`.
fn hermite(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        2.0 * t3 - 3.0 * t2 + 1.0,
        -2.0 * t3 + 3.0 * t2,
        t3 - 2.0 * t2 + t,
        t3 - t2,
    ]
}

fn hermite_d1(t: f64) -> [f64; 4] {
    let t2 = t * t;
    [
        6.0 * t2 - 6.0 * t,
        -6.0 * t2 + 6.0 * t,
        3.0 * t2 - 4.0 * t + 1.0,
        3.0 * t2 - 2.0 * t,
    ]
}

fn hermite_d2(t: f64) -> [f64; 4] {
    [12.0 * t - 6.0, -12.0 * t + 6.0, 6.0 * t - 4.0, 6.0 * t - 2.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect()
    }

    fn sample(x: &[f64], y: &[f64], f: impl Fn(f64, f64) -> f64) -> Array2<f64> {
        Array2::from_shape_fn((y.len(), x.len()), |(j, i)| f(x[i], y[j]))
    }

    #[test]
    fn test_reproduces_knots() {
        let x = grid(8, 0.0, 3.0);
        let y = grid(6, 1.0, 2.0);
        let data = sample(&x, &y, |a, b| (a * b).sin() + b);
        let spline = BicubicSpline::new(x.clone(), y.clone(), data.clone()).unwrap();

        for j in 0..y.len() {
            for i in 0..x.len() {
                assert_relative_eq!(
                    spline.evaluate(x[i], y[j]).unwrap(),
                    data[[j, i]],
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_linear_in_y_is_exact() {
        // Natural splines reproduce linear data exactly along either axis
        let x = grid(20, -2.0, 2.0);
        let y = grid(5, 0.0, 1.0);
        let spline = BicubicSpline::new(x.clone(), y.clone(), sample(&x, &y, |a, b| 3.0 * a + 2.0 * b)).unwrap();

        assert_relative_eq!(spline.evaluate(0.37, 0.61).unwrap(), 3.0 * 0.37 + 2.0 * 0.61, epsilon = 1e-12);
        assert_relative_eq!(spline.deriv_x(0.37, 0.61).unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(spline.deriv_xx(0.37, 0.61).unwrap(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_smooth_surface_and_derivatives() {
        let x = grid(80, 0.0, 4.0);
        let y = grid(12, 0.0, 1.0);
        let spline = BicubicSpline::new(x.clone(), y.clone(), sample(&x, &y, |a, b| a.sin() * (1.0 + b))).unwrap();

        let (xq, yq) = (2.13, 0.47);
        assert_relative_eq!(spline.evaluate(xq, yq).unwrap(), xq.sin() * (1.0 + yq), epsilon = 1e-5);
        assert_relative_eq!(spline.deriv_x(xq, yq).unwrap(), xq.cos() * (1.0 + yq), epsilon = 1e-3);
        assert_relative_eq!(spline.deriv_xx(xq, yq).unwrap(), -xq.sin() * (1.0 + yq), epsilon = 2e-2);
    }

    #[test]
    fn test_row_major_layout() {
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![0.0, 1.0];
        let flat = vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0];
        let data = Array2::from_shape_vec((y.len(), x.len()), flat).unwrap();
        let spline = BicubicSpline::new(x, y, data).unwrap();

        // offset j * nx + i: (i=2, j=1) -> 12
        assert_relative_eq!(spline.evaluate(2.0, 1.0).unwrap(), 12.0, epsilon = 1e-12);
        assert_relative_eq!(spline.evaluate(1.0, 0.0).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = BicubicSpline::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0], Array2::zeros((3, 3)));
        assert!(matches!(result, Err(SplineError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_non_monotonic_axis_rejected() {
        let result = BicubicSpline::new(vec![0.0, 2.0, 1.0], vec![0.0, 1.0], Array2::zeros((2, 3)));
        assert!(matches!(result, Err(SplineError::NonMonotonic { axis: "x", .. })));

        let result = BicubicSpline::new(vec![0.0, 1.0, 2.0], vec![1.0, 1.0], Array2::zeros((2, 3)));
        assert!(matches!(result, Err(SplineError::NonMonotonic { axis: "y", .. })));
    }

    #[test]
    fn test_out_of_bounds() {
        let x = grid(4, 0.0, 1.0);
        let y = grid(4, 0.0, 1.0);
        let spline = BicubicSpline::new(x.clone(), y.clone(), sample(&x, &y, |a, b| a + b)).unwrap();

        match spline.evaluate(1.5, 0.5) {
            Err(SplineError::OutOfBounds { axis, value, min, max }) => {
                assert_eq!(axis, "x");
                assert_eq!(value, 1.5);
                assert_eq!(min, 0.0);
                assert_eq!(max, 1.0);
            }
            other => panic!("Expected OutOfBounds, got {other:?}"),
        }
        assert!(matches!(spline.deriv_x(0.5, -0.1), Err(SplineError::OutOfBounds { axis: "y", .. })));
    }

    #[test]
    fn test_non_finite_sample_rejected() {
        let mut data = Array2::zeros((2, 2));
        data[[1, 0]] = f64::NAN;
        let result = BicubicSpline::new(vec![0.0, 1.0], vec![0.0, 1.0], data);
        assert!(matches!(result, Err(SplineError::NonFinite { index: 2, .. })));
    }
}
