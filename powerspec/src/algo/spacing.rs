//! Sampling grids for spline tables.
//!
//! All functions return `None` for degenerate requests (too few points,
//! non-positive bounds for logarithmic spacing, or reversed bounds) and pin
//! the end points exactly to the requested bounds.

/// `n` points spaced uniformly between `min` and `max` inclusive.
pub fn linear_spacing(min: f64, max: f64, n: usize) -> Option<Vec<f64>> {
    if n < 2 || !(min < max) {
        return None;
    }
    let step = (max - min) / (n - 1) as f64;
    let mut points: Vec<f64> = (0..n).map(|i| min + step * i as f64).collect();
    points[n - 1] = max;
    Some(points)
}

/// `n` points spaced uniformly in `ln x` between `min` and `max` inclusive.
pub fn log_spacing(min: f64, max: f64, n: usize) -> Option<Vec<f64>> {
    if n < 2 || !(min > 0.0 && min < max) {
        return None;
    }
    let (ln_min, ln_max) = (min.ln(), max.ln());
    let step = (ln_max - ln_min) / (n - 1) as f64;
    let mut points: Vec<f64> = (0..n).map(|i| (ln_min + step * i as f64).exp()).collect();
    points[0] = min;
    points[n - 1] = max;
    Some(points)
}

/// Logarithmic segment `[log_min, lin_min)` with `n_log` points followed by a
/// linear segment `[lin_min, max]` with `n_lin` points.
///
/// The shared boundary `lin_min` appears once, giving `n_log + n_lin - 1`
/// points in total.
pub fn linlog_spacing(
    log_min: f64,
    lin_min: f64,
    max: f64,
    n_log: usize,
    n_lin: usize,
) -> Option<Vec<f64>> {
    if !(log_min > 0.0 && log_min < lin_min) {
        return None;
    }
    let log_part = log_spacing(log_min, lin_min, n_log)?;
    let lin_part = linear_spacing(lin_min, max, n_lin)?;

    let mut points = Vec::with_capacity(n_log + n_lin - 1);
    points.extend_from_slice(&log_part[..n_log - 1]);
    points.extend(lin_part);
    Some(points)
}

/// Number of points needed to cover `[min, max]` at `per_decade` density.
pub fn points_for_decades(min: f64, max: f64, per_decade: usize) -> usize {
    let decades = max.log10() - min.log10();
    (decades * per_decade as f64).ceil() as usize
}
