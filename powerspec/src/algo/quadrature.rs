//! Adaptive Gauss–Kronrod quadrature.
//!
//! Globally adaptive bisection driven by the 7-point Gauss / 15-point
//! Kronrod pair. The interval with the largest error estimate is split until
//! the summed estimate meets the tolerance or the subdivision limit is hit.
//! Hitting the limit is not an error: the best estimate is returned with
//! `converged == false` and the caller decides whether that matters.

/// Kronrod abscissae on [-1, 1], positive half in descending order.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

/// Kronrod weights matching `XGK`.
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_18,
    0.140_653_259_715_525_92,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_83,
];

/// Gauss weights for the odd-indexed Kronrod abscissae (XGK[1], [3], [5], [7]).
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Tolerances and limits for one adaptive integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureOptions {
    /// Absolute error target
    pub epsabs: f64,
    /// Relative error target
    pub epsrel: f64,
    /// Maximum number of subintervals
    pub limit: usize,
}

impl Default for QuadratureOptions {
    fn default() -> Self {
        Self {
            epsabs: 0.0,
            epsrel: 1e-5,
            limit: 1000,
        }
    }
}

/// Outcome of an adaptive integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureResult {
    /// Best estimate of the integral
    pub value: f64,
    /// Estimated absolute error
    pub abs_error: f64,
    /// Number of subintervals used
    pub intervals: usize,
    /// Whether the tolerance was reached
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

/// Apply the 15-point Kronrod rule on `[a, b]`, returning `(value, error)`.
fn kronrod15<E>(
    f: &mut impl FnMut(f64) -> Result<f64, E>,
    a: f64,
    b: f64,
) -> Result<(f64, f64), E> {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);

    let f_center = f(center)?;
    let mut kronrod = f_center * WGK[7];
    let mut gauss = f_center * WG[3];

    for (j, (&x, &w)) in XGK.iter().zip(WGK.iter()).take(7).enumerate() {
        let dx = half * x;
        let pair = f(center - dx)? + f(center + dx)?;
        kronrod += w * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }

    Ok((kronrod * half, ((kronrod - gauss) * half).abs()))
}

/// Integrate `f` over `[a, b]`.
///
/// The first error returned by `f` aborts the integration and is passed
/// through unchanged.
pub fn integrate<E>(
    mut f: impl FnMut(f64) -> Result<f64, E>,
    a: f64,
    b: f64,
    options: &QuadratureOptions,
) -> Result<QuadratureResult, E> {
    let (value, error) = kronrod15(&mut f, a, b)?;
    let mut segments = vec![Segment { a, b, value, error }];

    loop {
        let total: f64 = segments.iter().map(|s| s.value).sum();
        let total_error: f64 = segments.iter().map(|s| s.error).sum();
        let tolerance = options.epsabs.max(options.epsrel * total.abs());

        if total_error <= tolerance {
            return Ok(QuadratureResult {
                value: total,
                abs_error: total_error,
                intervals: segments.len(),
                converged: true,
            });
        }

        let (worst, _) = segments
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, s)| {
                if s.error > best.1 {
                    (i, s.error)
                } else {
                    best
                }
            });
        let segment = segments[worst];
        let mid = 0.5 * (segment.a + segment.b);

        // Stop when the interval can no longer be split in floating point
        let exhausted = segments.len() >= options.limit
            || mid <= segment.a
            || mid >= segment.b
            || !total_error.is_finite();
        if exhausted {
            return Ok(QuadratureResult {
                value: total,
                abs_error: total_error,
                intervals: segments.len(),
                converged: false,
            });
        }

        let (left_value, left_error) = kronrod15(&mut f, segment.a, mid)?;
        let (right_value, right_error) = kronrod15(&mut f, mid, segment.b)?;
        segments[worst] = Segment {
            a: segment.a,
            b: mid,
            value: left_value,
            error: left_error,
        };
        segments.push(Segment {
            a: mid,
            b: segment.b,
            value: right_value,
            error: right_error,
        });
    }
}
