//! Numerical building blocks for the power spectrum tables
//!
//! This module provides natural cubic splines, bicubic splines on
//! rectilinear grids, sampling grids and adaptive quadrature.

pub mod bicubic;
pub mod quadrature;
pub mod spacing;
pub mod spline;

pub use bicubic::BicubicSpline;
pub use quadrature::{integrate, QuadratureOptions, QuadratureResult};
pub use spacing::{linear_spacing, linlog_spacing, log_spacing, points_for_decades};
pub use spline::{CubicSpline, SplineError};
