//! Power spectrum tables, their extrapolation and the statistics built on them.

pub mod baryons;
pub mod engine;
pub mod extrapolation;
pub mod moments;
pub mod normalize;
pub mod table;

pub use engine::Cosmology;
pub use table::PowerSpectrumTable;
