/// Numeric helpers shared by the preprocessing stages and the dashboard.
///
/// Everything here works on plain `f64` slices and ignores non-finite
/// values where noted, so callers can pass columns straight from records.
///
/// Submodules:
/// - `stats`: mean, population standard deviation, percentiles, correlation.

pub mod stats;
