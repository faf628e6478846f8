// Report text markers.
pub const LIST_START: &str = "{L}";
pub const LIST_END: &str = "{E}";
pub const TABULAR_DATA: &str = "{d}";
pub const REPORT_END: &str = "*end";

/// Threshold below which `zero_fun` substitutes a smooth positive value.
pub const ZERO_FUN_DELTA: f64 = 1e-11;

pub const DEFAULT_U_MAX: f64 = 0.99;
pub const DEFAULT_SEED: u64 = 123;
