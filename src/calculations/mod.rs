pub mod date_pass;

pub use date_pass::{CalculationError, DatePass};
