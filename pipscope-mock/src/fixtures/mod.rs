//! Deterministic price fixtures.

mod bars;
mod raw;

pub use bars::{five_minute_walk, flat_bar, trading_weeks};
pub use raw::{raw_line, write_raw_dataset, write_raw_file};
