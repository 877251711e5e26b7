mod stats;
mod tally;

pub use stats::{argmax, mean};
pub use tally::Tally;
