pub mod results;
pub mod stats;
