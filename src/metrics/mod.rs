pub mod aggregate;
pub mod classifier;
pub mod intake;
pub mod labels;
