pub mod config;
pub mod judge;
pub mod math;
pub mod montecarlo;
pub mod sim;
