pub mod catalogue;
pub mod config;
pub mod consts;
pub mod error;
pub mod estimates;
pub mod fitting;
pub mod math;
pub mod model;
pub mod objective;
pub mod observations;
pub mod penalties;
pub mod processes;
pub mod reports;
pub mod runner;
pub mod selectivities;
pub mod threadpool;
