pub mod parser;
pub mod masking;
pub mod anomaly;
pub mod temporal;
pub mod cluster;
pub mod config;
pub mod report;
