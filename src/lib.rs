pub mod cli;
pub mod config;
pub mod error;
pub mod forecast;
pub mod market_data;
pub mod model;
pub mod service;
pub mod tracker;
