//! Factory Planner
//!
//! Plans production chains for factory-building games: place factories,
//! connect outputs to inputs, and see which inputs are under-supplied.

pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod factory_types;
pub mod graph;
pub mod models;
pub mod remote;
