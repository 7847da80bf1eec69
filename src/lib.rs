pub mod aggregate;
pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod exchange;
pub mod indicator;
pub mod input;
pub mod interval;
pub mod model;
pub mod poller;
pub mod service;
pub mod store;
