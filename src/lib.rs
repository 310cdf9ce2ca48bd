pub mod catalog;
pub mod command;
pub mod condition;
pub mod config;
pub mod csv_loader;
pub mod detector;
pub mod events;
pub mod geometry;
pub mod hid;
pub mod keys;
pub mod ledger;
pub mod pipeline;
pub mod types;
