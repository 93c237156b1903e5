pub mod app;
pub mod command;
pub mod config;
pub mod detect;
pub mod probe;
pub mod proxy;
pub mod reconcile;
pub mod store;
pub mod ui;
