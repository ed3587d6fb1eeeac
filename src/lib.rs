pub mod app;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod model;
pub mod player;
pub mod ui;
