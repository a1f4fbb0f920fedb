pub mod config;
pub mod controller;
pub mod error;
pub mod fixed;
pub mod logging;
pub mod output;
pub mod replay;
pub mod sweep;
pub mod synthetic;
