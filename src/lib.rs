pub mod app;
pub mod calc;
pub mod compare;
pub mod config;
pub mod domain;
pub mod error;
pub mod label;
pub mod ops;
pub mod output;
pub mod quality;
pub mod snapshot;
pub mod verify;
