#[macro_use]
extern crate log;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod shelf;
