//! Condition matching and site ranking engine for clinical trial search.

pub mod api;
pub mod cli;
pub mod config;
pub mod data;
pub mod embed;
pub mod error;
pub mod index;
pub mod logging;
pub mod search;
