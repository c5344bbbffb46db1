#![allow(clippy::new_without_default)]

pub mod api;
pub mod check;
pub mod errors;
pub mod models;
pub mod resolver;
