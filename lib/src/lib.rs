#![allow(clippy::new_without_default)]

pub mod config;
pub mod policy;
pub mod roles;

pub mod errors {
    pub type Error = anyhow::Error;
    pub type Result<T> = std::result::Result<T, anyhow::Error>;
}
