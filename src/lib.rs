pub mod auth;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod manifest;
pub mod publish;
pub mod pull;
pub mod reference;
pub mod registry;

pub use error::{Error, ErrorKind, Result};
