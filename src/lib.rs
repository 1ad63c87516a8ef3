pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
