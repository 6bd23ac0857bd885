pub mod app;
pub mod clients;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod store;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::Services;
pub use config::{cli::LocalStorage, Settings};
pub use core::etl::EtlEngine;
pub use store::JsonStore;
pub use utils::error::{DataError, Result};
