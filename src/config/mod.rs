pub mod cli;
pub mod settings;

pub use settings::{Settings, WordPressSite};

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "diamond-data")]
#[command(about = "Jewellery directory builder: Google Places discovery, enrichment and GeoDirectory publishing")]
pub struct CliConfig {
    /// Path to a TOML settings file
    #[arg(long, global = true, env = "DIAMOND_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    /// Process at most this many clusters / listings per stage
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the HTTP application
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import postcodes from a CSV file
    ImportPostcodes { file: PathBuf },
    /// Group postcodes into search clusters
    Cluster {
        #[arg(long)]
        radius_km: Option<f64>,
    },
    /// Discover jewellers around each due cluster
    Scrape,
    /// Generate listing copy from jeweller websites
    Enrich,
    /// Capture homepage screenshots and upload them to WordPress
    Screenshot,
    /// Create GeoDirectory places for finished listings
    Publish,
    /// Run scrape, enrich, screenshot and publish in order
    Pipeline,
    /// Build gd_upload.csv from exported CSV files
    Directory {
        #[arg(long)]
        input_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Settings file + env, then command line overrides.
    pub fn settings(&self) -> crate::utils::error::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;

        if let Some(limit) = self.limit {
            settings.testing_limit = Some(limit);
        }

        match &self.command {
            Command::Serve { host, port } => {
                if let Some(host) = host {
                    settings.server.host = host.clone();
                }
                if let Some(port) = port {
                    settings.server.port = *port;
                }
            }
            Command::Cluster { radius_km: Some(radius) } => {
                settings.cluster.radius_km = *radius;
            }
            Command::Directory {
                input_dir,
                output_dir,
            } => {
                if let Some(dir) = input_dir {
                    settings.directory.input_dir = dir.display().to_string();
                }
                if let Some(dir) = output_dir {
                    settings.directory.output_dir = dir.display().to_string();
                }
            }
            _ => {}
        }

        Ok(settings)
    }
}
