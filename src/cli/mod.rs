//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use airq_core::Bounds;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "airq-sampler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a sampling session and print its final snapshot
    Run(RunArgs),
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a JSON configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bounding box as "lat1,lon1,lat2,lon2"
    #[arg(short, long, allow_hyphen_values = true)]
    pub bounds: Option<Bounds>,

    /// Sampling period in minutes
    #[arg(short, long)]
    pub period: Option<u32>,

    /// Rounds per minute
    #[arg(short, long)]
    pub rate: Option<u32>,

    /// Concurrent fetches per round
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// WAQI API token
    #[arg(long, env = "WAQI_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Override the WAQI endpoint
    #[arg(long)]
    pub base_url: Option<String>,

    /// Start without blocking and poll the status instead
    #[arg(long)]
    pub background: bool,

    /// Seconds between status polls in background mode
    #[arg(long, default_value_t = 10, requires = "background")]
    pub poll_secs: u64,

    /// Stop the session after this many seconds (background mode)
    #[arg(long, requires = "background")]
    pub stop_after: Option<u64>,
}

impl Cli {
    /// Dispatch the selected command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => commands::run(args).await,
            Commands::Validate { config } => commands::validate(&config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "airq-sampler",
            "run",
            "--bounds",
            "-34.0,-58.6,-34.8,-58.3",
            "--period",
            "2",
            "--rate",
            "5",
            "--token",
            "abc",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.bounds, Some(Bounds::new(-34.0, -58.6, -34.8, -58.3)));
        assert_eq!(args.period, Some(2));
        assert_eq!(args.rate, Some(5));
        assert_eq!(args.token.as_deref(), Some("abc"));
        assert!(!args.background);
        assert_eq!(args.poll_secs, 10);
    }

    #[test]
    fn test_parse_rejects_bad_bounds() {
        assert!(Cli::try_parse_from(["airq-sampler", "run", "--bounds", "1,2,3"]).is_err());
    }

    #[test]
    fn test_stop_after_requires_background() {
        assert!(Cli::try_parse_from(["airq-sampler", "run", "--stop-after", "5"]).is_err());
        assert!(Cli::try_parse_from([
            "airq-sampler",
            "run",
            "--background",
            "--stop-after",
            "5"
        ])
        .is_ok());
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["airq-sampler", "-v", "validate", "-c", "cfg.json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Validate { .. }));
    }
}
