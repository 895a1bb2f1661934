//! Command-line argument parsing for the `tickstats` binary

use crate::config::Config;
use crate::types::{ConfigPath, HostName, Port, ThreadCount, TickInterval};
use clap::Parser;
use std::path::PathBuf;

/// Parse port from command line argument
fn parse_port(s: &str) -> Result<Port, String> {
    let port: u16 = s
        .trim()
        .parse()
        .map_err(|e| format!("Invalid port number: {}", e))?;
    Port::try_from(port).map_err(|e| format!("Invalid port: {}", e))
}

/// Replay a timestamped event feed and stream inter-arrival statistics to a
/// WebSocket subscriber
#[derive(Parser, Debug, Clone)]
#[command(name = "tickstats", version, about)]
pub struct Args {
    /// Event feed file (overrides feed.path in the config file)
    #[arg(env = "TICKSTATS_FEED")]
    pub feed: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "tickstats.toml", env = "TICKSTATS_CONFIG")]
    pub config: ConfigPath,

    /// Host to bind the subscriber listener to (overrides config file)
    #[arg(long, env = "TICKSTATS_HOST")]
    pub host: Option<HostName>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "TICKSTATS_PORT", value_parser = parse_port)]
    pub port: Option<Port>,

    /// Pacing tick in milliseconds (overrides config file)
    #[arg(long, env = "TICKSTATS_TICK_MS")]
    pub tick_ms: Option<TickInterval>,

    /// Start replaying immediately instead of waiting for a subscriber
    #[arg(long)]
    pub no_wait: bool,

    /// Number of worker threads (default: 1)
    #[arg(short, long, env = "TICKSTATS_THREADS")]
    pub threads: Option<ThreadCount>,

    /// Write the default configuration to --config and exit
    #[arg(long)]
    pub write_default_config: bool,

    /// Also write logs to this file
    #[arg(long, env = "TICKSTATS_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Stop once the feed is exhausted and everything has been published
    #[arg(long)]
    pub exit_after_feed: bool,
}

impl Args {
    /// Feed path from args, falling back to the config file
    #[must_use]
    pub fn feed_path(&self, config: &Config) -> Option<PathBuf> {
        self.feed.clone().or_else(|| config.feed.path.clone())
    }

    /// Fold command-line overrides into `config`
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(tick) = self.tick_ms {
            config.pipeline.tick_ms = tick;
        }
        if let Some(threads) = self.threads {
            config.server.threads = threads;
        }
        if self.no_wait {
            config.pipeline.start_on_subscribe = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tickstats").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.config.as_str(), "tickstats.toml");
        assert!(args.port.is_none());
        assert!(!args.no_wait);
        assert!(!args.exit_after_feed);
    }

    #[test]
    fn test_feed_positional() {
        let args = parse(&["data.csv"]);
        assert_eq!(args.feed, Some(PathBuf::from("data.csv")));
    }

    #[test]
    fn test_feed_falls_back_to_config() {
        let args = parse(&[]);
        let mut config = Config::default();
        config.feed.path = Some(PathBuf::from("from_config.csv"));
        assert_eq!(args.feed_path(&config), Some(PathBuf::from("from_config.csv")));

        let args = parse(&["cli.csv"]);
        assert_eq!(args.feed_path(&config), Some(PathBuf::from("cli.csv")));
    }

    #[test]
    fn test_zero_port_rejected() {
        let result = Args::try_parse_from(["tickstats", "--port", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_tick_rejected() {
        let result = Args::try_parse_from(["tickstats", "--tick-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let args = parse(&["--host", "0.0.0.0", "-p", "9001", "--tick-ms", "2", "--no-wait"]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.server.host.as_str(), "0.0.0.0");
        assert_eq!(config.server.port.get(), 9001);
        assert_eq!(config.pipeline.tick_ms.get(), 2);
        assert!(!config.pipeline.start_on_subscribe);
    }

    #[test]
    fn test_apply_without_overrides_keeps_config() {
        let args = parse(&[]);
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config, Config::default());
    }
}
