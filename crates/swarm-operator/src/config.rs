//! Operator command line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use swarm_cluster::LoopConfig;
use swarm_common::telemetry::LogFormat;

/// Swarm - Cluster API infrastructure provider for self-pairing nodes
#[derive(Parser, Debug, Clone)]
#[command(name = "swarm-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the CRD manifests and exit
    #[arg(long)]
    pub crd: bool,

    /// Seconds between periodic resyncs of the background loops
    #[arg(long, env = "SWARM_RESYNC_INTERVAL", default_value_t = 60)]
    pub resync_interval: u64,

    /// Seconds a discovery session waits for paired nodes
    #[arg(long, env = "SWARM_DISCOVERY_TIMEOUT", default_value_t = 180)]
    pub discovery_timeout: u64,

    /// Seconds a registration payload stays announced
    #[arg(long, env = "SWARM_REGISTRATION_TIMEOUT", default_value_t = 180)]
    pub registration_timeout: u64,

    /// Namespace to sweep (repeatable); all namespaces when unset
    #[arg(
        long = "watch-namespace",
        env = "SWARM_WATCH_NAMESPACES",
        value_delimiter = ','
    )]
    pub watch_namespaces: Vec<String>,

    /// Exit instead of retrying when namespaces cannot be listed
    #[arg(long, env = "SWARM_FAIL_FAST")]
    pub fail_fast_on_list_error: bool,

    /// Path to the edgevpn binary used for ledger sessions
    #[arg(long, env = "SWARM_EDGEVPN_BINARY", default_value = "edgevpn")]
    pub edgevpn_binary: PathBuf,

    /// Log output format: json or text
    #[arg(long, env = "SWARM_LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Period of both resync schedulers
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_interval.max(1))
    }

    /// Settings for the discovery loop
    pub fn discovery_loop(&self) -> LoopConfig {
        self.loop_config(self.discovery_timeout)
    }

    /// Settings for the registration loop
    pub fn registration_loop(&self) -> LoopConfig {
        self.loop_config(self.registration_timeout)
    }

    fn loop_config(&self, timeout_secs: u64) -> LoopConfig {
        LoopConfig {
            namespaces: self
                .watch_namespaces
                .iter()
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
                .collect(),
            timeout: Duration::from_secs(timeout_secs),
            fail_fast_on_list_error: self.fail_fast_on_list_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["swarm-operator"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(!cli.crd);
        assert_eq!(cli.resync_period(), Duration::from_secs(60));
        assert_eq!(cli.discovery_loop().timeout, Duration::from_secs(180));
        assert!(cli.discovery_loop().namespaces.is_empty());
        assert!(!cli.discovery_loop().fail_fast_on_list_error);
        assert_eq!(cli.edgevpn_binary, PathBuf::from("edgevpn"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_namespaces_repeat_and_split() {
        let cli = parse(&["--watch-namespace", "fleet", "--watch-namespace", "edge,lab"]);
        assert_eq!(cli.registration_loop().namespaces, vec!["fleet", "edge", "lab"]);
    }

    #[test]
    fn test_loop_timeouts_are_independent() {
        let cli = parse(&["--discovery-timeout", "30", "--registration-timeout", "90"]);
        assert_eq!(cli.discovery_loop().timeout, Duration::from_secs(30));
        assert_eq!(cli.registration_loop().timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_fail_fast_and_text_logs() {
        let cli = parse(&["--fail-fast-on-list-error", "--log-format", "text"]);
        assert!(cli.discovery_loop().fail_fast_on_list_error);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        assert_eq!(parse(&["--resync-interval", "0"]).resync_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["swarm-operator", "--log-format", "xml"]).is_err());
    }
}
