mod discover;
mod progress;
mod settings;
mod wordlist;

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Reconstructs a GraphQL schema from validation error messages when
/// introspection is disabled.
#[derive(Parser, Debug)]
#[command(name = "graphql-oracle")]
#[command(version)]
pub struct Cli {
    /// GraphQL endpoint URL (optional if set in the config file)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Candidate names, one per line
    #[arg(short, long, value_name = "FILE")]
    pub wordlist: Option<PathBuf>,

    /// Query template; FUZZ marks where candidate names are inserted
    #[arg(short, long, value_name = "TEMPLATE")]
    pub document: Option<String>,

    /// Schema from an earlier run to extend (introspection JSON)
    #[arg(short, long, value_name = "FILE")]
    pub input_schema: Option<PathBuf>,

    /// Output file path (writes to stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// HTTP headers to include in every request (can be specified multiple times)
    /// Format: "Header-Name: Header-Value"
    /// These are merged with headers from the config file (CLI takes precedence)
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Candidate names sent per request
    #[arg(long, value_name = "N")]
    pub bucket_size: Option<usize>,

    /// Requests in flight at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of retry attempts on network and server errors
    #[arg(long, value_name = "N")]
    pub retry: Option<u32>,

    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Suppress progress indicators (spinners)
    #[arg(long)]
    pub no_progress: bool,
}

/// Output verbosity options
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub show_progress: bool,
    pub show_info: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(log_level(cli.verbose, cli.quiet));

    let output_opts = OutputOptions {
        show_progress: !cli.quiet && !cli.no_progress,
        show_info: !cli.quiet,
    };

    discover::run(cli, output_opts).await
}

fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins over the `-v` flags. Logs go to stderr so stdout only
/// ever carries the schema.
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, false), "warn");
        assert_eq!(log_level(1, false), "info");
        assert_eq!(log_level(2, false), "debug");
        assert_eq!(log_level(7, false), "trace");
        assert_eq!(log_level(0, true), "error");
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "graphql-oracle",
            "https://example.com/graphql",
            "-w",
            "words.txt",
            "-H",
            "Authorization: Bearer token",
            "-H",
            "X-Trace: 1",
            "--bucket-size",
            "32",
            "-vv",
        ]);

        assert_eq!(cli.url.as_deref(), Some("https://example.com/graphql"));
        assert_eq!(cli.wordlist, Some(PathBuf::from("words.txt")));
        assert_eq!(cli.headers.len(), 2);
        assert_eq!(cli.bucket_size, Some(32));
        assert_eq!(cli.verbose, 2);
        assert!(cli.document.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["graphql-oracle", "-q", "-v"]).is_err());
    }
}
