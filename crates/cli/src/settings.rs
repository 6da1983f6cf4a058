//! Run settings merged from CLI flags, an optional config file and defaults.

use crate::Cli;
use anyhow::{Context, Result};
use graphql_oracle::{validate_template, Config};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file names to search for, in order of preference
const CONFIG_FILES: &[&str] = &[
    "graphql-oracle.yml",
    "graphql-oracle.yaml",
    "graphql-oracle.json",
];

const DEFAULT_DOCUMENT: &str = "query { FUZZ }";

/// Contents of a `graphql-oracle.yml` file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub bucket_size: Option<usize>,
    pub concurrency: Option<usize>,
    /// Request timeout in seconds.
    pub timeout: Option<u64>,
    pub retry: Option<u32>,
    pub document: Option<String>,
    /// Relative paths are resolved against the config file's directory.
    pub wordlist: Option<PathBuf>,
}

/// A config file together with where it was read from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: FileConfig,
}

/// Everything a discovery run needs.
#[derive(Debug)]
pub struct Settings {
    pub config: Config,
    pub document: String,
    pub wordlist: PathBuf,
}

/// Find a config file by walking up the directory tree from `start_dir`.
#[tracing::instrument(fields(start = %start_dir.display()))]
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current_dir = start_dir.to_path_buf();
    loop {
        for file_name in CONFIG_FILES {
            let config_path = current_dir.join(file_name);
            if config_path.is_file() {
                tracing::info!(path = %config_path.display(), "Found config file");
                return Some(config_path);
            }
        }
        if !current_dir.pop() {
            tracing::debug!("No config file found");
            return None;
        }
    }
}

/// Load a config file, detecting the format from its extension.
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

    let config: FileConfig = match extension {
        "yml" | "yaml" => serde_saphyr::from_str(&contents)
            .with_context(|| format!("YAML parse error in {}", path.display()))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("JSON parse error in {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported config format: {}. Expected .yml, .yaml or .json",
            path.display()
        ),
    };
    tracing::debug!(?config, "Config loaded");

    Ok(LoadedConfig {
        path: path.to_path_buf(),
        config,
    })
}

/// Loads the config named by `--config`, or the nearest one above the
/// working directory if there is one.
pub fn discover_config(explicit: Option<&Path>) -> Result<Option<LoadedConfig>> {
    if let Some(path) = explicit {
        return load_config(path).map(Some);
    }
    let current_dir = std::env::current_dir().context("Failed to read current directory")?;
    find_config(&current_dir).map(|path| load_config(&path)).transpose()
}

/// Parses a header string in "Name: Value" format.
pub fn parse_header(header: &str) -> Result<(String, String)> {
    let Some((name, value)) = header.split_once(':') else {
        anyhow::bail!("Invalid header format: '{header}'. Expected 'Header-Name: Header-Value'");
    };
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Header name cannot be empty");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Merges CLI flags over the config file over built-in defaults.
pub fn resolve_settings(cli: &Cli, file: Option<LoadedConfig>) -> Result<Settings> {
    let (file, base_dir) = match file {
        Some(loaded) => {
            let base_dir = loaded.path.parent().map(Path::to_path_buf);
            (loaded.config, base_dir)
        }
        None => (FileConfig::default(), None),
    };

    let url = cli.url.clone().or(file.url).context(
        "No endpoint URL given.\n\n\
        Usage:\n  \
        graphql-oracle <URL> --wordlist <FILE>\n\n\
        or set 'url' in graphql-oracle.yml",
    )?;

    let wordlist = match (&cli.wordlist, file.wordlist) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        },
        (None, None) => anyhow::bail!(
            "No wordlist given. Use --wordlist or set 'wordlist' in the config file"
        ),
    };

    let document = cli
        .document
        .clone()
        .or(file.document)
        .unwrap_or_else(|| DEFAULT_DOCUMENT.to_string());
    validate_template(&document).context("Invalid --document")?;

    let cli_headers = cli
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>>>()
        .context("Failed to parse headers")?;

    let mut config = Config::new(url)
        .with_headers(file.headers.unwrap_or_default())
        .with_headers(cli_headers);
    if let Some(bucket_size) = cli.bucket_size.or(file.bucket_size) {
        config = config.with_bucket_size(bucket_size);
    }
    if let Some(concurrency) = cli.concurrency.or(file.concurrency) {
        config = config.with_concurrency(concurrency);
    }
    if let Some(timeout) = cli.timeout.or(file.timeout) {
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    if let Some(retry) = cli.retry.or(file.retry) {
        config = config.with_retries(retry);
    }
    config.validate().context("Invalid settings")?;

    Ok(Settings {
        config,
        document,
        wordlist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("graphql-oracle").chain(args.iter().copied()))
    }

    fn loaded(config: FileConfig) -> Option<LoadedConfig> {
        Some(LoadedConfig {
            path: PathBuf::from("/project/graphql-oracle.yml"),
            config,
        })
    }

    #[test]
    fn test_parse_header_valid() {
        let (name, value) = parse_header("Authorization: Bearer token").unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Bearer token");
    }

    #[test]
    fn test_parse_header_with_colons_in_value() {
        let (name, value) = parse_header("X-Custom: value:with:colons").unwrap();
        assert_eq!(name, "X-Custom");
        assert_eq!(value, "value:with:colons");
    }

    #[test]
    fn test_parse_header_invalid() {
        assert!(parse_header("InvalidHeader").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_resolve_settings_from_flags() {
        let settings = resolve_settings(
            &cli(&[
                "https://example.com/graphql",
                "-w",
                "words.txt",
                "-H",
                "Authorization: Bearer token",
                "--bucket-size",
                "16",
                "--concurrency",
                "4",
                "--timeout",
                "5",
                "--retry",
                "2",
            ]),
            None,
        )
        .unwrap();

        assert_eq!(settings.config.url, "https://example.com/graphql");
        assert_eq!(settings.wordlist, PathBuf::from("words.txt"));
        assert_eq!(settings.document, DEFAULT_DOCUMENT);
        assert_eq!(settings.config.headers.len(), 1);
        assert_eq!(settings.config.bucket_size, 16);
        assert_eq!(settings.config.concurrency, 4);
        assert_eq!(settings.config.timeout, Duration::from_secs(5));
        assert_eq!(settings.config.retries, 2);
    }

    #[test]
    fn test_resolve_settings_defaults() {
        let settings =
            resolve_settings(&cli(&["https://example.com/graphql", "-w", "w.txt"]), None).unwrap();

        assert_eq!(settings.config.bucket_size, graphql_oracle::DEFAULT_BUCKET_SIZE);
        assert_eq!(settings.config.concurrency, graphql_oracle::DEFAULT_CONCURRENCY);
        assert_eq!(settings.config.retries, 0);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let file = FileConfig {
            url: Some("https://file.example.com/graphql".to_string()),
            headers: Some(BTreeMap::from([
                ("Authorization".to_string(), "Bearer file".to_string()),
                ("X-Team".to_string(), "core".to_string()),
            ])),
            bucket_size: Some(8),
            concurrency: Some(2),
            document: Some("query { viewer { FUZZ } }".to_string()),
            wordlist: Some(PathBuf::from("words.txt")),
            ..FileConfig::default()
        };

        let settings = resolve_settings(
            &cli(&["-H", "authorization: Bearer cli", "--bucket-size", "32"]),
            loaded(file),
        )
        .unwrap();

        assert_eq!(settings.config.url, "https://file.example.com/graphql");
        assert_eq!(settings.config.bucket_size, 32);
        assert_eq!(settings.config.concurrency, 2);
        assert_eq!(settings.document, "query { viewer { FUZZ } }");
        assert_eq!(settings.wordlist, PathBuf::from("/project/words.txt"));
        assert_eq!(
            settings.config.headers,
            vec![
                ("X-Team".to_string(), "core".to_string()),
                ("authorization".to_string(), "Bearer cli".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolve_settings_requires_url() {
        let err = resolve_settings(&cli(&["-w", "words.txt"]), None).unwrap_err();
        assert!(err.to_string().contains("No endpoint URL given"));
    }

    #[test]
    fn test_resolve_settings_requires_wordlist() {
        let err = resolve_settings(&cli(&["https://example.com/graphql"]), None).unwrap_err();
        assert!(err.to_string().contains("No wordlist given"));
    }

    #[test]
    fn test_resolve_settings_rejects_template_without_placeholder() {
        let result = resolve_settings(
            &cli(&["https://example.com/graphql", "-w", "w.txt", "-d", "query { user }"]),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_settings_rejects_zero_bucket_size() {
        let result = resolve_settings(
            &cli(&["https://example.com/graphql", "-w", "w.txt", "--bucket-size", "0"]),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
url: https://api.example.com/graphql
headers:
  Authorization: Bearer token
bucketSize: 128
wordlist: words.txt
"#;
        let mut file = NamedTempFile::with_suffix(".yml").unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file.flush().unwrap();

        let loaded = load_config(file.path()).unwrap();
        assert_eq!(
            loaded.config.url.as_deref(),
            Some("https://api.example.com/graphql")
        );
        assert_eq!(loaded.config.bucket_size, Some(128));
        assert_eq!(loaded.config.headers.unwrap().len(), 1);
    }

    #[test]
    fn test_load_json_config() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(br#"{"url": "https://api.example.com/graphql", "concurrency": 4}"#)
            .unwrap();
        file.flush().unwrap();

        let loaded = load_config(file.path()).unwrap();
        assert_eq!(loaded.config.concurrency, Some(4));
    }

    #[test]
    fn test_load_config_rejects_unknown_keys() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(br#"{"bucket_size": 4}"#).unwrap();
        file.flush().unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".toml").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn test_find_config_walks_up() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("graphql-oracle.yaml");
        std::fs::write(&config_path, "url: https://example.com/graphql\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(config_path));
    }
}
