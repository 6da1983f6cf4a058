//! The discovery run behind the `graphql-oracle` command.

use crate::settings::{discover_config, resolve_settings};
use crate::{Cli, OutputOptions};
use anyhow::{Context, Result};
use colored::Colorize;
use graphql_oracle::{discover_type, HttpExecutor, Prober, Schema};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Reads a schema emitted by an earlier run.
fn load_seed(path: &Path) -> Result<Schema> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input schema {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Input schema {} is not JSON", path.display()))?;
    Schema::from_json(&value)
        .with_context(|| format!("Failed to load input schema {}", path.display()))
}

fn write_schema(schema: &Schema, output: Option<&Path>) -> Result<()> {
    let content = serde_json::to_string_pretty(&schema.to_introspection())
        .context("Failed to serialize schema")?;

    if let Some(path) = output {
        std::fs::write(path, &content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").context("Failed to write to stdout")?;
    }
    Ok(())
}

fn count_fields(schema: &Schema) -> usize {
    schema.types().map(|ty| ty.fields.len()).sum()
}

/// Runs one discovery and writes the schema.
///
/// When a fatal error interrupts discovery, whatever was learned before it
/// is still written out, then the error is returned.
#[tracing::instrument(skip_all)]
pub async fn run(cli: Cli, output_opts: OutputOptions) -> Result<()> {
    let start_time = Instant::now();

    let file_config = discover_config(cli.config.as_deref())?;
    let settings = resolve_settings(&cli, file_config)?;
    let wordlist = crate::wordlist::load_wordlist(&settings.wordlist)?;
    let seed = cli.input_schema.as_deref().map(load_seed).transpose()?;

    let url = settings.config.url.clone();
    let executor = HttpExecutor::new(&settings.config).context("Failed to create HTTP client")?;
    let prober = Prober::new(executor, settings.config).context("Invalid settings")?;

    // The spinner would interleave with a schema printed to stdout.
    let spinner = crate::progress::spinner(
        &format!("Probing {url}..."),
        output_opts.show_progress && cli.output.is_some(),
    );

    let mut schema = match seed {
        Some(seed) => seed,
        None => Schema::new(
            prober
                .probe_root_typenames()
                .await
                .with_context(|| format!("Failed to reach {url}"))?,
        ),
    };

    spinner.set_message(format!("Probing {} with {} words...", settings.document, wordlist.len()));
    let outcome = discover_type(&prober, &mut schema, &wordlist, &settings.document).await;
    spinner.finish_and_clear();

    write_schema(&schema, cli.output.as_deref())?;
    let typename =
        outcome.with_context(|| format!("Discovery against {url} stopped early"))?;

    if output_opts.show_info {
        if let Some(path) = &cli.output {
            println!(
                "{} Probed {} and wrote {} types, {} fields to {}",
                "✓".green(),
                typename.bold(),
                schema.types().count(),
                count_fields(&schema),
                path.display().to_string().cyan()
            );
            println!("  {} {:.2}s", "⏱".dimmed(), start_time.elapsed().as_secs_f64());
        }
    }

    Ok(())
}
