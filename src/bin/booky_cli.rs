//! Booky CLI - publication database and ticket booklets
//!
//! Commands: config, list, search-keys, search-titles, check-key, preview, build
//! Outputs JSON to stdout
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use booky_core::{
    derive_booklet, render_booklet, BookletDefinition, BookyError, BuildRecord, Configuration,
    KeyAvailability, Publication, PublicationDirectory, CONFIG_FILENAME, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "booky-cli", version)]
#[command(about = "Booky CLI - bookbinding tickets from a validated publication database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Verbose logging to stderr. Repeat for more (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration parameters
    Config,

    /// List keys and titles in the database
    List {
        /// Include every bookbinding field
        #[arg(short = 'L', long)]
        full: bool,
    },

    /// Search publication keys (wildcards * ? [..], case-insensitive)
    SearchKeys { pattern: String },

    /// Search publication titles (wildcards * ? [..], case-insensitive)
    SearchTitles { pattern: String },

    /// Check whether a key is free for a new publication
    CheckKey { key: String },

    /// Derive a booklet and print the computed tickets
    Preview {
        /// Booklet definition file
        booklet: PathBuf,
    },

    /// Derive a booklet and write its LaTeX document
    Build {
        /// Booklet definition file
        booklet: PathBuf,

        /// Directory for the .tex output
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = ENGINE_VERSION, "booky starting");

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            let output = serde_json::json!({
                "success": false,
                "kind": e.kind(),
                "error": e.to_string(),
            });
            println!("{output}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, BookyError> {
    let config = Configuration::load(&cli.config)?;
    tracing::info!(config = %cli.config.display(), "configuration ok");

    let directory = PublicationDirectory::load(&config)?;
    tracing::info!(
        files = config.pub_db_filenames().len(),
        publications = directory.len(),
        "publication database loaded"
    );

    match &cli.command {
        Commands::Config => {
            print_json(&config)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::List { full } => {
            let entries: Vec<_> = directory.iter().collect();
            print_entries(&entries, *full)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::SearchKeys { pattern } => {
            print_entries(&directory.search_keys(pattern), true)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::SearchTitles { pattern } => {
            print_entries(&directory.search_titles(pattern), true)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::CheckKey { key } => {
            let availability = directory.check_key(key);
            print_json(&serde_json::json!({ "key": key, "availability": &availability }))?;
            match availability {
                KeyAvailability::Available => Ok(ExitCode::SUCCESS),
                KeyAvailability::Taken { .. } => Ok(ExitCode::from(2)),
            }
        }

        Commands::Preview { booklet } => {
            let definition = BookletDefinition::load(booklet)?;
            let derived = derive_booklet(&directory, &config, &definition)?;
            tracing::info!(
                pages = derived.pages.len(),
                tickets = derived.ticket_count(),
                "booklet derived"
            );
            print_json(&derived)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Build { booklet, output_dir } => {
            let definition = BookletDefinition::load(booklet)?;
            let derived = derive_booklet(&directory, &config, &definition)?;
            let markup = render_booklet(&derived);
            let output = tex_path(output_dir, &derived.filename);

            fs::write(&output, &markup).map_err(|source| BookyError::Write {
                path: output.display().to_string(),
                source,
            })?;
            tracing::info!(output = %output.display(), "booklet written");

            let record = BuildRecord::new(&directory, &derived, &markup, chrono::Utc::now())?;
            print_json(&serde_json::json!({
                "success": true,
                "output": output.display().to_string(),
                "build": record,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[derive(Serialize)]
struct Entry<'a> {
    key: &'a str,
    title: &'a str,
}

fn print_entries(entries: &[(&str, &Publication)], full: bool) -> Result<(), BookyError> {
    if full {
        let rows: Vec<_> = entries
            .iter()
            .map(|(key, p)| serde_json::json!({ "key": key, "publication": p }))
            .collect();
        print_json(&rows)
    } else {
        let rows: Vec<_> = entries
            .iter()
            .map(|(key, p)| Entry { key, title: &p.title })
            .collect();
        print_json(&rows)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), BookyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Output path for a booklet, with `.tex` added when the name has no extension.
fn tex_path(output_dir: &Path, filename: &str) -> PathBuf {
    let path = output_dir.join(filename);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("tex")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_build_with_output_dir() {
        let cli = Cli::try_parse_from(["booky-cli", "build", "spring.toml", "-o", "out"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILENAME));
        match cli.command {
            Commands::Build { booklet, output_dir } => {
                assert_eq!(booklet, PathBuf::from("spring.toml"));
                assert_eq!(output_dir, PathBuf::from("out"));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn cli_parse_list_full_and_verbosity() {
        let args = ["booky-cli", "-vv", "--config", "alt.toml", "list", "--full"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Commands::List { full: true }));
    }

    #[test]
    fn cli_parse_search_keys() {
        let cli = Cli::try_parse_from(["booky-cli", "search-keys", "NAT*"]).unwrap();
        assert!(matches!(cli.command, Commands::SearchKeys { ref pattern } if pattern == "NAT*"));
    }

    #[test]
    fn tex_extension_added_only_when_missing() {
        assert_eq!(tex_path(Path::new("out"), "spring"), PathBuf::from("out/spring.tex"));
        assert_eq!(tex_path(Path::new("out"), "spring.tex"), PathBuf::from("out/spring.tex"));
    }
}
