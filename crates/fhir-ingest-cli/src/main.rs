use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use fhir_ingest_cli::cli::{Cli, Commands};
use fhir_ingest_cli::config::loader::{load_config, resolve_config_path};
use fhir_ingest_cli::output::{print_error, print_success, render_summary};
use fhir_ingest_cli::{EXIT_CONFIG_ERROR, EXIT_IMPORT_FAILURE, driver, observability};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let cli = Cli::parse();
    let (config_path, source) = resolve_config_path(cli.config.as_deref());

    let mut cfg = match load_config(&config_path, source) {
        Ok(c) => c,
        Err(e) => {
            print_error(&format!("Configuration error: {e}"));
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    tracing::debug!(
        path = %config_path.display(),
        source = %source,
        "Configuration loaded"
    );

    match cli.command {
        Commands::CheckConfig => {
            match toml::to_string_pretty(&cfg.redacted()) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    print_error(&format!("Cannot render configuration: {e}"));
                    return ExitCode::from(EXIT_CONFIG_ERROR);
                }
            }
            print_success(&format!(
                "Configuration OK ({} from {source})",
                config_path.display()
            ));
            ExitCode::SUCCESS
        }
        Commands::Import(args) => {
            if let Err(e) = driver::apply_import_args(&mut cfg, &args) {
                print_error(&format!("Configuration error: {e}"));
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
            observability::apply_logging_level(&cfg.logging.level);

            match driver::run_import(&cfg).await {
                Ok(summary) => {
                    print!("{}", render_summary(&summary));
                    if summary.is_success() {
                        print_success("Import finished");
                        ExitCode::SUCCESS
                    } else {
                        print_error(&format!(
                            "{} file(s) failed",
                            summary.files_failed().to_string().red()
                        ));
                        ExitCode::from(EXIT_IMPORT_FAILURE)
                    }
                }
                Err(e) => {
                    print_error(&format!("Import failed: {e:#}"));
                    ExitCode::from(EXIT_IMPORT_FAILURE)
                }
            }
        }
    }
}
