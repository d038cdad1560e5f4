use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fhir_ingest_importer::AbortPolicy;

#[derive(Parser)]
#[command(name = "fhir-ingest")]
#[command(about = "Import directories of FHIR bundles into a relational database")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (overrides FHIR_INGEST_CONFIG and fhir-ingest.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import every bundle file in a directory
    Import(ImportArgs),
    /// Validate and print the effective configuration
    CheckConfig,
}

#[derive(clap::Args, Default)]
pub struct ImportArgs {
    /// Bundle directory (overrides import.data_dir)
    pub dir: Option<PathBuf>,
    /// What a failing file does to the run: whole-run or per-file
    #[arg(long)]
    pub policy: Option<AbortPolicy>,
    /// Import into in-memory tables instead of PostgreSQL
    #[arg(long)]
    pub dry_run: bool,
    /// Bundle file extension (overrides import.extension)
    #[arg(long)]
    pub extension: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let cli = Cli::parse_from([
            "fhir-ingest",
            "import",
            "data/fhir",
            "--policy",
            "per-file",
            "--dry-run",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.dir, Some(PathBuf::from("data/fhir")));
        assert_eq!(args.policy, Some(AbortPolicy::PerFile));
        assert!(args.dry_run);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = Cli::try_parse_from(["fhir-ingest", "import", "--policy", "never"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::parse_from(["fhir-ingest", "check-config"]);
        assert!(matches!(cli.command, Commands::CheckConfig));
        assert_eq!(cli.config, None);
    }
}
