pub mod export;
pub mod import;

use std::io::IsTerminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vault_migrator::config::{Options, DEFAULT_EXPORT_PATH, DEFAULT_FILE, DEFAULT_VAULT_ADDR};

#[derive(Parser)]
#[command(
    name = "vault-migrator",
    version,
    about = "Import secrets into Vault from a YAML file, or export them to one"
)]
pub struct Cli {
    /// File to import from / export to
    #[arg(short, long, default_value = DEFAULT_FILE)]
    pub file: String,

    /// Enable importing data into Vault
    #[arg(long)]
    pub import: bool,

    /// Enable exporting data from Vault
    #[arg(long)]
    pub export: bool,

    /// Which paths to export (comma separated or repeated)
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_EXPORT_PATH)]
    pub export_paths: Vec<String>,

    /// Do not exit on read/write errors
    #[arg(long)]
    pub ignore_errors: bool,

    /// Vault API address
    #[arg(long, env = "VAULT_ADDR", default_value = DEFAULT_VAULT_ADDR)]
    pub vault_addr: String,

    /// Vault token (defaults to ~/.vault-token)
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,

    /// Print verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_options(self) -> Options {
        Options {
            file: self.file,
            import: self.import,
            export: self.export,
            export_paths: self.export_paths,
            ignore_errors: self.ignore_errors,
            vault_addr: self.vault_addr,
            vault_token: self.vault_token,
            verbose: self.verbose,
        }
    }
}

/// Log to stderr at `info`, or `debug` with `--verbose`. `RUST_LOG` wins.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}
