use tracing::debug;
use vault_migrator::backend::VaultCli;
use vault_migrator::config::Settings;
use vault_migrator::error::Result;
use vault_migrator::import::{self, Importer};

pub fn run(settings: &Settings) -> Result<()> {
    // Template and format errors must surface before the backend is touched.
    let records = import::read_file(&settings.file)?;
    debug!(
        "Parsed {} record(s) from {}",
        records.len(),
        settings.file.display()
    );

    let backend = VaultCli::connect(&settings.vault_addr, settings.vault_token.clone())?;
    Importer::new(&backend, settings.error_policy).import(&records)?;
    Ok(())
}
