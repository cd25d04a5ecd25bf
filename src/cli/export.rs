use tracing::info;
use vault_migrator::backend::VaultCli;
use vault_migrator::config::Settings;
use vault_migrator::error::Result;
use vault_migrator::export::{self, Exporter};

pub fn run(settings: &Settings) -> Result<()> {
    let backend = VaultCli::connect(&settings.vault_addr, settings.vault_token.clone())?;
    let report = Exporter::new(&backend, settings.error_policy)
        .export(settings.export_paths.as_slice())?;

    // Only reached when the walk succeeded; a failed walk leaves no file behind.
    export::write_file(&settings.file, &report.records)?;
    info!("Wrote {}", settings.file.display());
    Ok(())
}
