mod cli;

use clap::Parser;
use cli::Cli;
use vault_migrator::config::{Mode, Settings};

fn main() {
    let cli = Cli::parse();

    let result = Settings::resolve(cli.into_options(), dirs::home_dir().as_deref()).and_then(
        |settings| {
            cli::init_logging(settings.verbose);
            match settings.mode {
                Mode::Import => cli::import::run(&settings),
                Mode::Export => cli::export::run(&settings),
            }
        },
    );

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
