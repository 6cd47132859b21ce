//! `gwmon` binary entry point.

use clap::Parser;

use gateway_monitor::cli_app::{self, Cli};
use gateway_monitor::logger::init_logging;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.log_config()) {
        eprintln!("gwmon: failed to initialize logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = cli_app::run(&cli) {
        eprintln!("gwmon: {err}");
        std::process::exit(1);
    }
}
