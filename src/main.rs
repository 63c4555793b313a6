use log::debug;

mod shell;
mod utils;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    debug!("configuration loaded from {}", config.config_dir.display());

    let mut shell = Shell::new(&config)?;
    shell.run()
}
