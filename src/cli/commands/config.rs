//! Config command: print a starting configuration.

use std::path::PathBuf;

use clap::Parser;

use super::super::output::{color, format_error};
use crate::PipelineConfig;

/// Print the default filter configuration as TOML
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Check this config file instead of printing the default
    #[arg(long, value_name = "PATH")]
    pub check: Option<PathBuf>,
}

/// Print the default config, or validate a given one.
pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.check {
        Some(path) => {
            let config = PipelineConfig::from_toml_file(&path)
                .map_err(|e| format_error("Reading config", e))?;
            config
                .validate()
                .map_err(|e| format_error("Checking config", e))?;
            println!("{} Config OK: {}", color("32", "✓"), path.display());
        }
        None => {
            let text = PipelineConfig::default()
                .to_toml_string()
                .map_err(|e| format_error("Rendering config", e))?;
            print!("{}", text);
        }
    }
    Ok(())
}
