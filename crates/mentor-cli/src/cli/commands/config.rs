//! Configuration commands.

use anyhow::Result;
use mentor_core::config::{Config, paths};

pub fn path() -> Result<()> {
    println!("{}", paths::config_path().display());
    Ok(())
}

pub fn init() -> Result<()> {
    let path = paths::config_path();
    Config::init(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn set_model(model: &str) -> Result<()> {
    Config::save_model(model)?;
    println!("Model set to {model}");
    Ok(())
}
