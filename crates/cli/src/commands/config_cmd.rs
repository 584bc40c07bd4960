//! `parallax config`: locate, create or validate the config file.

use std::path::Path;

use clap::Subcommand;
use parallax_config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
    /// Load the config (with env overrides) and report problems
    Validate,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_dir().join("config.toml");
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            if init(&path)? {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists, leaving it alone", path.display());
            }
        }
        ConfigAction::Validate => validate()?,
    }
    Ok(())
}

/// Write the default config to `path`. Returns false if the file already exists.
fn init(path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

fn validate() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    println!("Config OK");
    println!("  provider:        {}", config.model.provider);
    println!("  model:           {}", config.model.name);
    println!("  max iterations:  {}", config.agent.max_iterations);
    if !config.has_api_key() && config.model.provider != "ollama" {
        println!("  warning: no model API key (set PARALLAX_API_KEY or OPENAI_API_KEY)");
    }
    for (tool, enabled, key) in [
        ("Bocha", config.tools.bocha.enabled, &config.tools.bocha.api_key),
        ("QWeather", config.tools.qweather.enabled, &config.tools.qweather.api_key),
        ("Google Serper", config.tools.serper.enabled, &config.tools.serper.api_key),
    ] {
        if enabled && key.is_none() {
            println!("  warning: {tool} is enabled but has no API key and will be skipped");
        }
    }
    Ok(())
}
