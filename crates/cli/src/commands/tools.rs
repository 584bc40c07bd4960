//! `parallax tools`: list the tools the current config enables.

use parallax_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = parallax_tools::registry_from_config(&config.tools);

    if registry.is_empty() {
        println!("No tools enabled. Set BOCHA_API_KEY or QWEATHER_API_KEY, or add keys under [tools] in");
        println!("  {}", AppConfig::config_dir().join("config.toml").display());
        return Ok(());
    }

    let mut tools: Vec<_> = registry.iter().collect();
    tools.sort_by(|a, b| a.name().cmp(b.name()));
    for tool in tools {
        println!("{}", tool.name());
        for line in tool.description().lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}
