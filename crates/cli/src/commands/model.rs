//! Builds the model backend from the `[model]` config section.

use parallax_config::ModelConfig;
use parallax_providers::OpenAiCompatModel;

pub fn build(config: &ModelConfig) -> Result<OpenAiCompatModel, Box<dyn std::error::Error>> {
    let key = config.api_key.clone().unwrap_or_default();
    let needs_key = config.provider != "ollama" && config.provider != "custom";
    if needs_key && key.is_empty() {
        return Err(format!(
            "No API key for provider \"{}\". Set PARALLAX_API_KEY or OPENAI_API_KEY, \
             or add model.api_key to {}",
            config.provider,
            parallax_config::AppConfig::config_dir().join("config.toml").display()
        )
        .into());
    }

    let model = match (config.provider.as_str(), config.base_url.as_deref()) {
        ("ollama", base_url) => OpenAiCompatModel::ollama(base_url, &config.name)?,
        (provider, Some(base_url)) => OpenAiCompatModel::new(provider, base_url, key, &config.name)?,
        ("openrouter", None) => OpenAiCompatModel::openrouter(key, &config.name)?,
        (_, None) => OpenAiCompatModel::openai(key, &config.name)?,
    };

    let model = model.with_temperature(config.temperature);
    Ok(match config.max_tokens {
        Some(max) => model.with_max_tokens(max),
        None => model,
    })
}
