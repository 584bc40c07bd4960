//! Built-in tools for Parallax.
//!
//! Each tool wraps one HTTP API and answers with a string observation:
//! Bocha web search, Google search through serper.dev, the QWeather 7-day
//! forecast, and the QWeather city lookup that feeds it coordinates.
//!
//! API keys come from the config file or the tool's environment variable.
//! A tool without a key is left out of the registry rather than failing
//! at call time.

pub mod bocha;
mod http;
pub mod qweather;
pub mod serper;

use std::sync::Arc;

use parallax_config::ToolsConfig;
use parallax_core::tool::ToolRegistry;
use tracing::{debug, warn};

pub use bocha::{BochaOptions, BochaTool};
pub use qweather::{GeoOptions, GeoTool, WeatherOptions, WeatherTool};
pub use serper::{SearchType, SerperOptions, SerperTool};

/// Build the registry for a run from the `[tools]` config section.
///
/// Disabled tools are skipped silently; enabled tools that cannot be built
/// (usually a missing API key) are skipped with a warning.
pub fn registry_from_config(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if config.bocha.enabled {
        let mut options = BochaOptions::default().count(config.bocha.count);
        if let Some(key) = &config.bocha.api_key {
            options = options.api_key(key);
        }
        match BochaTool::new(options) {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => warn!(tool = "Bocha", error = %e, "Tool skipped"),
        }
    }

    if config.serper.enabled {
        let built = config
            .serper
            .search_type
            .parse::<SearchType>()
            .and_then(|search_type| {
                let mut options = SerperOptions::default().search_type(search_type);
                if let Some(key) = &config.serper.api_key {
                    options = options.api_key(key);
                }
                SerperTool::new(options)
            });
        match built {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => warn!(tool = "google_serper", error = %e, "Tool skipped"),
        }
    }

    if config.qweather.enabled {
        let qw = &config.qweather;

        let mut weather = WeatherOptions::default().unit(&qw.unit);
        let mut geo = GeoOptions::default().number(qw.geo_number);
        if let Some(key) = &qw.api_key {
            weather = weather.api_key(key);
            geo = geo.api_key(key);
        }
        if let Some(lang) = &qw.lang {
            weather = weather.lang(lang);
            geo = geo.lang(lang);
        }

        match GeoTool::new(geo) {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => warn!(tool = "q-geo", error = %e, "Tool skipped"),
        }
        match WeatherTool::new(weather) {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => warn!(tool = "q-weather", error = %e, "Tool skipped"),
        }
    }

    debug!(tools = %registry.names(), "Tool registry built");
    registry
}
