//! City lookup: turns "Province/City" into coordinates for the forecast tool.

use async_trait::async_trait;
use parallax_core::RunCancellationToken;
use parallax_core::error::ToolError;
use parallax_core::tool::Tool;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{API_KEY_HEADER, QWEATHER_API_KEY_ENV, check_envelope};
use crate::http;

pub const GEO_BASE_URL: &str = "https://geoapi.qweather.com";
pub const NO_RESULTS: &str = "No q-geo search results were found";

const MAX_NUMBER: u32 = 10;
const DEFAULT_NUMBER: u32 = 5;

const DESCRIPTION: &str = "Use the q-geo API to look up a Chinese city and get its longitude and latitude. \
Input must be \"Province/City\", for example \"Guangdong/Shenzhen\". \
Returns a JSON list of matching locations with name, id, lat, lon, adm2, adm1, country and tz.";

#[derive(Debug, Clone, Default)]
pub struct GeoOptions {
    api_key: Option<String>,
    number: Option<u32>,
    lang: Option<String>,
    base_url: Option<String>,
}

impl GeoOptions {
    /// Use this key instead of `QWEATHER_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Matches per lookup. Zero means the default of 5; anything above 10 is capped.
    pub fn number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

pub struct GeoTool {
    api_key: String,
    number: u32,
    lang: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl GeoTool {
    pub fn new(options: GeoOptions) -> Result<Self, ToolError> {
        let api_key = http::resolve_api_key(
            options.api_key,
            http::env_key(QWEATHER_API_KEY_ENV),
            QWEATHER_API_KEY_ENV,
        )?;
        let number = match options.number.unwrap_or(DEFAULT_NUMBER) {
            0 => DEFAULT_NUMBER,
            n => n.min(MAX_NUMBER),
        };
        let base_url = options.base_url.as_deref().unwrap_or(GEO_BASE_URL);

        Ok(Self {
            api_key,
            number,
            lang: options.lang.filter(|l| !l.is_empty()),
            endpoint: format!("{}/v2/city/lookup", base_url.trim_end_matches('/')),
            client: http::client()?,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    async fn lookup(&self, province: &str, city: &str) -> Result<String, ToolError> {
        debug!(province, city, "q-geo lookup");

        let number = self.number.to_string();
        let mut query = vec![
            ("location", city),
            ("adm", province),
            ("range", "cn"),
            ("number", number.as_str()),
        ];
        if let Some(lang) = &self.lang {
            query.push(("lang", lang.as_str()));
        }

        let request = self
            .client
            .get(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&query);
        let body = http::fetch_text(request, "q-geo").await?;
        check_envelope("q-geo", &body)?;

        let response: LookupResponse = serde_json::from_str(&body)
            .map_err(|e| ToolError::ExecutionFailed(format!("unexpected q-geo response: {e}")))?;

        let locations = response.location.unwrap_or_default();
        if locations.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        serde_json::to_string(&locations).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

/// Split "Province/City" into its two non-empty parts.
fn split_location(input: &str) -> Result<(&str, &str), ToolError> {
    let parts: Vec<&str> = input.trim().split('/').map(str::trim).collect();
    match parts.as_slice() {
        [province, city] if !province.is_empty() && !city.is_empty() => Ok((*province, *city)),
        _ => Err(ToolError::InvalidInput(format!(
            "expected \"Province/City\", got {input:?}"
        ))),
    }
}

#[async_trait]
impl Tool for GeoTool {
    fn name(&self) -> &str {
        "q-geo"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn call(&self, input: &str, cancel: &RunCancellationToken) -> Result<String, ToolError> {
        let (province, city) = split_location(input)?;
        http::cancellable(cancel, self.lookup(province, city)).await
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    location: Option<Vec<Location>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Location {
    name: String,
    id: String,
    lat: String,
    lon: String,
    adm2: String,
    adm1: String,
    country: String,
    tz: String,
}
