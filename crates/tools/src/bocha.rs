//! Bocha web search.
//!
//! Input is a plain search query. The observation lists each result page as
//! a small block with its title, URL, summary, site and crawl date.

use async_trait::async_trait;
use parallax_core::RunCancellationToken;
use parallax_core::error::ToolError;
use parallax_core::tool::Tool;
use serde::Deserialize;
use std::fmt::Write;
use tracing::debug;

use crate::http;

pub const BOCHA_BASE_URL: &str = "https://api.bochaai.com";
pub const BOCHA_API_KEY_ENV: &str = "BOCHA_API_KEY";
pub const NO_RESULTS: &str = "No Bocha search results were found";

const MAX_COUNT: u32 = 10;
const DEFAULT_COUNT: u32 = 5;

#[derive(Debug, Clone, Default)]
pub struct BochaOptions {
    api_key: Option<String>,
    count: Option<u32>,
    base_url: Option<String>,
}

impl BochaOptions {
    /// Use this key instead of `BOCHA_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Results per search. Zero means the default of 5; anything above 10 is capped.
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

pub struct BochaTool {
    api_key: String,
    count: u32,
    endpoint: String,
    client: reqwest::Client,
}

impl BochaTool {
    pub fn new(options: BochaOptions) -> Result<Self, ToolError> {
        let api_key =
            http::resolve_api_key(options.api_key, http::env_key(BOCHA_API_KEY_ENV), BOCHA_API_KEY_ENV)?;
        let count = match options.count.unwrap_or(DEFAULT_COUNT) {
            0 => DEFAULT_COUNT,
            n => n.min(MAX_COUNT),
        };
        let base_url = options.base_url.as_deref().unwrap_or(BOCHA_BASE_URL);

        Ok(Self {
            api_key,
            count,
            endpoint: format!("{}/v1/web-search", base_url.trim_end_matches('/')),
            client: http::client()?,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        debug!(query, count = self.count, "Bocha search");

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "query": query,
                "freshness": "noLimit",
                "summary": true,
                "count": self.count,
            }));
        let body = http::fetch_text(request, "Bocha").await?;

        let response: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| ToolError::ExecutionFailed(format!("unexpected Bocha response: {e}")))?;

        if response.code != 200 {
            return Err(ToolError::Api {
                status: u16::try_from(response.code).unwrap_or(0),
                message: response.msg.unwrap_or_else(|| body.clone()),
            });
        }

        let pages = response
            .data
            .map(|d| d.web_pages.value)
            .unwrap_or_default();
        if pages.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        Ok(format_pages(&pages))
    }
}

fn format_pages(pages: &[WebPage]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        let _ = write!(
            out,
            "(id: {}\ntitle: {}\nUrl: {}\nSummary: {}\nSiteName: {}\nDateLastCrawled: {}\n)",
            i + 1,
            page.name,
            page.url,
            page.summary,
            page.site_name,
            page.date_last_crawled,
        );
    }
    out
}

#[async_trait]
impl Tool for BochaTool {
    fn name(&self) -> &str {
        "Bocha"
    }

    fn description(&self) -> &str {
        "Search the web with the Bocha Web Search API. Input is a search query string. \
         Returns the matching pages with title, URL, summary, site name and crawl date."
    }

    async fn call(&self, input: &str, cancel: &RunCancellationToken) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("search query is empty".into()));
        }
        http::cancellable(cancel, self.search(query)).await
    }
}

// --- Bocha API types (internal) ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "webPages", default)]
    web_pages: WebPages,
}

#[derive(Debug, Default, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    site_name: String,
    #[serde(default)]
    date_last_crawled: String,
}
