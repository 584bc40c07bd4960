//! Google search through serper.dev.
//!
//! One tool, three result kinds: web results, images or news. The kind is
//! fixed when the tool is built; the model only supplies the query.

use std::fmt::Write;
use std::str::FromStr;

use async_trait::async_trait;
use parallax_core::RunCancellationToken;
use parallax_core::error::ToolError;
use parallax_core::tool::Tool;
use serde::Deserialize;
use tracing::debug;

use crate::http;

pub const SERPER_BASE_URL: &str = "https://google.serper.dev";
pub const SERPER_API_KEY_ENV: &str = "GOOGLE_SERPER_API_KEY";
pub const NO_RESULTS: &str = "No google serper search results were found";

const DESCRIPTION: &str = "A wrapper around Google Search. \
Useful for when you need to answer questions about current events. \
Always one of the first options when you need to find information on the internet. \
Input should be a search query.";

/// Which serper.dev endpoint to query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchType {
    #[default]
    Search,
    Images,
    News,
}

impl SearchType {
    fn path(self) -> &'static str {
        match self {
            SearchType::Search => "search",
            SearchType::Images => "images",
            SearchType::News => "news",
        }
    }
}

impl FromStr for SearchType {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "search" => Ok(SearchType::Search),
            "images" => Ok(SearchType::Images),
            "news" => Ok(SearchType::News),
            other => Err(ToolError::InvalidInput(format!("unknown serper search type \"{other}\""))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SerperOptions {
    api_key: Option<String>,
    search_type: SearchType,
    base_url: Option<String>,
}

impl SerperOptions {
    /// Use this key instead of `GOOGLE_SERPER_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

pub struct SerperTool {
    api_key: String,
    search_type: SearchType,
    endpoint: String,
    client: reqwest::Client,
}

impl SerperTool {
    pub fn new(options: SerperOptions) -> Result<Self, ToolError> {
        let api_key = http::resolve_api_key(
            options.api_key,
            http::env_key(SERPER_API_KEY_ENV),
            SERPER_API_KEY_ENV,
        )?;
        let base_url = options.base_url.as_deref().unwrap_or(SERPER_BASE_URL);

        Ok(Self {
            api_key,
            search_type: options.search_type,
            endpoint: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                options.search_type.path()
            ),
            client: http::client()?,
        })
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        debug!(query, kind = self.search_type.path(), "Serper search");

        let request = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query }));
        let body = http::fetch_text(request, "google_serper").await?;

        let response: SearchResponse = serde_json::from_str(&body).map_err(|e| {
            ToolError::ExecutionFailed(format!("unexpected google_serper response: {e}"))
        })?;

        let formatted = match self.search_type {
            SearchType::Search => format_organic(&response.organic),
            SearchType::Images => format_images(&response.images),
            SearchType::News => format_news(&response.news),
        };
        if formatted.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        Ok(formatted)
    }
}

fn format_organic(items: &[OrganicItem]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let _ = write!(
            out,
            "(id: {}\ntitle: {}\nlink: {}\nsnippet: {}\ndate: {}\n)",
            i + 1,
            item.title,
            item.link,
            item.snippet,
            item.date,
        );
    }
    out
}

fn format_images(items: &[ImageItem]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let _ = write!(
            out,
            "(id: {}\ntitle: {}\nlink: {}\nimageUrl: {}\nimageWidth: {}\nimageHeight: {}\n\
             thumbnailUrl: {}\n)",
            i + 1,
            item.title,
            item.link,
            item.image_url,
            item.image_width,
            item.image_height,
            item.thumbnail_url,
        );
    }
    out
}

fn format_news(items: &[NewsItem]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let _ = write!(
            out,
            "(id: {}\ntitle: {}\nlink: {}\nsnippet: {}\ndate: {}\nsource: {}\n)",
            i + 1,
            item.title,
            item.link,
            item.snippet,
            item.date,
            item.source,
        );
    }
    out
}

#[async_trait]
impl Tool for SerperTool {
    fn name(&self) -> &str {
        "google_serper"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn call(&self, input: &str, cancel: &RunCancellationToken) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("search query is empty".into()));
        }
        http::cancellable(cancel, self.search(query)).await
    }
}

// --- serper.dev API types (internal) ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    organic: Vec<OrganicItem>,
    images: Vec<ImageItem>,
    news: Vec<NewsItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganicItem {
    title: String,
    link: String,
    snippet: String,
    date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImageItem {
    title: String,
    link: String,
    image_url: String,
    image_width: u32,
    image_height: u32,
    thumbnail_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewsItem {
    title: String,
    link: String,
    snippet: String,
    date: String,
    source: String,
}
