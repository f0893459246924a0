//! Web tools: instant-answer search and plain-text page scraping.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::truncate_utf8;
use crate::error::ToolError;
use crate::provider::http::shared_client;
use crate::tools::tool::{FnTool, Tool};
use crate::tools::types::ToolParameters;
use crate::util::timeout::with_timeout;

pub const NO_RESULTS: &str = "No results found.";
const SCRAPE_MAX_BYTES: usize = 32_768;

/// Both web tools. `timeout` bounds each request, body included.
pub fn all_tools(search_base_url: &str, timeout: Duration) -> Vec<Arc<dyn Tool>> {
    vec![search_tool(search_base_url, timeout), scrape_tool(timeout)]
}

/// Create the `web_search` tool backed by a DuckDuckGo-compatible API.
pub fn search_tool(base_url: &str, timeout: Duration) -> Arc<dyn Tool> {
    let base_url = base_url.to_string();
    Arc::new(FnTool::new(
        "web_search",
        "Search the web and return a short abstract for the query",
        ToolParameters::object()
            .string("query", "Search query", true)
            .build(),
        move |args, _ctx| {
            let base_url = base_url.clone();
            async move {
                let query = args.get_str("query")?;
                search(&base_url, query, timeout).await
            }
        },
    ))
}

/// Create the `scrape_page` tool. Output is tag-stripped text, truncated to 32 KB.
pub fn scrape_tool(timeout: Duration) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "scrape_page",
        "Fetch a web page and return its visible text",
        ToolParameters::object()
            .string("url", "Absolute http(s) URL of the page", true)
            .build(),
        move |args, _ctx| async move {
            let url = args.get_str("url")?;
            scrape(url, timeout).await
        },
    ))
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
}

/// Send `request` and read the body, both within `timeout`.
async fn fetch(
    tool: &str,
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<(reqwest::StatusCode, String), ToolError> {
    with_timeout(timeout, async {
        let resp = request.send().await?;
        let status = resp.status();
        Ok((status, resp.text().await?))
    })
    .await
    .map_err(|e| ToolError::execution(tool, e.to_string()))
}

pub async fn search(base_url: &str, query: &str, timeout: Duration) -> Result<String, ToolError> {
    debug!(query, "web_search");
    let request = shared_client()
        .get(base_url)
        .query(&[("q", query), ("format", "json"), ("no_html", "1")]);
    let (status, body) = fetch("web_search", request, timeout).await?;
    if !status.is_success() {
        return Err(ToolError::execution(
            "web_search",
            format!("search service returned {status}"),
        ));
    }

    // Bodies that are not instant answers simply have no abstract.
    let answer = serde_json::from_str::<InstantAnswer>(&body)
        .map(|a| a.abstract_text)
        .unwrap_or_default();

    if answer.trim().is_empty() {
        Ok(NO_RESULTS.to_string())
    } else {
        Ok(answer)
    }
}

pub async fn scrape(url: &str, timeout: Duration) -> Result<String, ToolError> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| ToolError::InvalidArguments(format!("invalid url '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ToolError::InvalidArguments(format!(
            "unsupported url scheme '{}'",
            parsed.scheme()
        )));
    }

    debug!(url = %parsed, "scrape_page");
    let (status, html) = fetch("scrape_page", shared_client().get(parsed), timeout).await?;
    if !status.is_success() {
        return Err(ToolError::execution(
            "scrape_page",
            format!("page returned {status}"),
        ));
    }

    let text = html_to_text(&html);
    Ok(truncate_utf8(&text, SCRAPE_MAX_BYTES).to_string())
}

/// Drop markup and collapse runs of whitespace.
pub fn html_to_text(html: &str) -> String {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let noise = NOISE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let without_noise = noise.replace_all(html, " ");
    let without_tags = tag.replace_all(&without_noise, " ");
    space.replace_all(&without_tags, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_scripts_and_whitespace() {
        let html = "<html><head><style>p{}</style><script>var x = 1;</script></head>\
                    <body><h1>Title</h1>\n\n<p>Some   <b>bold</b> text</p></body></html>";
        assert_eq!(html_to_text(html), "Title Some bold text");
    }

    #[tokio::test]
    async fn scrape_rejects_non_http_urls() {
        let timeout = Duration::from_secs(1);
        let err = scrape("file:///etc/passwd", timeout).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref d) if d.contains("scheme")));
        let err = scrape("not a url", timeout).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
