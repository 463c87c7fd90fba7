//! Web access tools.
//!
//! Provides:
//! - `web_search`: search the web with Brave Search API.
//! - `read_url`: fetch URL content and extract readable text.
//!
//! Both tools put their network I/O behind the `search_api` breaker.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::lookup_host;

use crate::error::{BreakwaterError, Result};
use crate::providers::parse_provider_error;
use crate::resilience::CircuitBreaker;
use crate::utils::string::{prefix_chars, truncate_chars};

use super::{Tool, ToolCategory, ToolContext, ToolOutput, MAX_TOOL_ERROR_CHARS};

const BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const WEB_USER_AGENT: &str = "breakwater/0.3 (+https://github.com/breakwater-rs/breakwater)";
const MAX_WEB_SEARCH_COUNT: usize = 10;
const DEFAULT_MAX_FETCH_CHARS: usize = 20_000;
const MAX_FETCH_CHARS: usize = 200_000;
const MIN_FETCH_CHARS: usize = 256;
/// Maximum bytes to read from a response body before truncating.
/// Uses a 4x multiplier over MAX_FETCH_CHARS to account for multi-byte UTF-8.
const MAX_FETCH_BYTES: usize = MAX_FETCH_CHARS * 4;
const SKIP_TAGS: [&str; 4] = ["script", "style", "noscript", "svg"];

/// Web search tool backed by Brave Search.
pub struct WebSearchTool {
    api_key: String,
    client: Client,
    max_results: usize,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

impl WebSearchTool {
    /// Create a new web search tool.
    ///
    /// Fails with a configuration error when the API key is empty.
    pub fn new(api_key: &str, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(BreakwaterError::Config(
                "Brave Search API key is not configured".to_string(),
            ));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            client: Client::new(),
            max_results: 5,
            breaker,
            timeout: Duration::from_secs(15),
        })
    }

    /// Set the default result count.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_WEB_SEARCH_COUNT);
        self
    }

    /// Set the per-request timeout used for the breaker call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<BraveResult>> {
        let response = self
            .client
            .get(BRAVE_API_URL)
            .header("Accept", "application/json")
            .header("User-Agent", WEB_USER_AGENT)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(parse_provider_error(status, detail.trim()).into());
        }

        let payload: BraveResponse = response.json().await?;
        Ok(payload
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(count)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return result titles, URLs, and snippets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results (1-10)",
                    "minimum": 1,
                    "maximum": 10
                }
            },
            "required": ["query"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::NetworkRead
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BreakwaterError::Tool("Missing 'query' parameter".to_string()))?;

        let count = args
            .get("count")
            .and_then(|v| v.as_u64())
            .map(|c| c as usize)
            .unwrap_or(self.max_results)
            .clamp(1, MAX_WEB_SEARCH_COUNT);

        let results = self
            .breaker
            .call(self.timeout, || self.search(query, count))
            .await?;

        Ok(ToolOutput::success(format_results(query, &results)))
    }
}

fn format_results(query: &str, results: &[BraveResult]) -> String {
    if results.is_empty() {
        return format!("No web search results found for '{}'.", query);
    }

    let mut output = format!("Web search results for '{}':\n\n", query);
    for (index, item) in results.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", index + 1, item.title));
        output.push_str(&format!("   {}\n", item.url));
        if let Some(description) = item.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                output.push_str(&format!("   {}\n", description));
            }
        }
        output.push('\n');
    }
    output.trim_end().to_string()
}

/// URL reader: fetches a page and returns its title and readable text.
pub struct ReadUrlTool {
    client: Client,
    max_chars: usize,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

/// What came back from the network, before extraction.
struct Fetched {
    status: u16,
    final_url: Url,
    content_type: String,
    body: String,
}

impl ReadUrlTool {
    /// Create a new URL reader guarded by `breaker`.
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            max_chars: DEFAULT_MAX_FETCH_CHARS,
            breaker,
            timeout: Duration::from_secs(20),
        }
    }

    /// Set the default maximum output size.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.clamp(MIN_FETCH_CHARS, MAX_FETCH_CHARS);
        self
    }

    /// Set the per-request timeout used for the breaker call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch(&self, url: &Url) -> Result<Fetched> {
        // DNS-based SSRF check: a public name may resolve to a private address.
        resolve_and_check_host(url).await?;

        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", WEB_USER_AGENT)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        if is_blocked_host(&final_url) {
            return Err(BreakwaterError::SecurityViolation(format!(
                "Redirect destination is blocked (local or private network): {}",
                final_url
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = read_body_limited(response, MAX_FETCH_BYTES).await?;

        Ok(Fetched {
            status,
            final_url,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Tool for ReadUrlTool {
    fn name(&self) -> &str {
        "read_url"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its title and readable text content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "http/https URL to read"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum output characters",
                    "minimum": MIN_FETCH_CHARS,
                    "maximum": MAX_FETCH_CHARS
                }
            },
            "required": ["url"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::NetworkRead
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BreakwaterError::Tool("Missing 'url' parameter".to_string()))?;

        let parsed = Url::parse(url)
            .map_err(|e| BreakwaterError::Tool(format!("Invalid URL '{}': {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BreakwaterError::Tool(
                "Only http/https URLs are allowed".to_string(),
            ));
        }

        if is_blocked_host(&parsed) {
            return Err(BreakwaterError::SecurityViolation(
                "Blocked URL host (local or private network)".to_string(),
            ));
        }

        let max_chars = args
            .get("max_chars")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(self.max_chars)
            .clamp(MIN_FETCH_CHARS, MAX_FETCH_CHARS);

        let fetched = self
            .breaker
            .call(self.timeout, || self.fetch(&parsed))
            .await?;

        // The dependency answered; a 4xx page is the caller's problem, not an outage.
        if !(200..300).contains(&fetched.status) {
            return Ok(http_status_error(fetched.status, &fetched.final_url));
        }

        let (extractor, title, text) = if fetched.content_type.contains("application/json") {
            ("json", None, fetched.body)
        } else if fetched.content_type.contains("text/html")
            || fetched.body.trim_start().starts_with('<')
        {
            let document = Html::parse_document(&fetched.body);
            ("html", extract_title(&document), extract_text(&document))
        } else {
            ("raw", None, fetched.body)
        };

        let total_chars = text.chars().count();
        let truncated = total_chars > max_chars;
        let text = if truncated {
            prefix_chars(&text, max_chars)
        } else {
            text
        };

        Ok(ToolOutput::success(
            json!({
                "url": url,
                "final_url": fetched.final_url.as_str(),
                "status": fetched.status,
                "extractor": extractor,
                "title": title,
                "truncated": truncated,
                "length": text.chars().count(),
                "text": text,
            })
            .to_string(),
        ))
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let raw: String = document.select(&selector).next()?.text().collect();
    let title = normalize_whitespace(&raw);
    (!title.is_empty()).then_some(title)
}

/// Readable text of `<body>` (or the whole document), skipping script-like subtrees.
fn extract_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());
    let root = body.unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    collect_element_text(root, &mut parts);
    normalize_whitespace(&parts.join(" "))
}

fn collect_element_text(element: ElementRef, parts: &mut Vec<String>) {
    if SKIP_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let t = text.trim();
                if !t.is_empty() {
                    parts.push(t.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_element_text(child_el, parts);
                }
            }
            _ => {}
        }
    }
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read a response body in chunks, enforcing a maximum byte limit.
async fn read_body_limited(mut response: reqwest::Response, max_bytes: usize) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes.saturating_sub(buf.len());
        let take = chunk.len().min(remaining);
        buf.extend_from_slice(&chunk[..take]);
        if buf.len() >= max_bytes {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn is_blocked_host(url: &Url) -> bool {
    let Some(host_str) = url.host_str() else {
        return true;
    };

    let host = host_str.to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
        return true;
    }

    // `Url::host_str()` keeps the brackets around IPv6 literals.
    let ip_str = host
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(&host);
    if let Ok(ip) = ip_str.parse::<IpAddr>() {
        return is_private_or_local_ip(ip);
    }

    false
}

/// Resolve a URL's hostname and reject it if any address is private or local.
async fn resolve_and_check_host(url: &Url) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| BreakwaterError::SecurityViolation("URL has no host".to_string()))?;

    // IP literals are already checked by `is_blocked_host`.
    let bare = host
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(host);
    if bare.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs = lookup_host((host, port)).await?;

    for addr in addrs {
        if is_private_or_local_ip(addr.ip()) {
            return Err(BreakwaterError::SecurityViolation(format!(
                "DNS for '{}' resolved to private/local IP {}",
                host,
                addr.ip()
            )));
        }
    }

    Ok(())
}

fn is_private_or_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => is_private_or_local_ipv4(addr),
        IpAddr::V6(addr) => is_private_or_local_ipv6(addr),
    }
}

fn is_private_or_local_ipv4(addr: Ipv4Addr) -> bool {
    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_documentation()
        || addr.is_unspecified()
        || addr.octets()[0] == 0
}

fn is_private_or_local_ipv6(addr: Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_private_or_local_ipv4(v4);
    }
    let first = addr.segments()[0];

    addr.is_loopback()
        || addr.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || (first & 0xff00) == 0xff00
}

/// Error output for a page that answered with a non-2xx status.
fn http_status_error(status: u16, url: &Url) -> ToolOutput {
    ToolOutput::error(truncate_chars(
        &format!("HTTP {} for {}", status, url),
        MAX_TOOL_ERROR_CHARS,
    ))
}
