//! News tools: get_aws_news_articles and lookup_aws_news_article_details

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use newsdesk_config::NewsConfig;
use newsdesk_provider::{ParamType, ToolDescriptor};

use super::ToolTrait;

const USER_AGENT: &str = concat!("newsdesk/", env!("CARGO_PKG_VERSION"));

type ToolResult = Result<Value, Box<dyn std::error::Error + Send + Sync>>;

fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing '{}'", name))
}

/// Searches the news API for announcements about a topic
pub struct NewsArticlesTool {
    client: reqwest::Client,
    api_base: String,
    page_size: u32,
}

impl NewsArticlesTool {
    pub fn new(api_base: impl Into<String>, page_size: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            page_size,
        }
    }

    pub fn from_config(config: &NewsConfig) -> Self {
        Self::new(config.api_base.clone(), config.page_size)
    }
}

#[async_trait]
impl ToolTrait for NewsArticlesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_aws_news_articles",
            "Returns a list of AWS news articles announcing new products, services and \
             capabilities for the given AWS topic or service. Each article has an id, url, \
             title and published_date.",
        )
        .required(
            "topic",
            ParamType::String,
            "AWS topic or service to search for, for example \"load balancer\"",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> ToolResult {
        let topic = string_arg(&args, "topic")?;
        debug!("News search: {}", topic);

        let response = self
            .client
            .get(format!("{}/articles", self.api_base))
            .query(&[
                ("page_size", self.page_size.to_string().as_str()),
                ("article_type", "news"),
                ("search", topic),
            ])
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("news API returned {}", status).into());
        }

        let mut data: Value = response.json().await?;
        match data.get_mut("articles").map(Value::take) {
            Some(articles @ Value::Array(_)) => Ok(articles),
            _ => Err("news API response has no 'articles' list".into()),
        }
    }
}

/// Fetches an article page and returns its readable text
pub struct ArticleDetailsTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl ArticleDetailsTool {
    pub fn new(max_chars: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_chars,
        }
    }

    pub fn from_config(config: &NewsConfig) -> Self {
        Self::new(config.max_chars)
    }
}

#[async_trait]
impl ToolTrait for ArticleDetailsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "lookup_aws_news_article_details",
            "Fetches an AWS news article from its url and returns the article text.",
        )
        .required("url", ParamType::String, "Article url as returned by get_aws_news_articles")
    }

    async fn execute(&self, args: Map<String, Value>) -> ToolResult {
        let url = string_arg(&args, "url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("'{}' is not an http(s) url", url).into());
        }
        debug!("Fetching article: {}", url);

        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("article fetch returned {}", status).into());
        }

        let html = response.text().await?;
        let text = strip_tags(&html)?;
        Ok(Value::String(truncate_chars(&text, self.max_chars)))
    }
}

/// Drop scripts, styles and markup, then collapse blank runs
pub fn strip_tags(html: &str) -> Result<String, regex::Error> {
    let blocks = Regex::new(r"(?is)<script[\s\S]*?</script>|<style[\s\S]*?</style>")?;
    let text = blocks.replace_all(html, "");
    let tags = Regex::new(r"<[^>]+>")?;
    let text = tags.replace_all(&text, " ");
    let spaces = Regex::new(r"[ \t\r\f]+")?;
    let text = spaces.replace_all(&text, " ");
    let lines = Regex::new(r"\s*\n\s*(\n\s*)+")?;
    let text = lines.replace_all(&text, "\n\n");
    Ok(decode_html_entities(text.trim()))
}

fn decode_html_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Keep at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_removes_scripts_and_markup() {
        let html = "<html><head><style>p{}</style><script>alert(1)</script></head>\
                    <body><h1>Launch</h1><p>S3 &amp; more</p></body></html>";
        let text = strip_tags(html).unwrap();
        assert!(!text.contains("alert"));
        assert!(!text.contains('<'));
        assert!(text.contains("Launch"));
        assert!(text.contains("S3 & more"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let tool = NewsArticlesTool::new("http://localhost:1/", 5);
        assert_eq!(tool.api_base, "http://localhost:1");
    }
}
