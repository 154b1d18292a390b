//! Web capabilities: search, page fetch, and opening URLs
//!
//! These run on the dispatcher's blocking thread, so the HTTP calls use the
//! blocking reqwest client built per call (never on an async worker).

use std::time::Duration;

/// Per-request timeout for web tools
const WEB_TIMEOUT: Duration = Duration::from_secs(15);

/// How many search results to fold into a reply
const SEARCH_RESULTS: usize = 6;

/// Character cap for fetched page text
const PAGE_CHAR_LIMIT: usize = 4_000;

type ToolOutput = Result<String, String>;

fn blocking_client() -> Result<reqwest::blocking::Client, String> {
    reqwest::blocking::Client::builder()
        .timeout(WEB_TIMEOUT)
        .user_agent("Mozilla/5.0 (compatible; vesper-assistant)")
        .build()
        .map_err(|e| format!("cannot build HTTP client: {e}"))
}

/// Search the web via the DuckDuckGo HTML endpoint
pub fn web_search(query: &str) -> ToolOutput {
    let url = format!(
        "https://html.duckduckgo.com/html/?q={}",
        urlencoding::encode(query)
    );

    let body = blocking_client()?
        .get(&url)
        .send()
        .and_then(reqwest::blocking::Response::text)
        .map_err(|e| format!("search failed: {e}"))?;

    let results = parse_search_results(&body);
    if results.is_empty() {
        return Ok(format!("No results found for '{query}'"));
    }

    let mut out = format!("Search results for '{query}':\n");
    for (i, (title, snippet)) in results.iter().enumerate() {
        out.push_str(&format!("{}. {title}\n", i + 1));
        if !snippet.is_empty() {
            let short: String = snippet.chars().take(150).collect();
            out.push_str(&format!("   {short}\n"));
        }
    }
    Ok(out.trim_end().to_string())
}

/// Parse DuckDuckGo HTML results into (title, snippet) pairs
fn parse_search_results(html: &str) -> Vec<(String, String)> {
    let document = scraper::Html::parse_document(html);
    let Ok(result_sel) = scraper::Selector::parse("div.result") else {
        return Vec::new();
    };
    let Ok(title_sel) = scraper::Selector::parse("a.result__a") else {
        return Vec::new();
    };
    let Ok(snippet_sel) = scraper::Selector::parse("a.result__snippet") else {
        return Vec::new();
    };

    document
        .select(&result_sel)
        .take(SEARCH_RESULTS)
        .filter_map(|result| {
            let title = collect_text(result.select(&title_sel).next()?);
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(collect_text)
                .unwrap_or_default();
            (!title.is_empty()).then_some((title, snippet))
        })
        .collect()
}

/// Fetch a page and reduce it to readable text
pub fn fetch_webpage(url: &str) -> ToolOutput {
    let url = normalize_url(url);

    let body = blocking_client()?
        .get(&url)
        .send()
        .and_then(reqwest::blocking::Response::text)
        .map_err(|e| format!("cannot fetch {url}: {e}"))?;

    let mut text = extract_readable_text(&body);
    if let Some((cut, _)) = text.char_indices().nth(PAGE_CHAR_LIMIT) {
        text.truncate(cut);
        text.push_str("\n\n... (truncated)");
    }

    if text.trim().is_empty() {
        return Ok(format!("No readable text found at {url}"));
    }
    Ok(format!("Content from {url}:\n\n{text}"))
}

/// Pull headline/paragraph/list text out of an HTML document
fn extract_readable_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let Ok(selector) = scraper::Selector::parse("title, h1, h2, h3, p, li") else {
        return String::new();
    };

    let mut lines = Vec::new();
    for element in document.select(&selector) {
        let text = collect_text(element);
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines.join("\n")
}

fn collect_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Open a URL in the user's default browser
pub fn open_url(url: &str) -> ToolOutput {
    let url = normalize_url(url);

    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    std::process::Command::new(opener)
        .arg(&url)
        .spawn()
        .map_err(|e| format!("cannot open browser: {e}"))?;

    Ok(format!("Opened {url}"))
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_a_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn search_results_parse_from_result_markup() {
        let html = r#"
            <div class="result">
              <a class="result__a" href="https://example.com">Example  Title</a>
              <a class="result__snippet">A short   snippet.</a>
            </div>
            <div class="result">
              <a class="result__a" href="https://other.com">Other</a>
            </div>
        "#;
        let results = parse_search_results(html);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "Example Title");
        assert_eq!(results[0].1, "A short snippet.");
        assert_eq!(results[1].1, "");
    }

    #[test]
    fn readable_text_skips_scripts() {
        let html = r"
            <html><head><script>var x = 1;</script><title>Page</title></head>
            <body><p>First paragraph.</p><div>ignored</div><li>item</li></body></html>
        ";
        let text = extract_readable_text(html);
        assert!(text.contains("Page"));
        assert!(text.contains("First paragraph."));
        assert!(text.contains("item"));
        assert!(!text.contains("var x"));
    }
}
