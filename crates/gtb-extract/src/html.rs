//! Visible-text extraction from web pages, for "send a link, get the test
//! solved" requests.

use std::time::Duration;

use gtb_core::{Error, Result};
use scraper::Html;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetch a page and return its visible text, one line per text run.
/// Script/style contents and elements hidden with inline CSS are skipped.
pub async fn visible_text(url: &str) -> Result<String> {
    let http = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Transport(format!("http client build: {e}")))?;

    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Transport(format!("page fetch failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(Error::Extraction(format!(
            "page fetch failed: {}",
            resp.status()
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| Error::Transport(format!("page body read failed: {e}")))?;

    Ok(strip_to_visible_text(&body))
}

fn strip_to_visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value().as_element().is_some_and(|el| {
                matches!(el.name(), "script" | "style" | "noscript") || hidden_by_style(el)
            })
        });
        if hidden {
            continue;
        }
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
    }

    lines.join("\n")
}

fn hidden_by_style(el: &scraper::node::Element) -> bool {
    el.attr("style").is_some_and(|style| {
        let style = style.to_lowercase().replace(' ', "");
        style.contains("display:none") || style.contains("visibility:hidden")
    })
}
