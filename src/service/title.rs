//! Best-effort title fetch for newly created mappings.
//!
//! The fetch is bounded twice: the client carries a request timeout, and the
//! body is read in chunks only up to a byte cap. Anything that goes wrong
//! yields "no title" rather than an error.

/// Fetch the destination page and extract its `<title>`, reading at most
/// `max_bytes` of the body.
pub async fn fetch_title(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Option<String> {
    let mut response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(url = %url, error = %err, "title fetch request failed");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!(url = %url, status = %response.status(), "title fetch got non-success status");
        return None;
    }

    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                body.extend_from_slice(&chunk);
                if body.len() >= max_bytes {
                    // Data cap reached; whatever title exists is in here or
                    // we treat the page as having none.
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "title fetch aborted mid-body");
                break;
            }
        }
    }

    extract_title(&String::from_utf8_lossy(&body))
}

/// Pull the contents of the first `<title>` element out of an HTML fragment,
/// collapsing internal whitespace.
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();

    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;

    let raw = &html[content_start..content_end];
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_title() {
        let html = "<html><head><title>Example Domain</title></head></html>";
        assert_eq!(extract_title(html), Some("Example Domain".to_string()));
    }

    #[test]
    fn collapses_whitespace_and_newlines() {
        let html = "<title>\n  Spread\n  Out \t Title\n</title>";
        assert_eq!(extract_title(html), Some("Spread Out Title".to_string()));
    }

    #[test]
    fn handles_title_attributes_and_case() {
        let html = r#"<HTML><TITLE lang="en">Upper</TITLE></HTML>"#;
        assert_eq!(extract_title(html), Some("Upper".to_string()));
    }

    #[test]
    fn missing_or_empty_title_is_none() {
        assert_eq!(extract_title("<html><body>no head</body></html>"), None);
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title("<title>unterminated"), None);
    }

    #[test]
    fn truncated_html_before_close_tag_is_none() {
        // What a byte-capped read of a huge page can look like.
        let html = "<head><title>Cut off mid";
        assert_eq!(extract_title(html), None);
    }
}
