//! Fragment markup handling: content-region extraction and resource rewriting.
//!
//! Fragments are complete XHTML documents. Assembly only needs the body
//! content, with relative resource references made valid for wherever the
//! assembled output is consumed from.

pub mod rewrite;

use std::sync::LazyLock;

use scraper::{Html, Selector};

pub use rewrite::{ResourceRewriter, prepare_print_stylesheet};

// ---------------------------------------------------------------------------
// Content region
// ---------------------------------------------------------------------------

/// Why a fragment's content region could not be located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no <body> opening tag")]
    MissingOpen,
    #[error("no </body> closing tag after the opening tag")]
    MissingClose,
}

/// Return the markup between the `<body …>` opening tag and `</body>`.
///
/// Purely textual: the fragment does not have to be well-formed beyond the
/// two delimiters.
pub fn extract_content_region(doc: &str) -> Result<&str, ExtractError> {
    let open = find_body_open(doc).ok_or(ExtractError::MissingOpen)?;
    let tag_end = doc[open..]
        .find('>')
        .map(|i| open + i + 1)
        .ok_or(ExtractError::MissingOpen)?;
    let close = doc[tag_end..]
        .find("</body>")
        .map(|i| tag_end + i)
        .ok_or(ExtractError::MissingClose)?;

    Ok(&doc[tag_end..close])
}

/// Position of the `<body` tag, ignoring look-alikes such as `<bodyish>`.
fn find_body_open(doc: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = doc[from..].find("<body") {
        let at = from + i;
        match doc[at + 5..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(at),
            None => return None,
            _ => from = at + 5,
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Text of the first `h1` in a content region (or the first `h2` without one).
///
/// Whitespace runs are collapsed; empty headings are ignored.
pub fn extract_heading(region: &str) -> Option<String> {
    static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
    static H2: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("valid selector"));

    let fragment = Html::parse_fragment(region);
    [&*H1, &*H2].into_iter().find_map(|sel| {
        fragment.select(sel).find_map(|el| {
            let text = el.text().collect::<Vec<_>>().join(" ");
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!collapsed.is_empty()).then_some(collapsed)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_between_body_tags() {
        let doc = r#"<html><head><title>x</title></head><body class="chapter" epub:type="bodymatter"><p>Hi</p></body></html>"#;
        assert_eq!(extract_content_region(doc), Ok("<p>Hi</p>"));
    }

    #[test]
    fn plain_body_tag() {
        let doc = "<html>\n<body>\n<h1>One</h1>\n</body>\n</html>";
        assert_eq!(extract_content_region(doc), Ok("\n<h1>One</h1>\n"));
    }

    #[test]
    fn missing_open_tag() {
        assert_eq!(
            extract_content_region("<html><div>no body</div></html>"),
            Err(ExtractError::MissingOpen)
        );
    }

    #[test]
    fn missing_close_tag() {
        assert_eq!(
            extract_content_region("<html><body><p>cut off"),
            Err(ExtractError::MissingClose)
        );
    }

    #[test]
    fn body_lookalike_is_not_a_delimiter() {
        let doc = "<bodyguard>x</bodyguard><body id=\"b\">real</body>";
        assert_eq!(extract_content_region(doc), Ok("real"));
    }

    #[test]
    fn heading_prefers_h1_and_collapses_whitespace() {
        let region = "<h2>Sub</h2><h1 class=\"chap\">CHAPTER I<br/>\n  Unveiling   Your Odyssey</h1>";
        assert_eq!(
            extract_heading(region).as_deref(),
            Some("CHAPTER I Unveiling Your Odyssey")
        );
    }

    #[test]
    fn heading_falls_back_to_h2() {
        assert_eq!(extract_heading("<h2>Part One</h2>").as_deref(), Some("Part One"));
        assert_eq!(extract_heading("<h1> </h1><p>text</p>"), None);
    }
}
