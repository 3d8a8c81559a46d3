//! Small query helpers over a parsed HTML document

use scraper::{ElementRef, Html, Selector};

/// Elements matching a CSS selector; an invalid selector matches nothing
pub fn select<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn count(doc: &Html, css: &str) -> usize {
    select(doc, css).len()
}

/// Whitespace-normalised text of an element
pub fn text_of(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching `css`, if any and non-empty
pub fn first_text(doc: &Html, css: &str) -> Option<String> {
    select(doc, css)
        .first()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Content of a `<meta>` tag whose `name` or `property` equals `key`
/// (case-insensitive)
pub fn meta_content(doc: &Html, key: &str) -> Option<String> {
    select(doc, "meta[content]").into_iter().find_map(|el| {
        let value = el.value();
        let matches = value
            .attr("name")
            .or_else(|| value.attr("property"))
            .is_some_and(|n| n.eq_ignore_ascii_case(key));
        if matches {
            value
                .attr("content")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
        } else {
            None
        }
    })
}

/// Whether any `<link>` has `rel` containing the given token
pub fn has_link_rel(doc: &Html, rel: &str) -> bool {
    select(doc, "link[rel]").iter().any(|el| {
        el.value().attr("rel").is_some_and(|r| {
            r.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case(rel))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_content_matches_name_and_property() {
        let doc = Html::parse_document(
            r#"<html><head>
            <meta name="Description" content=" Local plumbing experts ">
            <meta property="og:title" content="Plumbers">
            </head></html>"#,
        );
        assert_eq!(
            meta_content(&doc, "description").as_deref(),
            Some("Local plumbing experts")
        );
        assert_eq!(meta_content(&doc, "og:title").as_deref(), Some("Plumbers"));
        assert_eq!(meta_content(&doc, "og:description"), None);
    }

    #[test]
    fn test_link_rel_tokens() {
        let doc = Html::parse_document(
            r#"<html><head><link rel="shortcut icon" href="/f.ico"><link rel="Canonical" href="/"></head></html>"#,
        );
        assert!(has_link_rel(&doc, "canonical"));
        assert!(has_link_rel(&doc, "icon"));
        assert!(!has_link_rel(&doc, "manifest"));
    }

    #[test]
    fn test_first_text_normalises_whitespace() {
        let doc = Html::parse_document("<html><head><title>\n  Acme \n Co  </title></head></html>");
        assert_eq!(first_text(&doc, "title").as_deref(), Some("Acme Co"));
        assert_eq!(first_text(&doc, "h1"), None);
    }
}
