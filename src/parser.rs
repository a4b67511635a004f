//! Minimal RSS 2.0 decoding.
//!
//! Only the channel header and the four item fields the pipeline stores are
//! read. Everything else in the document is ignored, including namespaced
//! extensions such as `atom:link` or `content:encoded`.

use roxmltree::{Document, Node, ParsingOptions};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("document has no <channel> element")]
    MissingChannel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RssItem>,
}

/// One `<item>`, with fields exactly as they appeared (trimmed).
/// Missing elements come back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

pub fn parse(bytes: &[u8]) -> Result<RssFeed, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)?;

    let channel = child_element(doc.root_element(), "channel").ok_or(ParseError::MissingChannel)?;

    let items = channel
        .children()
        .filter(|node| is_plain_element(node, "item"))
        .map(|item| RssItem {
            title: child_text(item, "title"),
            link: child_text(item, "link"),
            description: child_text(item, "description"),
            pub_date: child_text(item, "pubDate"),
        })
        .collect();

    Ok(RssFeed {
        title: child_text(channel, "title"),
        link: child_text(channel, "link"),
        description: child_text(channel, "description"),
        items,
    })
}

fn is_plain_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().namespace().is_none() && node.tag_name().name() == name
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| is_plain_element(child, name))
}

fn child_text(node: Node<'_, '_>, name: &str) -> String {
    child_element(node, name)
        .map(|child| {
            child
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
            <channel>
                <title>Tech News</title>
                <link>https://technews.example.com</link>
                <atom:link href="https://technews.example.com/rss" rel="self"/>
                <description>Latest tech news</description>
                <language>en-us</language>
                <item>
                    <title>Breaking: New Technology Announced</title>
                    <link>https://technews.example.com/article/1</link>
                    <guid>https://technews.example.com/article/1</guid>
                    <description><![CDATA[<p>Something <b>big</b></p>]]></description>
                    <pubDate>Mon, 09 Dec 2024 12:00:00 +0000</pubDate>
                </item>
                <item>
                    <title>Review: Latest Gadget</title>
                    <link>
                        https://technews.example.com/article/2
                    </link>
                    <pubDate>Mon, 09 Dec 2024 10:00:00 +0000</pubDate>
                </item>
            </channel>
        </rss>
    "#;

    #[test]
    fn test_parse_channel_header() {
        let feed = parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(feed.title, "Tech News");
        assert_eq!(feed.link, "https://technews.example.com");
        assert_eq!(feed.description, "Latest tech news");
    }

    #[test]
    fn test_parse_items_in_order() {
        let feed = parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].title, "Breaking: New Technology Announced");
        assert_eq!(feed.items[0].link, "https://technews.example.com/article/1");
        assert_eq!(feed.items[0].description, "<p>Something <b>big</b></p>");
        assert_eq!(feed.items[0].pub_date, "Mon, 09 Dec 2024 12:00:00 +0000");
        assert_eq!(feed.items[1].link, "https://technews.example.com/article/2");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let feed = parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(feed.items[1].description, "");

        let xml = "<rss><channel><item><link>https://a.com</link></item></channel></rss>";
        let feed = parse(xml.as_bytes()).unwrap();
        assert_eq!(feed.title, "");
        assert_eq!(
            feed.items[0],
            RssItem {
                link: "https://a.com".to_string(),
                ..RssItem::default()
            }
        );
    }

    #[test]
    fn test_channel_without_items() {
        let xml = "<rss><channel><title>Empty</title></channel></rss>";
        let feed = parse(xml.as_bytes()).unwrap();
        assert!(feed.items.is_empty());
    }

    #[test]
    fn test_doctype_is_accepted() {
        let xml = r#"<?xml version="1.0"?>
            <!DOCTYPE rss PUBLIC "-//Netscape Communications//DTD RSS 0.91//EN"
                "http://my.netscape.com/publish/formats/rss-0.91.dtd">
            <rss version="0.91"><channel><title>Old</title></channel></rss>"#;
        let feed = parse(xml.as_bytes()).unwrap();
        assert_eq!(feed.title, "Old");
    }

    #[test]
    fn test_malformed_xml() {
        let result = parse(b"<rss><channel><item></channel>");
        assert!(matches!(result, Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_not_xml_at_all() {
        let result = parse(b"<html>not closed");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let result = parse(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn test_document_without_channel() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Atom</title></feed>"#;
        let result = parse(xml.as_bytes());
        assert!(matches!(result, Err(ParseError::MissingChannel)));
    }
}
