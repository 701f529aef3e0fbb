//! Streaming RSS 2.0 / RSS 1.0 / Atom reader.
//!
//! Only what a story needs is extracted: the title, a plain-text summary and
//! any media links (`media:content`, `media:thumbnail`, `enclosure`, Atom
//! `link` with an image type).

use crate::error::FeedError;
use crate::models::{FeedEntry, MediaKind, MediaLink};
use quick_xml::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::Html;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Title,
    Summary,
    Content,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    title: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    media: Vec<MediaLink>,
}

impl EntryBuilder {
    fn set(&mut self, field: TextField, text: String) {
        let slot = match field {
            TextField::Title => &mut self.title,
            TextField::Summary => &mut self.summary,
            TextField::Content => &mut self.content,
        };
        // first occurrence wins; Atom <source><title> must not override
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    fn build(self) -> FeedEntry {
        let summary = self
            .summary
            .filter(|s| !s.is_empty())
            .or(self.content.filter(|s| !s.is_empty()));
        FeedEntry {
            title: self.title.unwrap_or_default(),
            summary,
            media: self.media,
        }
    }
}

fn text_field(name: &[u8]) -> Option<TextField> {
    match name {
        b"title" => Some(TextField::Title),
        b"description" | b"summary" => Some(TextField::Summary),
        b"content:encoded" | b"content" => Some(TextField::Content),
        _ => None,
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            match escape::unescape(&raw) {
                Ok(v) => v.into_owned(),
                Err(_) => raw,
            }
        })
}

/// Media link carried by `e`, if it is one of the elements we understand.
fn media_link(name: &[u8], e: &BytesStart<'_>) -> Option<MediaLink> {
    match name {
        b"media:content" => {
            let url = attr(e, b"url")?;
            let mime = attr(e, b"type").or_else(|| {
                attr(e, b"medium").map(|medium| format!("{}/*", medium.to_ascii_lowercase()))
            });
            Some(MediaLink {
                url,
                kind: MediaKind::Attachment,
                mime,
            })
        }
        b"media:thumbnail" => Some(MediaLink {
            url: attr(e, b"url")?,
            kind: MediaKind::Thumbnail,
            mime: None,
        }),
        b"enclosure" => Some(MediaLink {
            url: attr(e, b"url")?,
            kind: MediaKind::Attachment,
            // untyped enclosures are as often audio as they are photos
            mime: Some(attr(e, b"type").unwrap_or_else(|| "application/octet-stream".to_string())),
        }),
        b"link" => {
            // plain RSS <link> has no attributes; only typed Atom links count
            let mime = attr(e, b"type")?;
            Some(MediaLink {
                url: attr(e, b"href")?,
                kind: MediaKind::Link,
                mime: Some(mime),
            })
        }
        _ => None,
    }
}

/// Collapse markup and entities into single-spaced plain text.
pub fn plain_text(s: &str) -> String {
    let text = if s.contains('<') || s.contains('&') {
        let fragment = Html::parse_fragment(s);
        fragment.root_element().text().collect::<Vec<_>>().join(" ")
    } else {
        s.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn finish_text(raw: &str) -> String {
    let unescaped = match escape::unescape(raw) {
        Ok(cow) => cow.into_owned(),
        Err(e) => {
            debug!(error = %e, "Unescape failed; keeping raw text");
            raw.to_string()
        }
    };
    plain_text(&unescaped)
}

/// Parse a feed document into entries, in document order.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedEntry>, FeedError> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::<u8>::new();
    let mut saw_feed = false;
    let mut current: Option<EntryBuilder> = None;
    let mut field: Option<(TextField, Vec<u8>)> = None;
    let mut text = String::new();
    let mut entries = Vec::<FeedEntry>::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                match name.as_slice() {
                    b"rss" | b"feed" | b"rdf:rdf" | b"channel" => saw_feed = true,
                    b"item" | b"entry" => {
                        saw_feed = true;
                        current = Some(EntryBuilder::default());
                    }
                    other => {
                        if let Some(entry) = current.as_mut() {
                            if let Some(link) = media_link(other, &e) {
                                entry.media.push(link);
                            } else if field.is_none() {
                                if let Some(f) = text_field(other) {
                                    field = Some((f, name.clone()));
                                    text.clear();
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                if let Some(entry) = current.as_mut() {
                    if let Some(link) = media_link(&name, &e) {
                        entry.media.push(link);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::GeneralRef(r)) => {
                // kept escaped; finish_text resolves it with the rest
                if field.is_some() {
                    text.push('&');
                    text.push_str(&String::from_utf8_lossy(&r));
                    text.push(';');
                }
            }
            Ok(Event::CData(c)) => {
                if field.is_some() {
                    let raw = String::from_utf8_lossy(&c);
                    text.push_str(&escape::escape(&*raw));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                if matches!(&field, Some((_, open)) if *open == name) {
                    if let (Some((f, _)), Some(entry)) = (field.take(), current.as_mut()) {
                        entry.set(f, finish_text(&text));
                    }
                    text.clear();
                } else if matches!(name.as_slice(), b"item" | b"entry") {
                    field = None;
                    if let Some(entry) = current.take() {
                        entries.push(entry.build());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, offset = reader.buffer_position(), parsed = entries.len(), "XML parse error");
                if entries.is_empty() {
                    return Err(e.into());
                }
                // keep what was read before the damage
                break;
            }
        }
        buf.clear();
    }

    if !saw_feed {
        return Err(FeedError::NotAFeed);
    }
    info!(entries = entries.len(), "Parsed feed");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Internacional</title>
    <item>
      <title>Summit opens</title>
      <link>https://example.com/summit</link>
      <description><![CDATA[<p>Leaders gather for <b>talks</b> on trade.</p>]]></description>
      <media:content url="https://img.example.com/summit.jpg" type="image/jpeg" medium="image"/>
      <media:thumbnail url="https://img.example.com/summit-thumb.jpg"/>
    </item>
    <item>
      <title>Markets &amp; bonds</title>
      <description>Prices rose &gt; 2% &#8212; analysts</description>
      <enclosure url="https://cdn.example.com/podcast.mp3" type="audio/mpeg" length="1"/>
    </item>
    <item>
      <title>No summary here</title>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Mundo</title>
  <entry>
    <title>Elections called</title>
    <link rel="alternate" href="https://example.com/elections"/>
    <link rel="enclosure" type="image/png" href="https://img.example.com/ballot.png"/>
    <summary type="html">&lt;p&gt;The vote will be held in spring.&lt;/p&gt;</summary>
    <source><title>Other source</title></source>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].title, "Summit opens");
        assert_eq!(
            entries[0].summary.as_deref(),
            Some("Leaders gather for talks on trade.")
        );
        assert_eq!(entries[0].media.len(), 2);
        assert_eq!(
            entries[0].source_media().as_deref(),
            Some("https://img.example.com/summit.jpg")
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries[1].title, "Markets & bonds");
        assert_eq!(
            entries[1].summary.as_deref(),
            Some("Prices rose > 2% \u{2014} analysts")
        );
    }

    #[test]
    fn test_audio_enclosure_is_not_a_photo() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries[1].media.len(), 1);
        assert_eq!(entries[1].source_media(), None);
    }

    #[test]
    fn test_missing_description_is_none() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries[2].summary, None);
    }

    #[test]
    fn test_parse_atom_entry() {
        let entries = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Elections called");
        assert_eq!(
            entries[0].summary.as_deref(),
            Some("The vote will be held in spring.")
        );
        assert_eq!(
            entries[0].source_media().as_deref(),
            Some("https://img.example.com/ballot.png")
        );
    }

    #[test]
    fn test_html_page_is_not_a_feed() {
        let html = b"<html><body><p>Not a feed</p></body></html>";
        assert!(matches!(parse_feed(html), Err(FeedError::NotAFeed)));
    }

    #[test]
    fn test_broken_xml_errors() {
        let broken = b"<rss><channel><item><title>Half</titl></item>";
        assert!(parse_feed(broken).is_err());
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(plain_text("<p>a  <b>b</b></p>\n<p>c</p>"), "a b c");
        assert_eq!(plain_text("  plain   text "), "plain text");
    }
}
