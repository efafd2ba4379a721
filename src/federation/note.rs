//! Normalized post records
//!
//! Converts the JSON-LD note objects found in outboxes into the plain-text
//! form the Finger side renders.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Local};

use super::model::NoteObject;
use crate::error::AppError;

/// Rendered timestamp format, in the system time zone
const PUBLISHED_FORMAT: &str = "%Y-%m-%d, %H:%M";

/// A post ready to be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Original author, only set for reposts
    pub attributed_to: Option<String>,
    /// Local date-time, `yyyy-MM-dd, HH:mm`
    pub published: String,
    /// Plain text, paragraphs separated by blank lines
    pub content: String,
    /// Attachment URLs
    pub attachments: Vec<String>,
}

impl Note {
    /// Normalize a note object
    ///
    /// `repost` selects whether `attributedTo` is kept: the author is only
    /// worth showing when it differs from the account being fingered.
    ///
    /// # Errors
    /// Returns `AppError::Federation` if `published` is not an ISO-8601 instant
    pub fn from_object(object: NoteObject, repost: bool) -> Result<Self, AppError> {
        let published = format_published(&object.published)?;

        Ok(Self {
            attributed_to: if repost { object.attributed_to } else { None },
            published,
            content: html_to_text(&object.content),
            attachments: object
                .attachment
                .into_iter()
                .map(|attachment| attachment.url)
                .collect(),
        })
    }
}

/// Render an ISO-8601 instant in the local time zone
pub fn format_published(instant: &str) -> Result<String, AppError> {
    let parsed = DateTime::parse_from_rfc3339(instant.trim()).map_err(|e| {
        AppError::Federation(format!("Invalid published timestamp {:?}: {}", instant, e))
    })?;

    Ok(parsed
        .with_timezone(&Local)
        .format(PUBLISHED_FORMAT)
        .to_string())
}

/// Reduce note HTML to plain text
///
/// Every tag except `<p>` and `<br>` is dropped (keeping its text), then
/// paragraph boundaries become blank lines and `<br>` a line break. Lines
/// are trimmed and runs of blank lines collapse to one.
pub fn html_to_text(html: &str) -> String {
    let cleaned = ammonia::Builder::default()
        .tags(HashSet::from(["p", "br"]))
        .tag_attributes(HashMap::new())
        .generic_attributes(HashSet::new())
        .link_rel(None)
        .clean(html)
        .to_string();

    let with_breaks = cleaned
        .replace("<br>", "\n")
        .replace("<p>", "\n")
        .replace("</p>", "\n");

    let decoded = html_escape::decode_html_entities(&with_breaks);
    let mut text = decoded.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    while text.contains("\n\n\n") {
        text = text.replace("\n\n\n", "\n\n");
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::model::AttachmentObject;

    fn note_object(content: &str) -> NoteObject {
        NoteObject {
            attributed_to: Some("https://other.social/users/alice".to_string()),
            published: "2025-03-14T15:09:26Z".to_string(),
            content: content.to_string(),
            in_reply_to: None,
            attachment: vec![],
        }
    }

    #[test]
    fn paragraphs_become_blank_lines() {
        assert_eq!(
            html_to_text("<p>First paragraph</p><p>Second paragraph</p>"),
            "First paragraph\n\nSecond paragraph"
        );
    }

    #[test]
    fn whitespace_between_paragraphs_collapses_to_one_blank_line() {
        assert_eq!(html_to_text("<p>a</p> \n <p>b</p>"), "a\n\nb");
        assert_eq!(
            html_to_text("<p>first</p>\n\t\n<p>  second  </p><br> <br><p>third</p>"),
            "first\n\nsecond\n\nthird"
        );
    }

    #[test]
    fn line_breaks_are_kept() {
        assert_eq!(
            html_to_text("<p>one<br>two<br />three</p>"),
            "one\ntwo\nthree"
        );
    }

    #[test]
    fn links_and_spans_keep_their_text() {
        let html = r#"<p>Hello <span class="h-card"><a href="https://mastodon.social/@BoD" class="u-url mention">@<span>BoD</span></a></span> see <a href="https://example.com/x" rel="nofollow"><span class="invisible">https://</span>example.com/x</a></p>"#;
        assert_eq!(html_to_text(html), "Hello @BoD see https://example.com/x");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            html_to_text("<p>Fish &amp; chips &lt;3 &quot;yum&quot; &#39;ok&#39;</p>"),
            "Fish & chips <3 \"yum\" 'ok'"
        );
    }

    #[test]
    fn scripts_are_removed_with_their_content() {
        assert_eq!(html_to_text("<p>safe</p><script>alert(1)</script>"), "safe");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("just text"), "just text");
    }

    #[test]
    fn published_uses_local_time() {
        let expected = DateTime::parse_from_rfc3339("2025-03-14T15:09:26Z")
            .expect("valid instant")
            .with_timezone(&Local)
            .format("%Y-%m-%d, %H:%M")
            .to_string();

        assert_eq!(
            format_published("2025-03-14T15:09:26Z").expect("valid instant"),
            expected
        );
    }

    #[test]
    fn published_rejects_garbage() {
        assert!(matches!(
            format_published("yesterday"),
            Err(AppError::Federation(_))
        ));
    }

    #[test]
    fn author_is_only_kept_for_reposts() {
        let original = Note::from_object(note_object("<p>hi</p>"), false).expect("note");
        assert_eq!(original.attributed_to, None);

        let repost = Note::from_object(note_object("<p>hi</p>"), true).expect("note");
        assert_eq!(
            repost.attributed_to.as_deref(),
            Some("https://other.social/users/alice")
        );
    }

    #[test]
    fn attachments_map_to_urls() {
        let mut object = note_object("<p>pics</p>");
        object.attachment = vec![
            AttachmentObject {
                url: "https://files.example/1.png".to_string(),
            },
            AttachmentObject {
                url: "https://files.example/2.png".to_string(),
            },
        ];

        let note = Note::from_object(object, false).expect("note");
        assert_eq!(
            note.attachments,
            vec!["https://files.example/1.png", "https://files.example/2.png"]
        );
    }
}
