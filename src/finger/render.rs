//! Plain-text Finger responses

use std::fmt::Write;

use super::Address;
use crate::federation::Note;
use crate::text::wrap;

pub const INVALID_ADDRESS: &str = "Invalid address\n";

const SEPARATOR_WIDTH: usize = 72;

pub fn user_not_found(address: &Address) -> String {
    format!("User {} not found\n", address)
}

pub fn posts_not_found(address: &Address) -> String {
    format!("Posts from {} not found\n", address)
}

/// Render the latest posts of `address`
///
/// `notes` must not be empty; an empty outbox is reported with
/// [`posts_not_found`].
pub fn posts(address: &Address, notes: &[Note], profile_url: &str, wrap_width: usize) -> String {
    let separator = "-".repeat(SEPARATOR_WIDTH);
    let mut out = String::new();

    if notes.len() > 1 {
        let _ = writeln!(out, "Here are the latest {} posts from {}:", notes.len(), address);
    } else {
        let _ = writeln!(out, "Here is the latest post from {}:", address);
    }
    let _ = writeln!(out, "\n{}", separator);

    for note in notes {
        let _ = write!(out, "{}\n\n", note.published);
        if let Some(author) = &note.attributed_to {
            let _ = writeln!(out, "Repost from {}:", author);
        }
        let _ = writeln!(out, "{}", wrap(&note.content, wrap_width));

        match note.attachments.as_slice() {
            [] => {}
            [url] => {
                let _ = writeln!(out, "\nAttachment:\n{}", url);
            }
            urls => {
                out.push_str("\nAttachments:\n");
                for url in urls {
                    let _ = writeln!(out, "- {}", url);
                }
            }
        }

        let _ = writeln!(out, "\n{}", separator);
    }

    let _ = writeln!(out, "\nSee more posts at {}.", profile_url);
    out.push_str("Have a nice day!\n");
    out
}
