//! Fixed-width text wrapping for Finger responses
//!
//! Lines are wrapped independently, so blank lines separating paragraphs
//! survive. Widths are counted in characters, not bytes.

use std::collections::VecDeque;

/// Word-wrap `text` so that no line exceeds `max_width` characters.
///
/// Each `\n`-separated line is handled on its own. Lines that already fit
/// pass through unchanged; longer lines are filled greedily with
/// space-separated words. A word longer than `max_width` is hard-broken:
/// the first fragment fills whatever is left on the current line, the
/// following fragments take full lines.
///
/// The result is rejoined with `\n` and trimmed.
pub fn wrap(text: &str, max_width: usize) -> String {
    let max_width = max_width.max(1);

    text.split('\n')
        .flat_map(|line| wrap_line(line, max_width))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn wrap_line(line: &str, max_width: usize) -> Vec<String> {
    if char_len(line) <= max_width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut words: VecDeque<String> = line.split(' ').map(str::to_string).collect();
    let mut current = String::new();

    while let Some(word) = words.pop_front() {
        let word_len = char_len(&word);

        if current.is_empty() {
            if word_len > max_width {
                push_front_all(&mut words, split_chars(&word, max_width, max_width));
            } else {
                current = word;
            }
            continue;
        }

        let current_len = char_len(&current);
        if current_len + 1 + word_len <= max_width {
            current.push(' ');
            current.push_str(&word);
        } else if word_len > max_width {
            let remaining = max_width.saturating_sub(current_len + 1);
            if remaining == 0 {
                lines.push(std::mem::take(&mut current));
                words.push_front(word);
            } else {
                push_front_all(&mut words, split_chars(&word, max_width, remaining));
            }
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Cut `word` into fragments: the first at most `first_width` characters,
/// the rest at most `width`.
fn split_chars(word: &str, width: usize, first_width: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut fragment = String::new();
    let mut fragment_len = 0;
    let mut limit = first_width;

    for c in word.chars() {
        if fragment_len == limit {
            fragments.push(std::mem::take(&mut fragment));
            fragment_len = 0;
            limit = width;
        }
        fragment.push(c);
        fragment_len += 1;
    }
    if !fragment.is_empty() {
        fragments.push(fragment);
    }

    fragments
}

fn push_front_all(words: &mut VecDeque<String>, fragments: Vec<String>) {
    for fragment in fragments.into_iter().rev() {
        words.push_front(fragment);
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
