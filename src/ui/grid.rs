use chrono::DateTime;
use unicode_width::UnicodeWidthChar;

use crate::feed::{effective_timestamp, AggregatedArticle};
use crate::util::{display_width, strip_control_chars, truncate_to_width};

/// Blank columns between cards.
const GUTTER: usize = 2;
const TITLE_LINES: usize = 2;
const SNIPPET_LINES: usize = 3;

/// Number of card columns for a terminal `width`.
///
/// | width    | columns |
/// |----------|---------|
/// | < 96     | 1       |
/// | 96..128  | 2       |
/// | 128..160 | 3       |
/// | >= 160   | 4       |
pub fn columns_for_width(width: u16) -> usize {
    match width {
        160.. => 4,
        128..=159 => 3,
        96..=127 => 2,
        _ => 1,
    }
}

/// Renders the board as rows of fixed-height cards.
///
/// Each card shows the feed title and short date, up to two lines of title
/// and up to three lines of snippet. Untrusted text is stripped of control
/// sequences first.
pub fn render_grid(articles: &[AggregatedArticle], width: u16) -> String {
    if articles.is_empty() {
        return "No articles in the recency window.\n".to_string();
    }

    let columns = columns_for_width(width);
    let total = (width as usize).max(20);
    let card_width = (total - GUTTER * (columns - 1)) / columns;

    let mut out = String::new();
    for (row_idx, row) in articles.chunks(columns).enumerate() {
        if row_idx > 0 {
            out.push('\n');
        }
        let cards: Vec<Vec<String>> = row.iter().map(|a| card_lines(a, card_width)).collect();
        let height = cards.iter().map(Vec::len).max().unwrap_or(0);

        for line_idx in 0..height {
            let mut line = String::new();
            for (col, card) in cards.iter().enumerate() {
                if col > 0 {
                    line.push_str(&" ".repeat(GUTTER));
                }
                let cell = card.get(line_idx).map(String::as_str).unwrap_or("");
                line.push_str(cell);
                if col + 1 < cards.len() {
                    line.push_str(&" ".repeat(card_width.saturating_sub(display_width(cell))));
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out
}

/// `"Mar 5"` style date, or `None` when the article carries no date.
pub fn short_date(article: &AggregatedArticle) -> Option<String> {
    let ts = effective_timestamp(&article.article);
    (ts != DateTime::UNIX_EPOCH).then(|| ts.format("%b %-d").to_string())
}

fn card_lines(item: &AggregatedArticle, width: usize) -> Vec<String> {
    let feed_title = strip_control_chars(&item.feed_title);
    let header = match short_date(item) {
        Some(date) => format!("{} · {}", feed_title.to_uppercase(), date),
        None => feed_title.to_uppercase(),
    };

    let mut lines = vec![truncate_to_width(&header, width).into_owned()];
    lines.extend(wrap(&strip_control_chars(&item.article.title), width, TITLE_LINES));

    if let Some(snippet) = item.article.content_snippet.as_deref() {
        let snippet = strip_control_chars(snippet);
        lines.extend(wrap(&snippet, width, SNIPPET_LINES));
    }
    lines
}

/// Word-wraps `text` into at most `max_lines` lines of `width` columns.
///
/// The last line ends in `...` when text was left over. Words wider than a
/// line are cut.
pub fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    if max_lines == 0 {
        return lines;
    }

    let mut current = String::new();
    let mut words = text.split_whitespace().peekable();

    while let Some(word) = words.peek().copied() {
        let candidate_width = if current.is_empty() {
            display_width(word)
        } else {
            display_width(&current) + 1 + display_width(word)
        };

        if candidate_width <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            words.next();
            continue;
        }

        if current.is_empty() {
            current = take_width(word, width).to_string();
            words.next();
        }

        if lines.len() + 1 == max_lines {
            break;
        }
        lines.push(std::mem::take(&mut current));
    }

    if words.peek().is_some() && !current.is_empty() {
        if display_width(&current) + 3 > width {
            current = take_width(&current, width.saturating_sub(3)).trim_end().to_string();
        }
        current.push_str("...");
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Longest prefix of `s` that fits in `width` columns.
fn take_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width {
            return &s[..idx];
        }
        used += w;
    }
    s
}
