use chrono::NaiveDate;
use std::fmt::Write as _;

use crate::app::ImportOutcome;
use crate::feed::SubscriptionOutcome;
use crate::insight::{Analysis, Briefing, Summary};
use crate::storage::Subscription;
use crate::util::{display_width, strip_control_chars, truncate_to_width};

const PLACEHOLDER_NOTE: &str = "(The model reply could not be read; showing a placeholder.)";
const MAX_TITLE_WIDTH: usize = 32;

/// One subscription per line: id, title, url.
pub fn render_subscriptions(subscriptions: &[Subscription]) -> String {
    if subscriptions.is_empty() {
        return "No subscriptions.\n".to_string();
    }

    let id_width = subscriptions
        .iter()
        .map(|s| display_width(&s.id))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for sub in subscriptions {
        let title = strip_control_chars(&sub.title);
        let title = truncate_to_width(&title, MAX_TITLE_WIDTH);
        let _ = writeln!(
            out,
            "{:<id_w$}  {:<title_w$}  {}",
            strip_control_chars(&sub.id),
            title,
            strip_control_chars(&sub.url),
            id_w = id_width,
            title_w = MAX_TITLE_WIDTH,
        );
    }
    out
}

pub fn render_import(outcomes: &[ImportOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let _ = match outcome {
            ImportOutcome::Added { subscription } => writeln!(
                out,
                "added    {} ({})",
                strip_control_chars(&subscription.url),
                strip_control_chars(&subscription.title)
            ),
            ImportOutcome::Skipped { url } => {
                writeln!(out, "skipped  {} (already subscribed)", strip_control_chars(url))
            }
            ImportOutcome::Failed { url, error } => writeln!(
                out,
                "failed   {}: {}",
                strip_control_chars(url),
                strip_control_chars(error)
            ),
        };
    }
    out
}

/// Footer line for a refresh plus one line per failed subscription.
pub fn render_refresh_outcomes(article_count: usize, outcomes: &[SubscriptionOutcome]) -> String {
    let failed: Vec<&SubscriptionOutcome> =
        outcomes.iter().filter(|o| o.result.is_err()).collect();

    let mut out = format!(
        "{} articles from {} feeds",
        article_count,
        outcomes.len() - failed.len()
    );
    if !failed.is_empty() {
        let _ = write!(out, " ({} failed)", failed.len());
    }
    out.push('\n');

    for outcome in failed {
        if let Err(e) = &outcome.result {
            let _ = writeln!(
                out,
                "  {}: {}",
                strip_control_chars(&outcome.feed_title),
                strip_control_chars(e)
            );
        }
    }
    out
}

pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();
    if summary.placeholder {
        let _ = writeln!(out, "{}\n", PLACEHOLDER_NOTE);
    }
    let _ = writeln!(out, "TL;DR\n{}\n", strip_control_chars(&summary.tldr));
    if !summary.key_points.is_empty() {
        out.push_str("Key points\n");
        for point in &summary.key_points {
            let _ = writeln!(out, "  - {}", strip_control_chars(point));
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "Technical depth: {}",
        strip_control_chars(&summary.technical_depth)
    );
    let _ = writeln!(
        out,
        "Worth reading: {}",
        strip_control_chars(&summary.worth_reading)
    );
    out
}

/// The analysis in its Markdown export form.
pub fn render_analysis(analysis: &Analysis, title: &str) -> String {
    let markdown = analysis.to_markdown(title);
    let body = strip_control_chars(&markdown);
    if analysis.placeholder {
        format!("{}\n\n{}", PLACEHOLDER_NOTE, body)
    } else {
        body.into_owned()
    }
}

/// Greeting, date line, summary paragraphs and the key takeaway.
pub fn render_briefing(briefing: &Briefing, today: NaiveDate) -> String {
    let mut out = String::new();
    if briefing.placeholder {
        let _ = writeln!(out, "{}\n", PLACEHOLDER_NOTE);
    }
    let _ = writeln!(out, "{}", strip_control_chars(&briefing.greeting));
    let _ = writeln!(out, "{}\n", today.format("%A, %B %-d"));
    for paragraph in briefing.paragraphs() {
        let _ = writeln!(out, "{}\n", strip_control_chars(paragraph));
    }
    let _ = writeln!(
        out,
        "Key takeaway: {}",
        strip_control_chars(&briefing.key_takeaway)
    );
    out
}
