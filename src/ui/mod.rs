//! Plain-text terminal rendering for the CLI.
//!
//! Every renderer returns a `String`; nothing here writes to stdout. Text
//! from feeds and the model passes through
//! [`strip_control_chars`](crate::util::strip_control_chars) before it is
//! laid out.

mod grid;
mod report;

pub use grid::{columns_for_width, render_grid, short_date, wrap};
pub use report::{
    render_analysis, render_briefing, render_import, render_refresh_outcomes, render_subscriptions,
    render_summary,
};
