//! examkit-report: result reports.
//!
//! Renders a [`ResultAnalysis`](examkit_core::statistics::ResultAnalysis)
//! as a self-contained HTML page or as plain text for the terminal.

pub mod html;
pub mod text;

pub use html::{generate_html, write_html_report};
pub use text::render_text;
