// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use crate::pipeline::{QueryResult, ResultRow};

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Colorize article title (bold)
pub fn colorize_title(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize link (cyan)
pub fn colorize_link(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize publication date (yellow)
pub fn colorize_date(text: &str, use_color: bool) -> String {
    if use_color {
        text.yellow().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize description (dimmed)
pub fn colorize_description(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Serialize `value` as JSON to stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> serde_json::Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}

/// Render one result row as a numbered text block.
pub fn format_row(rank: usize, row: &ResultRow, use_color: bool) -> String {
    let mut out = format!("{:>2}. {}\n", rank, colorize_title(&row.title, use_color));
    if !row.date_published.is_empty() {
        out.push_str(&format!("    {}\n", colorize_date(&row.date_published, use_color)));
    }
    if !row.link.is_empty() {
        out.push_str(&format!("    {}\n", colorize_link(&row.link, use_color)));
    }
    if !row.description.is_empty() {
        out.push_str(&format!(
            "    {}\n",
            colorize_description(&row.description, use_color)
        ));
    }
    out
}

/// Write every row of `result`, closest first.
pub fn write_result<W: Write>(out: &mut W, result: &QueryResult, use_color: bool) -> std::io::Result<()> {
    for (i, row) in result.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        write!(out, "{}", format_row(i + 1, row, use_color))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str, link: &str) -> ResultRow {
        ResultRow {
            title: title.to_string(),
            description: String::new(),
            link: link.to_string(),
            date_published: "Mon, 13 May 2024".to_string(),
        }
    }

    #[test]
    fn plain_row_skips_empty_fields() {
        let text = format_row(3, &row("Lluvias en Lima", "https://rpp.pe/lima"), false);
        assert_eq!(
            text,
            " 3. Lluvias en Lima\n    Mon, 13 May 2024\n    https://rpp.pe/lima\n"
        );
    }

    #[test]
    fn colorizers_are_identity_without_color() {
        assert_eq!(colorize_title("t", false), "t");
        assert_eq!(colorize_link("l", false), "l");
        assert_eq!(colorize_date("d", false), "d");
        assert_eq!(colorize_description("x", false), "x");
    }

    #[test]
    fn write_result_separates_rows() {
        let result: QueryResult =
            serde_json::from_str(r#"[{"title":"A","description":"","link":"","date_published":""},{"title":"B","description":"","link":"","date_published":""}]"#)
                .unwrap();
        let mut buf = Vec::new();
        write_result(&mut buf, &result, false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), " 1. A\n\n 2. B\n");
    }
}
