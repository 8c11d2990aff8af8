//! Test utilities for rendered HTML
//!
//! This module provides helpers for comparing engine output in tests,
//! including line-ending normalization and the fixture tree location.

use std::path::{Path, PathBuf};

/// Normalize rendered HTML for comparison
///
/// This function:
/// - Removes carriage returns, so fixtures checked out with CRLF endings compare equal
/// - Trims leading and trailing whitespace
///
/// # Examples
///
/// ```
/// use handlebars_views::test_utils::normalize_html;
///
/// assert_eq!(normalize_html("<body>\r\n<p>x</p>\r\n</body>\n"), "<body>\n<p>x</p>\n</body>");
/// ```
pub fn normalize_html(html: &str) -> String {
    html.replace('\r', "").trim().to_string()
}

/// Assert that two HTML strings are equal after normalization
///
/// # Examples
///
/// ```
/// use handlebars_views::assert_html_eq;
///
/// assert_html_eq!("<p>Text</p>\r\n", "<p>Text</p>");
/// ```
#[macro_export]
macro_rules! assert_html_eq {
    ($left:expr, $right:expr) => {
        {
            let left_normalized = $crate::test_utils::normalize_html(&$left);
            let right_normalized = $crate::test_utils::normalize_html(&$right);

            if left_normalized != right_normalized {
                panic!(
                    "HTML assertion failed\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}",
                    left_normalized,
                    right_normalized,
                );
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        {
            let left_normalized = $crate::test_utils::normalize_html(&$left);
            let right_normalized = $crate::test_utils::normalize_html(&$right);

            if left_normalized != right_normalized {
                panic!(
                    "HTML assertion failed: {}\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}",
                    format!($($arg)*),
                    left_normalized,
                    right_normalized,
                );
            }
        }
    };
}

/// Compare two HTML strings and return whether they're equivalent
///
/// Like `assert_html_eq!` but returns a bool instead of panicking
pub fn html_eq(html1: &str, html2: &str) -> bool {
    normalize_html(html1) == normalize_html(html2)
}

/// Absolute path of a file under `tests/fixtures`
pub fn fixture_path(file_path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(file_path)
}
