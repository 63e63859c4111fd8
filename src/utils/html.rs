//! HTML utility functions.
//!
//! Provides common HTML processing functions:
//! - `escape()` - HTML entity escaping
//! - `inject_before_end_head()` - textual snippet injection
//! - `ansi_to_html()` - terminal error output for browser overlays

use std::borrow::Cow;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters that require HTML escaping.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape HTML special characters in text content.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
///
/// # Example
/// ```ignore
/// assert_eq!(escape("<script>"), "&lt;script&gt;");
/// assert_eq!(escape("hello"), "hello"); // No allocation
/// ```
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(ESCAPE_CHARS) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

// =============================================================================
// Snippet Injection
// =============================================================================

/// Insert a snippet immediately before `</head>`.
///
/// The document is treated as text, never parsed. Falls back to `</body>`
/// when no head is present, and to appending when neither tag exists.
pub fn inject_before_end_head(html: &str, snippet: &str) -> String {
    for anchor in ["</head>", "</body>"] {
        if let Some(pos) = html.find(anchor) {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..pos]);
            out.push_str(snippet);
            out.push_str(&html[pos..]);
            return out;
        }
    }
    let mut out = String::with_capacity(html.len() + snippet.len());
    out.push_str(html);
    out.push_str(snippet);
    out
}

// =============================================================================
// ANSI to HTML Conversion
// =============================================================================

/// Convert ANSI escape sequences to HTML spans.
///
/// Converts color codes like `\x1b[31m` (red) to `<span style="color:...">`.
/// Used for displaying error messages with syntax highlighting in browser overlays.
pub fn ansi_to_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    let mut chars = s.chars().peekable();
    let mut open_spans = 0;

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next(); // consume '['
                // Collect the code number(s)
                let mut code = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == ';' {
                        code.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                // Consume the terminator (usually 'm')
                if chars.peek() == Some(&'m') {
                    chars.next();
                }

                // Convert ANSI code to HTML
                if let Some(html) = ansi_code_to_html(&code, &mut open_spans) {
                    result.push_str(&html);
                }
            }
        } else if c == '<' {
            result.push_str("&lt;");
        } else if c == '>' {
            result.push_str("&gt;");
        } else if c == '&' {
            result.push_str("&amp;");
        } else {
            result.push(c);
        }
    }

    // Close any remaining spans
    for _ in 0..open_spans {
        result.push_str("</span>");
    }

    result
}

fn ansi_code_to_html(code: &str, open_spans: &mut i32) -> Option<String> {
    // Handle multiple codes separated by ';'
    let codes: Vec<&str> = code.split(';').collect();

    for c in codes {
        match c {
            "0" => {
                // Reset - close all open spans
                let closes = "</span>".repeat(*open_spans as usize);
                *open_spans = 0;
                return Some(closes);
            }
            "1" => {
                *open_spans += 1;
                return Some("<span style=\"font-weight:bold\">".to_string());
            }
            "31" => {
                *open_spans += 1;
                return Some("<span style=\"color:#ff5555\">".to_string()); // Red
            }
            "32" => {
                *open_spans += 1;
                return Some("<span style=\"color:#50fa7b\">".to_string()); // Green
            }
            "33" => {
                *open_spans += 1;
                return Some("<span style=\"color:#f1fa8c\">".to_string()); // Yellow
            }
            "34" => {
                *open_spans += 1;
                return Some("<span style=\"color:#8be9fd\">".to_string()); // Blue/Cyan
            }
            "35" => {
                *open_spans += 1;
                return Some("<span style=\"color:#ff79c6\">".to_string()); // Magenta
            }
            "36" => {
                *open_spans += 1;
                return Some("<span style=\"color:#8be9fd\">".to_string()); // Cyan
            }
            "90" | "37" => {
                *open_spans += 1;
                return Some("<span style=\"color:#6272a4\">".to_string()); // Gray
            }
            _ => {}
        }
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
