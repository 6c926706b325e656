//! Text helpers for backend output.
//!
//! Backend CLIs write colourised, cursor-moving output. Everything that ends up
//! in a run artifact goes through [`strip_ansi_codes`] first, and everything that
//! ends up in a log or preview goes through [`truncate`].

/// Strip ANSI escape sequences from a string.
///
/// Handles CSI sequences (`ESC [ ... <final>`) and OSC sequences
/// (`ESC ] ... BEL` or `ESC ] ... ESC \`), which together cover colours,
/// cursor movement and terminal titles emitted by interactive CLIs.
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // CSI final bytes are in the 0x40..=0x7E range
                while let Some(next) = chars.next() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(next) = chars.next() {
                    if next == '\x07' {
                        break;
                    }
                    if next == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            // Two-character escapes such as `ESC =` or `ESC >`
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }

    result
}

/// Truncate `s` to at most `max_bytes` bytes, appending `...` when cut.
///
/// The cut point is moved back to the nearest UTF-8 character boundary.
pub fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &s[..end])
}
