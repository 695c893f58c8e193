/// Message rendering: markup stripping and soft line wrapping
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width used for every delivered message
pub const WRAP_WIDTH: usize = 425;

/// When markup is removed from status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripPolicy {
    Always,
    /// Strip only for destinations that do not render markup themselves
    #[default]
    Auto,
    Never,
}

impl StripPolicy {
    pub fn should_strip(self, destination_renders_markup: bool) -> bool {
        match self {
            StripPolicy::Always => true,
            StripPolicy::Auto => !destination_renders_markup,
            StripPolicy::Never => false,
        }
    }
}

impl FromStr for StripPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(StripPolicy::Always),
            "auto" | "true" | "on" => Ok(StripPolicy::Auto),
            "never" | "false" | "off" => Ok(StripPolicy::Never),
            other => Err(format!("unknown strip_html policy: {}", other)),
        }
    }
}

impl fmt::Display for StripPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StripPolicy::Always => "always",
            StripPolicy::Auto => "auto",
            StripPolicy::Never => "never",
        };
        f.write_str(s)
    }
}

/// Strip (per policy) and wrap a status text for delivery
pub fn format_message(raw: &str, policy: StripPolicy, destination_renders_markup: bool) -> String {
    let text = if policy.should_strip(destination_renders_markup) {
        strip_html(raw)
    } else {
        raw.to_string()
    };
    word_wrap(&text, WRAP_WIDTH)
}

/// Remove tags and decode the common entities
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' if !opens_tag(rest) => {
                out.push('<');
                rest = &rest[1..];
            }
            '<' => match rest.find('>') {
                Some(end) => {
                    let tag = rest[1..end].trim().trim_start_matches('/').to_ascii_lowercase();
                    let tag_name = tag
                        .split(|ch: char| ch.is_whitespace() || ch == '/')
                        .next()
                        .unwrap_or("");
                    if tag_name == "br" {
                        out.push('\n');
                    }
                    rest = &rest[end + 1..];
                }
                // unterminated, keep literally
                None => {
                    out.push_str(rest);
                    rest = "";
                }
            },
            '&' => match decode_entity(rest) {
                Some((decoded, consumed)) => {
                    out.push(decoded);
                    rest = &rest[consumed..];
                }
                None => {
                    out.push('&');
                    rest = &rest[1..];
                }
            },
            _ => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    out
}

/// A tag starts with `<` followed by a letter or `/`; anything else is text
fn opens_tag(s: &str) -> bool {
    matches!(s.as_bytes().get(1), Some(b) if b.is_ascii_alphabetic() || *b == b'/')
}

/// Decode an entity at the start of `s`; returns the char and bytes consumed
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let end = s.find(';')?;
    // entities are short; anything longer is plain text with a stray '&'
    if end > 10 {
        return None;
    }
    let name = &s[1..end];
    let decoded = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)?
        }
    };
    Some((decoded, end + 1))
}

/// Soft-wrap lines longer than `width` characters
///
/// Breaks at the last whitespace within the width, or hard-breaks when a
/// line has none. Existing newlines are kept.
pub fn word_wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + text.len() / width);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut chars: Vec<char> = line.chars().collect();
        while chars.len() > width {
            let split = chars[..=width]
                .iter()
                .rposition(|c| c.is_whitespace())
                .filter(|&p| p > 0);
            match split {
                Some(p) => {
                    out.extend(&chars[..p]);
                    out.push('\n');
                    chars.drain(..=p);
                }
                None => {
                    out.extend(&chars[..width]);
                    out.push('\n');
                    chars.drain(..width);
                }
            }
        }
        out.extend(chars);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_always_ignores_destination() {
        assert_eq!(format_message("<b>hi</b>", StripPolicy::Always, true), "hi");
        assert_eq!(format_message("<b>hi</b>", StripPolicy::Always, false), "hi");
    }

    #[test]
    fn test_strip_auto_depends_on_destination() {
        assert_eq!(format_message("<i>x</i>", StripPolicy::Auto, false), "x");
        assert_eq!(format_message("<i>x</i>", StripPolicy::Auto, true), "<i>x</i>");
    }

    #[test]
    fn test_strip_never_passes_through() {
        assert_eq!(format_message("<b>hi</b> &amp;", StripPolicy::Never, false), "<b>hi</b> &amp;");
    }

    #[test]
    fn test_strip_html_entities_and_breaks() {
        assert_eq!(strip_html("a &lt;3 b&amp;c<br/>d"), "a <3 b&c\nd");
        assert_eq!(strip_html("&#65;&#x42; &bogus; & done"), "AB &bogus; & done");
        assert_eq!(strip_html("<a href=\"http://x\">link</a> ok"), "link ok");
        assert_eq!(strip_html("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_angle_brackets_in_prose_survive() {
        assert_eq!(format_message("I <3 rust -> yes", StripPolicy::Auto, false), "I <3 rust -> yes");
        assert_eq!(strip_html("if a < b and c > d then"), "if a < b and c > d then");
        assert_eq!(strip_html("a &lt;3 <b>b</b>"), "a <3 b");
    }

    #[test]
    fn test_word_wrap_breaks_on_whitespace() {
        assert_eq!(word_wrap("aaa bbb ccc", 7), "aaa bbb\nccc");
        assert_eq!(word_wrap("short", 10), "short");
    }

    #[test]
    fn test_word_wrap_hard_breaks_long_words() {
        assert_eq!(word_wrap("abcdefghij", 4), "abcd\nefgh\nij");
    }

    #[test]
    fn test_word_wrap_keeps_existing_newlines() {
        assert_eq!(word_wrap("ab cd\nef gh", 3), "ab\ncd\nef\ngh");
    }

    #[test]
    fn test_format_wraps_at_fixed_width() {
        let long = "word ".repeat(200);
        let formatted = format_message(&long, StripPolicy::Always, false);
        assert!(formatted.lines().all(|l| l.chars().count() <= WRAP_WIDTH));
        assert!(formatted.lines().count() > 1);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("ALWAYS".parse::<StripPolicy>().unwrap(), StripPolicy::Always);
        assert_eq!("never".parse::<StripPolicy>().unwrap(), StripPolicy::Never);
        assert!("sometimes".parse::<StripPolicy>().is_err());
    }
}
