//! Cleanup applied to chat replies before they enter the conversation

use regex::Regex;
use std::sync::OnceLock;

/// Literal substitutions, most specific phrase first so it wins over the bare token.
const BRAND_REPLACEMENTS: [(&str, &str); 3] = [
    ("I'm DeepSeek-R1,", "I'm Nector AI,"),
    ("created by DeepSeek", "created by Jawad Hameed"),
    ("DeepSeek", "Nector"),
];

fn boxed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\boxed\s*\{([^}]*)\}").expect("valid boxed regex"))
}

/// Unwrap `\boxed{..}` markers and turn lone newlines into paragraph breaks.
pub fn format_reply(text: &str) -> String {
    expand_single_newlines(&boxed_pattern().replace_all(text, "$1"))
}

/// Doubles each newline that is not already part of a run of newlines.
fn expand_single_newlines(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);

    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if c != '\n' {
            continue;
        }
        let prev_newline = i > 0 && chars[i - 1] == '\n';
        let next_newline = chars.get(i + 1) == Some(&'\n');
        if !prev_newline && !next_newline {
            out.push('\n');
        }
    }

    out
}

/// Swap the upstream model's self-identification for ours.
pub fn replace_brand(text: &str) -> String {
    BRAND_REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Full post-processing pipeline for a chat reply. Never applied to image results.
pub fn process_reply(text: &str) -> String {
    replace_brand(&format_reply(text))
}
