//! Journal text may carry a little formatting markup; everything that can run
//! script is removed.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Tags kept (without attributes).
const ALLOWED_TAGS: &[&str] = &[
    "b",
    "i",
    "em",
    "strong",
    "u",
    "p",
    "br",
    "ul",
    "ol",
    "li",
    "blockquote",
];

lazy_static! {
    static ref DANGEROUS_BLOCK: Regex = Regex::new(
        r"(?is)<\s*(script|style|iframe|object|embed|template)\b[^>]*>.*?<\s*/\s*(script|style|iframe|object|embed|template)\s*>"
    )
    .expect("valid dangerous-block regex");
    static ref DANGEROUS_TAG: Regex =
        Regex::new(r"(?i)<\s*/?\s*(script|style|iframe|object|embed|template)\b[^>]*>")
            .expect("valid dangerous-tag regex");
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?(-->|$)").expect("valid comment regex");
    static ref TAG: Regex =
        Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("valid tag regex");
    static ref SCRIPT_URL: Regex =
        Regex::new(r"(?i)(javascript|vbscript)\s*:").expect("valid script-url regex");
}

pub fn sanitize_html(input: &str) -> String {
    // Dropping a tag can splice its neighbours into a new one, so repeat until
    // a pass changes nothing. Every changing pass shortens the text or only
    // normalizes kept tags, so this terminates.
    let mut text = input.to_string();
    loop {
        let next = sanitize_pass(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text.trim().to_string()
}

fn sanitize_pass(input: &str) -> String {
    let text = DANGEROUS_BLOCK.replace_all(input, "");
    let text = DANGEROUS_TAG.replace_all(&text, "");
    let text = COMMENT.replace_all(&text, "");
    let text = TAG.replace_all(&text, |caps: &Captures| {
        let name = caps[2].to_ascii_lowercase();
        if ALLOWED_TAGS.contains(&name.as_str()) {
            format!("<{}{}>", &caps[1], name)
        } else {
            String::new()
        }
    });
    SCRIPT_URL.replace_all(&text, "").into_owned()
}
