//! Long-form to core dialect rewriter.
//!
//! The verbose dialect ("declare explicit integer named x equals 0x2A end")
//! is rewritten line by line into the compact core the lexer consumes
//! ("let int x = 0x2A"). Comments start with `;` and run to end of line.
//! Substitutions are whole-word; `module`, `scope`, `range` and `return`
//! pass through unchanged. Line count is preserved.

use std::sync::OnceLock;

use regex::Regex;

fn declare_explicit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bdeclare\s+explicit\s+integer\s+named\s+").expect("valid regex")
    })
}

fn declare_implicit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bdeclare\s+implicit\s+named\s+").expect("valid regex"))
}

fn equals_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bequals\b").expect("valid regex"))
}

fn end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bend\b").expect("valid regex"))
}

fn plus_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bplus\b").expect("valid regex"))
}

/// Rewrite long-form source into the core dialect. Purely textual; the
/// output is what the lexer sees.
pub fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let code = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };

        let mut text = code.to_string();
        let mut long_form = false;
        if declare_explicit_re().is_match(&text) {
            text = declare_explicit_re()
                .replace_all(&text, "let int ")
                .into_owned();
            long_form = true;
        }
        if declare_implicit_re().is_match(&text) {
            text = declare_implicit_re().replace_all(&text, "let ").into_owned();
            long_form = true;
        }
        text = equals_re().replace_all(&text, "=").into_owned();
        // the word `end` is the long-form declaration terminator; it is only
        // dropped on lines that used a declare phrase, so block terminators
        // survive and normalizing core text is a no-op
        if long_form {
            text = end_re().replace_all(&text, "").into_owned();
        }
        text = plus_re().replace_all(&text, "+").into_owned();

        out.push_str(text.trim());
        out.push('\n');
    }
    out
}
