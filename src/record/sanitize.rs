use std::sync::OnceLock;

use regex::Regex;

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[^a-zA-Z0-9!?,;.:_+*'#$%&/()@= -]").expect("static regex")
    })
}

/// Drop characters a product name must not carry (trademark signs, zero-width
/// spaces, stray newlines from the rendered DOM).
pub fn strip_disallowed(name: &str) -> String {
    disallowed().replace_all(name, "").trim().to_string()
}
