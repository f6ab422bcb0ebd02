//! Plain-text info sheets ("Product: ...", "Version: ...") some vendors ship
//! next to their firmware images.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReport {
    lines: Vec<String>,
}

impl TextReport {
    pub fn from_text(text: &str) -> Self {
        Self { lines: text.lines().map(|l| l.trim_end_matches('\r').to_string()).collect() }
    }

    pub fn line_containing(&self, query: &str) -> Option<&str> {
        self.lines.iter().map(String::as_str).find(|l| l.contains(query))
    }

    /// Value after the first `delim` on the first line containing `query`.
    pub fn value(&self, query: &str, delim: char) -> Option<String> {
        let line = self.line_containing(query)?;
        let (_, value) = line.split_once(delim)?;
        let value = value.trim();
        if value.is_empty() { None } else { Some(value.to_string()) }
    }
}
