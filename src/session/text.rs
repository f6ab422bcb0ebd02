use scraper::{ElementRef, Node};

// Elements that start and end a rendered line.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const HIDDEN_TAGS: &[&str] = &["head", "noscript", "script", "style", "template"];

/// Render an element's text roughly the way a browser's `innerText` does:
/// block boundaries and `<br>` become newlines, ASCII whitespace collapses,
/// non-breaking spaces survive as plain spaces.
pub fn inner_text(el: ElementRef<'_>) -> String {
    let mut lines: Vec<String> = vec![String::new()];
    walk(el, &mut lines);
    lines
        .iter()
        .map(|l| collapse_ascii_ws(l).replace('\u{a0}', " "))
        .map(|l| l.trim_matches(' ').to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(el: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => {
                if let Some(last) = lines.last_mut() { last.push_str(t); }
            }
            Node::Element(e) => {
                let name = e.name();
                if name == "br" { break_line(lines); continue; }
                if HIDDEN_TAGS.contains(&name) { continue; }
                let block = BLOCK_TAGS.contains(&name);
                if block { break_line(lines); }
                if let Some(child_el) = ElementRef::wrap(child) { walk(child_el, lines); }
                if block { break_line(lines); }
            }
            _ => {}
        }
    }
}

fn break_line(lines: &mut Vec<String>) {
    lines.push(String::new());
}

fn collapse_ascii_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_ascii_whitespace() {
            if !in_ws { out.push(' '); in_ws = true; }
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn render(html: &str, sel: &str) -> String {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(sel).unwrap();
        inner_text(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn breaks_on_br_and_blocks() {
        let got = render(
            "<div id='x'>Ver. 1.1.10<br>Latest Date:&nbsp; 03/04/2022<p>Download</p></div>",
            "#x",
        );
        assert_eq!(got, "Ver. 1.1.10\nLatest Date:  03/04/2022\nDownload");
    }

    #[test]
    fn collapses_source_whitespace_and_skips_scripts() {
        let got = render(
            "<span id='x'>  Archer\n    C7 <script>var a = 1;</script><b>v5</b>  </span>",
            "#x",
        );
        assert_eq!(got, "Archer C7 v5");
    }
}
