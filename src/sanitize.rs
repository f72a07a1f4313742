use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<(/?)([A-Za-z][A-Za-z0-9:-]*)(?:[^>"']|"[^"]*"|'[^']*')*>"#)
        .expect("tag pattern compiles")
});

/// Elements whose content is dropped together with the tags.
const STRIPPED_CONTENT: &[&str] = &[
    "script", "style", "iframe", "noscript", "noembed", "noframes", "template", "title", "xmp",
    "object", "svg", "math",
];

/// Removes every tag, comment and script-bearing element from free text and trims the result.
///
/// Text between ordinary tags is kept as-is. Input without markup comes back only trimmed,
/// so comparisons like `3 < 4` survive. Once markup was removed, stray `<` and `>` go too:
/// the output then never contains a tag delimiter and sanitizing twice yields the same string.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut saw_markup = false;
    let mut rest = raw;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match skip_markup(rest) {
            Some(after) => {
                saw_markup = true;
                rest = after;
            }
            None => {
                out.push('<');
                rest = &rest[1..];
            }
        }
    }

    if !saw_markup {
        return raw.trim().to_string();
    }
    out.push_str(rest);
    out.retain(|c| c != '<' && c != '>');
    out.trim().to_string()
}

/// `rest` starts with `<`. Returns what follows the markup construct opened there, or `None`
/// when the `<` is plain text.
fn skip_markup(rest: &str) -> Option<&str> {
    if let Some(body) = rest.strip_prefix("<!--") {
        return Some(body.find("-->").map_or("", |end| &body[end + 3..]));
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
        return Some(rest.find('>').map_or("", |end| &rest[end + 1..]));
    }

    if let Some(caps) = TAG.captures(rest) {
        let after = &rest[caps[0].len()..];
        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        if !closing && STRIPPED_CONTENT.contains(&name.as_str()) {
            return Some(skip_element_content(after, &name));
        }
        return Some(after);
    }

    // An unterminated tag swallows the rest of the input, as an HTML parser would.
    opens_tag(rest).then_some("")
}

fn opens_tag(rest: &str) -> bool {
    let mut chars = rest[1..].chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => true,
        Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        _ => false,
    }
}

fn skip_element_content<'a>(rest: &'a str, name: &str) -> &'a str {
    let lowered = rest.to_ascii_lowercase();
    let needle = format!("</{name}");
    match lowered.find(&needle) {
        Some(pos) => {
            let tail = &rest[pos + needle.len()..];
            tail.find('>').map_or("", |end| &tail[end + 1..])
        }
        None => "",
    }
}
