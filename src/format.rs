//! Reply text shaping.
//!
//! Backend replies use lightweight markdown-ish conventions (`**bold**`,
//! `Q1:` question labels, `Label:` line headings, `# headings`). The log
//! shows them as inline HTML markup; speech gets the plain semantic text.

/// Longest run of text before a colon that still counts as a line heading.
const MAX_LABEL_CHARS: usize = 40;

/// Convert a raw reply into display markup.
///
/// Raw HTML in the reply is escaped; only markup produced here is live.
pub fn format_for_display(raw: &str) -> String {
    raw.lines()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Convert a raw reply (or display text) into the text handed to speech
/// synthesis: markup tags and emphasis markers removed, line breaks folded
/// into single spaces.
pub fn speakable_text(raw: &str) -> String {
    let without_tags = strip_tags(raw);
    let mut out = String::with_capacity(without_tags.len());
    for line in without_tags.lines() {
        let line = line.trim_start();
        let line = line.trim_start_matches('#');
        for ch in line.chars() {
            match ch {
                '*' | '`' => {}
                _ => out.push(ch),
            }
        }
        out.push(' ');
    }
    let out = out.replace("__", "");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_line(line: &str) -> String {
    let trimmed = line.trim_start();
    if let Some(heading) = markdown_heading(trimmed) {
        return format!("<strong>{}</strong>", bold_spans(&escape_html(heading)));
    }

    let escaped = escape_html(line);
    let (label, rest) = match split_label(&escaped) {
        Some((label, rest)) => (Some(label), rest),
        None => (None, escaped.as_str()),
    };

    let body = question_labels(&bold_spans(rest));
    match label {
        Some(label) => format!("<strong>{label}:</strong>{body}"),
        None => body,
    }
}

/// `# Title` / `## Title` → `Title`.
fn markdown_heading(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim();
    (!title.is_empty()).then_some(title)
}

/// Detect a leading `Label:` heading. Lines that already carry emphasis,
/// times (`10:30`), URLs and question labels are left alone.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let label = &line[..colon];
    let after = &line[colon + 1..];

    if label.trim().is_empty() || label.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    if label.contains(['*', '<', '&', '/', '.', '?', '!']) {
        return None;
    }
    if !(after.is_empty() || after.starts_with(char::is_whitespace)) {
        return None;
    }
    if label.split_whitespace().last().is_some_and(is_question_label) {
        return None;
    }
    Some((label, after))
}

fn is_question_label(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('Q') && {
        let digits: String = chars.collect();
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    }
}

/// `**text**` → `<strong>text</strong>`; an unmatched `**` stays literal.
fn bold_spans(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("**") else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str("<strong>");
        out.push_str(&after_open[..end]);
        out.push_str("</strong>");
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

/// `Q<n>:` → `<strong>Q<n>:</strong>`, on a fresh line unless already at
/// the start of one.
fn question_labels(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'Q' && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric()) {
            let digits = bytes[i + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let colon = i + 1 + digits;
            if digits > 0 && bytes.get(colon) == Some(&b':') {
                out.push_str(&text[copied..i]);
                if !text[..i].trim().is_empty() {
                    out.push_str("<br>");
                }
                out.push_str("<strong>");
                out.push_str(&text[i..=colon]);
                out.push_str("</strong>");
                i = colon + 1;
                copied = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Replace `<...>` tags with a space so adjacent words do not fuse.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match (ch, in_tag) {
            ('<', false) => in_tag = true,
            ('>', true) => {
                in_tag = false;
                out.push(' ');
            }
            (_, true) => {}
            (c, false) => out.push(c),
        }
    }
    out
}
