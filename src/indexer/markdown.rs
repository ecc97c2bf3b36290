//! Markdown sections: one section per header, fenced code blocks respected.

/// Splits markdown into runs that each start at a header (or the file start).
pub fn split_by_headers(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut fence: Option<&str> = None;

    for line in content.lines() {
        let trimmed = line.trim_start();

        match fence {
            Some(marker) if trimmed.starts_with(marker) => fence = None,
            Some(_) => {}
            None if trimmed.starts_with("```") => fence = Some("```"),
            None if trimmed.starts_with("~~~") => fence = Some("~~~"),
            None if is_header(trimmed) => flush(&mut sections, &mut current),
            None => {}
        }

        current.push_str(line);
        current.push('\n');
    }

    flush(&mut sections, &mut current);
    sections
}

fn flush(sections: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sections.push(trimmed.to_string());
    }
    current.clear();
}

/// ATX header: 1-6 `#` followed by whitespace or end of line.
fn is_header(trimmed: &str) -> bool {
    let hashes = trimmed.bytes().take_while(|b| *b == b'#').count();
    (1..=6).contains(&hashes) && trimmed[hashes..].chars().next().is_none_or(char::is_whitespace)
}
