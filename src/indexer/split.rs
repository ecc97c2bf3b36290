//! Size-bounded text splitting shared by every chunking strategy.
//!
//! All sizes are in bytes; cuts always land on `char` boundaries.

/// Splits text into chunks of at most `max_size` bytes along blank lines.
///
/// A single paragraph larger than `max_size` is cut further, preferring
/// sentence boundaries.
pub fn split_by_paragraphs(content: &str, max_size: usize) -> Vec<String> {
    if content.len() <= max_size {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for para in content.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        // If adding this paragraph exceeds chunk size, start new chunk
        if !current_chunk.is_empty() && current_chunk.len() + para.len() + 2 > max_size {
            chunks.push(std::mem::take(&mut current_chunk));
        }

        if para.len() > max_size {
            if !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
            }
            chunks.extend(split_large_paragraph(para, max_size));
        } else {
            if !current_chunk.is_empty() {
                current_chunk.push_str("\n\n");
            }
            current_chunk.push_str(para);
        }
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Splits a large paragraph into smaller chunks, preferring sentence boundaries.
fn split_large_paragraph(para: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = para.trim();

    while rest.len() > max_size {
        let limit = floor_char_boundary(rest, max_size);

        // Search backwards from the limit to half of it for a sentence end
        let min_search = limit / 2;
        let cut = rest[..limit]
            .char_indices()
            .rev()
            .take_while(|(i, _)| *i >= min_search)
            .find(|(_, c)| matches!(c, '.' | '!' | '?' | '\n' | '。'))
            .map_or(limit, |(i, c)| i + c.len_utf8());

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

/// Splits content along line breaks into pieces of at most `max_size` bytes.
///
/// Last resort for oversized units; a single line longer than `max_size`
/// is hard-cut.
pub fn split_by_lines(content: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for line in content.lines() {
        if !current_chunk.is_empty() && current_chunk.len() + line.len() + 1 > max_size {
            chunks.push(std::mem::take(&mut current_chunk));
        }

        let mut line = line;
        while line.len() + 1 > max_size && line.len() > 1 {
            let cut = floor_char_boundary(line, max_size.saturating_sub(1).max(1));
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }

        current_chunk.push_str(line);
        current_chunk.push('\n');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Largest char boundary `<= index`, never 0 for non-empty text.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    if i == 0 {
        // Cut after the first char so progress is guaranteed
        s.chars().next().map_or(0, char::len_utf8)
    } else {
        i
    }
}
