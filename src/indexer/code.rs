//! Declaration-boundary sections for source code.
//!
//! Brace languages track `{`/`}` depth: a section starts at a declaration
//! line seen at depth 0 and ends once depth returns to 0 after opening.
//! Python-like languages start a section at every zero-indent declaration,
//! keeping decorators attached to the definition below them.
//!
//! Braces inside strings and comments are counted too; the split is a
//! heuristic and every section is re-bounded by the chunker afterwards.
use super::languages::{Boundary, LanguageConfig};
use super::markdown::split_by_headers;
use super::split::split_by_paragraphs;

/// Paragraph target used when a code file yields fewer than two sections.
pub const CODE_FALLBACK_SIZE: usize = 2000;

/// Cuts one document into candidate sections.
pub trait SectionSplitter {
    fn split_sections(&self, content: &str, max_chunk_size: usize) -> Vec<String>;
}

impl SectionSplitter for LanguageConfig {
    fn split_sections(&self, content: &str, _max_chunk_size: usize) -> Vec<String> {
        let sections = match self.boundary {
            Boundary::Headers => return split_by_headers(content),
            Boundary::Braces => split_by_braces(content, self),
            Boundary::Indentation => split_by_indentation(content, self),
        };

        if sections.len() <= 1 {
            return split_by_paragraphs(content, CODE_FALLBACK_SIZE);
        }
        sections
    }
}

/// Fallback for untyped documents.
pub struct Paragraphs;

impl SectionSplitter for Paragraphs {
    fn split_sections(&self, content: &str, max_chunk_size: usize) -> Vec<String> {
        split_by_paragraphs(content, max_chunk_size)
    }
}

fn flush(sections: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sections.push(trimmed.to_string());
    }
    current.clear();
}

fn split_by_braces(content: &str, lang: &LanguageConfig) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut in_unit = false;
    let mut opened = false;

    for line in content.lines() {
        if !in_unit && depth == 0 && lang.is_declaration(line.trim()) {
            flush(&mut sections, &mut current);
            in_unit = true;
            opened = false;
        }

        current.push_str(line);
        current.push('\n');

        let opens = line.matches('{').count();
        let closes = line.matches('}').count();
        if in_unit && opens > 0 {
            opened = true;
        }
        // Stray closers never drive depth negative
        depth = (depth + opens).saturating_sub(closes);

        if in_unit && opened && depth == 0 {
            flush(&mut sections, &mut current);
            in_unit = false;
        }
    }

    flush(&mut sections, &mut current);
    sections
}

fn split_by_indentation(content: &str, lang: &LanguageConfig) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut in_unit = false;
    let mut after_decorator = false;

    for line in content.lines() {
        let top_level = !line.starts_with([' ', '\t']) && !line.trim().is_empty();

        if top_level && !line.starts_with('#') {
            if lang.is_declaration(line) {
                // A def directly under its decorator stays in the same section
                if !after_decorator {
                    flush(&mut sections, &mut current);
                }
                in_unit = true;
            } else if in_unit {
                flush(&mut sections, &mut current);
                in_unit = false;
            }
            after_decorator = line.starts_with('@');
        }

        current.push_str(line);
        current.push('\n');
    }

    flush(&mut sections, &mut current);
    sections
}
