//! Document type table: file extension → type tag → section strategy.
//!
//! Which files get indexed is decided by the caller's extension allow-list;
//! this table only decides *how* an admitted file is cut into sections.

/// How a document type is cut into candidate sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Markdown header lines.
    Headers,
    /// Declaration lines at brace depth 0.
    Braces,
    /// Zero-indent declaration lines.
    Indentation,
}

pub struct LanguageConfig {
    pub name: &'static str,
    /// Lowercase, without the leading dot.
    pub extensions: &'static [&'static str],
    pub boundary: Boundary,
    /// Trimmed-line prefixes that open a declaration.
    pub decl_prefixes: &'static [&'static str],
    /// Also treat `name(args) {` lines as declarations.
    pub signature_lines: bool,
}

/// Type tag for files no entry claims.
pub const TEXT: &str = "text";

static LANGUAGES: &[LanguageConfig] = &[
    LanguageConfig {
        name: "markdown",
        extensions: &["md", "markdown", "mdx"],
        boundary: Boundary::Headers,
        decl_prefixes: &[],
        signature_lines: false,
    },
    LanguageConfig {
        name: "go",
        extensions: &["go"],
        boundary: Boundary::Braces,
        decl_prefixes: &["func ", "type "],
        signature_lines: false,
    },
    LanguageConfig {
        name: "templ",
        extensions: &["templ"],
        boundary: Boundary::Braces,
        decl_prefixes: &["templ ", "func ", "type ", "css ", "script "],
        signature_lines: false,
    },
    LanguageConfig {
        name: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
        boundary: Boundary::Braces,
        decl_prefixes: &[
            "function ",
            "async function ",
            "class ",
            "export ",
            "const ",
            "let ",
        ],
        signature_lines: true,
    },
    LanguageConfig {
        name: "typescript",
        extensions: &["ts", "tsx", "mts", "cts"],
        boundary: Boundary::Braces,
        decl_prefixes: &[
            "function ",
            "async function ",
            "class ",
            "abstract class ",
            "interface ",
            "type ",
            "enum ",
            "export ",
            "declare ",
            "const ",
            "let ",
        ],
        signature_lines: true,
    },
    LanguageConfig {
        name: "java",
        extensions: &["java"],
        boundary: Boundary::Braces,
        decl_prefixes: &[
            "public ",
            "private ",
            "protected ",
            "class ",
            "interface ",
            "enum ",
            "record ",
            "abstract ",
            "final ",
            "@",
        ],
        signature_lines: true,
    },
    LanguageConfig {
        name: "c",
        extensions: &["c", "h", "cc", "cpp", "hpp"],
        boundary: Boundary::Braces,
        decl_prefixes: &["struct ", "typedef ", "enum ", "union ", "static ", "class ", "namespace "],
        signature_lines: true,
    },
    LanguageConfig {
        name: "rust",
        extensions: &["rs"],
        boundary: Boundary::Braces,
        decl_prefixes: &[
            "fn ",
            "pub ",
            "async fn ",
            "unsafe ",
            "const fn ",
            "impl",
            "struct ",
            "enum ",
            "trait ",
            "mod ",
            "macro_rules!",
            "#[",
        ],
        signature_lines: false,
    },
    LanguageConfig {
        name: "python",
        extensions: &["py", "pyi"],
        boundary: Boundary::Indentation,
        decl_prefixes: &["def ", "async def ", "class ", "@"],
        signature_lines: false,
    },
];

impl LanguageConfig {
    pub fn get_all() -> &'static [LanguageConfig] {
        LANGUAGES
    }

    /// Look up by extension, with or without the leading dot; case-insensitive.
    pub fn get_by_extension(ext: &str) -> Option<&'static LanguageConfig> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        LANGUAGES
            .iter()
            .find(|c| c.extensions.contains(&ext.as_str()))
    }

    pub fn get_by_name(name: &str) -> Option<&'static LanguageConfig> {
        LANGUAGES.iter().find(|c| c.name == name)
    }

    /// Whether a trimmed line opens a declaration in this language.
    #[must_use]
    pub fn is_declaration(&self, trimmed: &str) -> bool {
        if self.decl_prefixes.iter().any(|p| trimmed.starts_with(p)) {
            return true;
        }
        self.signature_lines && looks_like_signature(trimmed)
    }
}

/// Type tag for a relative path, `text` when no entry claims the extension.
#[must_use]
pub fn doc_type_for_path(path: &str) -> &'static str {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(LanguageConfig::get_by_extension)
        .map_or(TEXT, |c| c.name)
}

// `int main(void) {`, `void Foo::bar() const {`; control flow is excluded.
fn looks_like_signature(trimmed: &str) -> bool {
    const CONTROL: &[&str] = &["if", "for", "while", "switch", "catch", "else", "do", "return"];

    let Some(open) = trimmed.find('(') else {
        return false;
    };
    if !trimmed.ends_with('{') || !trimmed[open..].contains(')') {
        return false;
    }
    let head = trimmed[..open].trim_end();
    let first = head.split_whitespace().next().unwrap_or("");
    !head.is_empty() && !CONTROL.contains(&first) && !trimmed.starts_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_for_path() {
        assert_eq!(doc_type_for_path("docs/readme.md"), "markdown");
        assert_eq!(doc_type_for_path("src/App.TSX"), "typescript");
        assert_eq!(doc_type_for_path("main.go"), "go");
        assert_eq!(doc_type_for_path("include/x.h"), "c");
        assert_eq!(doc_type_for_path("notes.txt"), TEXT);
        assert_eq!(doc_type_for_path("Makefile"), TEXT);
    }

    #[test]
    fn test_get_by_extension_accepts_dot() {
        assert_eq!(LanguageConfig::get_by_extension(".py").unwrap().name, "python");
        assert_eq!(LanguageConfig::get_by_extension("rs").unwrap().name, "rust");
        assert!(LanguageConfig::get_by_extension("png").is_none());
    }

    #[test]
    fn test_signature_lines() {
        let c = LanguageConfig::get_by_name("c").unwrap();
        assert!(c.is_declaration("int main(int argc, char **argv) {"));
        assert!(c.is_declaration("static void helper(void)"));
        assert!(!c.is_declaration("if (x > 0) {"));
        assert!(!c.is_declaration("} else if (y) {"));
        assert!(!c.is_declaration("x = compute(1);"));
    }
}
