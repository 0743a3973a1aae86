//! Frontmatter codec for markdown documents.
//!
//! A document is laid out as
//!
//! ```text
//! ---
//! title: "About"
//! draft: true
//! tags:
//!   - "intro"
//! ---
//! Body text...
//! ```
//!
//! The header understands the small YAML subset used by site content:
//! quoted and bare strings, non-negative integers, booleans, and string
//! lists written either inline (`[a, b]`) or as indented dash items.
//! Lines that fit none of these shapes are skipped, so a malformed header
//! never fails to parse.
//!
//! Serialization always writes lists in block form and always quotes
//! strings, so round-trips preserve values but not necessarily text.

mod value;

pub use value::{MetaValue, Metadata};

use chrono::NaiveDate;

const DELIMITER: &str = "---";

/// A document split into its metadata header and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub metadata: Metadata,
    pub body: String,
}

/// Splits a raw document into metadata and body.
///
/// Without a leading `---` header block the whole input is the body.
pub fn parse_document(raw: &str) -> ParsedDocument {
    match split_header(raw) {
        Some((header, body)) => ParsedDocument {
            metadata: parse_header(header),
            body: body.to_string(),
        },
        None => ParsedDocument {
            metadata: Metadata::new(),
            body: raw.to_string(),
        },
    }
}

/// Renders metadata and body back into a document.
pub fn serialize_document(metadata: &Metadata, body: &str) -> String {
    format!("{DELIMITER}\n{}{DELIMITER}\n{}", serialize_header(metadata), body)
}

/// Parses the lines between the delimiters.
pub fn parse_header(header: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let mut current_key: Option<String> = None;

    for raw_line in header.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(item) = list_item(line) {
            if let Some(MetaValue::List(items)) =
                current_key.as_deref().and_then(|k| metadata.get_mut(k))
            {
                items.push(unquote(item));
            }
            continue;
        }

        if let Some((key, value)) = key_value(line) {
            current_key = Some(key.to_string());
            metadata.insert(key, parse_value(value));
        }
    }

    metadata
}

/// Renders metadata as header lines, each terminated by a newline.
pub fn serialize_header(metadata: &Metadata) -> String {
    let mut lines = Vec::with_capacity(metadata.len());

    for (key, value) in metadata.iter() {
        match value {
            MetaValue::List(items) if items.is_empty() => lines.push(format!("{key}: []")),
            MetaValue::List(items) => {
                lines.push(format!("{key}:"));
                for item in items {
                    lines.push(format!("  - \"{}\"", escape(item)));
                }
            }
            MetaValue::String(s) => lines.push(format!("{key}: \"{}\"", escape(s))),
            MetaValue::Bool(b) => lines.push(format!("{key}: {b}")),
            MetaValue::Number(n) => lines.push(format!("{key}: {n}")),
        }
    }

    lines.join("\n") + "\n"
}

/// Returns true if `key` survives a serialize/parse round-trip.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(is_word_char)
}

/// Metadata for a new page.
pub fn default_page_metadata() -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("title", "");
    meta.insert("description", "");
    meta.insert("section", "");
    meta.insert("template", "default");
    meta.insert("draft", true);
    meta.insert("tags", Vec::<String>::new());
    meta
}

/// Metadata for a new post dated `date`.
pub fn default_post_metadata(date: NaiveDate) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("title", "");
    meta.insert("description", "");
    meta.insert("date", date.format("%Y-%m-%d").to_string());
    meta.insert("author", "");
    meta.insert("tags", Vec::<String>::new());
    meta.insert("draft", true);
    meta
}

/// Display title: the `title` field, or a humanized file name.
pub fn document_title(metadata: &Metadata, file_name: &str) -> String {
    if let Some(title) = metadata.get("title").and_then(MetaValue::as_str) {
        if !title.is_empty() {
            return title.to_string();
        }
    }

    let stem = file_name
        .strip_suffix(".mdx")
        .or_else(|| file_name.strip_suffix(".md"))
        .unwrap_or(file_name);
    stem.replace(['-', '_'], " ")
}

fn split_header(raw: &str) -> Option<(&str, &str)> {
    let rest = raw
        .strip_prefix("---\r\n")
        .or_else(|| raw.strip_prefix("---\n"))?;

    // The header ends at the first line that is exactly the delimiter.
    let mut from = 0;
    while let Some(offset) = rest[from..].find("\n---") {
        let at = from + offset;
        let after = &rest[at + 4..];
        let body = after
            .strip_prefix("\r\n")
            .or_else(|| after.strip_prefix('\n'));
        if let Some(body) = body {
            let header = &rest[..at];
            return Some((header.strip_suffix('\r').unwrap_or(header), body));
        }
        from = at + 1;
    }

    None
}

/// Matches `<whitespace>-<whitespace><item>`.
fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.len() == line.len() {
        return None;
    }
    let rest = trimmed.strip_prefix('-')?;
    let item = rest.trim_start();
    if item.len() == rest.len() {
        return None;
    }
    Some(item.trim_end())
}

/// Matches `<word>: <value>` starting at column zero.
fn key_value(line: &str) -> Option<(&str, &str)> {
    let key_len = line
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    if key_len == 0 {
        return None;
    }

    let (key, rest) = line.split_at(key_len);
    let value = rest.trim_start().strip_prefix(':')?;
    Some((key, value.trim()))
}

/// Parses one header value the way it would be read after `key:`.
pub fn parse_value(value: &str) -> MetaValue {
    if value.is_empty() || value == "[]" {
        return MetaValue::List(Vec::new());
    }

    if value.len() >= 2 && value.starts_with('[') && value.ends_with(']') {
        let items = value[1..value.len() - 1]
            .split(',')
            .map(|item| unquote(item.trim()))
            .filter(|item| !item.is_empty())
            .collect();
        return MetaValue::List(items);
    }

    match value {
        "true" => return MetaValue::Bool(true),
        "false" => return MetaValue::Bool(false),
        _ => {}
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = value.parse::<u64>() {
            return MetaValue::Number(n);
        }
    }

    MetaValue::String(unquote(value))
}

/// Strips a matching pair of surrounding quotes.
///
/// Double-quoted text is unescaped; single-quoted text is taken literally.
fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if value.starts_with('"') && value.ends_with('"') {
            return unescape(&value[1..value.len() - 1]);
        }
        if value.starts_with('\'') && value.ends_with('\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("title", "About");
        meta.insert("draft", true);
        meta.insert("order", 12u64);
        meta.insert("tags", vec!["intro", "company"]);
        meta
    }

    #[test]
    fn test_parse_document_with_header() {
        let raw = "---\ntitle: \"About\"\ndraft: true\n---\nHello";
        let doc = parse_document(raw);

        assert_eq!(doc.body, "Hello");
        assert_eq!(doc.metadata.get("title"), Some(&MetaValue::from("About")));
        assert_eq!(doc.metadata.get("draft"), Some(&MetaValue::Bool(true)));
    }

    #[test]
    fn test_no_header_is_all_body() {
        let raw = "# Just markdown\n\n---\nnot a header";
        let doc = parse_document(raw);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, raw);
    }

    #[test]
    fn test_unterminated_header_is_all_body() {
        let raw = "---\ntitle: x\n";
        let doc = parse_document(raw);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, raw);
    }

    #[test]
    fn test_crlf_document() {
        let raw = "---\r\ntitle: \"Hi\"\r\ncount: 4\r\n---\r\nBody\r\n";
        let doc = parse_document(raw);
        assert_eq!(doc.metadata.get("title"), Some(&MetaValue::from("Hi")));
        assert_eq!(doc.metadata.get("count"), Some(&MetaValue::Number(4)));
        assert_eq!(doc.body, "Body\r\n");
    }

    #[test]
    fn test_header_value_precedence() {
        let header = "\
inline: [a, \"b\", 'c']
empty:
bracket: []
yes: true
no: false
count: 42
double: \"quoted\"
single: 'quoted'
bare: plain text here";
        let meta = parse_header(header);

        assert_eq!(meta.get("inline"), Some(&MetaValue::from(vec!["a", "b", "c"])));
        assert_eq!(meta.get("empty"), Some(&MetaValue::List(vec![])));
        assert_eq!(meta.get("bracket"), Some(&MetaValue::List(vec![])));
        assert_eq!(meta.get("yes"), Some(&MetaValue::Bool(true)));
        assert_eq!(meta.get("no"), Some(&MetaValue::Bool(false)));
        assert_eq!(meta.get("count"), Some(&MetaValue::Number(42)));
        assert_eq!(meta.get("double"), Some(&MetaValue::from("quoted")));
        assert_eq!(meta.get("single"), Some(&MetaValue::from("quoted")));
        assert_eq!(meta.get("bare"), Some(&MetaValue::from("plain text here")));
    }

    #[test]
    fn test_block_list_continuation() {
        let header = "tags:\n  - \"one\"\n  - two\n    - 'three'\ntitle: x";
        let meta = parse_header(header);
        assert_eq!(meta.get("tags"), Some(&MetaValue::from(vec!["one", "two", "three"])));
        assert_eq!(meta.get("title"), Some(&MetaValue::from("x")));
    }

    #[test]
    fn test_continuation_after_scalar_is_ignored() {
        let meta = parse_header("title: x\n  - stray");
        assert_eq!(meta.get("title"), Some(&MetaValue::from("x")));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let meta = parse_header("  just indented\n: no key\n-bad\ntitle: ok\n###");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("title"), Some(&MetaValue::from("ok")));
    }

    #[test]
    fn test_signed_and_huge_numbers_stay_strings() {
        let meta = parse_header("neg: -5\nhuge: 99999999999999999999999");
        assert_eq!(meta.get("neg"), Some(&MetaValue::from("-5")));
        assert_eq!(
            meta.get("huge"),
            Some(&MetaValue::from("99999999999999999999999"))
        );
    }

    #[test]
    fn test_serialize_shapes() {
        let mut meta = sample();
        meta.insert("empty", Vec::<String>::new());
        let header = serialize_header(&meta);

        assert_eq!(
            header,
            "title: \"About\"\ndraft: true\norder: 12\ntags:\n  - \"intro\"\n  - \"company\"\nempty: []\n"
        );
    }

    #[test]
    fn test_inline_list_normalizes_to_block() {
        let doc = parse_document("---\ntags: [a, b]\n---\n");
        let text = serialize_document(&doc.metadata, &doc.body);
        assert_eq!(text, "---\ntags:\n  - \"a\"\n  - \"b\"\n---\n");
    }

    #[test]
    fn test_roundtrip_value_equality() {
        let mut meta = sample();
        meta.insert("quote", "He said \"hi\" \\o/");
        meta.insert("multiline", "line one\nline two");
        meta.insert("looks_bool", "true");
        meta.insert("looks_number", "123");
        meta.insert("looks_list", "[x, y]");
        meta.insert("colon", "a: b # c");
        meta.insert("blank", "");
        meta.insert("spaced", "  padded  ");
        meta.insert("tricky_items", vec!["with, comma", "\"quoted\"", ""]);
        meta.insert("zero", 0u64);
        meta.insert("off", false);

        let body = "Body with\n---\na rule inside\n";
        let doc = parse_document(&serialize_document(&meta, body));

        assert_eq!(doc.metadata, meta);
        assert_eq!(doc.body, body);
    }

    #[test]
    fn test_empty_metadata_roundtrip() {
        let text = serialize_document(&Metadata::new(), "Hello");
        assert_eq!(text, "---\n\n---\nHello");
        let doc = parse_document(&text);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "Hello");
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("hero_image"));
        assert!(!is_valid_key("hero-image"));
        assert!(!is_valid_key(""));
    }

    #[test]
    fn test_default_post_metadata() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let meta = default_post_metadata(date);
        assert_eq!(meta.get("date"), Some(&MetaValue::from("2024-03-09")));
        assert_eq!(meta.get("draft"), Some(&MetaValue::Bool(true)));
        assert_eq!(meta.get("tags"), Some(&MetaValue::List(vec![])));
    }

    #[test]
    fn test_default_page_metadata_order() {
        let keys: Vec<String> = default_page_metadata().keys().map(String::from).collect();
        assert_eq!(
            keys,
            vec!["title", "description", "section", "template", "draft", "tags"]
        );
    }

    #[test]
    fn test_document_title() {
        let mut meta = Metadata::new();
        assert_eq!(document_title(&meta, "getting-started_guide.mdx"), "getting started guide");

        meta.insert("title", "");
        assert_eq!(document_title(&meta, "about.md"), "about");

        meta.insert("title", "About Us");
        assert_eq!(document_title(&meta, "about.md"), "About Us");
    }
}
