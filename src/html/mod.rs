//! Forgiving HTML scanning for the price listing page.
//!
//! This is not a full HTML5 parser. It tokenizes tags and text, tolerates
//! missing end tags the way browsers do for table cells, and decodes
//! character references the way browsers do in text.

mod entities;

use std::borrow::Cow;

const MAX_REFERENCE_NAME: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    StartTag(Tag<'a>),
    EndTag(&'a str),
    Text(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag<'a> {
    pub name: &'a str,
    raw_attrs: &'a str,
    pub self_closing: bool,
}

impl<'a> Tag<'a> {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Value of the first attribute named `name`, with character references decoded.
    /// Bare attributes (`<td nowrap>`) yield an empty string.
    pub fn attr(&self, name: &str) -> Option<Cow<'a, str>> {
        parse_attrs(self.raw_attrs)
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| decode_entities(value))
    }

    /// True when the `class` attribute lists every class in `required`.
    pub fn has_classes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        let Some(class_attr) = self.attr("class") else {
            return required.is_empty();
        };
        let present: Vec<&str> = class_attr.split_ascii_whitespace().collect();
        required.iter().all(|c| present.contains(&c.as_ref()))
    }
}

pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    // Moves past the next occurrence of `pat`, or to the end of input.
    fn skip_past(&mut self, pat: &str) {
        match self.rest().find(pat) {
            Some(idx) => self.pos += idx + pat.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn text_until_next_lt(&mut self, from: usize) -> Token<'a> {
        let start = self.pos;
        let end = self.src[from..]
            .find('<')
            .map(|i| from + i)
            .unwrap_or(self.src.len());
        self.pos = end;
        Token::Text(&self.src[start..end])
    }

    fn end_tag(&mut self) -> Option<Token<'a>> {
        let after_slash = self.pos + 2;
        let name_len = name_length(&self.src[after_slash..]);
        if name_len == 0 {
            // `</>` or `</ foo>`: bogus comment
            self.skip_past(">");
            return None;
        }
        let name = &self.src[after_slash..after_slash + name_len];
        self.skip_past(">");
        Some(Token::EndTag(name))
    }

    fn start_tag(&mut self) -> Token<'a> {
        let name_start = self.pos + 1;
        let name_end = name_start + name_length(&self.src[name_start..]);
        let name = &self.src[name_start..name_end];

        let close = find_tag_close(&self.src[name_end..]).map(|i| name_end + i);
        let attrs_end = close.unwrap_or(self.src.len());
        let mut raw_attrs = &self.src[name_end..attrs_end];
        let self_closing = raw_attrs.trim_end().ends_with('/');
        if self_closing {
            raw_attrs = raw_attrs.trim_end().trim_end_matches('/');
        }
        self.pos = close.map(|i| i + 1).unwrap_or(self.src.len());

        let tag = Tag {
            name,
            raw_attrs,
            self_closing,
        };

        // Script and style bodies are raw text; drop them up to their end tag.
        if !self_closing && (tag.is("script") || tag.is("style")) {
            let needle = format!("</{}", name.to_ascii_lowercase());
            let lowered = self.rest().to_ascii_lowercase();
            match lowered.find(&needle) {
                Some(idx) => self.pos += idx,
                None => self.pos = self.src.len(),
            }
        }

        Token::StartTag(tag)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            if self.pos >= self.src.len() {
                return None;
            }
            let rest = self.rest();
            if !rest.starts_with('<') {
                return Some(self.text_until_next_lt(self.pos));
            }
            if rest.starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->");
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(">");
                continue;
            }
            let next = rest.as_bytes().get(1).copied();
            match next {
                Some(b'/') => match self.end_tag() {
                    Some(token) => return Some(token),
                    None => continue,
                },
                Some(c) if c.is_ascii_alphabetic() => return Some(self.start_tag()),
                // A lone `<` is text.
                _ => return Some(self.text_until_next_lt(self.pos + 1)),
            }
        }
    }
}

fn name_length(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b':')
        .count()
}

// Index of the `>` closing a tag, skipping quoted attribute values.
fn find_tag_close(s: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in s.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn parse_attrs(raw: &str) -> Vec<(&str, &str)> {
    let bytes = raw.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' && bytes[i] != b'/' {
            i += 1;
        }
        if name_start == i {
            if i < bytes.len() {
                i += 1;
            }
            continue;
        }
        let name = &raw[name_start..i];

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            attrs.push((name, ""));
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match bytes.get(i) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let start = i + 1;
                let end = raw[start..].find(q as char).map(|e| start + e).unwrap_or(raw.len());
                i = (end + 1).min(raw.len());
                &raw[start..end]
            }
            Some(_) => {
                let start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &raw[start..i]
            }
            None => "",
        };
        attrs.push((name, value));
    }

    attrs
}

/// Decodes character references the way browsers do in text: every named
/// reference of the HTML standard, the legacy names that need no trailing `;`,
/// and decimal or hex numeric references. Anything else is left as written.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];
        match decode_reference(candidate, &mut out) {
            Some(consumed) => rest = &candidate[consumed..],
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

// Decodes the reference at the start of `s` (the text after `&`) into `out`.
// Returns how many bytes of `s` it used.
fn decode_reference(s: &str, out: &mut String) -> Option<usize> {
    if let Some(num) = s.strip_prefix('#') {
        let (ch, consumed) = decode_numeric(num)?;
        out.push(ch);
        return Some(consumed + 1);
    }

    let name_len = s
        .char_indices()
        .take_while(|&(_, c)| !matches!(c, '\t' | '\n' | '\x0c' | ' ' | '<' | '&' | '#' | ';'))
        .take(MAX_REFERENCE_NAME)
        .last()
        .map(|(i, c)| i + c.len_utf8())?;
    let name = if s[name_len..].starts_with(';') {
        &s[..name_len + 1]
    } else {
        &s[..name_len]
    };

    if let Some(value) = named_reference(name) {
        out.push_str(value);
        return Some(name.len());
    }

    // Longest legacy name prefixing the candidate, e.g. `&ampx` is `&x`.
    let (end, value) = (2..name.len())
        .rev()
        .filter(|&end| name.is_char_boundary(end))
        .find_map(|end| named_reference(&name[..end]).map(|value| (end, value)))?;
    out.push_str(value);
    Some(end)
}

fn named_reference(name: &str) -> Option<&'static str> {
    entities::NAMED_REFERENCES
        .binary_search_by(|(key, _)| (*key).cmp(name))
        .ok()
        .map(|idx| entities::NAMED_REFERENCES[idx].1)
}

fn decode_numeric(s: &str) -> Option<(char, usize)> {
    let (prefix, radix) = match s.as_bytes().first() {
        Some(b'x' | b'X') => (1, 16),
        _ => (0, 10),
    };
    let digits = s[prefix..]
        .bytes()
        .take_while(|b| char::from(*b).is_digit(radix))
        .count();
    if digits == 0 {
        return None;
    }

    let mut consumed = prefix + digits;
    // Overflowing values are out of range like any other too-large code point.
    let code = u32::from_str_radix(&s[prefix..consumed], radix).unwrap_or(u32::MAX);
    if s[consumed..].starts_with(';') {
        consumed += 1;
    }
    Some((numeric_char(code), consumed))
}

// Code points 0x80..=0x9F are read as windows-1252, as browsers do.
const WINDOWS_1252: [char; 32] = [
    '\u{20ac}', '\u{0081}', '\u{201a}', '\u{0192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02c6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008d}', '\u{017d}', '\u{008f}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02dc}', '\u{2122}', '\u{0161}', '\u{203a}', '\u{0153}', '\u{009d}', '\u{017e}', '\u{0178}',
];

fn numeric_char(code: u32) -> char {
    match code {
        0 => char::REPLACEMENT_CHARACTER,
        0x80..=0x9f => WINDOWS_1252[(code - 0x80) as usize],
        _ => char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
    }
}

/// Text of every `<td>` cell, grouped by `<tr>`, for the first `<table>`
/// whose class list contains all of `classes`.
///
/// Cell text is the concatenated, entity-decoded text of the cell with
/// markup removed. It is returned untrimmed. `<th>` cells are not collected.
/// Returns `None` when no matching table exists.
pub fn find_table_rows<S: AsRef<str>>(html: &str, classes: &[S]) -> Option<Vec<Vec<String>>> {
    let mut tokens = Tokenizer::new(html);

    tokens.by_ref().find(|token| match token {
        Token::StartTag(tag) => tag.is("table") && !tag.self_closing && tag.has_classes(classes),
        _ => false,
    })?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut cell: Option<String> = None;
    let mut depth = 1usize;

    fn close_cell(rows: &mut [Vec<String>], cell: &mut Option<String>) {
        if let (Some(text), Some(row)) = (cell.take(), rows.last_mut()) {
            row.push(text);
        }
    }

    for token in tokens {
        match token {
            Token::StartTag(tag) if tag.is("table") && !tag.self_closing => depth += 1,
            Token::EndTag(name) if name.eq_ignore_ascii_case("table") => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Token::StartTag(tag) if tag.is("tr") => {
                close_cell(&mut rows, &mut cell);
                rows.push(Vec::new());
            }
            Token::EndTag(name) if name.eq_ignore_ascii_case("tr") => {
                close_cell(&mut rows, &mut cell);
            }
            Token::StartTag(tag) if tag.is("td") => {
                close_cell(&mut rows, &mut cell);
                if rows.is_empty() {
                    rows.push(Vec::new());
                }
                if !tag.self_closing {
                    cell = Some(String::new());
                } else if let Some(row) = rows.last_mut() {
                    row.push(String::new());
                }
            }
            Token::StartTag(tag) if tag.is("th") => close_cell(&mut rows, &mut cell),
            Token::EndTag(name) if name.eq_ignore_ascii_case("td") => {
                close_cell(&mut rows, &mut cell);
            }
            Token::Text(text) => {
                if let Some(buf) = cell.as_mut() {
                    buf.push_str(&decode_entities(text));
                }
            }
            _ => {}
        }
    }
    close_cell(&mut rows, &mut cell);

    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_basic() {
        let tokens: Vec<_> = Tokenizer::new("<p class=\"a\">hi</p>").collect();
        assert_eq!(tokens.len(), 3);
        match &tokens[0] {
            Token::StartTag(tag) => {
                assert!(tag.is("P"));
                assert_eq!(tag.attr("class").as_deref(), Some("a"));
            }
            other => panic!("unexpected token {:?}", other),
        }
        assert_eq!(tokens[1], Token::Text("hi"));
        assert_eq!(tokens[2], Token::EndTag("p"));
    }

    #[test]
    fn test_tokenizer_skips_comments_doctype_and_scripts() {
        let html = "<!DOCTYPE html><!-- <td>x</td> --><script>if (a < b) {}</script>ok";
        let texts: Vec<_> = Tokenizer::new(html)
            .filter_map(|t| match t {
                Token::Text(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["ok"]);
    }

    #[test]
    fn test_attr_forms() {
        let mut tokens = Tokenizer::new("<td id=a1 nowrap data-x='y z' title=\"a &amp; b\" />");
        let Some(Token::StartTag(tag)) = tokens.next() else {
            panic!("expected start tag");
        };
        assert!(tag.self_closing);
        assert_eq!(tag.attr("id").as_deref(), Some("a1"));
        assert_eq!(tag.attr("nowrap").as_deref(), Some(""));
        assert_eq!(tag.attr("data-x").as_deref(), Some("y z"));
        assert_eq!(tag.attr("title").as_deref(), Some("a & b"));
        assert_eq!(tag.attr("missing"), None);
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let tokens: Vec<_> = Tokenizer::new("<a title=\"1 > 0\">x</a>").collect();
        assert_eq!(tokens[1], Token::Text("x"));
    }

    #[test]
    fn test_has_classes_is_order_independent() {
        let mut tokens = Tokenizer::new("<table class=\"my-table  table striped\">");
        let Some(Token::StartTag(tag)) = tokens.next() else {
            panic!("expected start tag");
        };
        assert!(tag.has_classes(&["table", "my-table"]));
        assert!(!tag.has_classes(&["table", "other"]));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("1,234"), "1,234");
        assert_eq!(decode_entities("A &amp; B"), "A & B");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{a0}b");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_decode_html5_named_references() {
        assert_eq!(decode_entities("A&ndash;B"), "A\u{2013}B");
        assert_eq!(decode_entities("1&comma;000"), "1,000");
        assert_eq!(decode_entities("Bank&rsquo;s"), "Bank\u{2019}s");
        // Two code points
        assert_eq!(decode_entities("&NotEqualTilde;"), "\u{2242}\u{338}");
    }

    #[test]
    fn test_decode_legacy_references_without_semicolon() {
        assert_eq!(decode_entities("x&amp y"), "x& y");
        assert_eq!(decode_entities("&copy2024"), "\u{a9}2024");
        assert_eq!(decode_entities("&ampfoo;"), "&foo;");
        // Only legacy names may drop the semicolon.
        assert_eq!(decode_entities("&ndash"), "&ndash");
    }

    #[test]
    fn test_decode_numeric_edge_cases() {
        assert_eq!(decode_entities("&#65B"), "AB");
        assert_eq!(decode_entities("&#150;"), "\u{2013}");
        assert_eq!(decode_entities("&#0;"), "\u{fffd}");
        assert_eq!(decode_entities("&#xD800;"), "\u{fffd}");
        assert_eq!(decode_entities("&#99999999999;"), "\u{fffd}");
        assert_eq!(decode_entities("&#;"), "&#;");
    }

    #[test]
    fn test_find_table_rows_uses_marker_and_skips_other_tables() {
        let html = r#"
            <table class="table"><tr><td>wrong</td></tr></table>
            <table class="table my-table">
              <tr><th>h1</th><th>h2</th></tr>
              <tr><td> a </td><td><b>b</b> c</td></tr>
            </table>"#;
        let rows = find_table_rows(html, &["table", "my-table"]).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1], vec![" a ".to_string(), "b c".to_string()]);
    }

    #[test]
    fn test_find_table_rows_implied_end_tags() {
        let html = "<TABLE class=t><TR><TD>1<TD>2<TR><TD>3</TABLE>";
        let rows = find_table_rows(html, &["t"]).unwrap();
        assert_eq!(rows, vec![vec!["1".to_string(), "2".to_string()], vec!["3".to_string()]]);
    }

    #[test]
    fn test_find_table_rows_missing_table() {
        assert!(find_table_rows("<div>no table</div>", &["table", "my-table"]).is_none());
    }

    #[test]
    fn test_th_text_not_attached_to_previous_cell() {
        let html = "<table class=t><tr><td>a<th>b</th><td>c</td></tr></table>";
        let rows = find_table_rows(html, &["t"]).unwrap();
        assert_eq!(rows, vec![vec!["a".to_string(), "c".to_string()]]);
    }
}
