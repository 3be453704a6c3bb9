//! ToUnicode CMap parsing for PDF text extraction
//!
//! The calendar is typeset with embedded Type0 fonts whose content streams
//! carry glyph ids only; the font's ToUnicode CMap is the sole route back
//! to Cyrillic text.

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::io::Read;

/// A parsed ToUnicode CMap mapping character codes to Unicode strings
#[derive(Debug, Default, Clone)]
pub struct ToUnicodeCMap {
    /// Direct mappings (code -> Unicode string)
    pub char_map: HashMap<u32, String>,
    /// Range mappings (start, end, base codepoint)
    pub ranges: Vec<(u32, u32, u32)>,
    /// Code width in bytes, taken from the codespace range
    pub code_len: usize,
}

impl ToUnicodeCMap {
    /// Parse a ToUnicode CMap from its decompressed content
    pub fn parse(content: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(content);
        let tokens = tokenize(&text);
        let mut cmap = ToUnicodeCMap {
            code_len: 2,
            ..Default::default()
        };

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                Token::Keyword("begincodespacerange") => {
                    if let Some(Token::Hex(lo)) = tokens.get(i + 1) {
                        cmap.code_len = (lo.len() / 2).clamp(1, 4);
                    }
                    i += 1;
                }
                Token::Keyword("beginbfchar") => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        if let (Some(code), Some(s)) = (parse_code(src), hex_to_unicode_string(dst)) {
                            cmap.char_map.insert(code, s);
                        }
                        i += 2;
                    }
                }
                Token::Keyword("beginbfrange") => {
                    i += 1;
                    while let (Some(Token::Hex(start)), Some(Token::Hex(end))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        let (Some(start), Some(end)) = (parse_code(start), parse_code(end)) else {
                            break;
                        };
                        match tokens.get(i + 2) {
                            Some(Token::Hex(base)) => {
                                if let Some(base) = parse_code(base) {
                                    cmap.ranges.push((start, end, base));
                                }
                                i += 3;
                            }
                            Some(Token::ArrayStart) => {
                                // [<dst1> <dst2> ...] maps each code explicitly
                                let mut j = i + 3;
                                let mut codes = start..=end;
                                while let Some(Token::Hex(dst)) = tokens.get(j) {
                                    // Destinations past `end` are skipped
                                    if let Some(code) = codes.next() {
                                        if let Some(s) = hex_to_unicode_string(dst) {
                                            cmap.char_map.insert(code, s);
                                        }
                                    }
                                    j += 1;
                                }
                                i = j + 1;
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        if cmap.char_map.is_empty() && cmap.ranges.is_empty() {
            None
        } else {
            Some(cmap)
        }
    }

    /// Look up a character code and return the Unicode string
    pub fn lookup(&self, code: u32) -> Option<String> {
        if let Some(s) = self.char_map.get(&code) {
            return Some(s.clone());
        }

        self.ranges
            .iter()
            .find(|&&(start, end, _)| code >= start && code <= end)
            .and_then(|&(start, _, base)| base.checked_add(code - start))
            .and_then(char::from_u32)
            .map(|c| c.to_string())
    }

    /// Decode a string operand byte by byte (or pairwise for 2-byte codes)
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut result = String::new();

        for chunk in bytes.chunks(self.code_len.max(1)) {
            let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
            match self.lookup(code) {
                Some(s) => result.push_str(&s),
                None => {
                    if let Some(c) = char::from_u32(code) {
                        result.push(c);
                    }
                }
            }
        }

        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Hex(&'a str),
    Keyword(&'a str),
    ArrayStart,
    ArrayEnd,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' if bytes.get(i + 1) == Some(&b'<') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = text[start..].find('>').map_or(bytes.len(), |p| start + p);
                tokens.push(Token::Hex(&text[start..end]));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b if b.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(Token::Keyword(&text[start..i]));
            }
            _ => i += 1,
        }
    }

    tokens
}

fn parse_code(hex: &str) -> Option<u32> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    u32::from_str_radix(&hex, 16).ok()
}

/// Convert a UTF-16BE hex string to a Unicode string
fn hex_to_unicode_string(hex: &str) -> Option<String> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let units: Vec<u16> = hex
        .as_bytes()
        .chunks(4)
        .filter(|chunk| chunk.len() == 4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|chunk| u16::from_str_radix(chunk, 16).ok())
        .collect();

    let s = String::from_utf16_lossy(&units);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Raw stream bytes, inflated when the stream is FlateDecode-compressed
pub fn stream_bytes(stream: &Stream) -> Vec<u8> {
    let is_flate = match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == b"FlateDecode",
        Ok(Object::Array(filters)) => {
            filters.len() == 1 && matches!(&filters[0], Object::Name(n) if n == b"FlateDecode")
        }
        _ => false,
    };

    if !is_flate {
        return stream.content.clone();
    }

    let mut out = Vec::new();
    let mut decoder = ZlibDecoder::new(stream.content.as_slice());
    match decoder.read_to_end(&mut out) {
        Ok(_) => out,
        Err(e) => {
            log::debug!("failed to inflate stream: {}", e);
            // Partial output is still useful for truncated streams
            out
        }
    }
}

/// Load and parse the ToUnicode CMap of a font dictionary, if any
pub fn font_cmap(doc: &Document, font: &Dictionary) -> Option<ToUnicodeCMap> {
    let reference = font.get(b"ToUnicode").ok()?;
    let (_, object) = doc.dereference(reference).ok()?;
    let stream = object.as_stream().ok()?;
    let mut cmap = ToUnicodeCMap::parse(&stream_bytes(stream))?;

    // Simple fonts always use single-byte codes
    let is_type0 = matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type0");
    if !is_type0 {
        cmap.code_len = 1;
    }
    Some(cmap)
}
