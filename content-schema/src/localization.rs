//! Localization line-format reader.
//!
//! Localization files are not script syntax: an `l_<language>:` header
//! followed by ` key:N "text"` lines. Keys resolve per key under last-wins,
//! so each line is one contribution. Unparseable lines are skipped silently,
//! matching the extractor's missing-field behavior.

const BOM: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq)]
pub struct LocEntry {
    pub key: String,
    /// The numeric revision marker between key and text, when present.
    pub version: Option<u32>,
    pub value: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocFile {
    pub language: Option<String>,
    pub entries: Vec<LocEntry>,
}

pub fn parse_localization(text: &str) -> LocFile {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut out = LocFile::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if out.language.is_none() && line.starts_with("l_") && line.ends_with(':') {
            out.language = Some(line.trim_end_matches(':').to_string());
            continue;
        }
        if let Some(entry) = parse_line(line, line_no) {
            out.entries.push(entry);
        }
    }
    out
}

fn parse_line(line: &str, line_no: u32) -> Option<LocEntry> {
    let colon = line.find(':')?;
    let key = line[..colon].trim();
    if key.is_empty() {
        return None;
    }
    let rest = &line[colon + 1..];

    let quote_start = rest.find('"')?;
    let version_part = rest[..quote_start].trim();
    let version = if version_part.is_empty() {
        None
    } else {
        version_part.parse::<u32>().ok()
    };

    // First to last quote: inner double quotes stay part of the value.
    let after = &rest[quote_start + 1..];
    let quote_end = after.rfind('"')?;
    Some(LocEntry {
        key: key.to_string(),
        version,
        value: after[..quote_end].to_string(),
        line: line_no,
    })
}
