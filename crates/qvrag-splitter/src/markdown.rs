//! Header-aware markdown splitting.
//!
//! ATX headings are located with pulldown-cmark (so `#` lines inside fenced
//! code are not headings); section bodies are sliced out of the original source to
//! keep their markdown intact.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use qvrag_core::{Chunk, Metadata};

/// Levels (1 = `#`) mapped to the metadata key recorded for them.
#[derive(Debug, Clone)]
pub(crate) struct HeaderLevels(Vec<(usize, String)>);

impl HeaderLevels {
    pub(crate) fn from_prefixes(headers: &[(String, String)]) -> Self {
        let mut levels: Vec<(usize, String)> = headers
            .iter()
            .filter(|(prefix, _)| !prefix.is_empty() && prefix.chars().all(|c| c == '#'))
            .map(|(prefix, name)| (prefix.len(), name.clone()))
            .collect();
        levels.sort_by_key(|(level, _)| *level);
        Self(levels)
    }

    fn name(&self, level: usize) -> Option<&str> {
        self.0.iter().find(|(l, _)| *l == level).map(|(_, n)| n.as_str())
    }
}

pub(crate) fn split_markdown(text: &str, levels: &HeaderLevels) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    // (level, key, title) for the headings currently in scope
    let mut stack: Vec<(usize, String, String)> = Vec::new();
    let mut section_start = 0usize;
    let mut open: Option<(usize, String, std::ops::Range<usize>)> = None;
    let mut title = String::new();

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            // setext headings (underlined with `===` / `---`) stay in the body
            Event::Start(Tag::Heading { level, .. }) if text[range.clone()].trim_start().starts_with('#') => {
                let level = level as usize;
                if let Some(name) = levels.name(level) {
                    push_section(&mut chunks, &text[section_start..range.start], &stack);
                    open = Some((level, name.to_string(), range));
                    title.clear();
                }
            }
            Event::Text(t) | Event::Code(t) if open.is_some() => title.push_str(&t),
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, name, range)) = open.take() {
                    stack.retain(|(l, _, _)| *l < level);
                    stack.push((level, name, title.trim().to_string()));
                    section_start = range.end;
                }
            }
            _ => {}
        }
    }
    push_section(&mut chunks, &text[section_start..], &stack);
    chunks
}

fn push_section(chunks: &mut Vec<Chunk>, body: &str, stack: &[(usize, String, String)]) {
    let body = body.trim();
    if body.is_empty() {
        return;
    }
    let mut metadata = Metadata::new();
    for (_, name, title) in stack {
        metadata.insert(name.clone(), serde_json::Value::String(title.clone()));
    }
    chunks.push(Chunk::with_metadata(body, metadata));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_levels() -> HeaderLevels {
        HeaderLevels::from_prefixes(&[
            ("#".into(), "Header 1".into()),
            ("##".into(), "Header 2".into()),
            ("###".into(), "Header 3".into()),
        ])
    }

    #[test]
    fn sections_carry_header_path() {
        let md = "# Guide\n\nIntro text.\n\n## Install\n\nRun it.\n\n### Linux\n\nUse apt.\n\n## Usage\n\nCall it.\n";
        let chunks = split_markdown(md, &default_levels());
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["Intro text.", "Run it.", "Use apt.", "Call it."]);
        assert_eq!(chunks[2].metadata["Header 3"], json!("Linux"));
        assert_eq!(chunks[2].metadata["Header 2"], json!("Install"));
        // a new level-2 header clears the level-3 entry
        assert_eq!(chunks[3].metadata.get("Header 3"), None);
        assert_eq!(chunks[3].metadata["Header 1"], json!("Guide"));
    }

    #[test]
    fn preamble_has_no_header_metadata() {
        let chunks = split_markdown("Before.\n\n# Title\n\nAfter.", &default_levels());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].metadata.is_empty());
        assert_eq!(chunks[0].text, "Before.");
    }

    #[test]
    fn fenced_hashes_and_deep_headers_stay_in_content() {
        let md = "# Code\n\n```sh\n# not a header\n```\n\n#### Detail\n\nDeep.";
        let chunks = split_markdown(md, &default_levels());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("# not a header"));
        assert!(chunks[0].text.contains("#### Detail"));
    }

    #[test]
    fn underlined_paragraphs_are_not_headers() {
        let md = "# Title\n\nImportant paragraph sentence.\n---\n\nMore body.\n\nSubtitle\n========\n";
        let chunks = split_markdown(md, &default_levels());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("Important paragraph sentence.\n---"));
        assert!(chunks[0].text.contains("More body."));
        assert!(chunks[0].text.contains("Subtitle"));
        assert_eq!(chunks[0].metadata.len(), 1);
        assert_eq!(chunks[0].metadata["Header 1"], json!("Title"));
    }

    #[test]
    fn empty_sections_are_dropped() {
        let chunks = split_markdown("# A\n## B\n\nBody", &default_levels());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata["Header 1"], json!("A"));
        assert_eq!(chunks[0].metadata["Header 2"], json!("B"));
    }
}
