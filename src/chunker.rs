//! Chunker (§4.5). Splits text into chunks targeting a configurable size
//! with overlap, preferring structural breaks, then paragraph breaks, then
//! sentence breaks. Deterministic given identical input.

use crate::token_budget::estimate_text_tokens;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig { target_tokens: 1000, overlap_tokens: 200 }
    }
}

#[derive(Debug, Clone)]
pub struct TextChunk {
    pub content: String,
    pub token_count: usize,
}

/// Split `text` along structural breaks first (blank lines around
/// headings/lists, signalled by a leading `#`, `-`, `*`, or digit-dot), then
/// paragraph breaks (`\n\n`), then sentence breaks (`. `), accumulating
/// segments into chunks that target `config.target_tokens` with
/// `config.overlap_tokens` of carry-over, never exceeding 1.5x target.
pub fn chunk_text(text: &str, config: ChunkerConfig) -> Vec<TextChunk> {
    let segments = split_into_segments(text);
    if segments.is_empty() {
        return Vec::new();
    }

    let hard_cap = (config.target_tokens as f64 * 1.5) as usize;
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    let flush = |current: &mut Vec<&str>, current_tokens: &mut usize, chunks: &mut Vec<TextChunk>| {
        if current.is_empty() {
            return;
        }
        let content = current.join("\n\n");
        chunks.push(TextChunk { content, token_count: *current_tokens });
    };

    for segment in &segments {
        let segment_tokens = estimate_text_tokens(segment);

        if current_tokens + segment_tokens > hard_cap && !current.is_empty() {
            flush(&mut current, &mut current_tokens, &mut chunks);
            let overlap = carry_overlap(&current, config.overlap_tokens);
            current = overlap.0;
            current_tokens = overlap.1;
        }

        current.push(segment);
        current_tokens += segment_tokens;

        if current_tokens >= config.target_tokens {
            flush(&mut current, &mut current_tokens, &mut chunks);
            let overlap = carry_overlap(&current, config.overlap_tokens);
            current = overlap.0;
            current_tokens = overlap.1;
        }
    }

    flush(&mut current, &mut current_tokens, &mut chunks);
    chunks.retain(|c| !c.content.trim().is_empty());
    chunks
}

fn carry_overlap<'a>(previous: &[&'a str], overlap_tokens: usize) -> (Vec<&'a str>, usize) {
    let mut carried = Vec::new();
    let mut tokens = 0usize;
    for segment in previous.iter().rev() {
        let segment_tokens = estimate_text_tokens(segment);
        if tokens + segment_tokens > overlap_tokens && !carried.is_empty() {
            break;
        }
        carried.push(*segment);
        tokens += segment_tokens;
        if tokens >= overlap_tokens {
            break;
        }
    }
    carried.reverse();
    (carried, tokens)
}

fn split_into_segments(text: &str) -> Vec<&str> {
    let paragraphs: Vec<&str> = text.split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if !paragraphs.is_empty() {
        let mut segments = Vec::new();
        for paragraph in paragraphs {
            if is_structural(paragraph) || paragraph.len() < 400 {
                segments.push(paragraph);
            } else {
                segments.extend(split_sentences(paragraph));
            }
        }
        return segments;
    }
    split_sentences(text)
}

fn is_structural(paragraph: &str) -> bool {
    let trimmed = paragraph.trim_start();
    trimmed.starts_with('#')
        || trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with('|')
        || trimmed.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) && trimmed.contains(". ")
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'.' && i + 1 < bytes.len() && bytes[i + 1] == b' ' {
            let sentence = text[start..=i].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = i + 1;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    if out.is_empty() {
        vec![text]
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("", ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn short_text_fits_one_chunk() {
        let chunks = chunk_text("a short paragraph about refunds.", ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_text_splits_into_multiple_chunks_under_hard_cap() {
        let paragraph = "This is a sentence about payments and refunds. ".repeat(200);
        let chunks = chunk_text(&paragraph, ChunkerConfig { target_tokens: 100, overlap_tokens: 20 });
        assert!(chunks.len() > 1);
        let hard_cap = 150;
        for chunk in &chunks {
            assert!(chunk.token_count <= hard_cap, "chunk exceeded hard cap: {}", chunk.token_count);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Para one.\n\nPara two is a bit longer with more content here.\n\nPara three.";
        let a = chunk_text(text, ChunkerConfig::default());
        let b = chunk_text(text, ChunkerConfig::default());
        let a_contents: Vec<_> = a.iter().map(|c| c.content.clone()).collect();
        let b_contents: Vec<_> = b.iter().map(|c| c.content.clone()).collect();
        assert_eq!(a_contents, b_contents);
    }

    #[test]
    fn structural_headings_stay_intact_as_segments() {
        let text = "# Heading One\n\nSome body text here.\n\n# Heading Two\n\nMore body text.";
        let chunks = chunk_text(text, ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("# Heading One"));
    }
}
