//! Document segmentation for pattern matching.

/// One sentence-bounded chunk of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position within the document's segment sequence
    pub index: usize,

    /// Segment text, trimmed
    pub text: String,
}

/// Split a document into sentence-bounded segments capped at `max_chars`.
///
/// Sentences accumulate into a segment until the cap would be exceeded;
/// a single sentence longer than the cap is hard-split at character
/// boundaries so no segment ever exceeds it.
pub fn segment_document(text: &str, max_chars: usize) -> Vec<Segment> {
    let max_chars = max_chars.max(1);
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if sentence.chars().count() > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            segments.extend(hard_split(sentence, max_chars));
            continue;
        }

        let would_be = current.chars().count() + 1 + sentence.chars().count();
        if !current.is_empty() && would_be > max_chars {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment { index, text })
        .collect()
}

/// Split on sentence enders (`.`, `!`, `?` followed by whitespace) and
/// newlines. Permit conditions are usually one sentence or one line each.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let boundary = match ch {
            '\n' => true,
            '.' | '!' | '?' => chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true),
            _ => false,
        };
        if boundary {
            let end = idx + ch.len_utf8();
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Split an overlong sentence into `max_chars`-sized chunks.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
