//! Sentence-bounded text chunking.
//!
//! Text is split into sentences, then sentences are accumulated greedily
//! until the next one would push the chunk past `chunk_size` characters.
//! Each following chunk re-includes the trailing sentences of the previous
//! chunk that fit in `chunk_overlap` characters.

const ABBREVIATIONS: &[&str] = &["Mr", "Mrs", "Ms", "Dr", "Prof", "Sr", "Jr", "St"];

/// Splits text into sentences after collapsing all whitespace runs.
///
/// A boundary is `.`, `!` or `?` followed by a space and an uppercase letter,
/// except after single-letter initials and common title abbreviations.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<(usize, char)> = normalized.char_indices().collect();

    let mut sentences = Vec::new();
    let mut start = 0;

    for i in 0..chars.len() {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let (Some(&(_, next)), Some(&(after_pos, after))) = (chars.get(i + 1), chars.get(i + 2))
        else {
            continue;
        };
        if next != ' ' || !after.is_uppercase() {
            continue;
        }
        if c == '.' && is_abbreviation(&normalized[start..pos]) {
            continue;
        }

        sentences.push(normalized[start..pos + c.len_utf8()].to_string());
        start = after_pos;
    }

    let rest = normalized[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}

fn is_abbreviation(prefix: &str) -> bool {
    let word = prefix.rsplit(' ').next().unwrap_or_default();
    let single_initial = word.chars().count() == 1 && word.chars().all(char::is_uppercase);
    single_initial || ABBREVIATIONS.contains(&word)
}

/// Splits text into overlapping, sentence-aligned chunks.
///
/// No chunk exceeds `chunk_size` characters unless it consists of a single
/// sentence that is longer than the budget on its own. The output depends only
/// on the inputs, so re-chunking identical text yields identical boundaries.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    let lengths: Vec<usize> = sentences.iter().map(|s| s.chars().count()).collect();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < sentences.len() {
        let mut size = 0;
        let mut end = start;

        while end < sentences.len() {
            let addition = lengths[end] + usize::from(end > start);
            if end > start && size + addition > chunk_size {
                break;
            }
            size += addition;
            end += 1;
        }

        chunks.push(sentences[start..end].join(" "));

        if end >= sentences.len() {
            break;
        }

        let mut overlap_size = 0;
        let mut overlap_count = 0;
        for k in (start..end).rev() {
            let len = lengths[k] + usize::from(k < end - 1);
            if overlap_size + len > chunk_overlap {
                break;
            }
            overlap_size += len;
            overlap_count += 1;
        }

        start = (end - overlap_count).max(start + 1);
    }

    chunks
}
