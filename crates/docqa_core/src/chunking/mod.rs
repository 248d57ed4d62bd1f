use std::collections::VecDeque;
use std::ops::Range;

use crate::domain::Chunk;
use crate::error::AppError;
use crate::ingest::LoadedDocument;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Size-bounded splitting with overlap, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(AppError::new(
                "INGEST_CHUNK_PARAMS_INVALID",
                "Chunk overlap must be smaller than a non-zero chunk size",
            )
            .with_details(format!("chunk_size={chunk_size}; chunk_overlap={chunk_overlap}")));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

/// Chunk every page of a loaded document, in page order.
pub fn chunk_document(doc: &LoadedDocument, params: ChunkParams) -> Vec<Chunk> {
    let mut out = Vec::new();
    for page in doc.pages.iter() {
        for range in split_ranges(&page.text, params) {
            let text = &page.text[range.clone()];
            out.push(Chunk::new(
                &doc.source_id,
                Some(page.page),
                Some([range.start, range.end]),
                text,
            ));
        }
    }
    out
}

/// Byte ranges of `text`, each at most `chunk_size` chars after trimming, where
/// neighbours share up to `chunk_overlap` chars of separator-aligned pieces.
pub fn split_ranges(text: &str, params: ChunkParams) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    atomic_pieces(text, 0..text.len(), &SEPARATORS, params.chunk_size, &mut pieces);

    let mut out: Vec<Range<usize>> = Vec::new();
    let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
    let mut window_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&text[piece.clone()]);
        if !window.is_empty() && window_len + piece_len > params.chunk_size {
            emit(text, &window, &mut out);
            while window_len > params.chunk_overlap
                || (window_len > 0 && window_len + piece_len > params.chunk_size)
            {
                match window.pop_front() {
                    Some((_, len)) => window_len -= len,
                    None => break,
                }
            }
        }
        window_len += piece_len;
        window.push_back((piece, piece_len));
    }
    if !window.is_empty() {
        emit(text, &window, &mut out);
    }
    out
}

fn emit(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let span = &text[first.0.start..last.0.end];
    let lead = span.len() - span.trim_start().len();
    let trail = span.len() - span.trim_end().len();
    if lead + trail >= span.len() {
        return;
    }
    let range = first.0.start + lead..last.0.end - trail;
    // Trimming can land two windows on the same start. Chunk ids follow the
    // start offset, so the wider range replaces the narrower one.
    match out.last_mut() {
        Some(prev) if prev.start == range.start => *prev = range,
        _ => out.push(range),
    }
}

/// Split `range` into contiguous pieces no longer than `max` chars, preferring
/// the coarsest separator present. Separators stay attached to the piece they end.
fn atomic_pieces(
    text: &str,
    range: Range<usize>,
    separators: &[&str],
    max: usize,
    out: &mut Vec<Range<usize>>,
) {
    let slice = &text[range.clone()];
    if slice.is_empty() {
        return;
    }
    if char_len(slice) <= max {
        out.push(range);
        return;
    }

    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || slice.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let sep = separators.get(position).copied().unwrap_or("");
    let rest = &separators[(position + 1).min(separators.len())..];

    if sep.is_empty() {
        for (i, ch) in slice.char_indices() {
            let start = range.start + i;
            out.push(start..start + ch.len_utf8());
        }
        return;
    }

    let mut cursor = range.start;
    for (idx, _) in slice.match_indices(sep) {
        let end = range.start + idx + sep.len();
        atomic_pieces(text, cursor..end, rest, max, out);
        cursor = end;
    }
    if cursor < range.end {
        atomic_pieces(text, cursor..range.end, rest, max, out);
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
