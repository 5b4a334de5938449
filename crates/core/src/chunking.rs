use crate::error::IngestError;

/// Window sizing for the splitter. Lengths are counted in chars, not bytes,
/// so multi-byte text never splits on a partial codepoint.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub size: usize,
    pub overlap: usize,
    pub separator: String,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 200,
            separator: "\n".to_string(),
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.size == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk size must be positive".to_string(),
            ));
        }

        if self.overlap >= self.size {
            return Err(IngestError::InvalidConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap, self.size
            )));
        }

        if self.separator.is_empty() {
            return Err(IngestError::InvalidConfig(
                "separator must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Splits `text` on the separator and reassembles the pieces into windows of
/// at most `size` chars. Separators stay attached to their piece, so
/// stripping each chunk's seeded overlap prefix and concatenating the rest
/// reconstructs the input exactly.
///
/// When appending the next piece would overflow the window, the current chunk
/// closes and the next one opens seeded with up to `overlap` trailing chars
/// of the chunk just closed. The seed is trimmed so a chunk opened for an
/// in-bounds piece never exceeds `size`; a single piece longer than `size`
/// keeps the full seed and passes through unsplit rather than being truncated
/// mid-word.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let mut seed_chars = 0usize;

    for piece in text.split_inclusive(config.separator.as_str()) {
        let piece_chars = piece.chars().count();

        // Close only when the window holds content beyond its seed, so a
        // seed never becomes a chunk of its own.
        if current_chars > seed_chars && current_chars + piece_chars > config.size {
            let carry = if piece_chars >= config.size {
                config.overlap
            } else {
                config.overlap.min(config.size - piece_chars)
            };

            let seed = tail_chars(&current, carry);
            seed_chars = seed.chars().count();
            chunks.push(std::mem::replace(&mut current, seed));
            current_chars = seed_chars;
        }

        current.push_str(piece);
        current_chars += piece_chars;
    }

    if current_chars > seed_chars {
        chunks.push(current);
    }

    Ok(chunks)
}

/// Last `count` chars of `text`, or all of it when shorter.
pub(crate) fn tail_chars(text: &str, count: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}
