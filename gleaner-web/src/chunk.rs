use gleaner_common::ChunkError;

/// A bounded slice of cleaned text, sent to the model as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Position in the split, starting at 0.
    pub index: usize,
    pub text: &'a str,
}

impl Segment<'_> {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into consecutive windows of `max_len` characters.
///
/// Every segment but the last holds exactly `max_len` characters; the last
/// holds the remainder. Empty input yields no segments.
///
/// ```
/// use gleaner_web::chunk::split;
///
/// let parts: Vec<&str> = split("abcdefghij", 3)
///     .unwrap()
///     .iter()
///     .map(|s| s.text)
///     .collect();
/// assert_eq!(parts, ["abc", "def", "ghi", "j"]);
/// ```
pub fn split(text: &str, max_len: usize) -> Result<Vec<Segment<'_>>, ChunkError> {
    if max_len == 0 {
        return Err(ChunkError::InvalidMaxLength);
    }

    let mut segments = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == max_len {
            segments.push(Segment {
                index: segments.len(),
                text: &text[start..offset],
            });
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        segments.push(Segment {
            index: segments.len(),
            text: &text[start..],
        });
    }

    Ok(segments)
}
