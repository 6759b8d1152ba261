/// Byte range of one brace-balanced block of a BibTeX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// The text this span covers in `content`.
    pub fn slice<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}

/// Splits `content` into entry spans by brace counting.
///
/// An `@` at brace depth zero opens a new entry. The previous entry then ends
/// right after the last closing brace that brought the depth back to zero, so
/// whitespace between entries belongs to neither of them. The final entry runs
/// to the end of the input.
pub fn scan_entries(content: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut depth: i64 = 0;
    let mut entry_start: Option<usize> = None;
    let mut last_close = 0;

    for (i, byte) in content.bytes().enumerate() {
        match byte {
            b'@' if depth == 0 => {
                if let Some(start) = entry_start {
                    spans.push(Span {
                        start,
                        end: last_close.max(start),
                    });
                }
                entry_start = Some(i);
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 && entry_start.is_some() {
                    last_close = i + 1;
                }
            }
            _ => (),
        }
    }

    if let Some(start) = entry_start {
        spans.push(Span {
            start,
            end: content.len(),
        });
    }
    spans
}
