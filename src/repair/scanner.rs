//! String-aware bracket scanning shared by every repair strategy.
//!
//! Works on bytes: every delimiter we care about is ASCII, and UTF-8
//! continuation bytes never collide with ASCII.

#[derive(Debug, Default, Clone)]
pub struct ScanState {
    pub stack: Vec<u8>,
    pub in_string: bool,
    escaped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    Open(u8),
    Close(u8),
    Other,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// True when every open container is an array (or nothing is open).
    pub fn only_arrays_open(&self) -> bool {
        self.stack.iter().all(|b| *b == b'[')
    }

    /// True right after an unescaped backslash inside a string.
    pub fn escaped(&self) -> bool {
        self.escaped
    }

    pub fn innermost(&self) -> Option<u8> {
        self.stack.last().copied()
    }

    pub fn feed(&mut self, b: u8) -> ScanEvent {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return ScanEvent::Other;
        }
        match b {
            b'"' => {
                self.in_string = true;
                ScanEvent::Other
            }
            b'{' | b'[' => {
                self.stack.push(b);
                ScanEvent::Open(b)
            }
            b'}' | b']' => {
                let opener = if b == b'}' { b'{' } else { b'[' };
                // Tolerate corruption: unwind to the matching opener if it is
                // open at all, otherwise ignore the stray closer.
                if let Some(pos) = self.stack.iter().rposition(|o| *o == opener) {
                    self.stack.truncate(pos);
                    ScanEvent::Close(b)
                } else {
                    ScanEvent::Other
                }
            }
            _ => ScanEvent::Other,
        }
    }
}

/// Index (inclusive) of the byte closing the container that opens at `start`.
pub fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if !matches!(bytes.get(start), Some(b'{') | Some(b'[')) {
        return None;
    }
    let mut state = ScanState::new();
    for (i, b) in bytes.iter().enumerate().skip(start) {
        state.feed(*b);
        if state.depth() == 0 && !state.in_string {
            return Some(i);
        }
    }
    None
}

/// Spans of "record" objects: objects whose enclosing containers are all
/// arrays. Nested arrays of records are therefore found at any depth.
#[derive(Debug, Default)]
pub struct RecordSpans {
    pub complete: Vec<(usize, usize)>,
    pub truncated_start: Option<usize>,
}

pub fn record_object_spans(text: &str) -> RecordSpans {
    let mut state = ScanState::new();
    let mut spans = RecordSpans::default();
    let mut current: Option<(usize, usize)> = None;

    for (i, b) in text.as_bytes().iter().enumerate() {
        let was_in_string = state.in_string;
        let opens_record = !was_in_string && *b == b'{' && current.is_none() && state.only_arrays_open();
        let depth_before = state.depth();
        let event = state.feed(*b);

        if opens_record {
            current = Some((i, depth_before));
            continue;
        }
        if let (ScanEvent::Close(_), Some((start, depth))) = (event, current) {
            if state.depth() <= depth {
                spans.complete.push((start, i));
                current = None;
            }
        }
    }
    spans.truncated_start = current.map(|(start, _)| start);
    spans
}
