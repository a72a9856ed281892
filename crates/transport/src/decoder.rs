//! Incremental byte → line decoding for event-tagged text streams.
//!
//! Network chunks can end anywhere: inside a line, or inside a multi-byte
//! UTF-8 sequence. [`LineDecoder`] carries both kinds of partial state across
//! calls so the lines it yields do not depend on where the chunks were split.

/// UTF-8 decoder that holds back an incomplete trailing sequence.
///
/// Invalid sequences are replaced with U+FFFD instead of failing.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + chunk` as forms complete characters.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(s) => {
                    out.push_str(s);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(
                        &self.pending[start..start + valid],
                    ));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += valid + bad;
                        }
                        // Incomplete sequence at the end: keep it for next time.
                        None => {
                            start += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }
}

/// Splits decoded text into complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    utf8: Utf8Decoder,
    buffer: String,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed, in order.
    ///
    /// The trailing fragment after the last newline stays buffered and is
    /// never returned as a line by this call. A `\r` before the newline is
    /// stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(chunk);
        self.buffer.push_str(&text);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);
        complete
            .split_terminator('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// The buffered partial line.
    #[must_use]
    pub fn remainder(&self) -> &str {
        &self.buffer
    }
}

/// What a single complete line means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `event: <name>`: a marker, fires no callback.
    Event(&'a str),
    /// `data: <json>`: the payload after the prefix.
    Data(&'a str),
    /// Anything else, including blank separators.
    Other,
}

impl<'a> Line<'a> {
    #[must_use]
    pub fn classify(line: &'a str) -> Self {
        if let Some(name) = line.strip_prefix("event: ") {
            Self::Event(name)
        } else if let Some(payload) = line.strip_prefix("data: ") {
            Self::Data(payload)
        } else {
            Self::Other
        }
    }
}
