use crate::error::FeedError;

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental `text/event-stream` decoder.
///
/// Only `data` fields matter to the live feed; `event`, `id`, `retry` and
/// comment lines are skipped. Lines end on `\r\n`, `\n` or a bare `\r`, and
/// chunks may split lines (and UTF-8 sequences) anywhere. Event data is handed
/// back as raw bytes so payload validation stays with the snapshot parser.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: Vec<u8>,
    has_data: bool,
    pending_cr: bool,
    overflowed: bool,
}

impl SseDecoder {
    /// Feeds one chunk and returns every event it completed, in order.
    ///
    /// A line longer than [`MAX_LINE_BYTES`] yields one `MalformedPayload` and
    /// drops the event it belonged to.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Vec<u8>, FeedError>> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut events);
                }
                b'\n' => self.end_line(&mut events),
                _ if self.overflowed => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    self.overflowed = true;
                    self.line.clear();
                    events.push(Err(FeedError::MalformedPayload(format!(
                        "live stream line exceeds {} bytes",
                        MAX_LINE_BYTES
                    ))));
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    fn end_line(&mut self, events: &mut Vec<Result<Vec<u8>, FeedError>>) {
        if self.overflowed {
            self.overflowed = false;
            self.data.clear();
            self.has_data = false;
            return;
        }

        let line = std::mem::take(&mut self.line);
        if line.is_empty() {
            let data = std::mem::take(&mut self.data);
            // an event whose data is empty is dropped, as browsers do
            if std::mem::take(&mut self.has_data) && !data.is_empty() {
                events.push(Ok(data));
            }
            return;
        }
        if line[0] == b':' {
            return;
        }

        let (field, value) = match line.iter().position(|b| *b == b':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(&b" "[..]).unwrap_or(value))
            }
            None => (&line[..], &[][..]),
        };
        if field == b"data" {
            if self.has_data {
                self.data.push(b'\n');
            }
            self.data.extend_from_slice(value);
            self.has_data = true;
        }
    }
}
