//! This module splits the body of a streamed response into frames, each holding
//! one JSON object. It supports two formats, newline-delimited JSON and
//! server-sent events. It expects a byte stream, as produced by the
//! [`Transport`](crate::transport::Transport), which is parsed incrementally,
//! frame by frame. Bytes are only pulled from the source when the buffered
//! ones do not hold a complete frame.

use std::marker::Unpin;

use bytes::Bytes;
use futures_core::stream::Stream;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::Error;
use crate::transport;

const DEFAULT_MAX_SIZE: usize = 1 << 24; // 16 MiB
const DEFAULT_CAPACITY: usize = 1 << 10; // 1 KiB

const DONE: &[u8] = b"[DONE]";

trait RemoveFirstN {
    fn remove_first(&mut self, n: usize);
}

impl<T: Copy> RemoveFirstN for Vec<T> {
    fn remove_first(&mut self, n: usize) {
        self.copy_within(n.., 0);
        self.truncate(self.len() - n);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Newline-delimited JSON
    /// See https://github.com/ndjson/ndjson-spec
    Ndjson,
    /// Server-sent events, one JSON object per event
    /// See https://html.spec.whatwg.org/multipage/server-sent-events.html
    Sse,
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

pub struct FrameParser<S>
where
    S: Stream<Item = Result<Bytes, transport::Error>> + Unpin,
{
    stream: S,
    cancel: CancellationToken,
    buf: Vec<u8>,
    max_size: usize,
    format: StreamFormat,
    // Scan position in `buf`, everything before it holds no line terminator
    i: usize,
    // The last line ended with \r, a \n at the start of the next read is part
    // of the same terminator
    skip_lf: bool,
    data: Vec<u8>,
    has_data: bool,
    finished: bool,
}

impl<S: Stream<Item = Result<Bytes, transport::Error>> + Unpin> FrameParser<S> {
    pub fn new(stream: S, format: StreamFormat, cancel: CancellationToken) -> FrameParser<S> {
        Self::with_max_size_and_capacity(stream, format, cancel, DEFAULT_MAX_SIZE, DEFAULT_CAPACITY)
    }

    pub fn with_max_size_and_capacity(
        stream: S,
        format: StreamFormat,
        cancel: CancellationToken,
        max_size: usize,
        init_capacity: usize,
    ) -> FrameParser<S> {
        FrameParser {
            stream,
            cancel,
            buf: Vec::with_capacity(init_capacity),
            max_size,
            format,
            i: 0,
            skip_lf: false,
            data: Vec::new(),
            has_data: false,
            finished: false,
        }
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    async fn refill_buffer(&mut self) -> Result<bool, Error> {
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            next = self.stream.next() => next,
        };

        match next {
            Some(Ok(b)) => {
                self.buf.extend_from_slice(&b);

                Ok(true)
            }
            Some(Err(err)) => Err(Error::StreamFailed(err)),
            None => Ok(false),
        }
    }

    // Finds the end of the next line.
    //
    // Returns the length of the line and the length of the line including its
    // terminator, or None when more data is needed.
    fn advance_to_line(&mut self) -> Option<(usize, usize)> {
        if self.skip_lf && !self.buf.is_empty() {
            if self.buf[0] == b'\n' {
                self.buf.remove_first(1);
            }

            self.skip_lf = false;
        }

        while self.i < self.buf.len() && self.buf[self.i] != b'\n' && self.buf[self.i] != b'\r' {
            self.i += 1;
        }

        if self.i == self.buf.len() {
            return None;
        }

        let end = self.i;

        let consumed = if self.buf[end] == b'\n' {
            end + 1
        } else if end + 1 < self.buf.len() {
            if self.buf[end + 1] == b'\n' {
                end + 2
            } else {
                end + 1
            }
        } else {
            // \r at the end of the buffer, the \n may still be on its way
            self.skip_lf = true;
            end + 1
        };

        Some((end, consumed))
    }

    fn consume(&mut self, n: usize) {
        self.buf.remove_first(n);
        self.i = 0;
    }

    // Extracts a non-empty line from the input and puts it in the data buffer
    fn extract_json_line(&mut self) -> bool {
        while let Some((end, consumed)) = self.advance_to_line() {
            let line = &self.buf[..end];

            let extracted = !is_blank(line);

            if extracted {
                self.data.extend_from_slice(line);
            }

            self.consume(consumed);

            if extracted {
                return true;
            }
        }

        false
    }

    // Collects the data fields of the next event in the data buffer
    //
    // Returns None when the stream signalled its end
    fn extract_sse_data(&mut self) -> Option<bool> {
        while let Some((end, consumed)) = self.advance_to_line() {
            let line = &self.buf[..end];

            let mut done = false;
            let mut dispatch = false;

            if line.is_empty() {
                if self.has_data {
                    self.has_data = false;

                    if self.data == DONE {
                        done = true;
                    } else if is_blank(&self.data) {
                        // Keep-alive events carry no frame
                        self.data.clear();
                    } else {
                        dispatch = true;
                    }
                }
            } else if line[0] != b':' {
                let (field, value) = match line.iter().position(|&b| b == b':') {
                    Some(colon) => (&line[..colon], &line[colon + 1..]),
                    None => (line, &line[line.len()..]),
                };

                // Remove the leading space (if it exists)
                let value = value.strip_prefix(b" ").unwrap_or(value);

                // id, event, retry and unknown fields carry nothing we use
                if field == b"data" {
                    if self.has_data {
                        self.data.push(b'\n');
                    }

                    self.data.extend_from_slice(value);
                    self.has_data = true;
                }
            }

            self.consume(consumed);

            if done {
                return None;
            }

            if dispatch {
                return Some(true);
            }
        }

        Some(false)
    }

    // The frame left in the buffer when the source ended
    fn extract_trailing_frame(&mut self) -> bool {
        match self.format {
            StreamFormat::Ndjson if !is_blank(&self.buf) => {
                self.data.clear();
                self.data.extend_from_slice(&self.buf);
                self.buf.clear();
                self.i = 0;

                true
            }
            // An event is only complete once its blank line arrived
            _ => false,
        }
    }

    /// The next frame, or None at the end of the stream.
    pub async fn parse_frame(&mut self) -> Option<Result<&[u8], Error>> {
        if self.finished {
            return None;
        }

        // Clear the previous frame
        self.data.clear();

        loop {
            let extracted = match self.format {
                StreamFormat::Ndjson => self.extract_json_line(),
                StreamFormat::Sse => match self.extract_sse_data() {
                    Some(extracted) => extracted,
                    None => {
                        self.finished = true;
                        return None;
                    }
                },
            };

            // The frame being built is the collected data plus the partial
            // line left in the buffer
            let frame_size = if extracted {
                self.data.len()
            } else {
                self.data.len() + self.buf.len()
            };

            if frame_size > self.max_size {
                self.finished = true;
                return Some(Err(Error::FrameTooLarge {
                    limit: self.max_size,
                }));
            }

            if extracted {
                return Some(Ok(&self.data));
            }

            match self.refill_buffer().await {
                Ok(true) => continue,
                Ok(false) => {
                    self.finished = true;

                    if self.extract_trailing_frame() {
                        return Some(Ok(&self.data));
                    }

                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }

    /// The next frame, deserialized.
    pub async fn parse<T: DeserializeOwned>(&mut self) -> Option<Result<T, Error>> {
        let frame = self.parse_frame().await?;

        Some(match frame {
            Ok(bytes) => serde_json::from_slice::<T>(bytes).map_err(|e| Error::DeserializationFailed {
                blob: String::from_utf8_lossy(bytes).into_owned(),
                source: e,
            }),
            Err(err) => Err(err),
        })
    }
}
