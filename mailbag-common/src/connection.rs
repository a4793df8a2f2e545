use core::fmt::Write as _;

use mailbag_tracing::traced;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::ConnectionResult;

/// Initial capacity for a line buffer, the bulk of commands fit well inside it
const LINE_CAPACITY: usize = 128;

/// One read from the client: a whole line or a piece of an over-long one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub bytes: Vec<u8>,
    /// These bytes carry on a line whose start an earlier read returned
    pub continuation: bool,
}

impl Line {
    /// The client closed its side of the stream
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A client stream that reads one line at a time and writes CRLF-terminated
/// responses.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    /// `BufReader` forwards writes untouched to the inner stream
    stream: BufReader<Stream>,
    max_line_length: usize,
    /// The last read stopped short of a `\n`
    mid_line: bool,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Connection<Stream> {
    pub fn new(stream: Stream, max_line_length: usize) -> Self {
        Self {
            stream: BufReader::new(stream),
            max_line_length: max_line_length.max(1),
            mid_line: false,
        }
    }

    /// Read the next line, terminator included.
    ///
    /// A line longer than the maximum line length is returned in pieces of at
    /// most that many bytes; only the final piece carries the `\n`, and every
    /// piece after the first is marked as a continuation. At end of stream
    /// the returned line is empty.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all), timing)]
    pub async fn read_line(&mut self) -> ConnectionResult<Line> {
        let mut line = Vec::with_capacity(LINE_CAPACITY.min(self.max_line_length));
        let mut complete = false;

        while !complete && line.len() < self.max_line_length {
            let available = self.stream.fill_buf().await?;
            if available.is_empty() {
                break;
            }

            let window = &available[..available.len().min(self.max_line_length - line.len())];
            let taken = match window.iter().position(|&byte| byte == b'\n') {
                Some(newline) => {
                    complete = true;
                    newline + 1
                }
                None => window.len(),
            };

            line.extend_from_slice(&window[..taken]);
            self.stream.consume(taken);
        }

        let continuation = self.mid_line;
        self.mid_line = !complete && !line.is_empty();

        Ok(Line {
            bytes: line,
            continuation,
        })
    }

    /// Write `response` followed by CRLF and flush it to the client
    #[traced(instrument(level = tracing::Level::TRACE, skip_all), timing)]
    pub async fn send<S: core::fmt::Display + Send + Sync>(
        &mut self,
        response: &S,
    ) -> ConnectionResult<usize> {
        let mut buffer = String::with_capacity(LINE_CAPACITY);
        write!(&mut buffer, "{response}\r\n")?;

        self.send_raw(buffer.as_bytes()).await
    }

    /// Write `bytes` verbatim and flush
    pub async fn send_raw(&mut self, bytes: &[u8]) -> ConnectionResult<usize> {
        let writer = self.stream.get_mut();
        writer.write_all(bytes).await?;
        writer.flush().await?;

        Ok(bytes.len())
    }

    /// Close the write half of the stream
    pub async fn shutdown(&mut self) -> ConnectionResult<()> {
        Ok(self.stream.get_mut().shutdown().await?)
    }
}
