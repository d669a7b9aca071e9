//! Stream Decoder
//!
//! Turns the incremental body of a `POST /api/chat` response into a lazy,
//! finite, non-restartable sequence of [`StreamChunk`]s.
//!
//! The transport may hand us any number of bytes per read, including a
//! fraction of a line or half of a multi-byte character. [`LineBuffer`] holds
//! raw bytes until a full `\n` delimiter arrives, so nothing is decoded from
//! an incomplete record. At most one wire record is buffered past the
//! delimiter scan; retry is not our business.

use futures::{Stream, StreamExt};

use crate::error::ClientError;
use crate::messages::{StreamChunk, WireRecord};

/// Content types the chat endpoint is allowed to answer with
const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/x-ndjson",
    "application/json",
    "text/event-stream",
    "text/plain",
];

/// How much of a bad line to quote back in a decode error
const ERROR_PREVIEW_CHARS: usize = 80;

/// Longest unterminated line held while waiting for its delimiter
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Byte accumulator that yields complete lines only
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    /// Bytes after the last delimiter seen
    tail: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_RECORD_BYTES)
    }
}

impl LineBuffer {
    /// Create an empty buffer with the default line limit
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer that rejects lines longer than `max_line`
    #[must_use]
    pub fn with_limit(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            tail: 0,
            max_line,
        }
    }

    /// Append raw bytes from the transport
    ///
    /// Fails once an unterminated line grows past the limit; nothing is
    /// buffered in that case.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let tail = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(pos) => bytes.len() - pos - 1,
            None => self.tail + bytes.len(),
        };
        if tail > self.max_line {
            return Err(ClientError::Decode(format!(
                "stream line exceeds {} bytes without a newline",
                self.max_line
            )));
        }
        self.tail = tail;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Pop the next complete line (without its delimiter)
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Take whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.tail = 0;
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            self.buffer.clear();
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }

    /// Whether no partial line is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Decode one line into a chunk
///
/// Returns `Ok(None)` for lines that carry no record: blanks, SSE comments,
/// and SSE `event:`/`id:`/`retry:` fields. An optional `data:` prefix is
/// stripped.
fn parse_line(line: &[u8]) -> Result<Option<StreamChunk>, ClientError> {
    let text = std::str::from_utf8(line)
        .map_err(|e| ClientError::Decode(format!("invalid UTF-8 in stream: {e}")))?;
    let text = text.trim();

    if text.is_empty() || text.starts_with(':') {
        return Ok(None);
    }
    if ["event:", "id:", "retry:"].iter().any(|f| text.starts_with(f)) {
        return Ok(None);
    }

    let payload = text.strip_prefix("data:").map_or(text, str::trim);
    if payload == "[DONE]" {
        return Ok(Some(StreamChunk::done(None)));
    }

    let record: WireRecord = serde_json::from_str(payload).map_err(|e| {
        let preview: String = payload.chars().take(ERROR_PREVIEW_CHARS).collect();
        ClientError::Decode(format!("{e} in line `{preview}`"))
    })?;

    Ok(Some(record.into()))
}

/// Lazy chunk sequence over a byte stream
///
/// Once it has returned an error, a final chunk, or end-of-stream, every
/// further call to [`next`](Self::next) returns `None`.
pub struct StreamDecoder<S> {
    body: S,
    lines: LineBuffer,
    finished: bool,
}

impl<S, B, E> StreamDecoder<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    /// Wrap a response body
    pub fn new(body: S) -> Self {
        Self {
            body,
            lines: LineBuffer::new(),
            finished: false,
        }
    }

    /// Next decoded chunk, `None` at end of stream
    pub async fn next(&mut self) -> Option<Result<StreamChunk, ClientError>> {
        if self.finished {
            return None;
        }

        loop {
            while let Some(line) = self.lines.next_line() {
                match parse_line(&line) {
                    Ok(Some(chunk)) => {
                        self.finished = chunk.is_final;
                        return Some(Ok(chunk));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
            }

            match self.body.next().await {
                Some(Ok(bytes)) => {
                    if let Err(e) = self.lines.push(bytes.as_ref()) {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    let rest = self.lines.finish()?;
                    return parse_line(&rest).transpose();
                }
            }
        }
    }
}

impl<S> StreamDecoder<S> {
    /// Whether the decoder has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Reject response bodies that cannot be an NDJSON/SSE chat stream
///
/// An absent header is accepted; media-type parameters are ignored.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), ClientError> {
    let Some(value) = content_type else {
        return Ok(());
    };
    let media = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if ACCEPTED_CONTENT_TYPES.contains(&media.as_str()) {
        Ok(())
    } else {
        Err(ClientError::Decode(format!(
            "unexpected content type `{value}`"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    type Body = stream::Iter<std::vec::IntoIter<Result<Vec<u8>, ClientError>>>;

    fn body(parts: &[&[u8]]) -> StreamDecoder<Body> {
        let items: Vec<Result<Vec<u8>, ClientError>> =
            parts.iter().map(|p| Ok(p.to_vec())).collect();
        StreamDecoder::new(stream::iter(items))
    }

    async fn collect(decoder: &mut StreamDecoder<Body>) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        while let Some(item) = decoder.next().await {
            out.push(item.expect("decode should succeed"));
        }
        out
    }

    const HELLO: &str = concat!(
        r#"{"message":{"role":"assistant","content":"He"},"done":false}"#,
        "\n",
        r#"{"message":{"role":"assistant","content":"llo"},"done":false}"#,
        "\n",
        r#"{"message":null,"done":true,"eval_count":2}"#,
        "\n",
    );

    #[tokio::test]
    async fn test_decodes_complete_lines() {
        let mut decoder = body(&[HELLO.as_bytes()]);
        let chunks = collect(&mut decoder).await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::delta("He"),
                StreamChunk::delta("llo"),
                StreamChunk::done(Some(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_tolerates_every_split_point() {
        let bytes = HELLO.as_bytes();
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            let mut decoder = body(&[a, b]);
            let chunks = collect(&mut decoder).await;
            assert_eq!(chunks.len(), 3, "split at byte {split}");
            assert_eq!(chunks[0].delta_content, "He");
            assert_eq!(chunks[1].delta_content, "llo");
            assert!(chunks[2].is_final);
        }
    }

    #[tokio::test]
    async fn test_byte_at_a_time_with_multibyte_text() {
        let line = "{\"message\":{\"role\":\"assistant\",\"content\":\"héllo ✓\"},\"done\":false}\n";
        let single_bytes: Vec<[u8; 1]> = line.bytes().map(|b| [b]).collect();
        let parts: Vec<&[u8]> = single_bytes.iter().map(|b| b.as_slice()).collect();
        let mut decoder = body(&parts);

        let chunks = collect(&mut decoder).await;
        assert_eq!(chunks, vec![StreamChunk::delta("héllo ✓")]);
    }

    #[tokio::test]
    async fn test_stops_after_done() {
        let input = concat!(
            r#"{"message":null,"done":true}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"late"},"done":false}"#,
            "\n",
        );
        let mut decoder = body(&[input.as_bytes()]);

        assert!(decoder.next().await.unwrap().unwrap().is_final);
        assert!(decoder.next().await.is_none());
        assert!(decoder.is_finished());
    }

    #[tokio::test]
    async fn test_malformed_line_is_terminal_error() {
        let mut decoder = body(&[b"{\"message\":\n", b"{\"done\":true}\n"]);

        let err = decoder.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_terminal() {
        let items: Vec<Result<Vec<u8>, ClientError>> = vec![
            Ok(br#"{"message":{"role":"assistant","content":"a"}}"#.to_vec()),
            Ok(b"\n".to_vec()),
            Err(ClientError::Decode("connection reset".into())),
            Ok(br#"{"done":true}"#.to_vec()),
        ];
        let mut decoder = StreamDecoder::new(stream::iter(items));

        assert_eq!(
            decoder.next().await.unwrap().unwrap(),
            StreamChunk::delta("a")
        );
        assert!(decoder.next().await.unwrap().is_err());
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_decoded() {
        let mut decoder = body(&[br#"{"message":{"role":"assistant","content":"tail"}}"#]);
        let chunks = collect(&mut decoder).await;

        assert_eq!(chunks, vec![StreamChunk::delta("tail")]);
    }

    #[tokio::test]
    async fn test_empty_body_ends_without_chunks() {
        let mut decoder = body(&[]);
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sse_framing_is_tolerated() {
        let input = concat!(
            ": keep-alive\n",
            "event: message\n",
            "data: {\"message\":{\"role\":\"assistant\",\"content\":\"x\"}}\r\n",
            "\r\n",
            "data: [DONE]\n",
        );
        let mut decoder = body(&[input.as_bytes()]);
        let chunks = collect(&mut decoder).await;

        assert_eq!(chunks, vec![StreamChunk::delta("x"), StreamChunk::done(None)]);
    }

    #[test]
    fn test_line_buffer_holds_partial_lines() {
        let mut lines = LineBuffer::new();
        lines.push(b"abc").unwrap();
        assert!(lines.next_line().is_none());
        lines.push(b"\r\ndef").unwrap();
        assert_eq!(lines.next_line().unwrap(), b"abc");
        assert!(!lines.is_empty());
        assert_eq!(lines.finish().unwrap(), b"def");
        assert!(lines.is_empty());
    }

    #[test]
    fn test_line_buffer_rejects_overlong_line() {
        let mut lines = LineBuffer::with_limit(8);
        lines.push(b"12345").unwrap();
        assert!(matches!(lines.push(b"6789"), Err(ClientError::Decode(_))));

        // A delimiter resets the count
        let mut lines = LineBuffer::with_limit(8);
        lines.push(b"12345").unwrap();
        lines.push(b"678\nabcdefgh").unwrap();
        assert_eq!(lines.next_line().unwrap(), b"12345678");
        assert!(lines.push(b"i").is_err());
    }

    #[tokio::test]
    async fn test_endless_line_is_terminal_error() {
        let block = vec![b'x'; 64 * 1024];
        let items: Vec<Result<Vec<u8>, ClientError>> = std::iter::repeat(block)
            .take(MAX_RECORD_BYTES / (64 * 1024) + 1)
            .map(Ok)
            .collect();
        let mut decoder = StreamDecoder::new(stream::iter(items));

        let err = decoder.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Decode(m) if m.contains("without a newline")));
        assert!(decoder.next().await.is_none());
    }

    #[test]
    fn test_content_type_check() {
        assert!(check_content_type(None).is_ok());
        assert!(check_content_type(Some("application/x-ndjson")).is_ok());
        assert!(check_content_type(Some("text/event-stream; charset=utf-8")).is_ok());
        assert!(check_content_type(Some("Application/JSON")).is_ok());
        assert!(matches!(
            check_content_type(Some("text/html")),
            Err(ClientError::Decode(_))
        ));
    }
}
