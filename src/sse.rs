//! Decoding of streamed chat answers.
//!
//! The chat endpoint streams an answer as newline-delimited `data:` lines. Each
//! line carries one fragment of the answer; a line with an empty payload stands
//! for a line break in the answer itself. Anything else on the wire is ignored.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::error::{Error, Result};
use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_PAYLOADS};

const DATA_PREFIX: &str = "data:";

/// Turn a response body into a stream of answer fragments.
///
/// A transport failure ends the stream with [`Error::StreamInterrupted`].
///
/// ```
/// # tokio_test::block_on(async {
/// use futures::StreamExt;
///
/// let body = futures::stream::iter(vec![
///     Ok::<_, std::io::Error>(bytes::Bytes::from("data:Hi\ndata:\ndata:there\n")),
/// ]);
/// let answer: Vec<String> = docweave::sse::decode_chat_stream(body)
///     .map(|fragment| fragment.unwrap())
///     .collect()
///     .await;
/// assert_eq!(answer.concat(), "Hi\nthere");
/// # });
/// ```
pub fn decode_chat_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = DecodeState {
        stream: Box::pin(byte_stream),
        buffer: BytesMut::new(),
        codec: LinesCodec::new(),
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            match state.next_line() {
                Ok(Some(line)) => {
                    if let Some(payload) = payload(&line) {
                        STREAM_PAYLOADS.click();
                        return Some((Ok(payload), state));
                    }
                    continue;
                }
                Ok(None) if state.finished => return None,
                Ok(None) => {}
                Err(err) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((Err(err), state));
                }
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    state.buffer.clear();
                    return Some((
                        Err(Error::stream_interrupted(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        )),
                        state,
                    ));
                }
                None => state.finished = true,
            }
        }
    })
}

struct DecodeState<S> {
    stream: std::pin::Pin<Box<S>>,
    buffer: BytesMut,
    codec: LinesCodec,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn next_line(&mut self) -> Result<Option<String>> {
        let decoded = if self.finished {
            self.codec.decode_eof(&mut self.buffer)
        } else {
            self.codec.decode(&mut self.buffer)
        };
        decoded.map_err(|e| match e {
            LinesCodecError::MaxLineLengthExceeded => {
                Error::encoding("stream line too long", None)
            }
            LinesCodecError::Io(e) => {
                Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
            }
        })
    }
}

/// The answer fragment carried by `line`, if it is a data line.
fn payload(line: &str) -> Option<String> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    if rest.is_empty() {
        Some("\n".to_string())
    } else {
        Some(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Send {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(
        stream: impl Stream<Item = Result<String>>,
    ) -> Vec<Result<String>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn parse_single_payload() {
        let got = collect(decode_chat_stream(chunks(vec![b"data:Hello\n"]))).await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].as_ref().unwrap(), "Hello");
    }

    #[tokio::test]
    async fn parse_multiple_payloads() {
        let got = collect(decode_chat_stream(chunks(vec![b"data:Hel\ndata:lo\n"]))).await;
        let text: Vec<_> = got.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn prefix_is_stripped_exactly() {
        let got = collect(decode_chat_stream(chunks(vec![b"data: spaced\n"]))).await;
        assert_eq!(got[0].as_ref().unwrap(), " spaced");
    }

    #[tokio::test]
    async fn empty_payload_is_newline() {
        let got = collect(decode_chat_stream(chunks(vec![b"data:a\ndata:\ndata:b\n"]))).await;
        let text: String = got.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text, "a\nb");
    }

    #[tokio::test]
    async fn other_lines_are_ignored() {
        let got = collect(decode_chat_stream(chunks(vec![
            b"event: message\n\n: keep-alive\nid: 3\ndata:x\n",
        ])))
        .await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].as_ref().unwrap(), "x");
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let got = collect(decode_chat_stream(chunks(vec![b"da", b"ta:one\r", b"\ndata:two"]))).await;
        let text: Vec<_> = got.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks() {
        let bytes = "data:분석\n".as_bytes();
        let (head, tail) = bytes.split_at(7);
        let head: &'static [u8] = Box::leak(head.to_vec().into_boxed_slice());
        let tail: &'static [u8] = Box::leak(tail.to_vec().into_boxed_slice());
        let got = collect(decode_chat_stream(chunks(vec![head, tail]))).await;
        assert_eq!(got[0].as_ref().unwrap(), "분석");
    }

    #[tokio::test]
    async fn transport_error_interrupts() {
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data:partial\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data:never\n")),
        ];
        let got = collect(decode_chat_stream(stream::iter(parts))).await;
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].as_ref().unwrap(), "partial");
        assert!(got[1].as_ref().unwrap_err().is_stream_interrupted());
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        let got = collect(decode_chat_stream(chunks(vec![]))).await;
        assert!(got.is_empty());
    }
}
