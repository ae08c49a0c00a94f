use crate::openai::audio::Audio;
use crate::openai::error::{Error, Result};
use crate::openai::misc::api_error;

use futures_util::{Stream, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::io::StreamReader;

/// Marker in front of every event line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload of the last event of a stream.
pub const DONE_TOKEN: &str = "[DONE]";

#[derive(Deserialize, Debug)]
struct StreamedResponse {
    #[serde(default)]
    choices: Vec<StreamedChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamedChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize, Debug)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// What a single line of the response body means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Blank keep-alive line.
    Skip,
    /// The terminator; nothing after it is read.
    Done,
    /// A data line, with the text fragment it carries if any.
    Chunk(Option<String>),
}

/// Decodes one line of an event stream.
///
/// The `data: ` marker is optional. Any other payload must be a JSON object;
/// its `choices[0].delta.content` is the fragment.
pub fn parse_line(line: &str) -> Result<LineEvent> {
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }
    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    if payload.trim() == DONE_TOKEN {
        return Ok(LineEvent::Done);
    }
    let chunk: StreamedResponse = serde_json::from_str(payload)?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    Ok(LineEvent::Chunk(content))
}

/// Text fragments read lazily from an event stream body.
///
/// The stream ends at the terminator, at end of body, or after the first
/// error, and cannot be restarted.
pub struct DeltaStream<R> {
    lines: Lines<R>,
    finished: bool,
}

impl<R: AsyncBufRead + Unpin> DeltaStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reads until the next line that carries text. Lines without a fragment
    /// are skipped. Returns `None` once the stream is over.
    pub async fn next_fragment(&mut self) -> Result<Option<String>> {
        while !self.finished {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::debug!("response body ended without terminator");
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    return Err(Error::from_body_read(e));
                }
            };
            match parse_line(&line) {
                Ok(LineEvent::Chunk(Some(fragment))) => return Ok(Some(fragment)),
                Ok(LineEvent::Chunk(None)) | Ok(LineEvent::Skip) => {}
                Ok(LineEvent::Done) => self.finished = true,
                Err(e) => {
                    tracing::warn!(%line, "malformed stream event");
                    self.finished = true;
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Writes every fragment to `out` as it arrives, flushing after each one,
    /// and returns the assembled text. A newline is written once the stream
    /// has ended cleanly.
    pub async fn write_to<W: Write>(mut self, out: &mut W) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await? {
            write!(out, "{fragment}")?;
            out.flush()?;
            text.push_str(&fragment);
        }
        writeln!(out)?;
        Ok(text)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<String>> {
        futures_util::stream::unfold(self, |mut deltas| async move {
            match deltas.next_fragment().await {
                Ok(Some(fragment)) => Some((Ok(fragment), deltas)),
                Ok(None) => None,
                Err(e) => Some((Err(e), deltas)),
            }
        })
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("audio")
        .to_string();
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let body = Body::wrap_stream(FramedRead::new(file, BytesCodec::new()));
    let part = Part::stream_with_length(body, length)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;
    Ok(part)
}

/// Posts `path` with the parameters in `config` and returns the response
/// body as a [`DeltaStream`].
///
/// Only the status line is awaited here; the body is read as the stream is
/// consumed.
pub async fn stream_audio<P: AsRef<Path>>(
    client: &Client,
    url: &str,
    api_key: &str,
    config: &Audio,
    path: P,
) -> Result<DeltaStream<impl AsyncBufRead + Unpin>> {
    let path = path.as_ref();
    config.validate()?;
    Audio::check_file(path)?;

    let form = config
        .form_fields()
        .into_iter()
        .fold(Form::new().part("file", file_part(path).await?), |form, (name, value)| {
            form.text(name, value)
        });

    tracing::debug!(%url, model = %config.model, "opening audio stream");
    let res = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .multipart(form)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        let body = res.text().await?;
        return Err(api_error(status, &body));
    }

    let body = Box::pin(
        res.bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    );
    Ok(DeltaStream::new(StreamReader::new(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn deltas(body: &'static str) -> DeltaStream<&'static [u8]> {
        DeltaStream::new(body.as_bytes())
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("").unwrap(), LineEvent::Skip);
        assert_eq!(parse_line("data: [DONE]").unwrap(), LineEvent::Done);
        assert_eq!(parse_line("[DONE] ").unwrap(), LineEvent::Done);
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":"Ciao"}}]}"#).unwrap(),
            LineEvent::Chunk(Some("Ciao".to_string()))
        );
        assert_eq!(
            parse_line(r#"{"choices":[{"delta":{"content":" mondo"}}]}"#).unwrap(),
            LineEvent::Chunk(Some(" mondo".to_string()))
        );
    }

    #[test]
    fn test_parse_line_without_content() {
        for line in [
            r#"data: {"choices":[{"delta":{}}]}"#,
            r#"data: {"choices":[{"delta":{"content":null}}]}"#,
            r#"data: {"choices":[{"index":0}]}"#,
            r#"data: {"choices":[]}"#,
            r#"data: {"usage":{"prompt_tokens":1}}"#,
        ] {
            assert_eq!(parse_line(line).unwrap(), LineEvent::Chunk(None), "{line}");
        }
    }

    #[test]
    fn test_parse_line_malformed() {
        assert!(matches!(
            parse_line("data: {\"choices\": ["),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_line("event: ping"), Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn test_fragments_are_concatenated() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Ciao\"}}]}\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\" mondo\"}}]}\n\
                    data: [DONE]\n";
        let mut out = Vec::new();
        let text = deltas(body).write_to(&mut out).await.unwrap();
        assert_eq!(text, "Ciao mondo");
        assert_eq!(String::from_utf8(out).unwrap(), "Ciao mondo\n");
    }

    #[tokio::test]
    async fn test_lines_after_done_are_not_read() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"fine\"}}]}\n\
                    data: [DONE]\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"extra\"}}]}\n\
                    not json at all\n";
        let mut stream = deltas(body);
        assert_eq!(stream.next_fragment().await.unwrap(), Some("fine".into()));
        assert_eq!(stream.next_fragment().await.unwrap(), None);
        assert!(stream.is_finished());
        assert_eq!(stream.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_content_does_not_stop_stream() {
        let body = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
                    \n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"uno\"}}]}\n\
                    data: {\"choices\":[{}]}\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\" due\"}}]}\n\
                    data: [DONE]\n";
        let mut out = Vec::new();
        let text = deltas(body).write_to(&mut out).await.unwrap();
        assert_eq!(text, "uno due");
    }

    #[tokio::test]
    async fn test_malformed_line_halts_output() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"prima\"}}]}\n\
                    data: {oops\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"dopo\"}}]}\n\
                    data: [DONE]\n";
        let mut out = Vec::new();
        let err = deltas(body).write_to(&mut out).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(String::from_utf8(out).unwrap(), "prima");
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_a_parse_error() {
        let body: &'static [u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\
                                    data: \xff\xfe\n\
                                    data: [DONE]\n";
        let mut out = Vec::new();
        let err = DeltaStream::new(body).write_to(&mut out).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "{err:?}");
        assert_eq!(String::from_utf8(out).unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_crlf_and_missing_terminator() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\r\n";
        let mut out = Vec::new();
        let text = deltas(body).write_to(&mut out).await.unwrap();
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn test_into_stream() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\
                    data: {bad\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"y\"}}]}\n";
        let items: Vec<Result<String>> = deltas(body).into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "x");
        assert!(matches!(items[1], Err(Error::Parse(_))));
    }
}
