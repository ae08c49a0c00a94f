//! The two ways of translating a recording: one blocking request through the
//! typed client, and one streamed request whose fragments are printed as they
//! arrive.

use crate::openai::{stream_audio, Audio, AudioTask, OpenAI, OpenAIConfig, Response, Result};
use reqwest::Client;
use std::io::Write;
use std::path::Path;

/// Printed in front of every translation.
pub const RESULT_LABEL: &str = "translation result:";

pub const LANGUAGE: &str = "it";
pub const SEED: i64 = 4419;
pub const REPETITION_PENALTY: f64 = 1.3;

/// Parameters of the blocking call. Language, seed and repetition penalty are
/// server extensions and travel as extra options.
pub fn sync_request() -> Audio {
    <Audio as OpenAIConfig>::default()
        .set_extra("language", LANGUAGE)
        .set_extra("seed", SEED)
        .set_extra("repetition_penalty", REPETITION_PENALTY)
}

pub fn stream_request() -> Audio {
    Audio::new(Audio::DEFAULT_MODEL)
        .set_language(LANGUAGE)
        .set_stream(true)
}

/// Translates `audio_path` with a single blocking request and writes the
/// labelled result to `out`.
pub fn sync_translation<P: AsRef<Path>, W: Write>(
    client: &OpenAI<Audio>,
    audio_path: P,
    out: &mut W,
) -> Result<Response> {
    let translation = client.translate(audio_path)?;
    writeln!(out, "{} {}", RESULT_LABEL, translation.text)?;
    Ok(translation)
}

/// Translates `audio_path` through the raw streaming endpoint, writing each
/// fragment to `out` as soon as it is received. Returns the full text.
pub async fn stream_translation<P: AsRef<Path>, W: Write>(
    audio_path: P,
    base_url: &str,
    api_key: &str,
    out: &mut W,
) -> Result<String> {
    let url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        AudioTask::Translation.path()
    );
    write!(out, "{} ", RESULT_LABEL)?;
    out.flush()?;

    let client = Client::new();
    let deltas = stream_audio(&client, &url, api_key, &stream_request(), audio_path).await?;
    let text = deltas.write_to(out).await?;
    tracing::debug!(chars = text.chars().count(), "stream finished");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_request_carries_extras() {
        let request = sync_request();
        assert!(request.validate().is_ok());
        let fields = request.form_fields();
        assert!(fields.contains(&("language".to_string(), "it".to_string())));
        assert!(fields.contains(&("seed".to_string(), "4419".to_string())));
        assert!(fields.contains(&("repetition_penalty".to_string(), "1.3".to_string())));
        assert!(fields.contains(&("response_format".to_string(), "json".to_string())));
        assert!(!fields.iter().any(|(name, _)| name == "stream"));
    }

    #[test]
    fn test_stream_request_fields() {
        let request = stream_request();
        assert!(request.validate().is_ok());
        assert_eq!(request.stream, Some(true));
        assert_eq!(request.language.as_deref(), Some("it"));
    }
}
