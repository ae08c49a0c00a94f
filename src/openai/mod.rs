pub mod audio;
pub mod error;
pub mod misc;
pub mod streaming;

pub use audio::{Audio, AudioTask, Response, ResponseFormat};
pub use error::{Error, Result};
pub use misc::{ErrorDetails, OpenAIError};
pub use streaming::{parse_line, stream_audio, DeltaStream, LineEvent};

use misc::api_error;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::path::Path;

/// Base URL of a locally running OpenAI-compatible server.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/v1";

/// Placeholder key for servers that do not check authentication.
pub const DEFAULT_API_KEY: &str = "EMPTY";

pub trait OpenAIConfig: Send + Sync {
    fn default() -> Self;
}

/// A typed client whose requests are shaped by the config `C`.
///
/// Calls block the current thread until the whole response has been read, so
/// the client must not be used from inside an async runtime. Requests have no
/// timeout; a long recording may take the server minutes to translate.
#[derive(Clone, Debug)]
pub struct OpenAI<C: OpenAIConfig> {
    pub client: Client,
    pub api_key: String,
    pub base_url: String,
    pub config: C,
}

impl<C: OpenAIConfig> OpenAI<C> {
    pub fn new<K: Into<String>, U: Into<String>>(api_key: K, base_url: U) -> Result<Self> {
        // The blocking client defaults to a 30 s total timeout.
        let client = Client::builder().timeout(None).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            config: C::default(),
        })
    }

    /// A client for the local server with the placeholder key.
    pub fn local() -> Result<Self> {
        Self::new(DEFAULT_API_KEY, DEFAULT_API_BASE)
    }

    pub fn with_config(mut self, config: C) -> Self {
        self.config = config;
        self
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Joins `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl OpenAI<Audio> {
    pub fn set_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config = self.config.set_model(model);
        self
    }

    pub fn set_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.config = self.config.set_response_format(response_format);
        self
    }

    pub fn set_temperature(mut self, temperature: f64) -> Self {
        self.config = self.config.set_temperature(temperature);
        self
    }

    pub fn set_extra<K: Into<String>, V: Into<serde_json::Value>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.config = self.config.set_extra(key, value);
        self
    }

    /// Translates the audio file at `path` into English text.
    pub fn translate<P: AsRef<Path>>(&self, path: P) -> Result<Response> {
        self.send_audio(AudioTask::Translation, path.as_ref())
    }

    /// Transcribes the audio file at `path` in its spoken language.
    pub fn transcribe<P: AsRef<Path>>(&self, path: P) -> Result<Response> {
        self.send_audio(AudioTask::Transcription, path.as_ref())
    }

    fn file_part(path: &Path) -> Result<Part> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio")
            .to_string();
        let file = std::fs::File::open(path)?;
        let length = file.metadata()?.len();
        let part = Part::reader_with_length(file, length)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        Ok(part)
    }

    fn send_audio(&self, task: AudioTask, path: &Path) -> Result<Response> {
        self.config.validate()?;
        Audio::check_file(path)?;

        let form = self
            .config
            .form_fields()
            .into_iter()
            .fold(Form::new().part("file", Self::file_part(path)?), |form, (name, value)| {
                form.text(name, value)
            });

        let url = self.endpoint(task.path());
        tracing::debug!(%url, model = %self.config.model, "sending audio request");
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()?;

        let status = res.status();
        let body = res.text()?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        if self.config.effective_response_format().is_json() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Ok(Response::from_text(body))
        }
    }
}
