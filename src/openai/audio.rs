use crate::openai::error::{Error, Result};
use crate::openai::OpenAIConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// The result of a single-shot audio request.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Response {
    pub text: String,

    /// Only present for `verbose_json` responses.
    #[serde(default)]
    pub language: Option<String>,

    /// Only present for `verbose_json` responses.
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Response {
    pub fn from_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            language: None,
            duration: None,
        }
    }
}

/// Which audio endpoint a request is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioTask {
    Translation,
    Transcription,
}

impl AudioTask {
    /// Path of the endpoint relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Translation => "audio/translations",
            Self::Transcription => "audio/transcriptions",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileType {
    Flac,
    Mp3,
    Mp4,
    Mpeg,
    Mpga,
    M4a,
    Ogg,
    Wav,
    Webm,
}

impl FileType {
    const ALL: [Self; 9] = [
        Self::Flac,
        Self::Mp3,
        Self::Mp4,
        Self::Mpeg,
        Self::Mpga,
        Self::M4a,
        Self::Ogg,
        Self::Wav,
        Self::Webm,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
            Self::Mpeg => "mpeg",
            Self::Mpga => "mpga",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
            Self::Webm => "webm",
        }
    }

    fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                Error::InvalidParameter(format!("missing file extension: {}", path.display()))
            })?;
        Self::try_from(extension.to_ascii_lowercase().as_str())
    }
}

impl TryFrom<&str> for FileType {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|file_type| file_type.as_str() == value)
            .ok_or_else(|| Error::InvalidParameter(format!("invalid file type: {value}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
    Srt,
    VerboseJson,
    Vtt,
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Srt => "srt",
            Self::VerboseJson => "verbose_json",
            Self::Vtt => "vtt",
        };
        f.write_str(format)
    }
}

impl TryFrom<&str> for ResponseFormat {
    type Error = Error;

    fn try_from(input: &str) -> Result<Self> {
        match input {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "srt" => Ok(Self::Srt),
            "verbose_json" => Ok(Self::VerboseJson),
            "vtt" => Ok(Self::Vtt),
            _ => Err(Error::InvalidParameter(format!(
                "invalid response format: {input}"
            ))),
        }
    }
}

impl ResponseFormat {
    pub fn get_default_response_format() -> Self {
        Self::Json
    }

    /// Whether the server answers with a JSON document rather than plain text.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::VerboseJson)
    }
}

/// Parameters of an audio translation or transcription request.
///
/// Everything except the audio file itself is sent as a multipart text field.
#[derive(Clone, Debug, PartialEq)]
pub struct Audio {
    /// ID of the model to use.
    pub model: String,

    /// The format of the transcript output, in one of these options: json, text, srt, verbose_json, or vtt.
    pub response_format: Option<ResponseFormat>,

    /// The sampling temperature, between 0 and 2. Higher values make the output more random, lower values make it
    /// more focused and deterministic.
    pub temperature: Option<f64>,

    /// The language of the input audio in ISO-639-1 format.
    pub language: Option<String>,

    /// An optional text to guide the model's style or continue a previous audio segment.
    pub prompt: Option<String>,

    /// Ask the server for an incremental `data:` event stream.
    pub stream: Option<bool>,

    /// Server specific options that are not part of the OpenAI API, e.g. `seed` or
    /// `repetition_penalty`. Each entry becomes its own form field.
    pub extra_body: Map<String, Value>,
}

impl Audio {
    pub const DEFAULT_MODEL: &'static str = "openai/whisper-large-v3";
    pub const DEFAULT_TEMPERATURE: f64 = 0.0;
    pub const MAX_TEMPERATURE: f64 = 2.0;
    pub const ISO_639_1_CODES: &'static [&'static str] = &[
        "ab", "aa", "af", "ak", "sq", "am", "ar", "an", "hy", "as", "av", "ae", "ay", "az", "bm",
        "ba", "eu", "be", "bn", "bh", "bi", "bs", "br", "bg", "my", "ca", "ch", "ce", "ny", "zh",
        "cv", "kw", "co", "cr", "hr", "cs", "da", "dv", "nl", "dz", "en", "eo", "et", "ee", "fo",
        "fj", "fi", "fr", "ff", "gl", "ka", "de", "el", "gn", "gu", "ht", "ha", "he", "hz", "hi",
        "ho", "hu", "ia", "id", "ie", "ga", "ig", "ik", "io", "is", "it", "iu", "ja", "jv", "kl",
        "kn", "kr", "ks", "kk", "km", "ki", "rw", "ky", "kv", "kg", "ko", "ku", "kj", "la", "lb",
        "lg", "li", "ln", "lo", "lt", "lu", "lv", "gv", "mk", "mg", "ms", "ml", "mt", "mi", "mr",
        "mh", "mn", "na", "nv", "nd", "ne", "ng", "nb", "nn", "no", "ii", "nr", "oc", "oj", "cu",
        "om", "or", "os", "pa", "pi", "fa", "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "sa",
        "sc", "sd", "se", "sm", "sg", "sr", "gd", "sn", "si", "sk", "sl", "so", "st", "es", "su",
        "sw", "ss", "sv", "ta", "te", "th", "ti", "to", "tn", "ts", "tk", "tr", "tw", "ug", "uk",
        "ur", "uz", "ve", "vi", "vo", "wa", "cy", "wo", "fy", "xh", "yi", "yo", "za", "zu",
    ];

    /// A request for `model` with every optional field left unset.
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            response_format: None,
            temperature: None,
            language: None,
            prompt: None,
            stream: None,
            extra_body: Map::new(),
        }
    }

    pub fn get_default_model() -> &'static str {
        Self::DEFAULT_MODEL
    }

    pub fn get_default_temperature() -> f64 {
        Self::DEFAULT_TEMPERATURE
    }

    pub fn get_default_response_format() -> ResponseFormat {
        ResponseFormat::get_default_response_format()
    }

    pub fn set_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn set_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn set_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn set_language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn set_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn set_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Adds a server specific option that is sent verbatim next to the typed fields.
    pub fn set_extra<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.extra_body.insert(key.into(), value.into());
        self
    }

    /// The response format the server will use, taking its default into account.
    pub fn effective_response_format(&self) -> ResponseFormat {
        self.response_format
            .unwrap_or_else(ResponseFormat::get_default_response_format)
    }

    pub fn is_file_type_supported<P: AsRef<Path>>(file_name: P) -> bool {
        FileType::from_path(file_name.as_ref()).is_ok()
    }

    pub fn get_supported_file_types() -> Vec<String> {
        FileType::ALL
            .into_iter()
            .map(|file_type| file_type.as_str().to_string())
            .collect()
    }

    pub fn is_valid_language(language: &str) -> bool {
        if language.len() != 2 {
            return false;
        }
        Self::ISO_639_1_CODES.contains(&language)
    }

    /// Checks that `path` points to an existing audio file of a supported type.
    pub fn check_file(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::InvalidParameter(format!(
                "audio file not found: {}",
                path.display()
            )));
        }
        FileType::from_path(path).map(|_| ())
    }

    fn typed_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("model", self.model.clone())];
        if let Some(response_format) = self.response_format {
            fields.push(("response_format", response_format.to_string()));
        }
        if let Some(temperature) = self.temperature {
            fields.push(("temperature", temperature.to_string()));
        }
        if let Some(language) = &self.language {
            fields.push(("language", language.clone()));
        }
        if let Some(prompt) = &self.prompt {
            fields.push(("prompt", prompt.clone()));
        }
        if let Some(stream) = self.stream {
            fields.push(("stream", stream.to_string()));
        }
        fields
    }

    /// All parameters as multipart text fields, typed fields first, then the
    /// extra options in insertion order. `null` extras are left out.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let typed = self
            .typed_fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value));
        let extra = self
            .extra_body
            .iter()
            .filter_map(|(name, value)| form_value(value).map(|value| (name.clone(), value)));
        typed.chain(extra).collect()
    }

    /// An extra option, with `null` treated as unset.
    fn extra(&self, key: &str) -> Option<&Value> {
        self.extra_body.get(key).filter(|value| !value.is_null())
    }

    fn language_hint(&self) -> Result<Option<&str>> {
        if let Some(language) = &self.language {
            return Ok(Some(language.as_str()));
        }
        match self.extra("language") {
            None => Ok(None),
            Some(Value::String(language)) => Ok(Some(language.as_str())),
            Some(other) => Err(Error::InvalidParameter(format!(
                "language must be a string, got {other}"
            ))),
        }
    }

    /// Rejects requests the server would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::InvalidParameter("model must not be empty".into()));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=Self::MAX_TEMPERATURE).contains(&temperature) {
                return Err(Error::InvalidParameter(format!(
                    "temperature must be between 0 and {}, got {temperature}",
                    Self::MAX_TEMPERATURE
                )));
            }
        }

        if let Some(language) = self.language_hint()? {
            if language.is_empty() {
                return Err(Error::InvalidParameter("language must not be empty".into()));
            }
            if !Self::is_valid_language(language) {
                return Err(Error::InvalidParameter(format!(
                    "language is not an ISO-639-1 code: {language}"
                )));
            }
        }

        if let Some(penalty) = self.extra("repetition_penalty") {
            match penalty.as_f64() {
                Some(penalty) if penalty > 0.0 => {}
                _ => {
                    return Err(Error::InvalidParameter(format!(
                        "repetition_penalty must be a positive number, got {penalty}"
                    )))
                }
            }
        }

        if let Some(seed) = self.extra("seed") {
            if !(seed.is_i64() || seed.is_u64()) {
                return Err(Error::InvalidParameter(format!(
                    "seed must be an integer, got {seed}"
                )));
            }
        }

        if let Some((name, _)) = self
            .typed_fields()
            .into_iter()
            .find(|(name, _)| self.extra(name).is_some())
        {
            return Err(Error::InvalidParameter(format!(
                "`{name}` is set both as a field and as an extra option"
            )));
        }

        Ok(())
    }
}

fn form_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl OpenAIConfig for Audio {
    fn default() -> Self {
        Self::new(Self::get_default_model())
            .set_response_format(Self::get_default_response_format())
            .set_temperature(Self::get_default_temperature())
    }
}
