use audio_translate::openai::{Audio, OpenAI, DEFAULT_API_BASE, DEFAULT_API_KEY};
use audio_translate::translate;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn audio_asset_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("azacinto_foscolo.ogg")
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Logs go to stderr so stdout only carries translations.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let foscolo = audio_asset_path();
    tracing::info!(path = %foscolo.display(), "using audio sample");

    let client = OpenAI::<Audio>::new(DEFAULT_API_KEY, DEFAULT_API_BASE)?
        .with_config(translate::sync_request());
    translate::sync_translation(&client, &foscolo, &mut io::stdout())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(translate::stream_translation(
        &foscolo,
        DEFAULT_API_BASE,
        DEFAULT_API_KEY,
        &mut io::stdout(),
    ))?;
    Ok(())
}
