use anyhow::{Context, Result};
use face_detection_bridge::app::App;
use face_detection_bridge::conf::Settings;
use std::env::args;
use tokio::io::AsyncReadExt;

/// Run the detection pipeline once, for a trigger payload read from
/// the file given as the first argument, or from stdin.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    let settings = Settings::from_env()?;

    let payload = if let Some(path) = args().nth(1) {
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read trigger payload from {:?}", path))?
    } else {
        let mut payload = String::new();
        tokio::io::stdin()
            .read_to_string(&mut payload)
            .await
            .context("Failed to read trigger payload from stdin")?;
        payload
    };

    let app = App::from_settings(&settings).await?;
    let result = app
        .handle_payload(&payload)
        .await
        .context("Failed to handle trigger")?;
    println!("{}", result);
    Ok(())
}
