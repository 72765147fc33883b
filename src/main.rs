use anyhow::{anyhow, Result};
use face_detection_bridge::app::App;
use face_detection_bridge::conf::Settings;
use face_detection_bridge::error::Error;
use face_detection_bridge::trigger::TriggerNotification;
use lambda_runtime::{run, service_fn, LambdaEvent};

/// Handle an object storage trigger through the detection pipeline
async fn function_handler(
    app: &App,
    event: LambdaEvent<TriggerNotification>,
) -> Result<&'static str, Error> {
    app.handle(&event.payload).await
}

/// Run a serverless function that listens to object storage triggers,
/// detects faces in every created image, and publishes a summary of
/// the detected faces to a message queue.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    let settings = Settings::from_env()?;
    let app = App::from_settings(&settings).await?;

    run(service_fn(|event| function_handler(&app, event)))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
