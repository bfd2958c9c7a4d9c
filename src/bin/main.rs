use aws_log_forwarder::{handle_event, ingest};
use aws_sdk_ecs::Client as EcsClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    // Get AWS Configuration
    let config = aws_config::load_from_env().await;
    let ecs_client = EcsClient::new(&config);
    let http_client = ingest::http_client()?;

    run(service_fn(|event: LambdaEvent<Value>| {
        handle_event(&ecs_client, &http_client, event)
    }))
    .await
}
