#![deny(missing_docs)]
//! <fullname>AWS log forwarder</fullname>
//!
//! Lambda functions that collect CloudWatch Logs subscription
//! deliveries and ECS service events, normalize them into log lines,
//! and ship them to a log ingestion endpoint.
use aws_sdk_ecs::Client as EcsClient;
use chrono::{DateTime, Utc};
use lambda_runtime::LambdaEvent;
use serde_json::Value;

mod cloudwatch_logs;

mod config;
pub use config::{Config, DEFAULT_EVENT_CUTOFF, DEFAULT_INGEST_URL};

/// `ecs` polls ECS for recent service events
pub mod ecs;

mod error;
pub use error::RuntimeError;

mod event;
pub use event::{AwsLogs, LogData, LogEntry, LogsEvent, TriggerEvent};

/// `ingest` delivers batches to the ingestion endpoint
pub mod ingest;

mod message;
pub use message::{Batch, Message, Meta, Options, Timestamp, MAX_LINE_LENGTH, TRUNCATION_MARKER};

#[cfg(test)]
mod test_util;

/// `handle_event` is the entry point of the forwarder that accepts
/// both CloudWatch Logs subscriptions and scheduled ticks
#[tracing::instrument(skip(ecs_client, http_client, event), fields(request_id = %event.context.request_id))]
pub async fn handle_event(
    ecs_client: &EcsClient,
    http_client: &reqwest::Client,
    event: LambdaEvent<Value>,
) -> Result<(), RuntimeError> {
    let config = Config::from_env()?;
    let trigger = TriggerEvent::try_from(event.payload)?;
    forward(ecs_client, http_client, &config, trigger, Utc::now()).await
}

/// `handle_service_events` is the entry point of the ECS only forwarder.
/// It polls the configured services whatever the payload is.
#[tracing::instrument(skip(ecs_client, http_client, event), fields(request_id = %event.context.request_id))]
pub async fn handle_service_events(
    ecs_client: &EcsClient,
    http_client: &reqwest::Client,
    event: LambdaEvent<Value>,
) -> Result<(), RuntimeError> {
    let config = Config::from_env()?;
    forward(
        ecs_client,
        http_client,
        &config,
        TriggerEvent::Scheduled,
        Utc::now(),
    )
    .await
}

/// Build the batch for the trigger and deliver it.
/// Exactly one source runs per invocation, empty batches are not delivered.
#[tracing::instrument(skip(ecs_client, http_client, config, trigger))]
pub async fn forward(
    ecs_client: &EcsClient,
    http_client: &reqwest::Client,
    config: &Config,
    trigger: TriggerEvent,
    now: DateTime<Utc>,
) -> Result<(), RuntimeError> {
    let batch = match trigger {
        TriggerEvent::CloudWatchLogs(event) => {
            tracing::info!("processing cloudwatch logs subscription");
            cloudwatch_logs::prepare_messages(event.aws_logs.data, config)
        }
        TriggerEvent::Scheduled => {
            tracing::info!("polling ecs service events");
            ecs::poll_services(ecs_client, config, now).await?
        }
    };

    if batch.messages.is_empty() {
        tracing::info!("no log messages in this invocation, skipping delivery");
        return Ok(());
    }

    ingest::send_batch(
        http_client,
        &config.ingest_url,
        config.api_key.as_deref(),
        &batch,
    )
    .await
}
