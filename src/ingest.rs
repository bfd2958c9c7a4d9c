use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::{
    error::RuntimeError,
    message::{Batch, Message},
};

/// Maximum time a delivery can take
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User sent with the api key, the ingestion API only checks the password
const BASIC_AUTH_USER: &str = "user";

#[derive(Serialize)]
struct IngestBody<'a> {
    e: &'static str,
    ls: &'a [Message],
}

/// Build the HTTP client used for deliveries
pub fn http_client() -> Result<Client, RuntimeError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Send the batch to the ingestion endpoint in a single request.
/// Without an api key the delivery is disabled and nothing is sent.
/// Non-2xx responses are reported as errors, the body is never read.
#[tracing::instrument(skip(client, api_key, batch), fields(count = batch.messages.len()))]
pub async fn send_batch(
    client: &Client,
    ingest_url: &str,
    api_key: Option<&str>,
    batch: &Batch,
) -> Result<(), RuntimeError> {
    let api_key = match api_key {
        Some(key) => key,
        None => {
            tracing::debug!("api key not configured, skipping delivery");
            return Ok(());
        }
    };

    tracing::info!("sending logs to the ingestion endpoint");

    let response = client
        .post(ingest_url)
        .basic_auth(BASIC_AUTH_USER, Some(api_key))
        .query(&batch.options)
        .json(&IngestBody {
            e: "ls",
            ls: &batch.messages,
        })
        .send()
        .await?
        .error_for_status()?;

    tracing::info!(status = %response.status(), "logs delivered");

    Ok(())
}
