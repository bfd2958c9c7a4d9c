use crate::{
    config::Config,
    event::LogData,
    message::{Batch, Message, Meta, Options, Timestamp},
};

/// Source label used when the log group is unknown
const DEFAULT_APP: &str = "CloudWatch";

/// Turn a CloudWatch Logs delivery into a batch of messages.
/// Every event shares the same app label and meta information.
#[tracing::instrument(skip(data, config), fields(log_group = ?data.log_group, log_stream = ?data.log_stream))]
pub fn prepare_messages(data: LogData, config: &Config) -> Batch {
    let app = match (&data.log_group, &data.log_stream) {
        (Some(_), Some(stream)) => app_name(stream),
        _ => DEFAULT_APP.to_string(),
    };
    let hostname = data.log_stream.as_deref().map(stream_hostname);

    let meta = Meta {
        kind: DEFAULT_APP.into(),
        group: data.log_group,
        stream: data.log_stream,
    };

    let messages = data
        .log_events
        .into_iter()
        .map(|event| {
            Message {
                line: event.message,
                timestamp: Timestamp::Millis(event.timestamp),
                file: app.clone(),
                meta: Some(meta.clone()),
            }
            .sanitize()
        })
        .collect::<Vec<_>>();

    tracing::info!(count = messages.len(), "prepared cloudwatch log messages");

    Batch {
        messages,
        options: Options::new(hostname, config),
    }
}

/// `ecs/app/1234` becomes `app[ecs]`
fn app_name(log_stream: &str) -> String {
    let prefix = log_stream.split('/').next().unwrap_or_default();
    format!("app[{}]", prefix)
}

/// The task or container id is the last part of the stream name,
/// after the last `/` and the last `]`.
fn stream_hostname(log_stream: &str) -> String {
    let last = log_stream.rsplit('/').next().unwrap_or_default();
    last.rsplit(']').next().unwrap_or_default().to_string()
}
