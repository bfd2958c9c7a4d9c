use serde::{de::Error, Deserialize, Deserializer};
use serde_json::Value;
use std::io::BufReader;

use crate::error::RuntimeError;

/// `TriggerEvent` is the payload a forwarder invocation receives
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerEvent {
    /// Log events delivered by a CloudWatch Logs subscription
    CloudWatchLogs(LogsEvent),
    /// Any other payload, usually a scheduled tick
    Scheduled,
}

impl TryFrom<Value> for TriggerEvent {
    type Error = RuntimeError;

    /// Payloads with an `awslogs` field must decode completely,
    /// a broken subscription payload is never treated as a tick.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if value.get("awslogs").is_none() {
            return Ok(TriggerEvent::Scheduled);
        }
        serde_json::from_value(value)
            .map(TriggerEvent::CloudWatchLogs)
            .map_err(RuntimeError::Decode)
    }
}

/// `LogsEvent` represents the raw event sent by CloudWatch
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct LogsEvent {
    /// Subscription data.
    // aws_logs is gzipped and base64 encoded, it needs a custom deserializer
    #[serde(rename = "awslogs")]
    pub aws_logs: AwsLogs,
}

/// `AwsLogs` is an unmarshaled, ungzipped, CloudWatch logs event
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AwsLogs {
    /// Decoded log data
    #[serde(deserialize_with = "from_base64")]
    pub data: LogData,
}

/// `LogData` represents the logs group event information
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogData {
    /// AWS account that owns the log group
    #[serde(default)]
    pub owner: String,
    /// Log group name
    pub log_group: Option<String>,
    /// Log stream name
    pub log_stream: Option<String>,
    /// Subscription filters that matched the events
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    /// `DATA_MESSAGE` or `CONTROL_MESSAGE`
    #[serde(default)]
    pub message_type: String,
    /// Log events in the delivery
    #[serde(default)]
    pub log_events: Vec<LogEntry>,
}

/// `LogEntry` represents a log entry from cloudwatch logs
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Event id
    #[serde(default)]
    pub id: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// Raw log line
    pub message: String,
}

fn from_base64<'d, D>(deserializer: D) -> Result<LogData, D::Error>
where
    D: Deserializer<'d>,
{
    let bytes = String::deserialize(deserializer)
        .and_then(|string| base64::decode(&string).map_err(D::Error::custom))?;

    let bytes = flate2::read::GzDecoder::new(&bytes[..]);
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(bytes));
    LogData::deserialize(&mut de).map_err(D::Error::custom)
}
