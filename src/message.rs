use serde::Serialize;

use crate::config::Config;

/// Maximum number of characters forwarded for a single line
pub const MAX_LINE_LENGTH: usize = 32000;

/// Marker appended to lines cut at `MAX_LINE_LENGTH`
pub const TRUNCATION_MARKER: &str = " (cut off, too long...)";

/// `Message` is a single log line in the shape the ingestion API expects
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    /// Text of the log entry
    pub line: String,
    /// When the event happened
    pub timestamp: Timestamp,
    /// Synthetic source label, `ecs[web]` or `app[ecs]` for example
    pub file: String,
    /// Log group and stream information, only set for CloudWatch logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// `Timestamp` keeps the representation each source provides
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the epoch, as CloudWatch reports them
    Millis(i64),
    /// ISO-8601 string, used for ECS service events
    Iso8601(String),
}

/// `Meta` describes where a CloudWatch log line comes from
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Meta {
    /// Source type label
    #[serde(rename = "type")]
    pub kind: String,
    /// CloudWatch log group name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// CloudWatch log stream name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}

/// `Options` is the envelope sent as query parameters with every batch
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Options {
    /// Hostname the lines are attributed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Comma separated tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// `Batch` groups the messages of one invocation with their envelope
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    /// Sanitized messages in delivery order
    pub messages: Vec<Message>,
    /// Envelope for the whole batch
    pub options: Options,
}

impl Message {
    /// Cut the line at `MAX_LINE_LENGTH` characters and flag it with `TRUNCATION_MARKER`.
    /// The marker is not counted against the limit.
    pub fn sanitize(mut self) -> Message {
        if let Some((end, _)) = self.line.char_indices().nth(MAX_LINE_LENGTH) {
            self.line.truncate(end);
            self.line.push_str(TRUNCATION_MARKER);
        }
        self
    }
}

impl Options {
    /// Build the envelope for a batch.
    /// A configured hostname always wins over the one derived from the source.
    pub fn new(derived_hostname: Option<String>, config: &Config) -> Options {
        Options {
            hostname: config.hostname.clone().or(derived_hostname),
            tags: config.tags.clone(),
        }
    }
}
