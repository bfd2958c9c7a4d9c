use thiserror::Error as ThisError;

/// Different errors that the forwarder can raise
#[derive(Debug, ThisError)]
pub enum RuntimeError {
    /// Error returned when a required environment variable is not set
    #[error("missing environment variable {0}")]
    MissingConfig(&'static str),
    /// Error returned when an environment variable cannot be parsed
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidConfig {
        /// Name of the variable
        name: &'static str,
        /// Raw value found in the environment
        value: String,
    },
    /// Error returned when the subscription payload is not valid base64, gzip or JSON
    #[error("failed to decode cloudwatch logs payload")]
    Decode(#[source] serde_json::Error),
    /// Error returned by the ECS API
    #[error("unexpected ecs error")]
    Ecs(#[from] aws_sdk_ecs::Error),
    /// Error returned when ECS doesn't describe a requested service
    #[error("ecs service {service} not found: {reason}")]
    MissingService {
        /// Service that was requested
        service: String,
        /// Failure reason reported by ECS, if any
        reason: String,
    },
    /// Error returned when the ingestion endpoint cannot be reached or rejects the batch
    #[error("failed to send logs to the ingestion endpoint")]
    Ingest(#[from] reqwest::Error),
}
