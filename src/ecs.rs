use aws_sdk_ecs::{Client, Error};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

use crate::{
    config::Config,
    error::RuntimeError,
    message::{Batch, Message, Options, Timestamp},
};

/// `ServiceEvent` is an ECS service event that can be forwarded
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceEvent {
    /// Event description, `(service web) has reached a steady state.` for example
    pub message: String,
    /// When ECS recorded the event
    pub created_at: DateTime<Utc>,
}

impl ServiceEvent {
    fn into_message(self, service: &str) -> Message {
        Message {
            line: self.message,
            timestamp: Timestamp::Iso8601(iso8601(self.created_at)),
            file: format!("ecs[{}]", service),
            meta: None,
        }
        .sanitize()
    }
}

/// Whole seconds render without a fraction, anything else with microseconds
fn iso8601(at: DateTime<Utc>) -> String {
    let format = if at.timestamp_subsec_nanos() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    at.to_rfc3339_opts(format, false)
}

/// Poll every configured service and collect the events newer than the cutoff window.
/// Services are queried one after the other, the first failure aborts the poll.
#[tracing::instrument(skip(client, config))]
pub async fn poll_services(
    client: &Client,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<Batch, RuntimeError> {
    if config.services.is_empty() {
        return Err(RuntimeError::MissingConfig("SERVICES"));
    }

    let cutoff = Duration::from_std(config.event_cutoff)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut messages = Vec::new();
    for service in &config.services {
        let events =
            describe_service_events(client, config.ecs_cluster.as_deref(), service).await?;
        let total = events.len();
        let recent = filter_recent(events, cutoff);
        tracing::debug!(
            service = service.as_str(),
            retained = recent.len(),
            dropped = total - recent.len(),
            "filtered ecs service events"
        );
        messages.extend(recent.into_iter().map(|e| e.into_message(service)));
    }

    tracing::info!(count = messages.len(), "prepared ecs event messages");

    Ok(Batch {
        messages,
        options: Options::new(None, config),
    })
}

/// Keep the events created strictly after the cutoff
pub fn filter_recent(events: Vec<ServiceEvent>, cutoff: DateTime<Utc>) -> Vec<ServiceEvent> {
    events
        .into_iter()
        .filter(|event| event.created_at > cutoff)
        .collect()
}

/// Fetch the recent event list ECS keeps for a service.
/// Events without a creation time can't be placed in a window and are skipped.
#[tracing::instrument(skip(client))]
async fn describe_service_events(
    client: &Client,
    cluster: Option<&str>,
    service: &str,
) -> Result<Vec<ServiceEvent>, RuntimeError> {
    let output = client
        .describe_services()
        .set_cluster(cluster.map(String::from))
        .services(service)
        .send()
        .await
        .map_err(Error::from)?;

    let described = output
        .services
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| RuntimeError::MissingService {
            service: service.into(),
            reason: output
                .failures
                .unwrap_or_default()
                .into_iter()
                .find_map(|f| f.reason)
                .unwrap_or_else(|| "no service returned".into()),
        })?;

    let events = described
        .events
        .unwrap_or_default()
        .into_iter()
        .filter_map(|event| {
            let created_at = event
                .created_at
                .and_then(|t| Utc.timestamp_opt(t.secs(), t.subsec_nanos()).single());
            match created_at {
                Some(created_at) => Some(ServiceEvent {
                    message: event.message.unwrap_or_default(),
                    created_at,
                }),
                None => {
                    tracing::warn!(id = ?event.id, "skipping ecs event without creation time");
                    None
                }
            }
        })
        .collect();

    Ok(events)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::*;
    use aws_sdk_ecs::{Client, Config as EcsConfig};
    use aws_smithy_client::{erase::DynConnector, test_connection::TestConnection};
    use aws_smithy_http::body::SdkBody;

    const CREATED_AT: i64 = 1660000000;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn describe_services(
        request_body: &str,
        status: u16,
        response_body: &str,
    ) -> (http::Request<SdkBody>, http::Response<SdkBody>) {
        (
            get_request_builder("ecs")
                .header("content-type", "application/x-amz-json-1.1")
                .header(
                    "x-amz-target",
                    "AmazonEC2ContainerServiceV20141113.DescribeServices",
                )
                .body(SdkBody::from(request_body.to_string()))
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(response_body.to_string()))
                .unwrap(),
        )
    }

    fn service_events(service: &str, events: &[(&str, i64)]) -> String {
        let events = events
            .iter()
            .enumerate()
            .map(|(i, (message, created_at))| {
                serde_json::json!({"id": i.to_string(), "createdAt": created_at, "message": message})
            })
            .collect::<Vec<_>>();
        serde_json::json!({
            "services": [{"serviceName": service, "events": events}],
            "failures": []
        })
        .to_string()
    }

    async fn client(conn: &TestConnection<SdkBody>) -> Client {
        let config = EcsConfig::new(&get_mock_config().await);
        Client::from_conf_conn(config, DynConnector::new(conn.clone()))
    }

    fn config(services: &[&str]) -> Config {
        Config {
            ecs_cluster: Some("prod".into()),
            services: services.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_poll_services_keeps_recent_events() -> Result<(), RuntimeError> {
        let conn = TestConnection::new(vec![describe_services(
            r#"{"cluster":"prod","services":["web"]}"#,
            200,
            &service_events("web", &[("(service web) has reached a steady state.", CREATED_AT)]),
        )]);
        let client = client(&conn).await;

        let batch = poll_services(&client, &config(&["web"]), at(CREATED_AT + 5)).await?;

        assert_eq!(
            vec![Message {
                line: "(service web) has reached a steady state.".into(),
                timestamp: Timestamp::Iso8601("2022-08-08T23:06:40+00:00".into()),
                file: "ecs[web]".into(),
                meta: None,
            }],
            batch.messages
        );
        assert_eq!(Options::default(), batch.options);
        conn.assert_requests_match(&vec![]);

        Ok(())
    }

    #[tokio::test]
    async fn test_poll_services_drops_old_events() -> Result<(), RuntimeError> {
        let conn = TestConnection::new(vec![describe_services(
            r#"{"cluster":"prod","services":["web"]}"#,
            200,
            &service_events("web", &[("(service web) has started 1 tasks.", CREATED_AT)]),
        )]);
        let client = client(&conn).await;

        let batch = poll_services(&client, &config(&["web"]), at(CREATED_AT + 200)).await?;

        assert!(batch.messages.is_empty());
        conn.assert_requests_match(&vec![]);

        Ok(())
    }

    #[tokio::test]
    async fn test_poll_services_in_configured_order() -> Result<(), RuntimeError> {
        let conn = TestConnection::new(vec![
            describe_services(
                r#"{"cluster":"prod","services":["web"]}"#,
                200,
                &service_events("web", &[("web new", CREATED_AT), ("web old", CREATED_AT - 600)]),
            ),
            describe_services(
                r#"{"cluster":"prod","services":["worker"]}"#,
                200,
                &service_events("worker", &[("worker new", CREATED_AT - 10)]),
            ),
        ]);
        let client = client(&conn).await;
        let config = Config {
            hostname: Some("ecs-events".into()),
            tags: Some("prod".into()),
            ..config(&["web", "worker"])
        };

        let batch = poll_services(&client, &config, at(CREATED_AT + 30)).await?;

        let lines = batch
            .messages
            .iter()
            .map(|m| (m.file.as_str(), m.line.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![("ecs[web]", "web new"), ("ecs[worker]", "worker new")],
            lines
        );
        assert_eq!(Some("ecs-events".to_string()), batch.options.hostname);
        assert_eq!(Some("prod".to_string()), batch.options.tags);
        conn.assert_requests_match(&vec![]);

        Ok(())
    }

    #[tokio::test]
    async fn test_poll_services_with_incomplete_events() -> Result<(), RuntimeError> {
        let conn = TestConnection::new(vec![describe_services(
            r#"{"cluster":"prod","services":["web"]}"#,
            200,
            r#"{"services":[{"serviceName":"web","events":[
                {"id":"1","message":"(service web) was unable to place a task."},
                {"id":"2","createdAt":1660000000.5},
                {"id":"3","createdAt":1660000001,"message":"(service web) has started 1 tasks."}
            ]}],"failures":[]}"#,
        )]);
        let client = client(&conn).await;

        let batch = poll_services(&client, &config(&["web"]), at(CREATED_AT + 5)).await?;

        assert_eq!(
            vec![
                Message {
                    line: "".into(),
                    timestamp: Timestamp::Iso8601("2022-08-08T23:06:40.500000+00:00".into()),
                    file: "ecs[web]".into(),
                    meta: None,
                },
                Message {
                    line: "(service web) has started 1 tasks.".into(),
                    timestamp: Timestamp::Iso8601("2022-08-08T23:06:41+00:00".into()),
                    file: "ecs[web]".into(),
                    meta: None,
                },
            ],
            batch.messages
        );
        conn.assert_requests_match(&vec![]);

        Ok(())
    }

    #[tokio::test]
    async fn test_poll_services_reports_missing_service() {
        let conn = TestConnection::new(vec![describe_services(
            r#"{"cluster":"prod","services":["web"]}"#,
            200,
            r#"{"services":[],"failures":[{"arn":"arn:aws:ecs:us-west-1:123456789012:service/web","reason":"MISSING"}]}"#,
        )]);
        let client = client(&conn).await;

        let err = poll_services(&client, &config(&["web"]), at(CREATED_AT))
            .await
            .unwrap_err();

        match err {
            RuntimeError::MissingService { service, reason } => {
                assert_eq!("web", service);
                assert_eq!("MISSING", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_services_stops_at_first_api_error() {
        let conn = TestConnection::new(vec![describe_services(
            r#"{"cluster":"prod","services":["web"]}"#,
            400,
            r#"{"__type":"ClusterNotFoundException","message":"Cluster not found."}"#,
        )]);
        let client = client(&conn).await;

        let err = poll_services(&client, &config(&["web", "worker"]), at(CREATED_AT))
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Ecs(_)));
    }

    #[tokio::test]
    async fn test_poll_services_requires_services() {
        let conn = TestConnection::new(vec![]);
        let client = client(&conn).await;

        let err = poll_services(&client, &config(&[]), at(CREATED_AT))
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::MissingConfig("SERVICES")));
    }

    #[test]
    fn test_filter_recent_is_strict() {
        let event = |created_at| ServiceEvent {
            message: "event".into(),
            created_at,
        };
        let cutoff = at(CREATED_AT);
        let events = vec![
            event(at(CREATED_AT - 1)),
            event(at(CREATED_AT)),
            event(at(CREATED_AT + 1)),
        ];

        assert_eq!(vec![event(at(CREATED_AT + 1))], filter_recent(events, cutoff));
    }

    #[test]
    fn test_iso8601() {
        assert_eq!("2022-08-08T23:06:40+00:00", iso8601(at(CREATED_AT)));
        let fractional = Utc.timestamp_opt(CREATED_AT, 123_000_000).single().unwrap();
        assert_eq!("2022-08-08T23:06:40.123000+00:00", iso8601(fractional));
    }
}
