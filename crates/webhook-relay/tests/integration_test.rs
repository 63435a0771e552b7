// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use mockito::{Matcher, Server};
use std::io::Write;
use std::time::Duration;
use webhook_relay::{RelayConfig, Session, Severity};

fn config_for(server: &Server) -> RelayConfig {
    RelayConfig {
        webhook_url: Some(format!("{}/hook", server.url())),
        username: "Trainer".to_string(),
        flush_interval: Duration::from_secs(3600),
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

#[tokio::test]
async fn progress_checkpoints_are_posted_to_webhook() {
    let mut server = Server::new_async().await;
    let checkpoints = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Regex(r"Epoch: \[[=-]{20}\]".to_string()))
        .with_status(204)
        .expect(11)
        .create_async()
        .await;
    let plain = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJsonString(
            r#"{"content":"```\nLoading data\n```","username":"Trainer"}"#.to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let session = Session::start_webhook(config_for(&server)).unwrap();
    let result = session
        .run("train", |mut out| async move {
            writeln!(out, "Loading data")?;
            for step in 0..=200u64 {
                write!(
                    out,
                    "\rEpoch: {}%|#####     | {step}/200 [00:10<00:10, 20.00it/s]",
                    step / 2
                )?;
            }
            writeln!(out)?;
            Ok::<_, std::io::Error>(())
        })
        .await;
    assert!(result.is_ok());

    let stats = session.finish().await;
    checkpoints.assert_async().await;
    plain.assert_async().await;
    assert_eq!(stats.delivered, 12);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn warning_flushes_buffered_logs_as_one_message() {
    let mut server = Server::new_async().await;
    let batch = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJsonString(
            r#"{"content":"```\nloading shard 1\nshard 2 is missing\n```"}"#.to_string(),
        ))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let session = Session::start_webhook(config_for(&server)).unwrap();
    let logs = session.logs();
    logs.record("debug noise", Severity::Debug);
    logs.record("loading shard 1", Severity::Info);
    logs.record("shard 2 is missing", Severity::Warn);
    assert_eq!(logs.pending(), 0);

    session.flush().await;
    batch.assert_async().await;
    session.finish().await;
}

#[tokio::test]
async fn failing_webhook_never_reaches_the_caller() {
    let mut server = Server::new_async().await;
    let rejected = server
        .mock("POST", "/hook")
        .with_status(429)
        .with_body(r#"{"message":"You are being rate limited.","retry_after":0.5}"#)
        .expect(2)
        .create_async()
        .await;

    let session = Session::start_webhook(config_for(&server)).unwrap();
    let value = session
        .run("report", |mut out| async move {
            writeln!(out, "still running")?;
            Ok::<_, std::io::Error>(42)
        })
        .await
        .unwrap();
    session.logs().record("something broke", Severity::Error);

    let stats = session.finish().await;
    rejected.assert_async().await;
    assert_eq!(value, 42);
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failed, 2);
}

#[tokio::test]
async fn operation_error_is_posted_and_returned() {
    let mut server = Server::new_async().await;
    let report = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJsonString(
            r#"{"content":"```\nError in load_model: checkpoint not found\n```"}"#.to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let session = Session::start_webhook(config_for(&server)).unwrap();
    let result: Result<(), String> = session
        .run("load_model", |_out| async {
            Err("checkpoint not found".to_string())
        })
        .await;

    assert_eq!(result.unwrap_err(), "checkpoint not found");
    report.assert_async().await;
    session.finish().await;
}
