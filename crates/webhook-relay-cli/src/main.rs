// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, io::Write as _, process::Stdio};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    process::Command,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use webhook_relay::{ProgressWriter, RelayConfig, Session, WebhookLayer};

const CONFIG_ERROR_EXIT_CODE: i32 = 2;
const INTERRUPTED_EXIT_CODE: i32 = 130;
const READ_BUFFER_SIZE: usize = 8192;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("RELAY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let session = RelayConfig::from_env().and_then(Session::start_webhook);
    init_tracing(&log_level, session.as_ref().ok().map(Session::layer));

    let session = match session {
        Ok(session) => session,
        Err(e) => {
            error!("Unable to start relay: {}", e);
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let command: Vec<String> = env::args()
        .skip(1)
        .skip_while(|arg| arg == "--")
        .collect();

    let code = if command.is_empty() {
        relay_stdin(&session).await
    } else {
        relay_command(&session, &command).await
    };

    let stats = session.finish().await;
    debug!(
        "Relayed {} messages, {} failed",
        stats.delivered, stats.failed
    );

    std::process::exit(code);
}

fn init_tracing(log_level: &str, relay: Option<WebhookLayer>) {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);
    let env_filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_filter(env_filter);

    if let Err(e) = tracing_subscriber::registry()
        .with(console)
        .with(relay)
        .try_init()
    {
        eprintln!("Failed to install tracing subscriber: {e}");
    }
}

async fn relay_stdin(session: &Session) -> i32 {
    let result = session
        .run("stdin", |relay| {
            pump(tokio::io::stdin(), tokio::io::stdout(), relay)
        })
        .await;

    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

async fn relay_command(session: &Session, command: &[String]) -> i32 {
    let name = command.join(" ");
    let stderr_relay = session.writer();

    let result = session
        .run(&name, |stdout_relay| {
            run_child(command, stdout_relay, stderr_relay)
        })
        .await;

    match result {
        Ok(ChildOutcome::Exited(status)) if status.success() => {
            info!("`{}` finished successfully", name);
            0
        }
        Ok(ChildOutcome::Exited(status)) => {
            error!("`{}` failed with {}", name, status);
            status.code().unwrap_or(1)
        }
        Ok(ChildOutcome::Interrupted) => {
            warn!("`{}` interrupted", name);
            INTERRUPTED_EXIT_CODE
        }
        // Already recorded by the session
        Err(_) => 1,
    }
}

enum ChildOutcome {
    Exited(std::process::ExitStatus),
    Interrupted,
}

async fn run_child(
    command: &[String],
    stdout_relay: ProgressWriter,
    stderr_relay: ProgressWriter,
) -> std::io::Result<ChildOutcome> {
    let (program, args) = match command.split_first() {
        Some(split) => split,
        None => return Err(std::io::Error::other("no command given")),
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    debug!("Spawned `{}` with pid {:?}", program, child.id());

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("child stderr not captured"))?;

    let stdout_task = tokio::spawn(pump(stdout, tokio::io::stdout(), stdout_relay));
    let stderr_task = tokio::spawn(pump(stderr, tokio::io::stderr(), stderr_relay));

    let outcome = tokio::select! {
        status = child.wait() => ChildOutcome::Exited(status?),
        _ = tokio::signal::ctrl_c() => {
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop child process: {}", e);
            }
            if let Err(e) = child.wait().await {
                warn!("Failed to reap child process: {}", e);
            }
            ChildOutcome::Interrupted
        }
    };

    for task in [stdout_task, stderr_task] {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Output stream ended with error: {}", e),
            Err(e) => warn!("Output relay task failed: {}", e),
        }
    }

    Ok(outcome)
}

/// Copies `reader` to `echo` unchanged while feeding the same bytes to `relay`.
async fn pump<R, W>(mut reader: R, mut echo: W, mut relay: ProgressWriter) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        echo.write_all(&buf[..n]).await?;
        echo.flush().await?;
        relay.write_all(&buf[..n])?;
    }
    relay.flush()
}
