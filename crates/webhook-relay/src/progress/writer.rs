// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::ProgressDispatcher;
use std::io;
use std::sync::Arc;

/// [`io::Write`] adapter that feeds a [`ProgressDispatcher`] line by line.
///
/// Output is split on both `\n` and `\r`, since progress bars redraw in place
/// with a carriage return. Invalid UTF-8 is replaced rather than rejected.
/// A trailing partial line is dispatched on [`io::Write::flush`] and on drop.
#[derive(Debug)]
pub struct ProgressWriter {
    dispatcher: Arc<ProgressDispatcher>,
    pending: Vec<u8>,
}

impl ProgressWriter {
    #[must_use]
    pub fn new(dispatcher: Arc<ProgressDispatcher>) -> Self {
        Self {
            dispatcher,
            pending: Vec::new(),
        }
    }

    fn dispatch_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        self.dispatcher.write(&line);
    }
}

impl io::Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                self.dispatch_pending();
            } else {
                self.pending.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.dispatch_pending();
        Ok(())
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        self.dispatch_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::delivery::{DeliveryHandle, DeliveryService};
    use crate::sink::MemorySink;
    use std::io::Write;
    use std::time::Duration;

    fn start() -> (ProgressWriter, DeliveryHandle, MemorySink) {
        let sink = MemorySink::new();
        let (service, handle) = DeliveryService::new(sink.clone(), Duration::from_secs(1));
        tokio::spawn(service.run());
        let dispatcher = Arc::new(ProgressDispatcher::new(
            &RelayConfig::default(),
            handle.clone(),
        ));
        (ProgressWriter::new(dispatcher), handle, sink)
    }

    #[tokio::test]
    async fn test_splits_on_newlines() {
        let (mut writer, handle, sink) = start();

        writeln!(writer, "first").unwrap();
        write!(writer, "sec").unwrap();
        write!(writer, "ond\nthird\n").unwrap();
        handle.drain().await.unwrap();

        assert_eq!(sink.bodies(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_carriage_return_redraws() {
        let (mut writer, handle, sink) = start();

        for current in [0, 5, 10] {
            write!(
                writer,
                "\rWork: {}%|#| {current}/10 [00:01<00:01]",
                current * 10
            )
            .unwrap();
        }
        writer.write_all(b"\n").unwrap();
        handle.drain().await.unwrap();

        let bodies = sink.bodies();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].starts_with("Work: [--------------------]"));
        assert!(bodies[2].starts_with("Work: [====================]"));
    }

    #[tokio::test]
    async fn test_flush_and_drop_emit_partial_line() {
        let (mut writer, handle, sink) = start();

        write!(writer, "partial").unwrap();
        handle.drain().await.unwrap();
        assert!(sink.is_empty());

        writer.flush().unwrap();
        write!(writer, "tail").unwrap();
        drop(writer);
        handle.drain().await.unwrap();

        assert_eq!(sink.bodies(), vec!["partial", "tail"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let (mut writer, handle, sink) = start();

        writer.write_all(b"bad \xff byte\n").unwrap();
        handle.drain().await.unwrap();

        assert_eq!(sink.bodies(), vec!["bad \u{fffd} byte"]);
    }
}
