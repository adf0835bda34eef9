// Output Stream Errors
// A closed terminal (broken pipe) is expected noise; any other write failure is fatal.

use std::io::{self, Write};
use tokio::sync::mpsc;

/// What to do with a write error on stdout/stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAction {
    Ignore,
    Fatal,
}

pub fn classify_stream_error(error: &io::Error) -> StreamAction {
    match error.kind() {
        io::ErrorKind::BrokenPipe => StreamAction::Ignore,
        _ => StreamAction::Fatal,
    }
}

/// A fatal write error reported by a guarded stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub stream: &'static str,
    pub kind: io::ErrorKind,
    pub message: String,
}

/// Reports fatal stream failures to the orchestrator
#[derive(Clone)]
pub struct StreamErrorSink {
    tx: mpsc::UnboundedSender<StreamFailure>,
}

impl StreamErrorSink {
    /// Classify `error`; forward it when fatal
    pub fn report(&self, stream: &'static str, error: &io::Error) -> StreamAction {
        let action = classify_stream_error(error);
        if action == StreamAction::Fatal {
            // Receiver gone means the orchestrator already stopped
            let _ = self.tx.send(StreamFailure {
                stream,
                kind: error.kind(),
                message: error.to_string(),
            });
        }
        action
    }
}

pub type StreamErrorReceiver = mpsc::UnboundedReceiver<StreamFailure>;

pub fn stream_error_channel() -> (StreamErrorSink, StreamErrorReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StreamErrorSink { tx }, rx)
}

/// Writer wrapper applying the stream error policy.
///
/// Broken pipes are swallowed (the write reports success so callers keep going),
/// other errors are reported to the sink and returned unchanged.
pub struct GuardedWriter<W> {
    inner: W,
    stream: &'static str,
    sink: StreamErrorSink,
}

impl<W: Write> GuardedWriter<W> {
    pub fn new(inner: W, stream: &'static str, sink: StreamErrorSink) -> Self {
        Self {
            inner,
            stream,
            sink,
        }
    }

    fn guard<T>(&self, result: io::Result<T>, on_ignore: T) -> io::Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => match self.sink.report(self.stream, &error) {
                StreamAction::Ignore => Ok(on_ignore),
                StreamAction::Fatal => Err(error),
            },
        }
    }
}

impl<W: Write> Write for GuardedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.guard(result, buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.guard(result, ())
    }
}
