//! Progress and log reporting.
//!
//! Every engine operation takes a `&mut dyn ProgressSink`. Operations push
//! human-readable log lines and entry-granular progress; the sink decides how
//! (or whether) to show them. The engine never depends on a UI.

use std::time::{Duration, Instant};

pub trait ProgressSink {
    /// Append a line to the operation log.
    fn log(&mut self, text: &str);

    /// Report `done` out of `total` units of work.
    fn report_progress(&mut self, done: u64, total: u64);

    /// Reset the progress counter and set the amount of work ahead.
    fn set_total(&mut self, total: u64);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn log(&mut self, _text: &str) {}
    fn report_progress(&mut self, _done: u64, _total: u64) {}
    fn set_total(&mut self, _total: u64) {}
}

/// Event delivered to a [`FnSink`] callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    Log(&'a str),
    Progress { done: u64, total: u64 },
    Total(u64),
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: FnMut(ProgressEvent<'_>),
{
    fn log(&mut self, text: &str) {
        (self.0)(ProgressEvent::Log(text))
    }

    fn report_progress(&mut self, done: u64, total: u64) {
        (self.0)(ProgressEvent::Progress { done, total })
    }

    fn set_total(&mut self, total: u64) {
        (self.0)(ProgressEvent::Total(total))
    }
}

/// Coalesces progress reports that arrive within `interval` of the last one
/// forwarded.
///
/// Log lines and totals are always forwarded immediately. A report with
/// `done >= total` is always forwarded, and a held-back report is flushed by
/// [`ThrottledSink::finish`], so the final state is never lost.
pub struct ThrottledSink<S: ProgressSink> {
    inner: S,
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<(u64, u64)>,
}

impl<S: ProgressSink> ThrottledSink<S> {
    pub fn new(inner: S, interval: Duration) -> Self {
        Self { inner, interval, last_emit: None, pending: None }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Forward any held-back report.
    pub fn flush(&mut self) {
        if let Some((done, total)) = self.pending.take() {
            self.inner.report_progress(done, total);
            self.last_emit = Some(Instant::now());
        }
    }

    /// Flush and hand back the wrapped sink.
    pub fn finish(mut self) -> S {
        self.flush();
        self.inner
    }
}

impl<S: ProgressSink> ProgressSink for ThrottledSink<S> {
    fn log(&mut self, text: &str) {
        self.inner.log(text);
    }

    fn report_progress(&mut self, done: u64, total: u64) {
        let due = match self.last_emit {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        };
        if done >= total || due {
            self.pending = None;
            self.inner.report_progress(done, total);
            self.last_emit = Some(Instant::now());
        } else {
            self.pending = Some((done, total));
        }
    }

    fn set_total(&mut self, total: u64) {
        self.pending = None;
        self.inner.set_total(total);
    }
}

/// Log an advisory: never blocks, always visible both to the sink and to
/// the `log` facade.
pub(crate) fn advise(sink: &mut dyn ProgressSink, text: &str) {
    log::warn!("{}", text);
    sink.log(&format!("Note: {}", text));
}
