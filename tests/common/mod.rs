//! Shared test utilities.

#![allow(dead_code, unused_imports)]

use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uibind::dispatch::{Dispatcher, ErrorSink, FailureReport};
use uibind::property::Property;

/// Error sink that keeps every report for later assertions.
#[derive(Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<FailureReport>>,
}

impl CollectingSink {
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().clone()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, report: &FailureReport) {
        self.reports.lock().push(report.clone());
    }
}

pub fn install_collecting_sink(dispatcher: &Dispatcher) -> Arc<CollectingSink> {
    let sink = Arc::new(CollectingSink::default());
    dispatcher.set_error_sink(sink.clone());
    sink
}

pub type Changes<T> = Arc<Mutex<Vec<(T, T)>>>;

/// Record every `(old, new)` pair a property reports.
pub fn record_changes<T>(property: &Property<T>) -> Changes<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    let changes: Changes<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    property.add_listener(move |old, new| {
        sink.lock().push((old.clone(), new.clone()));
    });
    changes
}

/// Poll the dispatcher until `done` holds or `timeout` elapses.
pub fn pump_until(dispatcher: &Dispatcher, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        dispatcher
            .poll(Duration::from_millis(5))
            .expect("pumping from the UI thread");
        if done() {
            return true;
        }
    }
    done()
}
