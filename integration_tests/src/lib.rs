//! Integration test helpers for the keyring engine.
//!
//! Provides a recording log sink and constructors wiring a keyring service
//! to a file inside a temp directory.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use keyring_store::{Keyring, KeyringService, LogSink, Severity};

/// Log sink that records every message for later assertion.
#[derive(Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl MemorySink {
    /// All messages logged so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .last()
            .map(|(_, message)| message.clone())
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

/// Open a service against `path`, returning the sink handle for assertions.
pub fn service_at(path: impl AsRef<Path>) -> (KeyringService<MemorySink>, MemorySink) {
    let sink = MemorySink::default();
    let keyring = Keyring::open(path).expect("keyring open failed");
    (KeyringService::new(keyring, sink.clone()), sink)
}
