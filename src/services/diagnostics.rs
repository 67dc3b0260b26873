use std::sync::{Arc, Mutex};

use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::models::diagnostics::{DiagnosticEvent, DiagnosticType};

static GLOBAL_LOG: Lazy<DiagnosticsLog> = Lazy::new(DiagnosticsLog::new);

/// Process-wide log shared by every bootstrapper that is not given its own.
pub fn global() -> DiagnosticsLog {
    GLOBAL_LOG.clone()
}

/// Append-only event list. Clones share the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsLog {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl DiagnosticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: DiagnosticEvent) {
        match event.event_type {
            DiagnosticType::Error | DiagnosticType::Timeout | DiagnosticType::Fallback => {
                warn!(
                    target: "app::bootstrap",
                    stage = %event.stage,
                    kind = %event.event_type,
                    from = ?event.from,
                    to = ?event.to,
                    reason = ?event.reason,
                    elapsed_ms = ?event.elapsed_ms,
                    "diagnostic event"
                );
            }
            _ => {
                info!(
                    target: "app::bootstrap",
                    stage = %event.stage,
                    kind = %event.event_type,
                    from = ?event.from,
                    to = ?event.to,
                    elapsed_ms = ?event.elapsed_ms,
                    "diagnostic event"
                );
            }
        }

        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count_of(&self, event_type: DiagnosticType) -> usize {
        self.events()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }
}

/// Builder for a [`DiagnosticEvent`] stamped with the current time.
pub struct EventBuilder {
    event: DiagnosticEvent,
}

impl EventBuilder {
    pub fn new(stage: &str, event_type: DiagnosticType) -> Self {
        Self {
            event: DiagnosticEvent {
                stage: stage.to_string(),
                event_type,
                from: None,
                to: None,
                reason: None,
                elapsed_ms: None,
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn from(mut self, backend: impl Into<String>) -> Self {
        self.event.from = Some(backend.into());
        self
    }

    pub fn to(mut self, backend: impl Into<String>) -> Self {
        self.event.to = Some(backend.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.event.reason = Some(reason.into());
        self
    }

    pub fn elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.event.elapsed_ms = Some(elapsed_ms);
        self
    }

    pub fn build(self) -> DiagnosticEvent {
        self.event
    }
}
