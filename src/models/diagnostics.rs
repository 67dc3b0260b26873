use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticType {
    Attempt,
    Success,
    Error,
    Timeout,
    Fallback,
    Teardown,
}

impl DiagnosticType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticType::Attempt => "attempt",
            DiagnosticType::Success => "success",
            DiagnosticType::Error => "error",
            DiagnosticType::Timeout => "timeout",
            DiagnosticType::Fallback => "fallback",
            DiagnosticType::Teardown => "teardown",
        }
    }
}

impl fmt::Display for DiagnosticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the bootstrap audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    pub stage: String,
    #[serde(rename = "type")]
    pub event_type: DiagnosticType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub timestamp: String,
}
