//! Backend selection at startup.
//!
//! The document store is the only backend with an asynchronous open step
//! that can stall, so it is the only one raced against a timer. Every other
//! request goes through the direct path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::diagnostics::DiagnosticType;
use crate::models::settings::{AppConfig, BackendKind};
use crate::services::diagnostics::{DiagnosticsLog, EventBuilder};
use crate::storage::document_store::DocumentStoreAdapter;
use crate::storage::key_value::{KeyValueAdapter, KeyValueStore};
use crate::storage::preferences::PreferenceStore;
use crate::storage::remote::RemoteAdapter;
use crate::storage::StorageAdapter;
use crate::utils::race::{race_with_timeout, RaceOutcome};

const STAGE: &str = "storage";

pub trait AdapterFactory: Send + Sync {
    fn create(&self, kind: BackendKind) -> AppResult<Arc<dyn StorageAdapter>>;
}

/// Builds the production backends from [`AppConfig`].
pub struct DefaultAdapterFactory {
    config: AppConfig,
    key_value_store: Arc<dyn KeyValueStore>,
}

impl DefaultAdapterFactory {
    pub fn new(config: AppConfig, key_value_store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            key_value_store,
        }
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn create(&self, kind: BackendKind) -> AppResult<Arc<dyn StorageAdapter>> {
        match kind {
            BackendKind::KeyValue => Ok(Arc::new(KeyValueAdapter::new(
                Arc::clone(&self.key_value_store),
                self.config.key_value_namespace.clone(),
            ))),
            BackendKind::DocumentStore => Ok(Arc::new(DocumentStoreAdapter::new(
                self.config.document_store_path(),
            ))),
            BackendKind::Remote => {
                let settings = self.config.remote.as_ref().ok_or_else(|| {
                    AppError::adapter_init(kind.as_str(), "SQUADBOOK_REMOTE_BASE_URL is not set")
                })?;
                Ok(Arc::new(RemoteAdapter::over_http(settings)?))
            }
        }
    }
}

/// UI-facing collaborator for one-line notices.
pub trait Notifier: Send + Sync {
    fn show_alert(&self, message: &str);
}

pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_alert(&self, message: &str) {
        warn!(target: "app::bootstrap", %message, "user notice");
    }
}

#[derive(Clone)]
pub struct BootstrapResult {
    pub adapter: Arc<dyn StorageAdapter>,
    pub requested: BackendKind,
    pub backend: BackendKind,
    pub fell_back: bool,
}

impl std::fmt::Debug for BootstrapResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapResult")
            .field("requested", &self.requested)
            .field("backend", &self.backend)
            .field("fell_back", &self.fell_back)
            .finish()
    }
}

enum FallbackReason {
    Timeout,
    Error(String),
}

impl FallbackReason {
    fn label(&self) -> &'static str {
        match self {
            FallbackReason::Timeout => "timeout",
            FallbackReason::Error(_) => "error",
        }
    }
}

pub struct StorageBootstrapper {
    factory: Arc<dyn AdapterFactory>,
    preferences: PreferenceStore,
    notifier: Arc<dyn Notifier>,
    diagnostics: DiagnosticsLog,
    init_timeout: Duration,
    document_store_enabled: bool,
}

impl StorageBootstrapper {
    pub fn new(
        factory: Arc<dyn AdapterFactory>,
        preferences: PreferenceStore,
        notifier: Arc<dyn Notifier>,
        diagnostics: DiagnosticsLog,
    ) -> Self {
        Self {
            factory,
            preferences,
            notifier,
            diagnostics,
            init_timeout: AppConfig::default().init_timeout,
            document_store_enabled: true,
        }
    }

    pub fn with_timeout(mut self, init_timeout: Duration) -> Self {
        self.init_timeout = init_timeout;
        self
    }

    pub fn with_document_store_enabled(mut self, enabled: bool) -> Self {
        self.document_store_enabled = enabled;
        self
    }

    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.diagnostics
    }

    /// Explicit request first, then the stored preference, then the document store.
    pub fn resolve_requested(&self, explicit: Option<BackendKind>) -> BackendKind {
        explicit
            .or_else(|| match self.preferences.backend() {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(target: "app::bootstrap", error = %err, "could not read backend preference");
                    None
                }
            })
            .unwrap_or(BackendKind::DocumentStore)
    }

    pub async fn bootstrap(&self, explicit: Option<BackendKind>) -> AppResult<BootstrapResult> {
        let requested = self.resolve_requested(explicit);
        info!(
            target: "app::bootstrap",
            requested = %requested,
            document_store_enabled = self.document_store_enabled,
            timeout_ms = self.init_timeout.as_millis() as u64,
            "selecting storage backend"
        );

        if requested == BackendKind::DocumentStore && self.document_store_enabled {
            self.race_path().await
        } else {
            self.direct_path(requested).await
        }
    }

    async fn direct_path(&self, requested: BackendKind) -> AppResult<BootstrapResult> {
        let mut target = requested;
        let mut fell_back = false;

        if requested == BackendKind::DocumentStore {
            target = BackendKind::SAFE_DEFAULT;
            fell_back = true;
            self.diagnostics.record(
                EventBuilder::new(STAGE, DiagnosticType::Fallback)
                    .from(requested.as_str())
                    .to(target.as_str())
                    .reason("disabled")
                    .build(),
            );
        }

        self.diagnostics.record(
            EventBuilder::new(STAGE, DiagnosticType::Attempt)
                .to(target.as_str())
                .build(),
        );

        let started = Instant::now();
        let adapter = match self.factory.create(target) {
            Ok(adapter) => adapter,
            Err(err) if target != BackendKind::SAFE_DEFAULT => {
                self.diagnostics.record(
                    EventBuilder::new(STAGE, DiagnosticType::Error)
                        .to(target.as_str())
                        .reason(err.to_string())
                        .elapsed_ms(elapsed_ms(started))
                        .build(),
                );
                let adapter = self
                    .fall_back(target, FallbackReason::Error(err.to_string()), started)
                    .await?;
                return Ok(BootstrapResult {
                    adapter,
                    requested,
                    backend: BackendKind::SAFE_DEFAULT,
                    fell_back: true,
                });
            }
            Err(err) => return Err(err),
        };

        let ready = Arc::clone(&adapter);
        let outcome = race_with_timeout(async move { ready.ready().await }, self.init_timeout).await;
        let event = match &outcome {
            RaceOutcome::Success(()) => EventBuilder::new(STAGE, DiagnosticType::Success),
            RaceOutcome::Timeout => {
                EventBuilder::new(STAGE, DiagnosticType::Timeout).reason("timeout")
            }
            RaceOutcome::Error(message) => {
                EventBuilder::new(STAGE, DiagnosticType::Error).reason(message.clone())
            }
        };
        self.diagnostics.record(
            event
                .to(target.as_str())
                .elapsed_ms(elapsed_ms(started))
                .build(),
        );

        Ok(BootstrapResult {
            adapter,
            requested,
            backend: target,
            fell_back,
        })
    }

    async fn race_path(&self) -> AppResult<BootstrapResult> {
        let requested = BackendKind::DocumentStore;
        self.diagnostics.record(
            EventBuilder::new(STAGE, DiagnosticType::Attempt)
                .to(requested.as_str())
                .build(),
        );

        let started = Instant::now();
        let (adapter, outcome) = match self.factory.create(requested) {
            Ok(adapter) => {
                let ready = Arc::clone(&adapter);
                let outcome =
                    race_with_timeout(async move { ready.ready().await }, self.init_timeout).await;
                (Some(adapter), outcome)
            }
            Err(err) => (None, RaceOutcome::Error(err.to_string())),
        };

        let reason = match (adapter, outcome) {
            (Some(adapter), RaceOutcome::Success(())) => {
                self.diagnostics.record(
                    EventBuilder::new(STAGE, DiagnosticType::Success)
                        .to(requested.as_str())
                        .elapsed_ms(elapsed_ms(started))
                        .build(),
                );
                return Ok(BootstrapResult {
                    adapter,
                    requested,
                    backend: requested,
                    fell_back: false,
                });
            }
            (adapter, outcome) => {
                let reason = match outcome {
                    RaceOutcome::Timeout => FallbackReason::Timeout,
                    RaceOutcome::Error(message) => FallbackReason::Error(message),
                    RaceOutcome::Success(()) => {
                        FallbackReason::Error("adapter missing after successful init".to_string())
                    }
                };
                self.record_failure(requested, &reason, started);
                if let Some(stalled) = adapter {
                    self.tear_down(stalled, requested).await;
                }
                reason
            }
        };

        let adapter = self.fall_back(requested, reason, started).await?;
        Ok(BootstrapResult {
            adapter,
            requested,
            backend: BackendKind::SAFE_DEFAULT,
            fell_back: true,
        })
    }

    fn record_failure(&self, backend: BackendKind, reason: &FallbackReason, started: Instant) {
        let event = match reason {
            FallbackReason::Timeout => {
                EventBuilder::new(STAGE, DiagnosticType::Timeout).reason("timeout")
            }
            FallbackReason::Error(message) => {
                EventBuilder::new(STAGE, DiagnosticType::Error).reason(message.clone())
            }
        };
        self.diagnostics.record(
            event
                .to(backend.as_str())
                .elapsed_ms(elapsed_ms(started))
                .build(),
        );
    }

    /// Best effort: a stalled adapter may never answer `close` either.
    async fn tear_down(&self, adapter: Arc<dyn StorageAdapter>, backend: BackendKind) {
        let closed = tokio::time::timeout(self.init_timeout, adapter.close()).await;
        let failure = match closed {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("teardown timed out".to_string()),
        };

        let mut event = EventBuilder::new(STAGE, DiagnosticType::Teardown).from(backend.as_str());
        if let Some(message) = failure {
            warn!(target: "app::bootstrap", backend = %backend, error = %message, "teardown of stalled adapter failed");
            event = event.reason(message);
        }
        self.diagnostics.record(event.build());
    }

    async fn fall_back(
        &self,
        from: BackendKind,
        reason: FallbackReason,
        started: Instant,
    ) -> AppResult<Arc<dyn StorageAdapter>> {
        let target = BackendKind::SAFE_DEFAULT;

        if let Err(err) = self.preferences.set_backend(target) {
            warn!(target: "app::bootstrap", error = %err, "could not persist fallback backend preference");
        }

        let adapter = self.factory.create(target)?;
        adapter.ready().await?;

        let detail = match &reason {
            FallbackReason::Timeout => format!(
                "did not become ready within {} ms",
                self.init_timeout.as_millis()
            ),
            FallbackReason::Error(message) => format!("failed to start ({message})"),
        };
        self.notifier.show_alert(&format!(
            "Storage backend \"{}\" {detail}; using \"{}\" instead.",
            from.as_str(),
            target.as_str()
        ));

        self.diagnostics.record(
            EventBuilder::new(STAGE, DiagnosticType::Fallback)
                .from(from.as_str())
                .to(target.as_str())
                .reason(reason.label())
                .elapsed_ms(elapsed_ms(started))
                .build(),
        );

        Ok(adapter)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
