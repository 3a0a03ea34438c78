//! Tracer backends
//!
//! ```text
//! TelemetryConfig.exporter ──► Telemetry::from_config
//!     tracing   ──► TracingTracer   (spans go to the tracing subscriber)
//!     recording ──► RecordingTracer (spans kept in memory)
//!     none      ──► NoopTracer
//! ```

pub mod recording;
pub mod tracing_tracer;

use std::sync::Arc;

use baserepo_domain::{NoopTracer, Tracer};
use shared::{TelemetryConfig, TelemetryExporter};

pub use recording::{EventRecord, RecordingTracer, SpanRecord};
pub use tracing_tracer::{TracingSpan, TracingTracer};

/// Tracer handle built once at startup and shared by every repository
#[derive(Clone)]
pub struct Telemetry {
    tracer: Arc<dyn Tracer>,
    recorder: Option<RecordingTracer>,
    component: String,
}

impl Telemetry {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let (tracer, recorder): (Arc<dyn Tracer>, _) = match config.exporter {
            TelemetryExporter::Tracing => {
                (Arc::new(TracingTracer::new(config.service_name.clone())), None)
            }
            TelemetryExporter::Recording => {
                let recorder = RecordingTracer::new();
                (Arc::new(recorder.clone()), Some(recorder))
            }
            TelemetryExporter::None => (Arc::new(NoopTracer), None),
        };

        tracing::debug!(exporter = ?config.exporter, service = %config.service_name, "telemetry initialised");

        Self {
            tracer,
            recorder,
            component: config.component.clone(),
        }
    }

    pub fn tracer(&self) -> Arc<dyn Tracer> {
        self.tracer.clone()
    }

    /// Present only for the `recording` exporter
    pub fn recorder(&self) -> Option<&RecordingTracer> {
        self.recorder.as_ref()
    }

    /// Span name prefix configured for the base repositories
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("recording", &self.recorder.is_some())
            .field("component", &self.component)
            .finish()
    }
}
