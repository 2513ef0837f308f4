//! Local location publishing.
//!
//! Per sample, in this order: store the local location, recenter the viewport,
//! fire the update-location call, redraw. The HTTP call runs on its own task
//! and reports back on a channel; its outcome is only logged and counted.
//!
//! With a publish interval, samples inside the interval are coalesced: the
//! latest one is held back and sent once the interval expires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use geopresence_core::error::{GeoPresenceError, Result};
use geopresence_core::protocol::location::LocationUpdate;
use geopresence_core::{Identity, Sample, SensorFailure, Viewport};

use crate::config::BackendSection;
use crate::obs::AgentMetrics;
use crate::reconciler::EventReconciler;

/// Persistence endpoint for local location updates.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn update_location(&self, body: &LocationUpdate) -> Result<()>;
}

/// `POST {api_base_url}/update-location`. Only HTTP 200 counts as success.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(backend: &BackendSection) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(backend.timeout_ms))
            .build()
            .map_err(|e| GeoPresenceError::Internal(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            url: backend.update_location_url(),
        })
    }
}

#[async_trait]
impl PersistenceSink for HttpSink {
    async fn update_location(&self, body: &LocationUpdate) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| GeoPresenceError::Persistence(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(GeoPresenceError::Persistence(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Outcome of one update-location call, tagged with the connection epoch it
/// was issued in.
#[derive(Debug)]
pub struct PersistReport {
    pub epoch: u64,
    pub username: Identity,
    pub result: Result<()>,
    pub elapsed: Duration,
}

pub struct LocationPublisher {
    sink: Arc<dyn PersistenceSink>,
    reports: mpsc::UnboundedSender<PersistReport>,
    metrics: Arc<AgentMetrics>,
    zoom: u8,
    min_interval: Duration,
    last_sent: Option<Instant>,
    pending: Option<LocationUpdate>,
}

impl LocationPublisher {
    pub fn new(
        sink: Arc<dyn PersistenceSink>,
        reports: mpsc::UnboundedSender<PersistReport>,
        metrics: Arc<AgentMetrics>,
        zoom: u8,
        min_interval: Duration,
    ) -> Self {
        Self {
            sink,
            reports,
            metrics,
            zoom,
            min_interval,
            last_sent: None,
            pending: None,
        }
    }

    /// Handle one local sample. Returns false if it was dropped.
    pub fn on_sample(&mut self, reconciler: &mut EventReconciler, sample: Sample, epoch: u64) -> bool {
        let location = sample.location;
        if let Err(e) = location.validate() {
            tracing::warn!(error = %e, "invalid sample dropped");
            self.metrics.sensor_errors.inc(&[("kind", "invalid_sample")]);
            return false;
        }

        let Some(self_id) = reconciler.record_self_location(location) else {
            tracing::debug!("sample before presence snapshot dropped");
            return false;
        };
        tracing::trace!(lat = location.lat, lng = location.lng, accuracy_m = sample.accuracy_m, "sample");

        reconciler.set_viewport(Viewport::centered_on(location, self.zoom));

        let update = LocationUpdate {
            username: self_id,
            location,
        };
        if self.should_send() {
            self.pending = None;
            self.send(update, epoch);
        } else {
            tracing::trace!("update-location deferred");
            self.pending = Some(update);
        }

        reconciler.reproject();
        self.metrics.samples_published.inc(&[]);
        true
    }

    pub fn on_sensor_error(&self, failure: SensorFailure) {
        tracing::warn!(error = %failure, "error getting location");
        self.metrics.sensor_errors.inc(&[("kind", failure.as_str())]);
    }

    /// Log a persistence outcome. Reports from an earlier connection are
    /// counted as stale and otherwise ignored.
    pub fn on_report(&self, report: PersistReport, current_epoch: u64) {
        if report.epoch != current_epoch {
            tracing::debug!(epoch = report.epoch, current_epoch, "stale persistence response ignored");
            self.metrics.persistence.inc(&[("outcome", "stale")]);
            return;
        }

        self.metrics
            .persistence_duration
            .observe(&[], report.elapsed);
        match report.result {
            Ok(()) => {
                tracing::debug!(user = %report.username, "new location updated successfully");
                self.metrics.persistence.inc(&[("outcome", "ok")]);
            }
            Err(e) => {
                tracing::warn!(user = %report.username, error = %e, "location update failed");
                self.metrics.persistence.inc(&[("outcome", "failed")]);
            }
        }
    }

    /// When the held-back update is due, if there is one.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        Some(self.last_sent.map_or_else(Instant::now, |at| at + self.min_interval))
    }

    /// Send the held-back update, if any.
    pub fn flush(&mut self, epoch: u64) {
        if let Some(update) = self.pending.take() {
            self.send(update, epoch);
        }
    }

    /// Connection ended: a held-back update belongs to discarded state.
    pub fn end(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("deferred update-location dropped");
        }
    }

    fn send(&mut self, update: LocationUpdate, epoch: u64) {
        self.last_sent = Some(Instant::now());
        self.spawn_persist(update, epoch);
    }

    fn should_send(&self) -> bool {
        match self.last_sent {
            Some(at) => at.elapsed() >= self.min_interval,
            None => true,
        }
    }

    fn spawn_persist(&self, body: LocationUpdate, epoch: u64) {
        let sink = Arc::clone(&self.sink);
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = sink.update_location(&body).await;
            let _ = reports.send(PersistReport {
                epoch,
                username: body.username,
                result,
                elapsed: started.elapsed(),
            });
        });
    }
}
