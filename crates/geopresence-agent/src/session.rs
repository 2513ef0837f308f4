//! Connection lifecycle: the single event loop of the agent.
//!
//! Responsibilities:
//! - Subscribe to the presence channel and decode each frame once
//! - Apply events through the reconciler (one at a time, no locking)
//! - Start the position sensor after the snapshot and publish its samples
//! - Send deferred location updates when the publish interval expires
//! - Log persistence outcomes, ignoring those of earlier connections
//! - On end: unsubscribe (drop streams), discard state, clear the surface

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::Instrument;

use geopresence_core::error::{GeoPresenceError, Result};

use crate::config::AgentConfig;
use crate::notify::Notifier;
use crate::obs::AgentMetrics;
use crate::publisher::{LocationPublisher, PersistReport, PersistenceSink};
use crate::reconciler::{EventReconciler, Reaction};
use crate::sensor::{LocationSource, SampleStream, SensorReading};
use crate::surface::MapSurface;
use crate::transport::{decode, Inbound, TransportChannel};
use geopresence_core::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The transport stream ended.
    TransportClosed,
    /// Shutdown was requested.
    Shutdown,
}

/// Counters for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub end: EndReason,
    pub events_applied: u64,
    pub events_ignored: u64,
    pub decode_errors: u64,
    pub samples: u64,
    pub sensor_errors: u64,
}

impl ConnectionSummary {
    fn new() -> Self {
        Self {
            end: EndReason::TransportClosed,
            events_applied: 0,
            events_ignored: 0,
            decode_errors: 0,
            samples: 0,
            sensor_errors: 0,
        }
    }
}

pub struct Session {
    channel: String,
    zoom: u8,
    reconciler: EventReconciler,
    publisher: LocationPublisher,
    reports: mpsc::UnboundedReceiver<PersistReport>,
    metrics: Arc<AgentMetrics>,
    epoch: u64,
}

impl Session {
    pub fn new(
        cfg: &AgentConfig,
        surface: Box<dyn MapSurface>,
        notifier: Box<dyn Notifier>,
        sink: Arc<dyn PersistenceSink>,
        metrics: Arc<AgentMetrics>,
    ) -> Self {
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let reconciler = EventReconciler::new(
            surface,
            notifier,
            Arc::clone(&metrics),
            cfg.session.strict_init,
        );
        let publisher = LocationPublisher::new(
            sink,
            reports_tx,
            Arc::clone(&metrics),
            cfg.map.zoom,
            Duration::from_millis(cfg.backend.min_publish_interval_ms),
        );

        Self {
            channel: cfg.transport.channel.clone(),
            zoom: cfg.map.zoom,
            reconciler,
            publisher,
            reports,
            metrics,
            epoch: 0,
        }
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    /// Number of connections already ended.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Run one connection until the transport closes or `shutdown` flips to
    /// true (a dropped shutdown sender also counts as shutdown).
    ///
    /// Returns `Err` only for a repeated snapshot in strict mode, when the
    /// transport refuses the subscription or when it fails mid-stream. State is
    /// discarded either way.
    pub async fn run_connection(
        &mut self,
        transport: &mut dyn TransportChannel,
        sensor: Box<dyn LocationSource>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ConnectionSummary> {
        let span = tracing::info_span!("connection", channel = %self.channel, epoch = self.epoch);
        let result = self
            .run_inner(transport, sensor, shutdown)
            .instrument(span)
            .await;

        self.reconciler.end();
        self.publisher.end();
        self.epoch += 1;

        match &result {
            Ok(summary) => tracing::info!(?summary, "connection ended"),
            Err(e) => tracing::error!(error = %e, code = e.code().as_str(), "connection failed"),
        }
        result
    }

    async fn run_inner(
        &mut self,
        transport: &mut dyn TransportChannel,
        sensor: Box<dyn LocationSource>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ConnectionSummary> {
        let mut frames = transport.subscribe(&self.channel)?;
        let mut sensor = Some(sensor);
        let mut samples: Option<SampleStream> = None;
        let mut summary = ConnectionSummary::new();

        self.reconciler.set_viewport(Viewport {
            lat: 0.0,
            lng: 0.0,
            zoom: self.zoom,
        });

        let outcome: Result<EndReason> = loop {
            tokio::select! {
                // presence frames
                maybe_frame = frames.next() => {
                    let buf = match maybe_frame {
                        Some(Ok(buf)) => buf,
                        Some(Err(e)) => break Err(e),
                        None => break Ok(EndReason::TransportClosed),
                    };

                    match decode(&buf, &self.channel) {
                        Ok(Inbound::Event(event)) => {
                            let name = event.name();
                            match self.reconciler.apply(event) {
                                Ok(Reaction::Ignored) => {
                                    summary.events_ignored += 1;
                                }
                                Ok(reaction) => {
                                    summary.events_applied += 1;
                                    tracing::debug!(event = name, "event applied");
                                    if reaction == Reaction::StartAcquisition {
                                        samples = self.start_acquisition(sensor.take());
                                    }
                                }
                                Err(e) => break Err(e),
                            }
                        }
                        Ok(Inbound::Ignored { event, reason }) => {
                            tracing::debug!(%event, reason, "frame ignored");
                            self.metrics.events_ignored.inc(&[("reason", reason)]);
                            summary.events_ignored += 1;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "frame rejected");
                            self.metrics.decode_errors.inc(&[("code", e.code().as_str())]);
                            summary.decode_errors += 1;
                        }
                    }
                }

                // local position sensor
                reading = next_reading(&mut samples) => {
                    match reading {
                        Some(Ok(sample)) => {
                            if self.publisher.on_sample(&mut self.reconciler, sample, self.epoch) {
                                summary.samples += 1;
                            }
                        }
                        Some(Err(failure)) => {
                            self.publisher.on_sensor_error(failure);
                            summary.sensor_errors += 1;
                        }
                        None => {
                            tracing::info!("location source ended");
                            samples = None;
                        }
                    }
                }

                // deferred update-location
                _ = sleep_until(self.publisher.flush_deadline()) => {
                    self.publisher.flush(self.epoch);
                }

                // persistence outcomes
                Some(report) = self.reports.recv() => {
                    self.publisher.on_report(report, self.epoch);
                }

                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break Ok(EndReason::Shutdown);
                    }
                }
            }
        };

        // unsubscribe from transport and sensor
        drop(frames);
        drop(samples);

        summary.end = outcome?;
        Ok(summary)
    }

    fn start_acquisition(&self, sensor: Option<Box<dyn LocationSource>>) -> Option<SampleStream> {
        let mut sensor = sensor?;
        match sensor.watch() {
            Ok(stream) => {
                tracing::info!("location acquisition started");
                Some(stream)
            }
            Err(GeoPresenceError::SensorUnavailable) => {
                tracing::error!("geolocation is not supported on this device");
                self.metrics.sensor_errors.inc(&[("kind", "unavailable")]);
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "location acquisition failed to start");
                self.metrics.sensor_errors.inc(&[("kind", "start_failed")]);
                None
            }
        }
    }
}

/// Fires at `deadline`; pending forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Next sensor reading; pending forever while acquisition is not running.
async fn next_reading(samples: &mut Option<SampleStream>) -> Option<SensorReading> {
    match samples {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
