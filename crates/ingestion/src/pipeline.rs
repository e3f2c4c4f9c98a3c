//! Ingestion Pipeline main entry

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{FrameCallback, TelemetryCallback, TelemetryFeed, VideoFeed};
use tracing::{debug, info, instrument, warn};

use crate::metrics::IngestionMetrics;
use crate::error::{IngestionError, Result};
use crate::telemetry::TelemetrySource;
use crate::video::VideoSource;

/// Ingestion Pipeline
///
/// Owns the telemetry and video latest-value cells and the feeds that write
/// them. Mock and real feeds register the same way.
pub struct IngestionPipeline {
    telemetry: TelemetrySource,
    video: VideoSource,

    telemetry_feeds: HashMap<String, Box<dyn TelemetryFeed>>,
    video_feeds: HashMap<String, Box<dyn VideoFeed>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline with empty cells
    pub fn new() -> Self {
        Self {
            telemetry: TelemetrySource::new(),
            video: VideoSource::new(),
            telemetry_feeds: HashMap::new(),
            video_feeds: HashMap::new(),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Register a telemetry feed
    #[instrument(
        name = "ingestion_register_telemetry_feed",
        skip(self, feed),
        fields(feed = %feed.name())
    )]
    pub fn register_telemetry_feed(&mut self, feed: Box<dyn TelemetryFeed>) -> Result<()> {
        let name = feed.name().to_string();
        if self.telemetry_feeds.contains_key(&name) {
            return Err(IngestionError::DuplicateFeed { name });
        }
        debug!(feed = %name, "registered telemetry feed");
        self.telemetry_feeds.insert(name, feed);
        Ok(())
    }

    /// Register a video feed
    #[instrument(
        name = "ingestion_register_video_feed",
        skip(self, feed),
        fields(feed = %feed.name())
    )]
    pub fn register_video_feed(&mut self, feed: Box<dyn VideoFeed>) -> Result<()> {
        let name = feed.name().to_string();
        if self.video_feeds.contains_key(&name) {
            return Err(IngestionError::DuplicateFeed { name });
        }
        debug!(feed = %name, "registered video feed");
        self.video_feeds.insert(name, feed);
        Ok(())
    }

    /// Start all registered feeds
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(
            telemetry_feeds = self.telemetry_feeds.len(),
            video_feeds = self.video_feeds.len(),
            "starting all feeds"
        );
        for feed in self.telemetry_feeds.values() {
            self.start_telemetry_feed(feed.as_ref());
        }
        for feed in self.video_feeds.values() {
            self.start_video_feed(feed.as_ref());
        }
    }

    /// Stop all feeds
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(
            feeds = self.telemetry_feeds.len() + self.video_feeds.len(),
            "stopping all feeds"
        );
        for feed in self.telemetry_feeds.values() {
            if feed.is_listening() {
                debug!(feed = %feed.name(), "stopping telemetry feed");
                feed.stop();
            }
        }
        for feed in self.video_feeds.values() {
            if feed.is_listening() {
                debug!(feed = %feed.name(), "stopping video feed");
                feed.stop();
            }
        }
    }

    fn start_telemetry_feed(&self, feed: &dyn TelemetryFeed) {
        if feed.is_listening() {
            return;
        }
        debug!(feed = %feed.name(), "starting telemetry feed");
        let telemetry = self.telemetry.clone();
        let metrics = self.metrics.clone();
        let callback: TelemetryCallback = Arc::new(move |sample| {
            metrics.record_sample(sample.channel());
            telemetry.ingest(sample);
        });
        feed.listen(callback);
    }

    fn start_video_feed(&self, feed: &dyn VideoFeed) {
        if feed.is_listening() {
            return;
        }
        debug!(feed = %feed.name(), "starting video feed");
        let video = self.video.clone();
        let metrics = self.metrics.clone();
        let feed_name = feed.name().to_string();
        let callback: FrameCallback = Arc::new(move |frame| match video.publish(frame) {
            Ok(_) => metrics.record_frame(),
            Err(e) => {
                metrics.record_rejected_frame();
                warn!(feed = %feed_name, error = %e, "frame rejected");
            }
        });
        feed.listen(callback);
    }

    /// Telemetry cells (clone to hand to a reader)
    pub fn telemetry(&self) -> &TelemetrySource {
        &self.telemetry
    }

    /// Video cell (clone to hand to a reader)
    pub fn video(&self) -> &VideoSource {
        &self.video
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Registered feed count
    pub fn feed_count(&self) -> usize {
        self.telemetry_feeds.len() + self.video_feeds.len()
    }

    /// Check if the named feed is listening
    pub fn is_feed_listening(&self, name: &str) -> Result<bool> {
        if let Some(feed) = self.telemetry_feeds.get(name) {
            return Ok(feed.is_listening());
        }
        self.video_feeds
            .get(name)
            .map(|f| f.is_listening())
            .ok_or_else(|| IngestionError::FeedNotFound {
                name: name.to_string(),
            })
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
