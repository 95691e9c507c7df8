//! Object-creation event intake.
//!
//! Events arrive as CloudEvent envelopes whose `data` describes the stored
//! object. Only the bucket and object name drive processing; the rest is logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{DocumentError, StorageError, TriggerError};
use crate::models::config::ExtractorConfig;
use crate::pipeline::{process_pdf, ExtractOptions, ExtractionSummary};
use crate::storage::{ObjectStore, OutputTarget};

/// CloudEvent envelope for a storage notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ObjectData,
}

/// The object an event refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub bucket: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metageneration: Option<String>,
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl StorageEvent {
    pub fn from_json(json: &str) -> Result<Self, TriggerError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Why an event was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The object name does not end in `.pdf`.
    NotPdf,
    /// The object sits in the extractor's own output location.
    OwnOutput,
}

/// How an event ended. Everything here is a handled condition.
#[derive(Debug)]
pub enum TriggerOutcome {
    Ignored(IgnoreReason),
    /// The source object disappeared before it could be downloaded.
    SourceMissing,
    /// The configured output bucket does not exist.
    OutputBucketMissing,
    /// The PDF could not be opened; nothing was written.
    DocumentFailed(DocumentError),
    Processed(ExtractionSummary),
}

/// Decide whether an object should be processed at all.
pub fn screen_event(object: &ObjectData, config: &ExtractorConfig) -> Option<IgnoreReason> {
    if !object.name.to_lowercase().ends_with(".pdf") {
        return Some(IgnoreReason::NotPdf);
    }

    let prefix = config.output_prefix();
    if object.bucket == config.output_bucket
        && !prefix.is_empty()
        && object
            .name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    {
        return Some(IgnoreReason::OwnOutput);
    }

    None
}

/// Run one event through the gate, download and extraction.
///
/// Missing resources and unreadable documents end the invocation with an
/// outcome; only unexpected storage failures are returned as errors, leaving
/// the retry decision to the host.
pub async fn handle_event(
    event: &StorageEvent,
    config: &ExtractorConfig,
    store: &dyn ObjectStore,
) -> Result<TriggerOutcome, TriggerError> {
    let object = &event.data;
    info!("Event ID: {}", event.id);
    info!("Event type: {}", event.event_type);
    info!("Input: {}/{}", object.bucket, object.name);
    info!(
        "Metageneration: {}, created: {}, updated: {}",
        object.metageneration.as_deref().unwrap_or("-"),
        format_time(object.time_created),
        format_time(object.updated)
    );

    if let Some(reason) = screen_event(object, config) {
        match reason {
            IgnoreReason::NotPdf => {
                info!("Ignoring non-PDF file or file with no name: '{}'", object.name)
            }
            IgnoreReason::OwnOutput => info!(
                "Ignoring file '{}' as it is in the output directory of the same bucket",
                object.name
            ),
        }
        return Ok(TriggerOutcome::Ignored(reason));
    }

    if !store.bucket_exists(&config.output_bucket).await? {
        error!(
            "Output bucket not found: '{}' (input bucket '{}')",
            config.output_bucket, object.bucket
        );
        return Ok(TriggerOutcome::OutputBucketMissing);
    }

    info!("Attempting to process PDF: {}/{}", object.bucket, object.name);
    let timeout = config.download_timeout();
    let download = tokio::time::timeout(timeout, store.get_object(&object.bucket, &object.name));
    let data = match download.await {
        Ok(Ok(data)) => data,
        Ok(Err(StorageError::ObjectNotFound { bucket, key })) => {
            error!("File not found in input bucket during download: {}/{}", bucket, key);
            return Ok(TriggerOutcome::SourceMissing);
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(StorageError::Timeout(timeout.as_secs()).into()),
    };

    let target = OutputTarget::new(store, &config.output_bucket, config.output_prefix());
    match process_pdf(&data, &object.name, &target, ExtractOptions::from(config)).await {
        Ok(summary) => {
            info!(
                "Successfully finished processing trigger for: {}/{}",
                object.bucket, object.name
            );
            Ok(TriggerOutcome::Processed(summary))
        }
        Err(e) => {
            warn!("Could not process PDF {}: {}", object.name, e);
            Ok(TriggerOutcome::DocumentFailed(e))
        }
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}
