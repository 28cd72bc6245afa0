//! All-or-nothing multi-asset upload.
//!
//! Each request runs as a small saga:
//!
//! ```text
//! Requested -> Transferring -> Committed
//!                  |
//!                  v
//!            PartiallyFailed -> Retried -> Transferring ...
//!                  |
//!                  v
//!              Abandoned
//! ```
//!
//! Slots are fetched once; failed legs are retried against the same slots.
//! Nothing is persisted unless every leg commits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, TransferFailure, UploadError};
use crate::record::{
    assemble_batch_record, assemble_image_record, BatchRecord, ImageRecord, PersistPayload,
};
use crate::views::{ViewName, ViewSet};

use super::api::{FileSpec, PresignedSlot, StorageApi};
use super::source::{describe_views, ImageSource, UploadDescriptor};

/// Observable saga states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaState {
    /// Slot request sent for `files` descriptors.
    Requested { files: usize },
    /// PUTs in flight.
    Transferring { attempt: u32, legs: usize },
    Committed,
    PartiallyFailed { failed: Vec<String> },
    Retried { attempt: u32 },
    Abandoned,
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SagaState::Requested { files } => write!(f, "requested {files} upload URLs"),
            SagaState::Transferring { attempt, legs } => {
                write!(f, "transferring {legs} files (attempt {})", attempt + 1)
            }
            SagaState::Committed => write!(f, "committed"),
            SagaState::PartiallyFailed { failed } => {
                write!(f, "partially failed: {}", failed.join(", "))
            }
            SagaState::Retried { attempt } => write!(f, "retrying failed transfers (retry {attempt})"),
            SagaState::Abandoned => write!(f, "abandoned"),
        }
    }
}

pub type StateObserver = Arc<dyn Fn(&SagaState) + Send + Sync>;

/// Transfer tuning.
#[derive(Clone)]
pub struct UploadOptions {
    /// Upper bound on a single PUT.
    pub put_timeout: Duration,
    /// Extra attempts for failed legs. 0 means fail on the first error.
    pub transfer_retries: u32,
    /// Called on every saga transition.
    pub on_state: Option<StateObserver>,
}

impl UploadOptions {
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.on_state = Some(observer);
        self
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            put_timeout: Duration::from_secs(60),
            transfer_retries: 0,
            on_state: None,
        }
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("put_timeout", &self.put_timeout)
            .field("transfer_retries", &self.transfer_retries)
            .field("on_state", &self.on_state.is_some())
            .finish()
    }
}

/// One request's trip through the two-phase protocol.
pub struct UploadSaga<'a, A: StorageApi + ?Sized> {
    api: &'a A,
    options: &'a UploadOptions,
    cancel: CancellationToken,
    history: Vec<SagaState>,
}

impl<'a, A: StorageApi + ?Sized> UploadSaga<'a, A> {
    pub fn new(api: &'a A, options: &'a UploadOptions, cancel: CancellationToken) -> Self {
        Self {
            api,
            options,
            cancel,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[SagaState] {
        &self.history
    }

    pub fn state(&self) -> Option<&SagaState> {
        self.history.last()
    }

    fn transition(&mut self, state: SagaState) {
        if let Some(observer) = &self.options.on_state {
            observer(&state);
        }
        self.history.push(state);
    }

    /// Uploads every descriptor and returns the public URLs in input order.
    pub async fn run(&mut self, descriptors: &[UploadDescriptor]) -> Result<Vec<String>, UploadError> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let api = self.api;
        let cancel = self.cancel.clone();
        let put_timeout = self.options.put_timeout;

        self.transition(SagaState::Requested {
            files: descriptors.len(),
        });
        let specs: Vec<FileSpec> = descriptors
            .iter()
            .map(|d| FileSpec {
                file_name: d.name.clone(),
                file_type: d.content_type.clone(),
            })
            .collect();
        let requested = tokio::select! {
            _ = cancel.cancelled() => None,
            slots = api.request_slots(&specs) => Some(slots),
        };
        let Some(slots) = requested else {
            self.transition(SagaState::Abandoned);
            return Err(UploadError::Cancelled);
        };
        let slots = match slots {
            Ok(slots) => slots,
            Err(e) => {
                self.transition(SagaState::Abandoned);
                return Err(UploadError::SlotRequest(e));
            }
        };
        let slots = match match_slots(descriptors, slots) {
            Ok(slots) => slots,
            Err(e) => {
                self.transition(SagaState::Abandoned);
                return Err(e);
            }
        };

        let mut pending: Vec<usize> = (0..descriptors.len()).collect();
        let mut committed = vec![false; descriptors.len()];
        let mut attempt = 0u32;
        loop {
            self.transition(SagaState::Transferring {
                attempt,
                legs: pending.len(),
            });

            let legs = pending
                .iter()
                .map(|&i| transfer_leg(api, &descriptors[i], &slots[i], put_timeout));
            // Dropping the barrier on cancellation drops every in-flight PUT.
            let settled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = join_all(legs) => Some(results),
            };
            let Some(results) = settled else {
                self.transition(SagaState::Abandoned);
                return Err(UploadError::Cancelled);
            };

            let mut failures: Vec<(usize, ApiError)> = Vec::new();
            for (&i, result) in pending.iter().zip(results) {
                match result {
                    Ok(()) => committed[i] = true,
                    Err(e) => failures.push((i, e)),
                }
            }

            if failures.is_empty() {
                self.transition(SagaState::Committed);
                return Ok(slots.into_iter().map(|s| s.public_url).collect());
            }

            self.transition(SagaState::PartiallyFailed {
                failed: failures
                    .iter()
                    .map(|(i, _)| descriptors[*i].name.clone())
                    .collect(),
            });

            if attempt < self.options.transfer_retries {
                attempt += 1;
                self.transition(SagaState::Retried { attempt });
                pending = failures.into_iter().map(|(i, _)| i).collect();
                continue;
            }

            self.transition(SagaState::Abandoned);
            return Err(UploadError::Transfer {
                failed: failures
                    .into_iter()
                    .map(|(i, error)| TransferFailure {
                        name: descriptors[i].name.clone(),
                        error,
                    })
                    .collect(),
                committed: descriptors
                    .iter()
                    .zip(&committed)
                    .filter(|(_, done)| **done)
                    .map(|(d, _)| d.name.clone())
                    .collect(),
            });
        }
    }
}

async fn transfer_leg<A: StorageApi + ?Sized>(
    api: &A,
    descriptor: &UploadDescriptor,
    slot: &PresignedSlot,
    put_timeout: Duration,
) -> Result<(), ApiError> {
    let put = api.put_object(slot, descriptor.blob.clone(), &descriptor.content_type);
    match tokio::time::timeout(put_timeout, put).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(put_timeout)),
    }
}

/// Lines slots up with descriptors.
///
/// When every slot echoes a file name and our names are unique, slots are
/// matched by name; otherwise by position.
pub fn match_slots(
    descriptors: &[UploadDescriptor],
    slots: Vec<PresignedSlot>,
) -> Result<Vec<PresignedSlot>, UploadError> {
    if slots.len() != descriptors.len() {
        return Err(UploadError::SlotMismatch(format!(
            "requested {} URLs, received {}",
            descriptors.len(),
            slots.len()
        )));
    }

    let mut seen = std::collections::HashSet::new();
    let unique_names = descriptors.iter().all(|d| seen.insert(d.name.as_str()));
    if !unique_names || slots.iter().any(|s| s.file_name.is_none()) {
        return Ok(slots);
    }

    let mut by_name: HashMap<String, PresignedSlot> = HashMap::with_capacity(slots.len());
    for slot in slots {
        let name = slot.file_name.clone().unwrap_or_default();
        if by_name.insert(name.clone(), slot).is_some() {
            return Err(UploadError::SlotMismatch(format!("duplicate URL for {name}")));
        }
    }
    descriptors
        .iter()
        .map(|d| {
            by_name
                .remove(&d.name)
                .ok_or_else(|| UploadError::SlotMismatch(format!("no URL issued for {}", d.name)))
        })
        .collect()
}

/// Single-image mode: uploads every view, then records them with `full` as
/// the primary URL.
pub async fn upload_views<A: StorageApi + ?Sized>(
    api: &A,
    views: &ViewSet,
    options: &UploadOptions,
    cancel: &CancellationToken,
) -> Result<ImageRecord, UploadError> {
    if views.is_empty() {
        return Err(UploadError::NoImages);
    }
    let names: Vec<ViewName> = views.names();
    let descriptors = describe_views(views)?;

    let mut saga = UploadSaga::new(api, options, cancel.clone());
    let urls = saga.run(&descriptors).await?;

    let record = assemble_image_record(names.into_iter().zip(urls))?;
    if let Err(source) = api.persist_image(&record).await {
        return Err(UploadError::Persist {
            payload: PersistPayload::Image(record),
            source,
        });
    }
    Ok(record)
}

/// Batch mode: uploads `File` entries, passes `Url` entries through, then
/// records direct URLs followed by uploaded ones.
pub async fn upload_batch<A: StorageApi + ?Sized>(
    api: &A,
    sources: Vec<ImageSource>,
    options: &UploadOptions,
    cancel: &CancellationToken,
) -> Result<BatchRecord, UploadError> {
    if sources.is_empty() {
        return Err(UploadError::NoImages);
    }

    let mut direct = Vec::new();
    let mut files = Vec::new();
    for source in sources {
        match source {
            ImageSource::Url(url) => direct.push(url.into_string()),
            ImageSource::File(descriptor) => files.push(descriptor),
        }
    }

    let mut saga = UploadSaga::new(api, options, cancel.clone());
    let uploaded = saga.run(&files).await?;

    let record = assemble_batch_record(direct, uploaded);
    if let Err(source) = api.persist_batch(&record).await {
        return Err(UploadError::Persist {
            payload: PersistPayload::Batch(record),
            source,
        });
    }
    Ok(record)
}
