//! Client-side capture tracking.
//!
//! Every captured file starts as a pending upload and is promoted to
//! confirmed only when its upload succeeds. Readiness is computed from
//! confirmed entries alone, so a transition is never offered on the strength
//! of an upload that might still fail.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::FeatureCatalog;
use crate::categories::Phase;
use crate::error::UploadError;
use crate::gate::{self, GateDecision};
use crate::lifecycle::{Job, PhotoRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CaptureId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureState {
    PendingUpload,
    Confirmed { storage_ref: String },
    Failed { reason: String, timed_out: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEntry {
    pub id: CaptureId,
    pub category_key: String,
    /// Phase the photo is (or will be) recorded under.
    pub phase: Phase,
    pub filename: String,
    #[serde(flatten)]
    pub state: CaptureState,
}

/// Captures for one job during one documentation pass.
#[derive(Debug, Clone)]
pub struct CaptureSet {
    job_id: String,
    entries: Vec<CaptureEntry>,
    persisted: BTreeSet<(Phase, String)>,
    next_id: u64,
}

impl CaptureSet {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            entries: Vec::new(),
            persisted: BTreeSet::new(),
            next_id: 1,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Seeds categories already confirmed on the server, e.g. after a reload.
    pub fn with_persisted(mut self, phase: Phase, keys: BTreeSet<String>) -> Self {
        self.persisted
            .extend(keys.into_iter().map(|key| (phase, key)));
        self
    }

    /// Registers a local capture awaiting upload.
    pub fn add_pending(&mut self, category_key: &str, phase: Phase, filename: &str) -> CaptureId {
        let id = CaptureId(self.next_id);
        self.next_id += 1;
        self.entries.push(CaptureEntry {
            id,
            category_key: category_key.to_string(),
            phase,
            filename: filename.to_string(),
            state: CaptureState::PendingUpload,
        });
        id
    }

    fn entry_mut(&mut self, id: CaptureId) -> Option<&mut CaptureEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Resolves a pending capture from its upload result. Returns `false`
    /// for an unknown id.
    pub fn resolve(&mut self, id: CaptureId, result: &Result<PhotoRecord, UploadError>) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        entry.state = match result {
            Ok(photo) => {
                entry.phase = photo.phase;
                CaptureState::Confirmed {
                    storage_ref: photo.storage_ref.clone(),
                }
            }
            Err(e) => CaptureState::Failed {
                reason: e.to_string(),
                timed_out: e.is_timeout(),
            },
        };
        true
    }

    /// Puts a failed capture back to pending so it can be uploaded again.
    pub fn retry(&mut self, id: CaptureId) -> bool {
        match self.entry_mut(id) {
            Some(entry) if matches!(entry.state, CaptureState::Failed { .. }) => {
                entry.state = CaptureState::PendingUpload;
                true
            }
            _ => false,
        }
    }

    /// Drops a capture the user discarded.
    pub fn remove(&mut self, id: CaptureId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[CaptureEntry] {
        &self.entries
    }

    pub fn failed(&self) -> impl Iterator<Item = &CaptureEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, CaptureState::Failed { .. }))
    }

    /// True once every submitted capture resolved one way or the other.
    pub fn is_settled(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| e.state == CaptureState::PendingUpload)
    }

    /// Category keys with a confirmed photo in `phase`, including seeded ones.
    pub fn confirmed_keys(&self, phase: Phase) -> BTreeSet<String> {
        let local = self
            .entries
            .iter()
            .filter(|e| e.phase == phase && matches!(e.state, CaptureState::Confirmed { .. }))
            .map(|e| e.category_key.clone());
        let seeded = self
            .persisted
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, key)| key.clone());
        local.chain(seeded).collect()
    }

    /// Gate decision over confirmed captures only.
    pub fn readiness(&self, catalog: &FeatureCatalog, job: &Job, phase: Phase) -> GateDecision {
        gate::can_transition(catalog, job, phase, &self.confirmed_keys(phase))
    }

    /// Whether the confirm action may be offered: every upload settled and
    /// the gate satisfied.
    pub fn can_confirm(&self, catalog: &FeatureCatalog, job: &Job, phase: Phase) -> bool {
        self.is_settled() && self.readiness(catalog, job, phase).allowed
    }
}
