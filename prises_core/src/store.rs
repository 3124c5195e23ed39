//! The store and its dispatch surface.
//!
//! Presentation code reaches the collections only through [`Store`]: typed
//! [`Action`]s in, sorted read views out. Every dispatch applies the reducer
//! first, then writes the full durable state through the persistor.

use crate::codec::{self, ExportDocument, FileOutcome, ImportReport, ImportSummary, Upload};
use crate::collection::Collection;
use crate::dose::{self, DoseStatus};
use crate::persist::{FileStorage, KeyValueStorage, Persistor};
use crate::retime::RetimeRequest;
use crate::ui::{UiPatch, UiState};
use crate::{list, Config, Error, Medication, Result, Shot};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::cmp::Ordering;
use std::path::PathBuf;
use uuid::Uuid;

/// Every mutation the presentation layer may request
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Insert under a new uuid; any uuid in the payload is ignored
    CreateMedication(Medication),
    /// Full replace by uuid; no-op without one
    EditMedication(Medication),
    DeleteMedication(Uuid),
    /// Replace the whole collection (import only)
    InitMedications(Vec<Medication>),
    CreateShot(Shot),
    EditShot(Shot),
    DeleteShot(Uuid),
    InitShots(Vec<Shot>),
    /// Record an intake of an existing medication
    Take { medication: Uuid, at: DateTime<Utc> },
    SetUi(UiPatch),
}

/// What a dispatch did to the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
    Created(Uuid),
}

impl Outcome {
    pub fn created(self) -> Option<Uuid> {
        match self {
            Outcome::Created(uuid) => Some(uuid),
            _ => None,
        }
    }
}

pub struct Store<S: KeyValueStorage> {
    medications: Collection<Medication>,
    shots: Collection<Shot>,
    ui: UiState,
    persistor: Persistor<S>,
}

impl Store<FileStorage> {
    /// Open the store under the configured data directory
    pub fn open(config: &Config) -> Self {
        Self::rehydrate(FileStorage::new(config.storage_dir()))
    }
}

impl<S: KeyValueStorage> Store<S> {
    /// Start from whatever the storage holds; never fails
    pub fn rehydrate(storage: S) -> Self {
        let persistor = Persistor::new(storage);
        let snapshot = persistor.rehydrate();
        Self {
            medications: snapshot.medications,
            shots: snapshot.shots,
            ui: UiState::with_view_mode(snapshot.view_mode),
            persistor,
        }
    }

    pub fn into_storage(self) -> S {
        self.persistor.into_storage()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Apply `action`, then persist if durable state changed
    ///
    /// On a storage error the in-memory change is kept and the error returned.
    pub fn dispatch(&mut self, action: Action) -> Result<Outcome> {
        let durable = match &action {
            Action::SetUi(patch) => patch.touches_durable(),
            _ => true,
        };

        let outcome = self.reduce(action)?;
        if durable && outcome != Outcome::Unchanged {
            self.persist()?;
        }
        Ok(outcome)
    }

    fn reduce(&mut self, action: Action) -> Result<Outcome> {
        tracing::debug!("Dispatching {:?}", action);
        let outcome = match action {
            Action::CreateMedication(fields) => Outcome::Created(self.medications.create(fields)),
            Action::EditMedication(fields) => changed(self.medications.edit(fields)),
            Action::DeleteMedication(uuid) => changed(self.medications.delete(&uuid)),
            Action::InitMedications(records) => {
                self.medications.bulk_init(records);
                Outcome::Changed
            }
            Action::CreateShot(fields) => Outcome::Created(self.shots.create(fields)),
            Action::EditShot(fields) => changed(self.shots.edit(fields)),
            Action::DeleteShot(uuid) => changed(self.shots.delete(&uuid)),
            Action::InitShots(records) => {
                self.shots.bulk_init(records);
                Outcome::Changed
            }
            Action::Take { medication, at } => {
                let medication = self
                    .medications
                    .get(&medication)
                    .ok_or_else(|| Error::NotFound(format!("medication {}", medication)))?;
                let shot = Shot::snapshot(medication, at);
                Outcome::Created(self.shots.create(shot))
            }
            Action::SetUi(patch) => {
                self.ui.set(patch);
                Outcome::Changed
            }
        };
        Ok(outcome)
    }

    fn persist(&mut self) -> Result<()> {
        self.persistor
            .persist(&self.medications, &self.shots, self.ui.medic_view_mode)
            .map_err(|e| {
                tracing::warn!("Failed to persist store: {}", e);
                e
            })
    }

    // ------------------------------------------------------------------
    // Read views
    // ------------------------------------------------------------------

    /// Medications by name, ignoring case and accents
    pub fn medications(&self) -> Vec<&Medication> {
        let mut medications: Vec<_> = self.medications.iter().collect();
        medications.sort_by(|a, b| compare_names(&a.primary, &b.primary));
        medications
    }

    /// Shots, most recent first
    pub fn shots(&self) -> Vec<&Shot> {
        let mut shots: Vec<_> = self.shots.iter().collect();
        shots.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| a.uuid.cmp(&b.uuid)));
        shots
    }

    pub fn medication(&self, uuid: &Uuid) -> Option<&Medication> {
        self.medications.get(uuid)
    }

    pub fn shot(&self, uuid: &Uuid) -> Option<&Shot> {
        self.shots.get(uuid)
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Look up a medication by display name, ignoring case and accents
    pub fn find_medication(&self, name: &str) -> Option<&Medication> {
        let wanted = fold_name(name.trim());
        self.medications
            .iter()
            .find(|m| fold_name(m.primary.trim()) == wanted)
    }

    pub fn dose_status(&self, medication: &Medication, now: DateTime<Utc>) -> DoseStatus {
        dose::dose_status(medication, self.shots.iter(), now)
    }

    pub fn export_document(&self) -> ExportDocument {
        ExportDocument {
            medications: self.medications().into_iter().cloned().collect(),
            shots: self.shots().into_iter().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------
    // Compound operations
    // ------------------------------------------------------------------

    /// Record an intake of `medication` now
    pub fn take(&mut self, medication: Uuid) -> Result<Uuid> {
        let outcome = self.dispatch(Action::Take {
            medication,
            at: Utc::now(),
        })?;
        outcome
            .created()
            .ok_or_else(|| Error::NotFound(format!("medication {}", medication)))
    }

    /// Correct a shot's time against the local clock
    pub fn retime_shot(&mut self, uuid: Uuid, request: RetimeRequest) -> Result<i64> {
        self.retime_shot_at(uuid, request, &Local::now())
    }

    /// Correct a shot's time against an explicit `now`
    ///
    /// Submits the full record with only `ts` changed, then closes the edit.
    pub fn retime_shot_at<Tz: TimeZone>(
        &mut self,
        uuid: Uuid,
        request: RetimeRequest,
        now: &DateTime<Tz>,
    ) -> Result<i64> {
        let mut shot = self
            .shots
            .get(&uuid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("shot {}", uuid)))?;

        shot.ts = request.resolve(now)?.timestamp_millis();
        let ts = shot.ts;
        self.dispatch(Action::EditShot(shot))?;

        if self.ui.shot_to_edit == Some(uuid) {
            self.dispatch(Action::SetUi(UiPatch::default().shot_to_edit(None)))?;
        }
        tracing::info!("Shot {} moved to {}", uuid, ts);
        Ok(ts)
    }

    /// Read, parse and apply a batch of uploaded files
    pub fn import_files(&mut self, paths: &[PathBuf]) -> ImportReport {
        let uploads = codec::read_uploads(paths);
        self.import_uploads(uploads)
    }

    /// Apply already-read uploads in order
    ///
    /// Each file replaces the collections it carries, so within a batch the
    /// last file to carry a key wins for that collection. Both collections of
    /// a file are reduced before a single persist.
    pub fn import_uploads(&mut self, uploads: Vec<Upload>) -> ImportReport {
        let mut report = ImportReport::default();

        for Upload { path, document } in uploads {
            let result = document.and_then(|document| {
                let document = document.with_fresh_ids();
                let mut summary = ImportSummary::default();

                if let Some(shots) = document.shots {
                    summary.shots = Some(shots.len());
                    self.reduce(Action::InitShots(shots))?;
                }
                if let Some(medications) = document.medications {
                    summary.medications = Some(medications.len());
                    self.reduce(Action::InitMedications(medications))?;
                }
                self.persist()?;
                Ok(summary)
            });

            match &result {
                Ok(summary) => tracing::info!("Imported {:?}: {:?}", path, summary),
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
            report.files.push(FileOutcome { path, result });
        }

        report
    }

    /// Append every row of a tab-separated list as a new medication
    pub fn import_list(&mut self, raw: &str) -> Result<Vec<Uuid>> {
        let medications = list::parse_list(raw)?;
        let mut created = Vec::with_capacity(medications.len());
        for medication in medications {
            if let Some(uuid) = self.dispatch(Action::CreateMedication(medication))?.created() {
                created.push(uuid);
            }
        }
        tracing::info!("Added {} medications from list", created.len());
        Ok(created)
    }
}

fn changed(did_change: bool) -> Outcome {
    if did_change {
        Outcome::Changed
    } else {
        Outcome::Unchanged
    }
}

/// Collation: case- and accent-insensitive first, exact text as tie-break
fn compare_names(a: &str, b: &str) -> Ordering {
    fold_name(a).cmp(&fold_name(b)).then_with(|| a.cmp(b))
}

fn fold_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => folded.push('a'),
            'æ' => folded.push_str("ae"),
            'ç' => folded.push('c'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ñ' => folded.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => folded.push('o'),
            'œ' => folded.push_str("oe"),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ý' | 'ÿ' => folded.push('y'),
            'ß' => folded.push_str("ss"),
            other => folded.push(other),
        }
    }
    folded
}
