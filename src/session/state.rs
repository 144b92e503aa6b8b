//! Annotation session state and lifecycle
//!
//! One session edits one submission. It owns the canvas engine for the active
//! slot and keeps a cached copy of the submission that is replaced by whatever
//! the store returns after each successful update.
//!
//! Save and report generation come in three steps (`begin_*`, the pending
//! request's async `persist`/`run`, `finish_*`) so hosts can keep editing
//! while the store call is outstanding; [`AnnotationSession::save`] and
//! [`AnnotationSession::generate_report`] chain them for simple callers.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tokio::sync::mpsc;

use super::messages::{Intent, SessionEvent};
use super::recommendations::RecommendationEditor;
use crate::annotations::{AnnotationSnapshot, codec, handle_pointer};
use crate::canvas::{Background, CANVAS_HEIGHT, CANVAS_WIDTH, CanvasEngine, CanvasEvent, LiveShape};
use crate::config::{AppConfig, Tool};
use crate::domain::{AssetRef, Recommendations, Shape, SlotId, Status, Submission, SubmissionUpdate};
use crate::error::{
    CanvasError, ImageDecodeError, PersistenceError, RenderError, RequestKind, SessionError,
};
use crate::report;
use crate::store::{Backend, ImageStore, SubmissionStore};

/// Settings a session reads from the application configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub jpeg_quality: u8,
    pub stroke_width: f32,
    pub default_tool: Tool,
    pub default_label: String,
    pub report_title: String,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            stroke_width: config.stroke_width,
            default_tool: config.default_tool,
            default_label: config.default_label.clone(),
            report_title: config.report_title.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// A save that has been snapshotted but not yet persisted
#[derive(Clone, Debug)]
pub struct PendingSave {
    pub submission_id: String,
    pub slot: SlotId,
    /// Engine revision the snapshot was taken at
    pub revision: u64,
    pub snapshot: AnnotationSnapshot,
}

impl PendingSave {
    /// Store the flattened image, then update the slot in one submission update
    pub async fn persist<S>(&self, store: &S) -> Result<Submission, PersistenceError>
    where
        S: ImageStore + SubmissionStore,
    {
        let annotated_image = store.put_image(self.snapshot.raster.clone()).await?;
        let update = SubmissionUpdate::Annotations {
            slot: self.slot,
            shapes: self.snapshot.shapes.clone(),
            annotated_image,
            saved_at: Utc::now(),
        };
        store.update_submission(&self.submission_id, update).await
    }
}

/// A report request that passed validation
#[derive(Clone, Debug)]
pub struct PendingReport {
    pub submission: Submission,
    pub recommendations: Recommendations,
    pub date: NaiveDate,
    pub title: String,
}

impl PendingReport {
    /// Fetch pictures, compose and store the PDF, then record it on the submission
    pub async fn run<B: Backend>(&self, store: &B) -> Result<Submission, SessionError> {
        let pictures = report::fetch_report_images(store, &self.submission).await;

        let submission = self.submission.clone();
        let recommendations = self.recommendations.clone();
        let date = self.date;
        let title = self.title.clone();
        let pdf = tokio::task::spawn_blocking(move || {
            report::compose(&submission, &recommendations, &pictures, date, &title)
        })
        .await
        .map_err(|e| RenderError::Pdf(format!("report task failed: {e}")))??;

        let report = store.put_report(pdf).await?;
        let id = &self.submission.id;
        store
            .update_submission(
                id,
                SubmissionUpdate::Recommendations {
                    recommendations: self.recommendations.clone(),
                },
            )
            .await?;
        let updated = store
            .update_submission(
                id,
                SubmissionUpdate::Report {
                    report,
                    generated_at: Utc::now(),
                },
            )
            .await?;
        Ok(updated)
    }
}

/// A background fetch for one slot
#[derive(Clone, Debug)]
pub struct BackgroundRequest {
    pub slot: SlotId,
    pub url: String,
}

impl BackgroundRequest {
    /// Fetch the bytes and decode them on a blocking worker
    pub async fn load<S: ImageStore>(&self, store: &S) -> Result<Background, ImageDecodeError> {
        let bytes = store.get_image(&self.url).await?;
        tokio::task::spawn_blocking(move || {
            Background::decode(&bytes, CANVAS_WIDTH, CANVAS_HEIGHT)
        })
        .await
        .map_err(|e| ImageDecodeError::Task(e.to_string()))?
    }
}

/// Editing session for one submission
pub struct AnnotationSession<B> {
    store: Arc<B>,
    settings: SessionSettings,
    submission: Submission,
    slot: SlotId,
    engine: CanvasEngine,
    tool: Tool,
    label: String,
    recommendations: RecommendationEditor,
    in_flight: Option<RequestKind>,
    was_dirty: bool,
    listeners: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl<B: Backend> AnnotationSession<B> {
    /// Load a submission and start editing its upper-teeth slot
    pub async fn open(
        store: Arc<B>,
        submission_id: &str,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let submission = store.get_submission(submission_id).await?;
        let slot = SlotId::UpperTeeth;
        let engine = Self::build_engine(&submission, slot, settings.stroke_width)?;
        let derived = submission.shape_labels();
        let recommendations =
            RecommendationEditor::new(submission.treatment_recommendations.clone(), &derived);

        log::info!(
            "Opened submission {} ({}) on {}",
            submission.id,
            submission.status,
            slot
        );

        Ok(Self {
            store,
            tool: settings.default_tool,
            label: settings.default_label.clone(),
            settings,
            submission,
            slot,
            engine,
            recommendations,
            in_flight: None,
            was_dirty: false,
            listeners: Vec::new(),
        })
    }

    fn build_engine(
        submission: &Submission,
        slot: SlotId,
        stroke_width: f32,
    ) -> Result<CanvasEngine, SessionError> {
        let mut engine = CanvasEngine::with_stroke_width(stroke_width);
        codec::deserialize(&submission.slot(slot).annotations, &mut engine)?;
        engine.drain_events();
        Ok(engine)
    }

    // --- notifications ---

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: SessionEvent) {
        log::trace!("Session event {:?}", event);
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Labels behind the recommendation editor: live shapes here, persisted elsewhere
    fn derived_labels(&self) -> BTreeSet<String> {
        let mut labels: BTreeSet<String> = self
            .engine
            .live_shapes()
            .iter()
            .map(|s| s.label.clone())
            .collect();
        for (slot, image_slot) in self.submission.images.iter() {
            if slot != self.slot {
                labels.extend(image_slot.annotations.iter().map(|s| s.label.clone()));
            }
        }
        labels
    }

    fn sync_recommendations(&mut self) {
        let derived = self.derived_labels();
        if self.recommendations.sync(&derived) {
            self.emit(SessionEvent::RecommendationsChanged);
        }
    }

    /// Forward queued engine events to listeners
    fn pump_engine_events(&mut self) {
        for event in self.engine.drain_events() {
            match event {
                CanvasEvent::ShapesChanged => {
                    self.emit(SessionEvent::ShapesChanged);
                    self.sync_recommendations();
                }
                CanvasEvent::BackgroundReady => {
                    self.emit(SessionEvent::BackgroundReady(self.slot));
                }
            }
        }
        let dirty = self.engine.is_dirty();
        if dirty != self.was_dirty {
            self.was_dirty = dirty;
            self.emit(SessionEvent::DirtyChanged(dirty));
        }
    }

    // --- intents ---

    /// Apply one user intent
    pub fn handle(&mut self, intent: Intent) -> Result<(), SessionError> {
        let result = match intent {
            Intent::SelectTool(tool) => {
                log::debug!("Tool {}", tool.name());
                self.tool = tool;
                self.emit(SessionEvent::ToolChanged(tool));
                Ok(())
            }
            Intent::CycleTool => {
                self.tool = self.tool.next();
                log::debug!("Tool {}", self.tool.name());
                self.emit(SessionEvent::ToolChanged(self.tool));
                Ok(())
            }
            Intent::SelectLabel(label) => {
                if label.trim().is_empty() {
                    Err(CanvasError::EmptyLabel.into())
                } else {
                    self.label = label.clone();
                    self.emit(SessionEvent::LabelChanged(label));
                    Ok(())
                }
            }
            Intent::AddShape => self
                .engine
                .add_shape(self.tool.shape_kind(), &self.label)
                .map(|_| ())
                .map_err(SessionError::from),
            Intent::Pointer(action) => {
                handle_pointer(&mut self.engine, self.tool, &self.label, action)
                    .map_err(SessionError::from)
            }
            Intent::DeleteSelected => {
                self.engine.remove_selected();
                Ok(())
            }
            Intent::ClearAll => {
                self.engine.clear_all_shapes();
                Ok(())
            }
            Intent::SetRecommendation { label, text } => {
                let derived = self.derived_labels();
                self.recommendations
                    .set(&label, &text, &derived)
                    .map(|()| self.emit(SessionEvent::RecommendationsChanged))
                    .map_err(SessionError::from)
            }
            Intent::AddCustomLabel(label) => {
                if self.recommendations.add_custom(&label) {
                    self.emit(SessionEvent::RecommendationsChanged);
                }
                Ok(())
            }
            Intent::RemoveCustomLabel(label) => {
                let derived = self.derived_labels();
                if self.recommendations.remove_custom(&label, &derived) {
                    self.emit(SessionEvent::RecommendationsChanged);
                }
                Ok(())
            }
        };
        self.pump_engine_events();
        result
    }

    /// Replace the active slot's shapes with imported records
    pub fn replace_shapes(&mut self, shapes: &[Shape]) -> Result<(), SessionError> {
        codec::import(shapes, &mut self.engine)?;
        self.pump_engine_events();
        Ok(())
    }

    // --- background ---

    /// What to fetch for the active slot's background
    pub fn background_request(&self) -> BackgroundRequest {
        BackgroundRequest {
            slot: self.slot,
            url: self.submission.slot(self.slot).original.url.clone(),
        }
    }

    /// Install a loaded background if it is still for the active slot
    pub fn apply_background(
        &mut self,
        slot: SlotId,
        result: Result<Background, ImageDecodeError>,
    ) -> Result<(), ImageDecodeError> {
        if slot != self.slot {
            log::debug!("Dropping background for {} (now editing {})", slot, self.slot);
            return Ok(());
        }
        match result {
            Ok(background) => {
                self.engine.set_background(background);
                self.pump_engine_events();
                Ok(())
            }
            Err(err) => {
                log::warn!("Background for {} failed: {}", slot, err);
                self.emit(SessionEvent::BackgroundFailed {
                    slot,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Fetch, decode and install the active slot's original photo
    pub async fn load_background(&mut self) -> Result<(), ImageDecodeError> {
        let request = self.background_request();
        let result = request.load(self.store.as_ref()).await;
        self.apply_background(request.slot, result)
    }

    // --- slots ---

    /// Switch to another slot; refused while there are unsaved edits
    pub fn switch_slot(&mut self, slot: SlotId) -> Result<(), SessionError> {
        if let Some(kind) = self.in_flight {
            return Err(SessionError::Busy(kind));
        }
        if self.engine.is_dirty() {
            return Err(SessionError::UnsavedChanges(self.slot));
        }
        self.rebuild_for(slot)
    }

    /// Switch to another slot, dropping any unsaved edits on the current one
    pub fn switch_slot_discarding(&mut self, slot: SlotId) -> Result<(), SessionError> {
        if let Some(kind) = self.in_flight {
            return Err(SessionError::Busy(kind));
        }
        if self.engine.is_dirty() {
            log::warn!(
                "Discarding {} unsaved shape(s) on {}",
                self.engine.live_shapes().len(),
                self.slot
            );
            self.emit(SessionEvent::EditsDiscarded(self.slot));
        }
        self.rebuild_for(slot)
    }

    fn rebuild_for(&mut self, slot: SlotId) -> Result<(), SessionError> {
        if slot == self.slot && !self.engine.is_dirty() {
            return Ok(());
        }
        let engine = Self::build_engine(&self.submission, slot, self.settings.stroke_width)?;
        self.engine = engine;
        self.slot = slot;
        log::debug!("Now editing {}", slot);
        self.emit(SessionEvent::SlotChanged(slot));
        self.emit(SessionEvent::ShapesChanged);
        self.sync_recommendations();
        self.pump_engine_events();
        Ok(())
    }

    // --- save ---

    fn claim(&mut self, kind: RequestKind) -> Result<(), SessionError> {
        if let Some(current) = self.in_flight {
            return Err(SessionError::Busy(current));
        }
        self.in_flight = Some(kind);
        Ok(())
    }

    /// Snapshot the active slot for saving and mark a save as in flight
    pub fn begin_save(&mut self) -> Result<PendingSave, SessionError> {
        if let Some(current) = self.in_flight {
            return Err(SessionError::Busy(current));
        }
        if !self.engine.is_dirty() {
            return Err(SessionError::NothingToSave);
        }
        let snapshot = codec::snapshot(&self.engine, self.settings.jpeg_quality)?;
        self.claim(RequestKind::Save)?;
        Ok(PendingSave {
            submission_id: self.submission.id.clone(),
            slot: self.slot,
            revision: self.engine.revision(),
            snapshot,
        })
    }

    /// Persist a pending save against this session's store
    pub async fn persist_save(&self, pending: &PendingSave) -> Result<Submission, PersistenceError> {
        pending.persist(self.store.as_ref()).await
    }

    /// Apply the outcome of a save
    pub fn finish_save(
        &mut self,
        pending: PendingSave,
        result: Result<Submission, PersistenceError>,
    ) -> Result<(), SessionError> {
        self.in_flight = None;
        match result {
            Ok(updated) => {
                let previous = self.submission.status;
                self.submission = updated;
                self.engine.acknowledge_save(pending.revision);
                log::info!(
                    "Saved {} shape(s) on {}",
                    pending.snapshot.shapes.len(),
                    pending.slot
                );
                self.emit(SessionEvent::Saved(pending.slot));
                if self.submission.status != previous {
                    self.emit(SessionEvent::StatusChanged(self.submission.status));
                }
                self.sync_recommendations();
                self.pump_engine_events();
                Ok(())
            }
            Err(err) => {
                log::error!("Saving {} failed: {}", pending.slot, err);
                self.emit(SessionEvent::SaveFailed {
                    slot: pending.slot,
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Save the active slot's shapes and flattened image
    pub async fn save(&mut self) -> Result<(), SessionError> {
        let pending = self.begin_save()?;
        let result = self.persist_save(&pending).await;
        self.finish_save(pending, result)
    }

    // --- recommendations ---

    /// Persist the recommendation entries as a single update
    pub async fn save_recommendations(&mut self) -> Result<(), SessionError> {
        self.claim(RequestKind::Recommendations)?;
        let update = SubmissionUpdate::Recommendations {
            recommendations: self.recommendations.entries().clone(),
        };
        let result = self
            .store
            .update_submission(&self.submission.id, update)
            .await;
        self.in_flight = None;
        match result {
            Ok(updated) => {
                self.submission = updated;
                self.emit(SessionEvent::RecommendationsSaved);
                Ok(())
            }
            Err(err) => {
                log::error!("Saving recommendations failed: {}", err);
                Err(err.into())
            }
        }
    }

    // --- report ---

    /// Validate and mark a report request as in flight; no I/O happens here
    pub fn begin_report(&mut self) -> Result<PendingReport, SessionError> {
        if let Some(current) = self.in_flight {
            return Err(SessionError::Busy(current));
        }
        self.submission
            .check_reportable(self.recommendations.entries())?;
        self.claim(RequestKind::Report)?;
        Ok(PendingReport {
            submission: self.submission.clone(),
            recommendations: self.recommendations.entries().clone(),
            date: Local::now().date_naive(),
            title: self.settings.report_title.clone(),
        })
    }

    /// Run a pending report against this session's store
    pub async fn run_report(&self, pending: &PendingReport) -> Result<Submission, SessionError> {
        pending.run(self.store.as_ref()).await
    }

    /// Apply the outcome of a report run; returns the stored report reference
    pub fn finish_report(
        &mut self,
        result: Result<Submission, SessionError>,
    ) -> Result<AssetRef, SessionError> {
        self.in_flight = None;
        match result {
            Ok(updated) => {
                let previous = self.submission.status;
                self.submission = updated;
                let Some(report) = self.submission.report.clone() else {
                    return Err(PersistenceError::backend("store returned no report reference").into());
                };
                log::info!("Report generated for {}: {}", self.submission.id, report.url);
                self.emit(SessionEvent::ReportGenerated(report.clone()));
                if self.submission.status != previous {
                    self.emit(SessionEvent::StatusChanged(self.submission.status));
                }
                Ok(report)
            }
            Err(err) => {
                log::error!("Report generation failed: {}", err);
                self.emit(SessionEvent::ReportFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Generate, store and record the PDF report
    pub async fn generate_report(&mut self) -> Result<AssetRef, SessionError> {
        let pending = self.begin_report()?;
        let result = self.run_report(&pending).await;
        self.finish_report(result)
    }

    // --- accessors ---

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn status(&self) -> Status {
        self.submission.status
    }

    pub fn active_slot(&self) -> SlotId {
        self.slot
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_dirty(&self) -> bool {
        self.engine.is_dirty()
    }

    pub fn in_flight(&self) -> Option<RequestKind> {
        self.in_flight
    }

    pub fn recommendations(&self) -> &Recommendations {
        self.recommendations.entries()
    }

    pub fn custom_labels(&self) -> &BTreeSet<String> {
        self.recommendations.custom_labels()
    }

    /// Read-only view of the live shapes on the active slot
    pub fn live_shapes(&self) -> &[LiveShape] {
        self.engine.live_shapes()
    }

    /// Flattened canvas for display
    pub fn render_preview(&self) -> image::RgbaImage {
        self.engine.render_preview()
    }

    /// Flattened canvas as PNG bytes
    pub fn export_raster(&self) -> Result<Vec<u8>, RenderError> {
        self.engine.export_raster()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::PointerAction;
    use crate::store::ReportStore;
    use crate::domain::{
        PatientInfo, Point, SlotImages, SubmissionFilter, SubmissionPage, SubmissionStats,
    };
    use crate::store::MemoryStore;
    use std::io::Cursor;

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([220, 190, 180]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    async fn seeded(store: &MemoryStore) -> String {
        let upper = store.put_image(jpeg(1024, 768)).await.unwrap();
        let front = store.put_image(jpeg(640, 480)).await.unwrap();
        let lower = store.put_image(jpeg(480, 640)).await.unwrap();
        let submission = Submission::new(
            "sub-1",
            PatientInfo {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
                note: None,
            },
            SlotImages::new(upper, front, lower),
            Utc::now(),
        );
        store.create_submission(submission).await.unwrap();
        "sub-1".to_string()
    }

    async fn open(store: MemoryStore) -> AnnotationSession<MemoryStore> {
        let id = seeded(&store).await;
        AnnotationSession::open(Arc::new(store), &id, SessionSettings::default())
            .await
            .unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = MemoryStore::new();
        let mut session = open(store.clone()).await;
        let mut rx = session.subscribe();
        assert_eq!(session.status(), Status::Uploaded);

        session.load_background().await.unwrap();
        session.handle(Intent::AddShape).unwrap();
        assert!(session.is_dirty());
        assert_eq!(session.recommendations().get("Stains").map(String::as_str), Some(""));

        session.save().await.unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.status(), Status::Annotated);
        let slot = session.submission().slot(SlotId::UpperTeeth);
        assert_eq!(slot.annotations.len(), 1);
        assert!(slot.annotated.is_some());

        session
            .handle(Intent::SetRecommendation {
                label: "Stains".to_string(),
                text: "Scaling and polishing".to_string(),
            })
            .unwrap();
        let report = session.generate_report().await.unwrap();
        assert_eq!(session.status(), Status::Reported);
        let pdf = store.report_bytes(&report.url).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let stored = store.get_submission("sub-1").await.unwrap();
        assert_eq!(stored.treatment_recommendations["Stains"], "Scaling and polishing");

        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::BackgroundReady(SlotId::UpperTeeth)));
        assert!(events.contains(&SessionEvent::Saved(SlotId::UpperTeeth)));
        assert!(events.contains(&SessionEvent::StatusChanged(Status::Annotated)));
        assert!(events.contains(&SessionEvent::StatusChanged(Status::Reported)));
    }

    #[tokio::test]
    async fn test_report_rejected_before_save() {
        let store = MemoryStore::new();
        let mut session = open(store.clone()).await;
        session
            .handle(Intent::SetRecommendation {
                label: "Stains".to_string(),
                text: "Polish".to_string(),
            })
            .unwrap();

        let err = session.generate_report().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(crate::error::ValidationError::NotAnnotated { .. })
        ));
        assert_eq!(session.in_flight(), None);
    }

    #[tokio::test]
    async fn test_report_needs_recommendation_text() {
        let mut session = open(MemoryStore::new()).await;
        session.handle(Intent::AddShape).unwrap();
        session.save().await.unwrap();

        let err = session.generate_report().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(crate::error::ValidationError::NoRecommendations)
        ));
    }

    #[tokio::test]
    async fn test_busy_guard_and_edits_during_save() {
        let mut session = open(MemoryStore::new()).await;
        session.handle(Intent::AddShape).unwrap();

        let pending = session.begin_save().unwrap();
        assert!(matches!(
            session.begin_save(),
            Err(SessionError::Busy(RequestKind::Save))
        ));
        assert!(matches!(
            session.begin_report(),
            Err(SessionError::Busy(RequestKind::Save))
        ));
        assert!(matches!(
            session.switch_slot(SlotId::FrontTeeth),
            Err(SessionError::Busy(RequestKind::Save))
        ));

        // Edits keep flowing while the save is outstanding
        session.handle(Intent::SelectTool(Tool::Circle)).unwrap();
        session.handle(Intent::AddShape).unwrap();

        let result = session.persist_save(&pending).await;
        session.finish_save(pending, result).unwrap();
        assert!(session.is_dirty());
        assert_eq!(session.submission().slot(SlotId::UpperTeeth).annotations.len(), 1);
        assert_eq!(session.live_shapes().len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_to_save() {
        let mut session = open(MemoryStore::new()).await;
        assert!(matches!(session.save().await, Err(SessionError::NothingToSave)));
    }

    /// Store whose submission updates always fail
    struct FailingStore(MemoryStore);

    impl ImageStore for FailingStore {
        async fn put_image(&self, bytes: Vec<u8>) -> Result<AssetRef, PersistenceError> {
            self.0.put_image(bytes).await
        }

        async fn get_image(&self, url: &str) -> Result<Vec<u8>, PersistenceError> {
            self.0.get_image(url).await
        }
    }

    impl SubmissionStore for FailingStore {
        async fn create_submission(&self, submission: Submission) -> Result<(), PersistenceError> {
            self.0.create_submission(submission).await
        }

        async fn get_submission(&self, id: &str) -> Result<Submission, PersistenceError> {
            self.0.get_submission(id).await
        }

        async fn update_submission(
            &self,
            _id: &str,
            _update: SubmissionUpdate,
        ) -> Result<Submission, PersistenceError> {
            Err(PersistenceError::backend("database offline"))
        }

        async fn list_submissions(
            &self,
            filter: &SubmissionFilter,
        ) -> Result<SubmissionPage, PersistenceError> {
            self.0.list_submissions(filter).await
        }

        async fn submission_stats(&self) -> Result<SubmissionStats, PersistenceError> {
            self.0.submission_stats().await
        }
    }

    impl ReportStore for FailingStore {
        async fn put_report(&self, pdf: Vec<u8>) -> Result<AssetRef, PersistenceError> {
            self.0.put_report(pdf).await
        }
    }

    #[tokio::test]
    async fn test_save_failure_keeps_edits() {
        let inner = MemoryStore::new();
        let id = seeded(&inner).await;
        let mut session = AnnotationSession::open(
            Arc::new(FailingStore(inner)),
            &id,
            SessionSettings::default(),
        )
        .await
        .unwrap();
        let mut rx = session.subscribe();

        session.handle(Intent::AddShape).unwrap();
        let err = session.save().await.unwrap_err();
        assert!(matches!(err, SessionError::Persistence(_)));
        assert!(session.is_dirty());
        assert_eq!(session.in_flight(), None);
        assert_eq!(session.status(), Status::Uploaded);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, SessionEvent::SaveFailed { slot: SlotId::UpperTeeth, .. }))
        );
    }

    #[tokio::test]
    async fn test_switch_slot_with_unsaved_edits() {
        let mut session = open(MemoryStore::new()).await;
        let mut rx = session.subscribe();
        session.handle(Intent::AddShape).unwrap();

        assert!(matches!(
            session.switch_slot(SlotId::FrontTeeth),
            Err(SessionError::UnsavedChanges(SlotId::UpperTeeth))
        ));
        assert_eq!(session.active_slot(), SlotId::UpperTeeth);

        session.switch_slot_discarding(SlotId::FrontTeeth).unwrap();
        assert_eq!(session.active_slot(), SlotId::FrontTeeth);
        assert!(!session.is_dirty());
        assert!(session.live_shapes().is_empty());
        assert!(session.recommendations().is_empty());

        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::EditsDiscarded(SlotId::UpperTeeth)));
        assert!(events.contains(&SessionEvent::SlotChanged(SlotId::FrontTeeth)));
        assert!(events.contains(&SessionEvent::RecommendationsChanged));
    }

    #[tokio::test]
    async fn test_discarded_label_does_not_reach_saved_recommendations() {
        let store = MemoryStore::new();
        let mut session = open(store.clone()).await;
        session.handle(Intent::SelectLabel("Attrition".to_string())).unwrap();
        session.handle(Intent::AddShape).unwrap();
        assert!(session.recommendations().contains_key("Attrition"));

        session.switch_slot_discarding(SlotId::LowerTeeth).unwrap();
        session.save_recommendations().await.unwrap();

        let stored = store.get_submission("sub-1").await.unwrap();
        assert!(!stored.treatment_recommendations.contains_key("Attrition"));
    }

    #[tokio::test]
    async fn test_saved_shapes_follow_slot_switches() {
        let mut session = open(MemoryStore::new()).await;
        session.handle(Intent::SelectLabel("Crowns".to_string())).unwrap();
        session.handle(Intent::AddShape).unwrap();
        session.save().await.unwrap();

        session.switch_slot(SlotId::LowerTeeth).unwrap();
        assert!(session.live_shapes().is_empty());
        // Labels persisted on other slots still back a recommendation
        assert!(session.recommendations().contains_key("Crowns"));

        session.switch_slot(SlotId::UpperTeeth).unwrap();
        assert_eq!(session.live_shapes().len(), 1);
        assert_eq!(session.live_shapes()[0].label, "Crowns");
    }

    #[tokio::test]
    async fn test_clearing_shapes_prunes_recommendations() {
        let mut session = open(MemoryStore::new()).await;
        session.handle(Intent::AddShape).unwrap();
        session
            .handle(Intent::AddCustomLabel("Diet".to_string()))
            .unwrap();
        assert!(session.recommendations().contains_key("Stains"));

        session.handle(Intent::ClearAll).unwrap();
        assert!(!session.recommendations().contains_key("Stains"));
        assert!(session.recommendations().contains_key("Diet"));
    }

    #[tokio::test]
    async fn test_blank_recommendation_label_is_rejected() {
        let mut session = open(MemoryStore::new()).await;
        let mut rx = session.subscribe();

        let result = session.handle(Intent::SetRecommendation {
            label: " \n".to_string(),
            text: "Floss daily".to_string(),
        });
        assert!(matches!(
            result,
            Err(SessionError::Validation(crate::error::ValidationError::EmptyLabel))
        ));
        assert!(session.recommendations().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tool_and_label_changes_leave_shapes_alone() {
        let mut session = open(MemoryStore::new()).await;
        session.handle(Intent::AddShape).unwrap();
        let before = session.live_shapes().to_vec();

        session.handle(Intent::CycleTool).unwrap();
        assert_eq!(session.tool(), Tool::Circle);
        session.handle(Intent::SelectLabel("Attrition".to_string())).unwrap();
        assert_eq!(session.label(), "Attrition");
        assert!(matches!(
            session.handle(Intent::SelectLabel(" ".to_string())),
            Err(SessionError::Canvas(CanvasError::EmptyLabel))
        ));
        assert_eq!(session.live_shapes(), before.as_slice());
    }

    #[tokio::test]
    async fn test_freehand_through_pointer_intents() {
        let mut session = open(MemoryStore::new()).await;
        session.handle(Intent::SelectTool(Tool::Freehand)).unwrap();
        for action in [
            PointerAction::Down(Point::new(100.0, 100.0)),
            PointerAction::Move(Point::new(120.0, 110.0)),
            PointerAction::Move(Point::new(140.0, 130.0)),
            PointerAction::Up(Point::new(150.0, 140.0)),
        ] {
            session.handle(Intent::Pointer(action)).unwrap();
        }
        assert_eq!(session.live_shapes().len(), 1);
        assert!(session.is_dirty());
    }

    #[tokio::test]
    async fn test_stale_background_is_dropped() {
        let mut session = open(MemoryStore::new()).await;
        let request = session.background_request();
        session.switch_slot(SlotId::FrontTeeth).unwrap();

        let result = request.load(&MemoryStore::new()).await;
        assert!(result.is_err());
        // Result for the old slot is ignored, even a failure
        session.apply_background(request.slot, result).unwrap();
    }
}
