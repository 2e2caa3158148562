// ============================================================================
// SESSION: one open photo: base buffer, edit history, tools, pending jobs
// ============================================================================
//
// Every user action goes through here. Operations whose preconditions are not
// met (no image, no active mask, a geometry tool in the way, segmentation in
// flight) do nothing and report `false`; only file-facing calls return errors.
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tracing::{info, warn};

use crate::canvas::{Canvas, Overlays, RenderRequest, draw_overlays};
use crate::components::history::{EditHistory, HistoryEntry};
use crate::components::tools::{CropHandle, CropTool, RadialTool, ToolState};
use crate::config::EngineConfig;
use crate::error::{LumaError, LumaResult, PresetError, SegmentationError};
use crate::mask::{Mask, MaskId, MaskKind};
use crate::ops::tone_curve::{ToneCurve, sort_points};
use crate::ops::transform::{DestructiveTransform, FlipAxis, Rotation};
use crate::params::{CurvePoint, EditParameters, GlobalEdits};
use crate::preset::Preset;
use crate::segmentation::{SegmentationJob, Segmenter};

/// Action names recorded in history.
pub mod actions {
    pub const LOAD_IMAGE: &str = "Load Image";
    pub const ADJUST_TONE_CURVE: &str = "Adjust Tone Curve";
    pub const SELECT_SUBJECT: &str = "Select Subject";
    pub const ADD_RADIAL_MASK: &str = "Add Radial Mask";
    pub const SELECT_MASK: &str = "Select Mask";
    pub const DELETE_MASK: &str = "Delete Mask";
    pub const LOAD_PRESET: &str = "Load Preset";
}

/// Mask list row for the UI.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskSummary {
    pub id: MaskId,
    pub name: String,
    pub kind: &'static str,
    pub active: bool,
}

/// Display toggles for [`Session::display_frame`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayOptions {
    /// Tint the active mask's coverage red.
    pub show_mask_overlay: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self { show_mask_overlay: true }
    }
}

/// Uncommitted slider/curve values shown while the user is still dragging.
#[derive(Clone, Debug, Default)]
struct LivePreview {
    global: Option<EditParameters>,
    curve: Option<Vec<CurvePoint>>,
    mask: Option<(MaskId, EditParameters)>,
}

pub struct Session {
    config: EngineConfig,
    canvas: Option<Canvas>,
    history: EditHistory,
    tool: ToolState,
    pending: Option<SegmentationJob>,
    preview: LivePreview,
    /// Where the current image came from, if it was opened from disk.
    pub path: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            canvas: None,
            history: EditHistory::default(),
            tool: ToolState::Idle,
            pending: None,
            preview: LivePreview::default(),
            path: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // IMAGE LOADING
    // ========================================================================

    /// Replace the base image and start a fresh history. Any in-flight
    /// segmentation is abandoned. Empty images are refused.
    pub fn load_image(&mut self, image: RgbaImage) -> bool {
        if image.width() == 0 || image.height() == 0 {
            warn!("refusing to load an empty image");
            return false;
        }
        info!(width = image.width(), height = image.height(), "image loaded");
        self.canvas = Some(Canvas::new(image));
        self.history.reset(actions::LOAD_IMAGE);
        self.tool = ToolState::Ready;
        self.pending = None;
        self.preview = LivePreview::default();
        self.path = None;
        true
    }

    /// Decode a file from disk and load it.
    pub fn open(&mut self, path: &Path) -> LumaResult<()> {
        let image = image::open(path)?.to_rgba8();
        if !self.load_image(image) {
            return Err(LumaError::NoImage);
        }
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn has_image(&self) -> bool {
        self.canvas.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.canvas.as_ref().map(Canvas::dimensions)
    }

    // ========================================================================
    // COMMIT HELPERS
    // ========================================================================

    /// Image loaded, no geometry tool active and no segmentation in flight.
    pub fn controls_enabled(&self) -> bool {
        self.canvas.is_some() && self.tool.controls_enabled() && !self.is_busy()
    }

    fn can_commit(&self) -> bool {
        self.canvas.is_some() && !self.is_busy()
    }

    fn mark_dirty(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.mark_dirty();
        }
    }

    fn commit_with<F>(&mut self, action: &str, edit: F) -> bool
    where
        F: FnOnce(&mut HistoryEntry),
    {
        self.history.commit_with(action, edit);
        self.mark_dirty();
        true
    }

    // ========================================================================
    // PARAMETER EDITS
    // ========================================================================

    /// Commit new global adjustment values.
    pub fn commit_global(&mut self, action: &str, params: EditParameters) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        self.preview.global = None;
        self.commit_with(action, |e| e.global_edits.adjustments = params)
    }

    /// Commit a new tone curve. Points are sorted by x; fewer than two points
    /// or points outside 0..255 are refused.
    pub fn set_tone_curve(&mut self, mut points: Vec<CurvePoint>) -> bool {
        let in_range = |v: f32| v.is_finite() && (0.0..=255.0).contains(&v);
        if !self.controls_enabled() || points.len() < 2 || !points.iter().all(|p| in_range(p.x) && in_range(p.y)) {
            return false;
        }
        sort_points(&mut points);
        self.preview.curve = None;
        self.commit_with(actions::ADJUST_TONE_CURVE, |e| e.global_edits.tone_curve_points = points)
    }

    /// Commit edits for the active mask. No active mask, no commit.
    pub fn commit_mask_edits(&mut self, action: &str, params: EditParameters) -> bool {
        if !self.controls_enabled() || self.active_mask().is_none() {
            return false;
        }
        self.preview.mask = None;
        self.commit_with(action, |e| {
            if let Some(mask) = e.active_mask_mut() {
                mask.edits = params;
            }
        })
    }

    /// Make `id` the active mask. Selecting the mask that is already active
    /// records nothing.
    pub fn select_mask(&mut self, id: MaskId) -> bool {
        let Some(entry) = self.history.current() else { return false };
        if !self.can_commit() || entry.mask(id).is_none() || entry.active_mask_id == Some(id) {
            return false;
        }
        self.preview.mask = None;
        self.commit_with(actions::SELECT_MASK, |e| e.active_mask_id = Some(id))
    }

    pub fn delete_active_mask(&mut self) -> bool {
        let Some(id) = self.active_mask().map(|m| m.id) else { return false };
        if !self.controls_enabled() {
            return false;
        }
        self.preview.mask = None;
        self.commit_with(actions::DELETE_MASK, |e| {
            e.masks.retain(|m| m.id != id);
            e.active_mask_id = None;
        })
    }

    // ========================================================================
    // LIVE PREVIEW
    // ========================================================================

    /// Show global values without committing them.
    pub fn preview_global(&mut self, params: EditParameters) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        self.preview.global = Some(params);
        self.mark_dirty();
        true
    }

    /// Show active-mask values without committing them.
    pub fn preview_mask(&mut self, params: EditParameters) -> bool {
        let Some(id) = self.active_mask().map(|m| m.id) else { return false };
        if !self.controls_enabled() {
            return false;
        }
        self.preview.mask = Some((id, params));
        self.mark_dirty();
        true
    }

    /// Show a tone curve without committing it.
    pub fn preview_curve(&mut self, mut points: Vec<CurvePoint>) -> bool {
        if !self.controls_enabled() || points.len() < 2 {
            return false;
        }
        sort_points(&mut points);
        self.preview.curve = Some(points);
        self.mark_dirty();
        true
    }

    /// Drop all uncommitted values and go back to the committed snapshot.
    pub fn clear_preview(&mut self) {
        self.preview = LivePreview::default();
        self.mark_dirty();
    }

    // ========================================================================
    // TONE CURVE WIDGET
    // ========================================================================

    /// The curve being edited: the previewed points if any, else the
    /// committed ones.
    fn working_curve(&self) -> Option<ToneCurve> {
        let points = match &self.preview.curve {
            Some(points) => points.clone(),
            None => self.global_edits()?.tone_curve_points.clone(),
        };
        Some(ToneCurve::new(points))
    }

    /// Index of the curve point within `curve_hit_radius` of (x, y).
    pub fn curve_point_at(&self, x: f32, y: f32) -> Option<usize> {
        self.working_curve()?.hit_test(x, y, self.config.curve_hit_radius)
    }

    /// Grab the point under the cursor, or insert one there. The result is
    /// previewed until [`Session::curve_release`].
    pub fn curve_press(&mut self, x: f32, y: f32) -> Option<usize> {
        if !self.controls_enabled() {
            return None;
        }
        let mut curve = self.working_curve()?;
        let index = match curve.hit_test(x, y, self.config.curve_hit_radius) {
            Some(i) => i,
            None => curve.add_point(x, y),
        };
        self.preview_curve(curve.points().to_vec());
        Some(index)
    }

    /// Move a grabbed point. Returns its index after re-sorting.
    pub fn curve_drag(&mut self, index: usize, x: f32, y: f32) -> Option<usize> {
        if !self.controls_enabled() {
            return None;
        }
        let mut curve = self.working_curve()?;
        let index = curve.drag_point(index, x, y)?;
        self.preview_curve(curve.points().to_vec());
        Some(index)
    }

    /// Commit the previewed curve. An unchanged curve records nothing.
    pub fn curve_release(&mut self) -> bool {
        let Some(points) = self.preview.curve.clone() else { return false };
        if self.global_edits().is_some_and(|g| g.tone_curve_points == points) {
            self.preview.curve = None;
            self.mark_dirty();
            return false;
        }
        self.set_tone_curve(points)
    }

    /// Delete the interior point under (x, y) and commit the result.
    pub fn curve_remove_point(&mut self, x: f32, y: f32) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        let Some(mut curve) = self.working_curve() else { return false };
        let Some(index) = curve.hit_test(x, y, self.config.curve_hit_radius) else { return false };
        if !curve.remove_point(index) {
            return false;
        }
        self.set_tone_curve(curve.points().to_vec())
    }

    // ========================================================================
    // RADIAL MASK TOOL
    // ========================================================================

    pub fn start_radial_tool(&mut self) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        self.tool = ToolState::RadialDrawing(RadialTool::default());
        true
    }

    pub fn radial_press(&mut self, x: f32, y: f32) {
        if let ToolState::RadialDrawing(tool) = &mut self.tool {
            tool.press(x, y);
            self.mark_dirty();
        }
    }

    pub fn radial_drag(&mut self, x: f32, y: f32) {
        if let ToolState::RadialDrawing(tool) = &mut self.tool {
            tool.drag_to(x, y);
        }
    }

    /// Finish the drag. A large enough ellipse becomes a new active mask;
    /// either way the tool closes.
    pub fn radial_release(&mut self) -> Option<MaskId> {
        let ToolState::RadialDrawing(tool) = &mut self.tool else { return None };
        let geometry = tool.release(self.config.min_radial_radius);
        self.tool = ToolState::Ready;
        let geometry = geometry.filter(|_| self.can_commit())?;
        let mask = Mask::radial(geometry);
        let id = mask.id;
        self.commit_with(actions::ADD_RADIAL_MASK, |e| {
            e.masks.push(mask);
            e.active_mask_id = Some(id);
        });
        Some(id)
    }

    // ========================================================================
    // CROP TOOL
    // ========================================================================

    pub fn start_crop(&mut self) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        let Some((w, h)) = self.dimensions() else { return false };
        self.tool = ToolState::Cropping(CropTool::new(w, h));
        true
    }

    pub fn crop_press(&mut self, x: f32, y: f32) -> Option<CropHandle> {
        let handle_size = self.config.crop_handle_size;
        match &mut self.tool {
            ToolState::Cropping(tool) => Some(tool.press(x, y, handle_size)),
            _ => None,
        }
    }

    pub fn crop_drag(&mut self, x: f32, y: f32) {
        let min_size = self.config.min_crop_size;
        if let ToolState::Cropping(tool) = &mut self.tool {
            tool.drag_to(x, y, min_size);
        }
    }

    pub fn crop_release(&mut self) {
        if let ToolState::Cropping(tool) = &mut self.tool {
            tool.release();
        }
    }

    /// Bake the current edits into a cropped base image.
    pub fn apply_crop(&mut self) -> bool {
        let (ToolState::Cropping(tool), Some((w, h))) = (&self.tool, self.dimensions()) else {
            return false;
        };
        let (x, y, width, height) = tool.crop_box.to_pixel_rect(w, h);
        self.apply_transform(DestructiveTransform::Crop { x, y, width, height })
    }

    pub fn cancel_crop(&mut self) {
        if matches!(self.tool, ToolState::Cropping(_)) {
            self.tool = ToolState::Ready;
        }
    }

    pub fn tool_state(&self) -> &ToolState {
        &self.tool
    }

    // ========================================================================
    // DESTRUCTIVE TRANSFORMS
    // ========================================================================

    pub fn rotate(&mut self, rotation: Rotation) -> bool {
        self.apply_transform(DestructiveTransform::Rotate(rotation))
    }

    pub fn flip(&mut self, axis: FlipAxis) -> bool {
        self.apply_transform(DestructiveTransform::Flip(axis))
    }

    /// Render the committed snapshot, transform it into the new base and
    /// restart history from a single default entry.
    pub fn apply_transform(&mut self, transform: DestructiveTransform) -> bool {
        if !self.can_commit() {
            return false;
        }
        self.preview = LivePreview::default();
        self.mark_dirty();
        let Some(frame) = self.frame() else { return false };
        let new_base = transform.apply(frame);
        let action = transform.action_name();
        info!(action = %action, width = new_base.width(), height = new_base.height(), "destructive transform");
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.set_base(new_base);
        }
        self.history.reset(&action);
        self.tool = ToolState::Ready;
        true
    }

    // ========================================================================
    // SUBJECT SEGMENTATION
    // ========================================================================

    /// Start classifying the committed frame in the background. Any live
    /// preview is dropped first. Commits are blocked until the job is
    /// collected.
    pub fn request_subject_mask(&mut self, segmenter: Arc<dyn Segmenter>) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        self.clear_preview();
        let Some(frame) = self.frame().cloned() else { return false };
        info!("subject segmentation requested");
        self.pending = Some(SegmentationJob::spawn(segmenter, frame));
        true
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Collect a finished job without blocking. `None` while nothing is
    /// pending or the classifier is still running.
    pub fn poll_segmentation(&mut self) -> Option<Result<MaskId, SegmentationError>> {
        let result = self.pending.as_ref()?.try_take()?;
        self.pending = None;
        Some(self.finish_segmentation(result))
    }

    /// Block until the pending job answers.
    pub fn wait_segmentation(&mut self) -> Option<Result<MaskId, SegmentationError>> {
        let job = self.pending.take()?;
        Some(self.finish_segmentation(job.wait()))
    }

    fn finish_segmentation(&mut self, result: Result<image::GrayImage, SegmentationError>) -> Result<MaskId, SegmentationError> {
        let coverage = result?;
        let Some((w, h)) = self.dimensions() else { return Err(SegmentationError::Disconnected) };
        if coverage.dimensions() != (w, h) {
            return Err(SegmentationError::DimensionMismatch {
                expected: w as usize * h as usize,
                got: coverage.as_raw().len(),
            });
        }
        let subjects = self
            .history
            .current()
            .map_or(0, |e| e.masks.iter().filter(|m| matches!(m.kind, MaskKind::Ai { .. })).count());
        let mask = Mask::new(format!("Subject {}", subjects + 1), MaskKind::Ai { coverage });
        let id = mask.id;
        self.commit_with(actions::SELECT_SUBJECT, |e| {
            e.masks.push(mask);
            e.active_mask_id = Some(id);
        });
        Ok(id)
    }

    // ========================================================================
    // HISTORY NAVIGATION
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        self.navigate(EditHistory::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.navigate(EditHistory::redo)
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        self.navigate(|h| h.jump_to(index))
    }

    fn navigate(&mut self, step: impl FnOnce(&mut EditHistory) -> bool) -> bool {
        if !self.can_commit() || !step(&mut self.history) {
            return false;
        }
        self.preview = LivePreview::default();
        self.mark_dirty();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.can_commit() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.can_commit() && self.history.can_redo()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn history_labels(&self) -> Vec<&str> {
        self.history.labels()
    }

    // ========================================================================
    // PRESETS
    // ========================================================================

    /// Snapshot of the committed state, or `None` without an image.
    pub fn preset(&self) -> Option<Preset> {
        self.canvas.as_ref()?;
        self.history.current().map(Preset::from_entry)
    }

    pub fn save_preset(&self, path: &Path) -> LumaResult<()> {
        let preset = self.preset().ok_or(LumaError::NoImage)?;
        preset.save(path)?;
        info!(path = %path.display(), "preset saved");
        Ok(())
    }

    /// Validate `preset` against the current image and commit it as one
    /// entry. `Ok(false)` when there is nothing to apply it to.
    pub fn apply_preset(&mut self, preset: &Preset) -> Result<bool, PresetError> {
        let Some((w, h)) = self.dimensions() else { return Ok(false) };
        if !self.can_commit() {
            return Ok(false);
        }
        let masks = preset.to_masks(w, h).inspect_err(|e| warn!(error = %e, "preset rejected"))?;
        let mut global_edits: GlobalEdits = preset.global_edits.clone();
        sort_points(&mut global_edits.tone_curve_points);
        self.preview = LivePreview::default();
        self.commit_with(actions::LOAD_PRESET, |e| {
            e.global_edits = global_edits;
            e.masks = masks;
            e.active_mask_id = None;
        });
        Ok(true)
    }

    pub fn load_preset(&mut self, path: &Path) -> Result<bool, PresetError> {
        let preset = Preset::load(path).inspect_err(|e| warn!(error = %e, path = %path.display(), "preset unreadable"))?;
        self.apply_preset(&preset)
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    /// The composited frame, re-rendered only if something changed.
    pub fn frame(&mut self) -> Option<&RgbaImage> {
        let canvas = self.canvas.as_mut()?;
        let entry = self.history.current()?;
        let preview = &self.preview;
        let req = RenderRequest {
            global: preview.global.as_ref().unwrap_or(&entry.global_edits.adjustments),
            curve_points: preview.curve.as_deref().unwrap_or(&entry.global_edits.tone_curve_points),
            masks: &entry.masks,
            mask_override: preview.mask.as_ref().map(|(id, p)| (*id, p)),
        };
        Some(canvas.render(&req, &self.config))
    }

    /// The frame plus overlays for the active mask and any geometry tool.
    pub fn display_frame(&mut self, options: DisplayOptions) -> Option<RgbaImage> {
        let (w, h) = self.dimensions()?;
        let coverage = options
            .show_mask_overlay
            .then(|| self.active_mask().map(|m| m.coverage(w, h)))
            .flatten();
        let overlays = Overlays {
            mask_coverage: coverage.as_ref(),
            mask_opacity: self.config.overlay_opacity,
            crop_box: match &self.tool {
                ToolState::Cropping(tool) => Some(tool.crop_box),
                _ => None,
            },
            radial_outline: match &self.tool {
                ToolState::RadialDrawing(tool) => tool.drag().map(|d| d.geometry()),
                _ => None,
            },
        };
        let frame = self.frame()?;
        Some(if overlays.is_empty() { frame.clone() } else { draw_overlays(frame, &overlays) })
    }

    /// Committed global edits of the current entry.
    pub fn global_edits(&self) -> Option<&GlobalEdits> {
        self.history.current().map(|e| &e.global_edits)
    }

    pub fn active_mask(&self) -> Option<&Mask> {
        self.history.current()?.active_mask()
    }

    pub fn active_mask_edits(&self) -> Option<&EditParameters> {
        self.active_mask().map(|m| &m.edits)
    }

    pub fn masks(&self) -> Vec<MaskSummary> {
        let Some(entry) = self.history.current() else { return Vec::new() };
        entry
            .masks
            .iter()
            .map(|m| MaskSummary {
                id: m.id,
                name: m.name.clone(),
                kind: m.kind.type_name(),
                active: entry.active_mask_id == Some(m.id),
            })
            .collect()
    }

    pub fn render_count(&self) -> u64 {
        self.canvas.as_ref().map_or(0, Canvas::render_count)
    }
}
