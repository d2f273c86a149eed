//! Editing session - owns the note grid and wires clicks, scrolling,
//! playback and files together.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EditorConfig;
use crate::file::{AssetStore, Composition, FileError, MusicFile};
use crate::pagination::{BoundsAnimator, NoteHit, Pagination, ScrollOutcome};
use crate::sequencer::playback::{NoteTrigger, PlaybackEvent, PlaybackScheduler};
use crate::sequencer::NoteGrid;

pub struct Editor {
    grid: NoteGrid,
    pagination: Pagination,
    scheduler: PlaybackScheduler,
    bpm: u32,
    path: Option<PathBuf>,
}

impl Editor {
    pub fn new(config: &EditorConfig, viewport_width: f32, viewport_height: f32) -> Self {
        let pagination = Pagination::new(viewport_width, viewport_height)
            .with_tolerance_divisor(config.editor.hit_tolerance_divisor)
            .with_animation(config.editor.scroll_animation());
        Self {
            grid: NoteGrid::new(),
            pagination,
            scheduler: PlaybackScheduler::new(),
            bpm: config.playback.default_bpm.max(1),
            path: None,
        }
    }

    pub fn grid(&self) -> &NoteGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut NoteGrid {
        &mut self.grid
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Zero is ignored
    pub fn set_bpm(&mut self, bpm: u32) {
        if bpm > 0 {
            self.bpm = bpm;
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Toggle the note under a click. Returns the hit and whether a note was added.
    pub fn click(&mut self, x: f32, y: f32) -> Option<(NoteHit, bool)> {
        let hit = self.pagination.pointer_down(x, y)?;
        let added = self.grid.toggle_note(hit.note, hit.global_beat);
        Some((hit, added))
    }

    pub fn scroll(&mut self, delta_quarters: i32, animator: &mut dyn BoundsAnimator) -> ScrollOutcome {
        self.pagination.scroll(delta_quarters, animator)
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn play(&mut self, now: Instant) -> bool {
        self.scheduler.start(self.bpm, &mut self.grid, now)
    }

    pub fn stop(&mut self) {
        self.scheduler.stop(&mut self.grid);
    }

    /// Drive playback from the event loop
    pub fn tick(&mut self, now: Instant, trigger: &mut dyn NoteTrigger) -> Vec<PlaybackEvent> {
        let events = self.scheduler.poll(now, &mut self.grid, trigger);
        for event in &events {
            if let PlaybackEvent::BeatAdvanced(beat) = event {
                self.pagination.ensure_capacity(*beat);
            }
        }
        events
    }

    /// Start over with an empty composition
    pub fn new_composition(&mut self, bpm: u32) {
        self.stop();
        self.grid.clear();
        self.set_bpm(bpm);
        self.path = None;
    }

    /// Replace the current composition with the one stored at `path`
    pub fn load(&mut self, path: &Path) -> Result<(), FileError> {
        let file = MusicFile::load(path)?;
        self.stop();
        file.export_to_grid(&mut self.grid);
        self.bpm = file.bpm();
        self.pagination.fit_grid(&self.grid);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), FileError> {
        let file = self.file_for(path)?;
        file.save()?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Write printable pages named after `path`
    pub fn export_svg(&self, path: &Path, assets: &dyn AssetStore) -> Result<Vec<PathBuf>, FileError> {
        self.file_for(path)?.export_svg(assets)
    }

    fn file_for(&self, path: &Path) -> Result<MusicFile, FileError> {
        let composition = Composition::from_grid(self.bpm, &self.grid);
        let file = MusicFile::with_composition(path, composition);
        if !file.is_valid() {
            return Err(FileError::InvalidPath);
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> Editor {
        Editor::new(&EditorConfig::default(), 400.0, 486.0)
    }

    #[test]
    fn test_zero_bpm_ignored() {
        let mut editor = editor();
        editor.set_bpm(90);
        editor.set_bpm(0);
        assert_eq!(editor.bpm(), 90);
        editor.new_composition(0);
        assert_eq!(editor.bpm(), 90);
    }

    #[test]
    fn test_click_toggles_note() {
        let mut editor = editor();
        let (x, y) = editor.pagination().note_position(4, 10).unwrap();
        let (hit, added) = editor.click(x, y).unwrap();
        assert!(added);
        assert_eq!(hit.global_beat, 10);
        assert!(editor.grid().contains(4, 10));
        let (_, added) = editor.click(x, y).unwrap();
        assert!(!added);
        assert!(editor.grid().is_empty());
        assert!(editor.click(-50.0, y).is_none());
    }

    #[test]
    fn test_editing_while_playing_keeps_running() {
        let mut editor = editor();
        editor.grid_mut().add_note(1, 3);
        let now = Instant::now();
        assert!(editor.play(now));
        editor.grid_mut().add_note(2, 5);
        assert!(editor.is_playing());
        editor.new_composition(60);
        assert!(!editor.is_playing());
        assert!(editor.grid().is_empty());
    }
}
