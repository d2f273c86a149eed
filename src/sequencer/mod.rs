/// Core sequencer state - the sparse note grid that holds a composition
/// Beats are unbounded, notes are one of the 15 fixed music box pitches
use std::collections::{BTreeMap, BTreeSet};

pub mod playback;

/// Number of pitches on the music box comb
pub const NOTE_COUNT: u8 = 15;

/// Highest valid note index
pub const MAX_NOTE: u8 = NOTE_COUNT - 1;

/// Highlights fainter than this are dropped by `decay_highlights`
const HIGHLIGHT_FLOOR: f32 = 0.01;

pub fn is_valid_note(note: u8) -> bool {
    note <= MAX_NOTE
}

#[derive(Debug, Clone, Default)]
pub struct NoteGrid {
    notes: BTreeMap<usize, BTreeSet<u8>>,
    highlights: BTreeMap<usize, f32>,
    dirty: bool,
}

impl NoteGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from a beat -> notes map, ignoring invalid notes
    pub fn from_note_map(map: &BTreeMap<usize, BTreeSet<u8>>) -> Self {
        let mut grid = Self::new();
        for (&beat, notes) in map {
            for &note in notes {
                grid.add_note(note, beat);
            }
        }
        grid
    }

    pub fn add_note(&mut self, note: u8, beat: usize) {
        if !is_valid_note(note) {
            log::trace!("Ignoring invalid note {} at beat {}", note, beat);
            return;
        }
        if self.notes.entry(beat).or_default().insert(note) {
            log::debug!(
                "Added note {}, there are now {} note(s) at beat {}",
                note,
                self.notes[&beat].len(),
                beat
            );
            self.mark_edited();
        }
    }

    pub fn remove_note(&mut self, note: u8, beat: usize) {
        let Some(set) = self.notes.get_mut(&beat) else {
            return;
        };
        if set.remove(&note) {
            if set.is_empty() {
                self.notes.remove(&beat);
            }
            log::debug!("Removed note {} at beat {}", note, beat);
            self.mark_edited();
        }
    }

    /// Add the note if it is missing, remove it otherwise.
    /// Returns true only when a note was added.
    pub fn toggle_note(&mut self, note: u8, beat: usize) -> bool {
        if !is_valid_note(note) {
            log::trace!("Ignoring toggle of invalid note {} at beat {}", note, beat);
            return false;
        }
        if self.contains(note, beat) {
            self.remove_note(note, beat);
            false
        } else {
            self.add_note(note, beat);
            true
        }
    }

    pub fn contains(&self, note: u8, beat: usize) -> bool {
        self.notes
            .get(&beat)
            .map(|set| set.contains(&note))
            .unwrap_or(false)
    }

    /// All notes at a beat, possibly empty
    pub fn notes(&self, beat: usize) -> BTreeSet<u8> {
        self.notes.get(&beat).cloned().unwrap_or_default()
    }

    /// Same as `notes`, but also flashes the beat on the next redraws
    pub fn highlight_notes(&mut self, beat: usize) -> BTreeSet<u8> {
        self.highlights.insert(beat, 1.0);
        self.dirty = true;
        self.notes(beat)
    }

    /// Number of beats needed to play everything: one past the last used beat
    pub fn beat_count(&self) -> usize {
        self.notes
            .iter()
            .rev()
            .find(|(_, set)| !set.is_empty())
            .map(|(&beat, _)| beat + 1)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.values().all(|set| set.is_empty())
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.highlights.clear();
        self.dirty = true;
    }

    /// Copy of every non-empty beat and its notes
    pub fn note_map(&self) -> BTreeMap<usize, BTreeSet<u8>> {
        self.notes
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(&beat, set)| (beat, set.clone()))
            .collect()
    }

    /// Iterate non-empty beats in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<u8>)> {
        self.notes
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(&beat, set)| (beat, set))
    }

    pub fn highlight(&self, beat: usize) -> f32 {
        self.highlights.get(&beat).copied().unwrap_or(0.0)
    }

    pub fn has_highlights(&self) -> bool {
        !self.highlights.is_empty()
    }

    /// Fade every highlight by `factor`, called once per redraw
    pub fn decay_highlights(&mut self, factor: f32) {
        for intensity in self.highlights.values_mut() {
            *intensity *= factor;
        }
        self.highlights.retain(|_, intensity| *intensity >= HIGHLIGHT_FLOOR);
    }

    pub fn reset_highlighting(&mut self) {
        if !self.highlights.is_empty() {
            self.highlights.clear();
            self.dirty = true;
        }
    }

    /// Whether anything changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_edited(&mut self) {
        self.highlights.clear();
        self.dirty = true;
    }
}
