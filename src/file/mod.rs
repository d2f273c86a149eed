/// Composition files - the `.mb` text format, saving, loading and SVG export
///
/// A file is a bpm line followed by one `<beat>:<note> <note> ...` line per
/// beat that has notes:
///
/// ```text
/// 120
/// 0:3 7
/// 2:1
/// ```
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::sequencer::{is_valid_note, NoteGrid};

pub mod assets;
pub mod svg;

pub use assets::{AssetStore, Assets};

pub const DEFAULT_BPM: u32 = 60;
pub const FILE_EXTENSION: &str = "mb";

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("No usable composition path")]
    InvalidPath,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No page template found for the SVG export")]
    AssetMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub bpm: u32,
    pub notes: BTreeMap<usize, BTreeSet<u8>>,
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            notes: BTreeMap::new(),
        }
    }
}

impl Composition {
    pub fn from_grid(bpm: u32, grid: &NoteGrid) -> Self {
        Self {
            bpm,
            notes: grid.note_map(),
        }
    }

    pub fn to_grid(&self) -> NoteGrid {
        NoteGrid::from_note_map(&self.notes)
    }

    pub fn beat_count(&self) -> usize {
        self.notes
            .iter()
            .rev()
            .find(|(_, notes)| !notes.is_empty())
            .map(|(&beat, _)| beat + 1)
            .unwrap_or(0)
    }

    /// Non-empty beats in ascending order
    pub fn beats(&self) -> impl Iterator<Item = (usize, &BTreeSet<u8>)> {
        self.notes
            .iter()
            .filter(|(_, notes)| !notes.is_empty())
            .map(|(&beat, notes)| (beat, notes))
    }
}

/// Read composition text. Malformed lines are skipped.
pub fn parse(text: &str) -> Composition {
    let mut composition = Composition::default();
    for line in text.lines() {
        match line.split_once(':') {
            Some((beat_token, note_tokens)) => {
                let Some(beat) = leading_int(beat_token).and_then(|b| usize::try_from(b).ok())
                else {
                    log::debug!("Skipping line with bad beat: {:?}", line);
                    continue;
                };
                let notes: BTreeSet<u8> = note_tokens
                    .split_whitespace()
                    .filter(|token| token.bytes().all(|b| b.is_ascii_digit()))
                    .filter_map(|token| token.parse::<u8>().ok())
                    .filter(|&note| is_valid_note(note))
                    .collect();
                if !notes.is_empty() {
                    composition.notes.insert(beat, notes);
                }
            }
            None => {
                if let Some(bpm) = leading_int(line)
                    .filter(|&value| value > 0)
                    .and_then(|value| u32::try_from(value).ok())
                {
                    composition.bpm = bpm;
                }
            }
        }
    }
    composition
}

/// Write composition text: the bpm, then one line per non-empty beat
pub fn serialize(composition: &Composition) -> String {
    let mut output = composition.bpm.to_string();
    for (beat, notes) in composition.beats() {
        let notes: Vec<String> = notes.iter().map(u8::to_string).collect();
        output.push('\n');
        output.push_str(&format!("{}:{}", beat, notes.join(" ")));
    }
    output
}

/// Integer at the start of `text`, after leading whitespace
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Whether `path` can be written: an existing writable file, or a new file in
/// an existing writable directory
pub fn has_write_access(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    if let Ok(metadata) = fs::metadata(path) {
        return metadata.is_file() && !metadata.permissions().readonly();
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::metadata(parent)
        .map(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
        .unwrap_or(false)
}

/// A composition bound to a location on disk.
///
/// Opening never fails outright: an unusable path yields a file whose
/// `is_valid` is false, and callers check that before saving.
#[derive(Debug, Clone)]
pub struct MusicFile {
    path: Option<PathBuf>,
    composition: Composition,
}

impl MusicFile {
    /// Load an existing file, or prepare a new one at a writable path
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.is_file() {
            return Self::load(path).unwrap_or_else(|err| {
                log::warn!("{}", err);
                Self::invalid()
            });
        }
        if !has_write_access(path) {
            log::warn!("Cannot create a composition at {:?}", path);
            return Self::invalid();
        }
        Self::with_composition(path, Composition::default())
    }

    /// Read a composition that must already exist at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FileError::InvalidPath);
        }
        let text = fs::read_to_string(path).map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let composition = parse(&text);
        log::info!(
            "Loaded {:?}: {} bpm, {} beat(s)",
            path,
            composition.bpm,
            composition.beat_count()
        );
        Ok(Self::with_composition(path, composition))
    }

    /// Bind `composition` to `path` without touching what is on disk
    pub fn with_composition(path: impl AsRef<Path>, composition: Composition) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            composition,
        }
    }

    pub fn invalid() -> Self {
        Self {
            path: None,
            composition: Composition::default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.path.as_deref().is_some_and(has_write_access)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn bpm(&self) -> u32 {
        self.composition.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        if bpm > 0 {
            self.composition.bpm = bpm;
        }
    }

    /// Take the notes currently in the editor
    pub fn import_grid(&mut self, grid: &NoteGrid) {
        self.composition.notes = grid.note_map();
    }

    /// Replace the editor's notes with this file's notes
    pub fn export_to_grid(&self, grid: &mut NoteGrid) {
        grid.clear();
        for (beat, notes) in self.composition.beats() {
            for &note in notes {
                grid.add_note(note, beat);
            }
        }
    }

    pub fn save(&self) -> Result<(), FileError> {
        let path = self
            .path
            .as_deref()
            .filter(|path| has_write_access(path))
            .ok_or(FileError::InvalidPath)?;
        fs::write(path, serialize(&self.composition)).map_err(|source| FileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Saved {:?}", path);
        Ok(())
    }

    /// Write the printable strip pages next to the composition file
    pub fn export_svg(&self, assets: &dyn AssetStore) -> Result<Vec<PathBuf>, FileError> {
        let path = self.path.as_deref().ok_or(FileError::InvalidPath)?;
        svg::export_to_svg(path, &self.composition, assets)
    }
}
