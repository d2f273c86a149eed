/// MUSICBOX - a music box composition editor library
///
/// This library provides the core components for writing music box strips:
/// - Sparse note grid holding the composition
/// - Strip geometry and click hit testing
/// - Growing, scrolling column of strips with one global beat timeline
/// - Playback scheduler driven by the host event loop
/// - `.mb` text files and printable SVG export
/// - Audio and MIDI outputs for testing and production use

pub mod audio;
pub mod config;
pub mod editor;
pub mod file;
pub mod midi;
pub mod pagination;
pub mod sequencer;
pub mod strip;

// Re-export commonly used types
pub use audio::AudioOutput;
pub use config::EditorConfig;
pub use editor::Editor;
pub use file::{Composition, FileError, MusicFile};
pub use midi::{midi_note_name, MidiOutputDevice};
pub use pagination::{AnimationTarget, BoundsAnimator, NoteClickListener, Pagination, SegmentId};
pub use sequencer::playback::{NoteTrigger, PlaybackEvent, PlaybackScheduler};
pub use sequencer::NoteGrid;
pub use strip::{Bounds, StripCoordinateMapper, StripKind};
