/// Playback scheduler - walks the beat timeline and triggers notes
///
/// The scheduler never sleeps or spawns threads. It keeps a single armed
/// deadline that the host event loop polls; each tick disarms the timer, runs
/// to completion, and only then arms the next one.
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use super::NoteGrid;

/// Delay before the first tick after `start`
const FIRST_TICK_DELAY: Duration = Duration::from_millis(1);

/// Tempo constant: tick spacing in milliseconds is this divided by bpm
const TICK_MS_NUMERATOR: u64 = 36_000;

/// Receives every non-empty set of notes that should sound together
pub trait NoteTrigger {
    fn play_notes(&mut self, notes: &BTreeSet<u8>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    BeatAdvanced(usize),
    NotesTriggered { beat: usize, notes: Vec<u8> },
    Finished,
}

/// Milliseconds between ticks for a tempo, `None` for a zero tempo
pub fn tick_interval(bpm: u32) -> Option<Duration> {
    if bpm == 0 {
        return None;
    }
    Some(Duration::from_millis(TICK_MS_NUMERATOR / u64::from(bpm)))
}

#[derive(Debug)]
pub struct PlaybackScheduler {
    deadline: Option<Instant>,
    interval: Duration,
    beat_index: usize,
    num_beats: usize,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self {
            deadline: None,
            interval: Duration::ZERO,
            beat_index: 0,
            num_beats: 0,
        }
    }

    /// Begin playing `grid` from the first beat. Restarts if already running.
    /// Returns false and stays stopped if `bpm` is zero.
    pub fn start(&mut self, bpm: u32, grid: &mut NoteGrid, now: Instant) -> bool {
        if self.is_running() {
            self.stop(grid);
        }
        let Some(interval) = tick_interval(bpm) else {
            log::warn!("Refusing to start playback at {} bpm", bpm);
            return false;
        };
        self.beat_index = 0;
        self.num_beats = grid.beat_count();
        self.interval = interval;
        self.deadline = Some(now + FIRST_TICK_DELAY);
        log::debug!(
            "Playback started: {} beats, {} ms per beat",
            self.num_beats,
            interval.as_millis()
        );
        true
    }

    pub fn stop(&mut self, grid: &mut NoteGrid) {
        self.deadline = None;
        self.beat_index = 0;
        self.num_beats = 0;
        grid.reset_highlighting();
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Index of the next beat to be played
    pub fn current_beat(&self) -> usize {
        self.beat_index
    }

    pub fn beat_total(&self) -> usize {
        self.num_beats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long the event loop may wait before polling again
    pub fn time_until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Run the armed tick if its deadline has passed.
    pub fn poll(
        &mut self,
        now: Instant,
        grid: &mut NoteGrid,
        trigger: &mut dyn NoteTrigger,
    ) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return events,
        }
        self.deadline = None;

        if self.beat_index >= self.num_beats {
            log::debug!("Playback finished after {} beats", self.num_beats);
            self.stop(grid);
            events.push(PlaybackEvent::Finished);
            return events;
        }

        let beat = self.beat_index;
        let notes = grid.highlight_notes(beat);
        events.push(PlaybackEvent::BeatAdvanced(beat));
        if !notes.is_empty() {
            trigger.play_notes(&notes);
            events.push(PlaybackEvent::NotesTriggered {
                beat,
                notes: notes.into_iter().collect(),
            });
        }
        self.beat_index += 1;

        self.deadline = Some(now + self.interval);
        events
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingTrigger {
        played: Vec<Vec<u8>>,
    }

    impl NoteTrigger for RecordingTrigger {
        fn play_notes(&mut self, notes: &BTreeSet<u8>) {
            self.played.push(notes.iter().copied().collect());
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(60), Some(ms(600)));
        assert_eq!(tick_interval(120), Some(ms(300)));
        assert_eq!(tick_interval(0), None);
    }

    #[test]
    fn test_three_beats_at_sixty_bpm() {
        let mut grid = NoteGrid::new();
        grid.add_note(3, 0);
        grid.add_note(7, 0);
        grid.add_note(1, 2);
        assert_eq!(grid.beat_count(), 3);

        let mut trigger = RecordingTrigger::default();
        let mut scheduler = PlaybackScheduler::new();
        let t0 = Instant::now();
        assert!(scheduler.start(60, &mut grid, t0));
        assert_eq!(scheduler.time_until_next_tick(t0), Some(ms(1)));

        // Nothing happens before the first deadline
        assert!(scheduler.poll(t0, &mut grid, &mut trigger).is_empty());

        let mut tick_times = Vec::new();
        let mut now = t0;
        let mut finished = false;
        for _ in 0..10 {
            now += scheduler.time_until_next_tick(now).unwrap_or_default();
            let events = scheduler.poll(now, &mut grid, &mut trigger);
            if events.contains(&PlaybackEvent::Finished) {
                finished = true;
                break;
            }
            if events
                .iter()
                .any(|e| matches!(e, PlaybackEvent::BeatAdvanced(_)))
            {
                tick_times.push(now - t0);
            }
        }

        assert!(finished);
        assert_eq!(tick_times, vec![ms(1), ms(601), ms(1201)]);
        assert_eq!(trigger.played, vec![vec![3, 7], vec![1]]);
        assert!(!scheduler.is_running());
        assert!(!grid.has_highlights());
    }

    #[test]
    fn test_empty_beats_advance_without_trigger() {
        let mut grid = NoteGrid::new();
        grid.add_note(0, 1);
        let mut trigger = RecordingTrigger::default();
        let mut scheduler = PlaybackScheduler::new();
        let t0 = Instant::now();
        scheduler.start(120, &mut grid, t0);

        let events = scheduler.poll(t0 + ms(1), &mut grid, &mut trigger);
        assert_eq!(events, vec![PlaybackEvent::BeatAdvanced(0)]);
        assert!(trigger.played.is_empty());
        assert_eq!(grid.highlight(0), 1.0);

        // A late poll still runs just one tick, and re-arms from that moment
        let late = t0 + ms(2000);
        let events = scheduler.poll(late, &mut grid, &mut trigger);
        assert_eq!(
            events,
            vec![
                PlaybackEvent::BeatAdvanced(1),
                PlaybackEvent::NotesTriggered { beat: 1, notes: vec![0] },
            ]
        );
        assert_eq!(scheduler.time_until_next_tick(late), Some(ms(300)));
    }

    #[test]
    fn test_empty_grid_stops_on_first_tick() {
        let mut grid = NoteGrid::new();
        let mut trigger = RecordingTrigger::default();
        let mut scheduler = PlaybackScheduler::new();
        let t0 = Instant::now();
        scheduler.start(60, &mut grid, t0);
        assert!(scheduler.is_running());
        let events = scheduler.poll(t0 + ms(1), &mut grid, &mut trigger);
        assert_eq!(events, vec![PlaybackEvent::Finished]);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_stop_is_idempotent_and_clears_highlights() {
        let mut grid = NoteGrid::new();
        grid.add_note(4, 0);
        grid.add_note(4, 5);
        let mut trigger = RecordingTrigger::default();
        let mut scheduler = PlaybackScheduler::new();
        let t0 = Instant::now();
        scheduler.start(60, &mut grid, t0);
        scheduler.poll(t0 + ms(1), &mut grid, &mut trigger);
        assert!(grid.has_highlights());
        assert_eq!(scheduler.current_beat(), 1);

        scheduler.stop(&mut grid);
        scheduler.stop(&mut grid);
        assert!(!scheduler.is_running());
        assert!(!grid.has_highlights());
        assert_eq!(scheduler.current_beat(), 0);
        assert_eq!(scheduler.beat_total(), 0);
        assert!(scheduler
            .poll(t0 + ms(5000), &mut grid, &mut trigger)
            .is_empty());
    }

    #[test]
    fn test_restart_resets_position() {
        let mut grid = NoteGrid::new();
        grid.add_note(2, 0);
        grid.add_note(2, 1);
        let mut trigger = RecordingTrigger::default();
        let mut scheduler = PlaybackScheduler::new();
        let t0 = Instant::now();
        scheduler.start(60, &mut grid, t0);
        scheduler.poll(t0 + ms(1), &mut grid, &mut trigger);
        assert_eq!(scheduler.current_beat(), 1);

        let t1 = t0 + ms(100);
        assert!(scheduler.start(120, &mut grid, t1));
        assert_eq!(scheduler.current_beat(), 0);
        assert_eq!(scheduler.interval(), ms(300));
        assert_eq!(scheduler.time_until_next_tick(t1), Some(ms(1)));
    }

    #[test]
    fn test_zero_bpm_is_rejected() {
        let mut grid = NoteGrid::new();
        grid.add_note(2, 0);
        let mut scheduler = PlaybackScheduler::new();
        assert!(!scheduler.start(0, &mut grid, Instant::now()));
        assert!(!scheduler.is_running());
    }
}
