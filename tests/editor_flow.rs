use std::collections::BTreeSet;
use std::fs;
use std::time::{Duration, Instant};

use musicbox::file::Assets;
use musicbox::{Editor, EditorConfig, FileError, NoteTrigger, PlaybackEvent};

#[derive(Default)]
struct RecordingTrigger {
    played: Vec<Vec<u8>>,
}

impl NoteTrigger for RecordingTrigger {
    fn play_notes(&mut self, notes: &BTreeSet<u8>) {
        self.played.push(notes.iter().copied().collect());
    }
}

fn editor() -> Editor {
    Editor::new(&EditorConfig::default(), 400.0, 486.0)
}

fn click_note(editor: &mut Editor, note: u8, beat: usize) -> bool {
    let (x, y) = editor
        .pagination()
        .note_position(note, beat)
        .expect("beat is on an allocated strip");
    let (hit, added) = editor.click(x, y).expect("click lands on a note");
    assert_eq!(hit.note, note);
    assert_eq!(hit.global_beat, beat);
    added
}

/// Run playback to the end, returning the beats that were ticked
fn play_to_end(editor: &mut Editor, trigger: &mut RecordingTrigger) -> Vec<usize> {
    let mut now = Instant::now();
    assert!(editor.play(now));
    let mut beats = Vec::new();
    for _ in 0..1000 {
        now += editor
            .scheduler()
            .time_until_next_tick(now)
            .unwrap_or(Duration::ZERO);
        for event in editor.tick(now, trigger) {
            match event {
                PlaybackEvent::BeatAdvanced(beat) => beats.push(beat),
                PlaybackEvent::Finished => return beats,
                PlaybackEvent::NotesTriggered { .. } => {}
            }
        }
    }
    panic!("playback never finished");
}

#[test]
fn test_click_save_load_play_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("waltz.mb");

    let mut editor = editor();
    editor.set_bpm(120);
    assert!(click_note(&mut editor, 3, 0));
    assert!(click_note(&mut editor, 7, 0));
    assert!(click_note(&mut editor, 1, 2));
    assert!(click_note(&mut editor, 9, 30));
    assert!(!click_note(&mut editor, 9, 30));

    editor.save(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "120\n0:3 7\n2:1");

    editor.new_composition(60);
    assert!(editor.grid().is_empty());
    assert_eq!(editor.bpm(), 60);

    editor.load(&path).unwrap();
    assert_eq!(editor.bpm(), 120);
    assert_eq!(editor.grid().notes(0), BTreeSet::from([3, 7]));
    assert_eq!(editor.path(), Some(path.as_path()));

    let mut trigger = RecordingTrigger::default();
    let beats = play_to_end(&mut editor, &mut trigger);
    assert_eq!(beats, vec![0, 1, 2]);
    assert_eq!(trigger.played, vec![vec![3, 7], vec![1]]);
    assert!(!editor.is_playing());
    assert!(!editor.grid().has_highlights());

    let pages = editor.export_svg(&path, &Assets::new()).unwrap();
    assert_eq!(pages, vec![dir.path().join("waltz1.svg")]);
    let svg = fs::read_to_string(&pages[0]).unwrap();
    assert_eq!(svg.matches("<circle").count(), 3);
    assert!(svg.trim_end().ends_with("</svg>"));
}

#[test]
fn test_loading_long_song_grows_strips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.mb");
    fs::write(&path, "90\n0:0\n250:14").unwrap();

    let mut editor = editor();
    assert_eq!(editor.pagination().segment_count(), 2);
    editor.load(&path).unwrap();
    assert!(editor.pagination().total_capacity() > 251);
    assert!(editor.pagination().note_position(14, 250).is_some());
}

#[test]
fn test_playback_grows_strips() {
    let mut editor = editor();
    editor.grid_mut().add_note(5, 100);
    let before = editor.pagination().segment_count();
    let mut trigger = RecordingTrigger::default();
    let beats = play_to_end(&mut editor, &mut trigger);
    assert_eq!(beats.len(), 101);
    assert!(editor.pagination().segment_count() > before);
    assert!(editor.pagination().total_capacity() > 100);
}

#[test]
fn test_invalid_paths_are_reported() {
    let mut editor = editor();
    let missing = std::path::Path::new("/no/such/dir/tune.mb");
    assert!(matches!(editor.load(missing), Err(FileError::InvalidPath)));
    assert!(matches!(editor.save(missing), Err(FileError::InvalidPath)));
    assert!(editor.path().is_none());
}

#[test]
fn test_loading_missing_file_keeps_current_work() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor();
    editor.set_bpm(120);
    editor.grid_mut().add_note(3, 5);

    let typo = dir.path().join("typo.mb");
    assert!(matches!(editor.load(&typo), Err(FileError::InvalidPath)));
    assert_eq!(editor.bpm(), 120);
    assert!(editor.grid().contains(3, 5));
    assert!(editor.path().is_none());
    assert!(!typo.exists());
}

#[test]
fn test_save_overwrites_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.mb");
    fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();

    let mut editor = editor();
    editor.set_bpm(75);
    editor.grid_mut().add_note(2, 1);
    editor.save(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "75\n1:2");
    assert_eq!(editor.path(), Some(path.as_path()));
}
