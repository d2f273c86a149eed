/// MIDI output using midir
use midir::{MidiOutput, MidiOutputConnection};
use std::collections::BTreeSet;

use crate::sequencer::playback::NoteTrigger;

const CLIENT_NAME: &str = "Music Box MIDI Output";
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const VELOCITY: u8 = 100;

/// MIDI note for each music box note index: Ab Bb C Db Eb F G, twice, then Ab
pub const MUSIC_BOX_PITCHES: [u8; 15] = [68, 70, 72, 73, 75, 77, 79, 80, 82, 84, 85, 87, 89, 91, 92];

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to create MIDI output: {0}")]
    Init(String),

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Invalid port index: {0}")]
    InvalidPort(usize),

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Failed to send message: {0}")]
    Send(String),
}

pub fn note_to_midi(note: u8) -> Option<u8> {
    MUSIC_BOX_PITCHES.get(usize::from(note)).copied()
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    sounding: Vec<u8>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            sounding: Vec::new(),
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(MidiError::InvalidPort(port_index))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "musicbox")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("Connected MIDI output to {}", name);
        self.connection = Some(connection);
        Ok(())
    }

    /// Connect to the first port whose name contains `pattern` (case-insensitive)
    pub fn connect_matching(&mut self, pattern: &str) -> Result<(), MidiError> {
        let needle = pattern.to_lowercase();
        let index = Self::available_ports()
            .iter()
            .position(|name| name.to_lowercase().contains(&needle))
            .ok_or_else(|| MidiError::PortNotFound(pattern.to_string()))?;
        self.connect(index)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<(), MidiError> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[NOTE_ON, note, velocity])
                .map_err(|e| MidiError::Send(e.to_string()))?;
        }
        Ok(())
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<(), MidiError> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[NOTE_OFF, note, 0])
                .map_err(|e| MidiError::Send(e.to_string()))?;
        }
        Ok(())
    }

    /// Release everything started by the last trigger
    pub fn release_all(&mut self) -> Result<(), MidiError> {
        for note in std::mem::take(&mut self.sounding) {
            self.send_note_off(note)?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Err(err) = self.release_all() {
            log::warn!("{}", err);
        }
        self.connection = None;
    }
}

impl NoteTrigger for MidiOutputDevice {
    fn play_notes(&mut self, notes: &BTreeSet<u8>) {
        if !self.is_connected() {
            return;
        }
        if let Err(err) = self.release_all() {
            log::warn!("{}", err);
        }
        for midi in notes.iter().filter_map(|&note| note_to_midi(note)) {
            match self.send_note_on(midi, VELOCITY) {
                Ok(()) => self.sounding.push(midi),
                Err(err) => log::warn!("{}", err),
            }
        }
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}
