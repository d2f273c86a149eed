/// Audio output using cpal - a small bank of decaying music box voices
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::midi::note_to_midi;
use crate::sequencer::playback::NoteTrigger;

/// Peak level of a freshly struck voice
const STRIKE_LEVEL: f32 = 0.15;

/// Voices quieter than this are dropped
const SILENCE: f32 = 0.0005;

/// Seconds for a voice to fall to 1/e of its level
const DECAY_SECONDS: f32 = 0.6;

/// Oldest voices are cut once this many are sounding
const MAX_VOICES: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Voice {
    frequency: f32,
    phase: f32,
    level: f32,
}

pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    voices: Arc<Mutex<Vec<Voice>>>,
}

impl AudioOutput {
    pub fn new() -> Option<Self> {
        let voices = Arc::new(Mutex::new(Vec::new()));
        let stream = Self::setup_audio_stream(Arc::clone(&voices))?;

        Some(Self {
            stream: Some(stream),
            voices,
        })
    }

    /// Output that tracks voices but has no device
    pub fn silent() -> Self {
        Self {
            stream: None,
            voices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn has_device(&self) -> bool {
        self.stream.is_some()
    }

    fn setup_audio_stream(voices: Arc<Mutex<Vec<Voice>>>) -> Option<cpal::Stream> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = usize::from(config.channels()).max(1);
        let decay = (-1.0 / (DECAY_SECONDS * sample_rate)).exp();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut voices) = voices.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let value = next_sample(&mut voices, sample_rate, decay);
                        frame.fill(value);
                    }
                    voices.retain(|voice| voice.level > SILENCE);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            ),
            other => {
                log::warn!("Unsupported sample format {:?}, audio disabled", other);
                return None;
            }
        };

        match stream {
            Ok(stream) => {
                if let Err(err) = stream.play() {
                    log::warn!("Failed to start audio stream: {}", err);
                }
                Some(stream)
            }
            Err(err) => {
                log::warn!("Failed to open audio stream: {}", err);
                None
            }
        }
    }

    /// Strike one music box note
    pub fn trigger_note(&mut self, note: u8) {
        let Some(midi) = note_to_midi(note) else {
            return;
        };
        let Ok(mut voices) = self.voices.lock() else {
            return;
        };
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(Voice {
            frequency: midi_note_to_frequency(midi),
            phase: 0.0,
            level: STRIKE_LEVEL,
        });
    }

    pub fn stop_all(&mut self) {
        if let Ok(mut voices) = self.voices.lock() {
            voices.clear();
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.lock().map(|voices| voices.len()).unwrap_or(0)
    }
}

impl NoteTrigger for AudioOutput {
    fn play_notes(&mut self, notes: &BTreeSet<u8>) {
        for &note in notes {
            self.trigger_note(note);
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(Self::silent)
    }
}

/// Mix one sample from every voice, advancing their phase and decay
fn next_sample(voices: &mut [Voice], sample_rate: f32, decay: f32) -> f32 {
    let mut value = 0.0;
    for voice in voices.iter_mut() {
        value += (voice.phase * 2.0 * std::f32::consts::PI).sin() * voice.level;
        voice.phase += voice.frequency / sample_rate;
        if voice.phase >= 1.0 {
            voice.phase -= 1.0;
        }
        voice.level *= decay;
    }
    value.clamp(-1.0, 1.0)
}

pub fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
