#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use musicbox::{
    config::{default_config_path, load_config, save_config},
    file::Assets,
    midi_note_name,
    midi::note_to_midi,
    pagination::ScrollOutcome,
    strip::paper_bounds,
    AnimationTarget, AudioOutput, Bounds, BoundsAnimator, Editor, EditorConfig, MidiOutputDevice,
    NoteTrigger, PlaybackEvent, SegmentId, StripKind,
};
#[cfg(feature = "gui")]
use std::collections::{BTreeSet, HashMap};
#[cfg(feature = "gui")]
use std::path::PathBuf;
#[cfg(feature = "gui")]
use std::time::{Duration, Instant};

#[cfg(feature = "gui")]
const NAV_WIDTH: f32 = 64.0;

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("musicbox starting up");
    let config_path = default_config_path();
    let config = load_config(&config_path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 860.0])
            .with_title("Music Box"),
        ..Default::default()
    };

    eframe::run_native(
        "Music Box",
        options,
        Box::new(move |_cc| Ok(Box::new(MusicBoxApp::new(config, config_path)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

/// Sends each triggered chord to the synth and the MIDI port
#[cfg(feature = "gui")]
struct Outputs {
    audio: AudioOutput,
    audio_enabled: bool,
    midi: MidiOutputDevice,
}

#[cfg(feature = "gui")]
impl NoteTrigger for Outputs {
    fn play_notes(&mut self, notes: &BTreeSet<u8>) {
        if self.audio_enabled {
            self.audio.play_notes(notes);
        }
        self.midi.play_notes(notes);
    }
}

#[cfg(feature = "gui")]
struct Transition {
    from: Bounds,
    to: Bounds,
    started: Instant,
    duration: Duration,
}

/// Eases strips and the note overlay towards the bounds pagination asks for
#[cfg(feature = "gui")]
#[derive(Default)]
struct StripAnimator {
    current: HashMap<AnimationTarget, Bounds>,
    transitions: HashMap<AnimationTarget, Transition>,
}

#[cfg(feature = "gui")]
impl StripAnimator {
    fn update(&mut self, now: Instant) {
        let mut finished = Vec::new();
        for (target, transition) in &self.transitions {
            let elapsed = now.saturating_duration_since(transition.started);
            let t = if transition.duration.is_zero() {
                1.0
            } else {
                (elapsed.as_secs_f32() / transition.duration.as_secs_f32()).min(1.0)
            };
            self.current
                .insert(*target, lerp_bounds(transition.from, transition.to, ease_out_quad(t)));
            if t >= 1.0 {
                finished.push(*target);
            }
        }
        for target in finished {
            self.transitions.remove(&target);
        }
    }

    /// Where a target is drawn right now; targets never animated sit at `resting`
    fn bounds(&self, target: AnimationTarget, resting: Bounds) -> Bounds {
        self.current.get(&target).copied().unwrap_or(resting)
    }

    /// Record where a target sits before a transition is requested
    fn settle(&mut self, target: AnimationTarget, resting: Bounds) {
        self.current.entry(target).or_insert(resting);
    }

    /// Forget positions, everything snaps to its resting bounds
    fn reset(&mut self) {
        self.current.clear();
        self.transitions.clear();
    }
}

#[cfg(feature = "gui")]
impl BoundsAnimator for StripAnimator {
    fn is_animating(&self) -> bool {
        !self.transitions.is_empty()
    }

    fn animate_bounds(&mut self, target: AnimationTarget, to: Bounds, duration: Duration) {
        let from = self.current.get(&target).copied().unwrap_or(to);
        self.transitions.insert(
            target,
            Transition {
                from,
                to,
                started: Instant::now(),
                duration,
            },
        );
    }
}

#[cfg(feature = "gui")]
fn lerp_bounds(a: Bounds, b: Bounds, t: f32) -> Bounds {
    let lerp = |x: f32, y: f32| x + (y - x) * t;
    Bounds::new(
        lerp(a.x, b.x),
        lerp(a.y, b.y),
        lerp(a.width, b.width),
        lerp(a.height, b.height),
    )
}

#[cfg(feature = "gui")]
fn ease_out_quad(t: f32) -> f32 {
    1.0 - (1.0 - t) * (1.0 - t)
}

#[cfg(feature = "gui")]
fn to_rect(bounds: Bounds, origin: egui::Pos2) -> egui::Rect {
    egui::Rect::from_min_size(
        origin + egui::vec2(bounds.x, bounds.y),
        egui::vec2(bounds.width, bounds.height),
    )
}

#[cfg(feature = "gui")]
struct MusicBoxApp {
    editor: Editor,
    outputs: Outputs,
    animator: StripAnimator,
    assets: Assets,
    config: EditorConfig,
    config_path: PathBuf,

    // UI state
    viewport: egui::Vec2,
    path_text: String,
    status: String,
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
}

#[cfg(feature = "gui")]
impl MusicBoxApp {
    fn new(config: EditorConfig, config_path: PathBuf) -> Self {
        let mut midi = MidiOutputDevice::new();
        let available_midi_ports = MidiOutputDevice::available_ports();
        let mut selected_port = None;
        if let Some(pattern) = &config.playback.midi_port {
            match midi.connect_matching(pattern) {
                Ok(()) => {
                    let needle = pattern.to_lowercase();
                    selected_port = available_midi_ports
                        .iter()
                        .position(|name| name.to_lowercase().contains(&needle));
                }
                Err(err) => log::warn!("{}", err),
            }
        }

        let mut assets = Assets::new();
        if let Some(dir) = &config.paths.asset_dir {
            assets = assets.with_dir(dir);
        }

        let mut app = Self {
            editor: Editor::new(&config, 0.0, 0.0),
            outputs: Outputs {
                audio: AudioOutput::default(),
                audio_enabled: config.playback.audio_enabled,
                midi,
            },
            animator: StripAnimator::default(),
            assets,
            config_path,
            viewport: egui::Vec2::ZERO,
            path_text: String::new(),
            status: String::new(),
            available_midi_ports,
            selected_port,
            config,
        };

        if let Some(path) = app.config.paths.last_composition.clone() {
            app.path_text = path.display().to_string();
            if path.is_file() {
                app.load();
            }
        }
        app
    }

    fn path(&self) -> Option<PathBuf> {
        let text = self.path_text.trim();
        (!text.is_empty()).then(|| PathBuf::from(text))
    }

    fn remember_path(&mut self) {
        self.config.paths.last_composition = self.editor.path().map(|p| p.to_path_buf());
        if let Err(err) = save_config(&self.config, &self.config_path) {
            log::warn!("{:#}", err);
        }
    }

    fn load(&mut self) {
        let Some(path) = self.path() else {
            self.status = "Enter a file path first".to_string();
            return;
        };
        match self.editor.load(&path) {
            Ok(()) => {
                self.animator.reset();
                self.status = format!("Loaded {}", path.display());
                self.remember_path();
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn save(&mut self) {
        let Some(path) = self.path() else {
            self.status = "Enter a file path first".to_string();
            return;
        };
        match self.editor.save(&path) {
            Ok(()) => {
                self.status = format!("Saved {}", path.display());
                self.remember_path();
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn export(&mut self) {
        let Some(path) = self.path() else {
            self.status = "Enter a file path first".to_string();
            return;
        };
        self.status = match self.editor.export_svg(&path, &self.assets) {
            Ok(pages) if pages.is_empty() => "Nothing exported".to_string(),
            Ok(pages) => format!("Exported {} page(s)", pages.len()),
            Err(err) => err.to_string(),
        };
    }

    fn toggle_playback(&mut self) {
        if self.editor.is_playing() {
            self.stop_playback();
        } else if self.editor.play(Instant::now()) {
            self.status = format!("Playing at {} bpm", self.editor.bpm());
        }
    }

    fn stop_playback(&mut self) {
        self.editor.stop();
        self.outputs.audio.stop_all();
        if let Err(err) = self.outputs.midi.release_all() {
            log::warn!("{}", err);
        }
    }

    fn scroll(&mut self, delta_quarters: i32) {
        let pagination = self.editor.pagination();
        // one past the end covers a strip appended by this scroll
        for index in 0..=pagination.segment_count() {
            self.animator.settle(
                AnimationTarget::Segment(SegmentId(index)),
                pagination.segment_bounds(index),
            );
        }
        self.animator
            .settle(AnimationTarget::Overlay, pagination.overlay_bounds());

        if let ScrollOutcome::Scrolled { grew: true } =
            self.editor.scroll(delta_quarters, &mut self.animator)
        {
            log::debug!(
                "Strip column grew to {}",
                self.editor.pagination().segment_count()
            );
        }
    }

    fn handle_playback_events(&mut self) {
        for event in self.editor.tick(Instant::now(), &mut self.outputs) {
            match event {
                PlaybackEvent::BeatAdvanced(_) | PlaybackEvent::NotesTriggered { .. } => {}
                PlaybackEvent::Finished => {
                    self.status = "Playback finished".to_string();
                    if let Err(err) = self.outputs.midi.release_all() {
                        log::warn!("{}", err);
                    }
                }
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let label = if self.editor.is_playing() { "⏸ Stop" } else { "▶ Play" };
            if ui.button(label).clicked() {
                self.toggle_playback();
            }

            ui.add_space(12.0);
            ui.label("BPM:");
            let mut bpm = self.editor.bpm();
            if ui.add(egui::Slider::new(&mut bpm, 20..=400)).changed() {
                self.editor.set_bpm(bpm);
            }
        });

        ui.horizontal(|ui| {
            ui.label("File:");
            ui.add(egui::TextEdit::singleline(&mut self.path_text).desired_width(220.0));
            if ui.button("New").clicked() {
                self.editor.new_composition(self.config.playback.default_bpm);
                self.path_text.clear();
                self.status = "New composition".to_string();
            }
            if ui.button("Load").clicked() {
                self.load();
            }
            if ui.button("Save").clicked() {
                self.save();
            }
            if ui.button("Export").clicked() {
                self.export();
            }
        });

        let mut selected_port_changed = None;
        ui.horizontal(|ui| {
            ui.label("MIDI Output:");
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            } else {
                egui::ComboBox::from_id_source("midi_port")
                    .selected_text(
                        self.selected_port
                            .and_then(|i| self.available_midi_ports.get(i))
                            .map(String::as_str)
                            .unwrap_or("Select port..."),
                    )
                    .show_ui(ui, |ui| {
                        for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                            if ui
                                .selectable_label(self.selected_port == Some(i), port_name)
                                .clicked()
                            {
                                selected_port_changed = Some(i);
                            }
                        }
                    });
            }
            ui.checkbox(&mut self.outputs.audio_enabled, "Synth");
        });

        if let Some(port_idx) = selected_port_changed {
            match self.outputs.midi.connect(port_idx) {
                Ok(()) => self.selected_port = Some(port_idx),
                Err(err) => self.status = err.to_string(),
            }
        }

        if !self.status.is_empty() {
            ui.label(self.status.as_str());
        }
    }

    fn navigation(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(8.0);
            if ui.button("▲").on_hover_text("Scroll up").clicked() {
                self.scroll(-1);
            }
            ui.add_space((ui.available_height() - 40.0).max(0.0));
            if ui.button("▼").on_hover_text("Scroll down").clicked() {
                self.scroll(1);
            }
        });
    }

    fn strips(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click());
        let rect = response.rect;
        let origin = rect.min;

        if rect.size() != self.viewport {
            self.viewport = rect.size();
            self.editor
                .pagination_mut()
                .set_viewport(rect.width(), rect.height());
            self.animator.reset();
        }

        if response.clicked() && !self.animator.is_animating() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = pos - origin;
                if let Some((hit, added)) = self.editor.click(local.x, local.y) {
                    if added {
                        self.outputs.play_notes(&BTreeSet::from([hit.note]));
                    }
                }
            }
        }

        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(235));
        let pagination = self.editor.pagination();

        for (id, segment) in pagination.segments() {
            let resting = pagination.segment_bounds(id.0);
            let outer = self.animator.bounds(AnimationTarget::Segment(id), resting);
            if !to_rect(outer, origin).intersects(rect) {
                continue;
            }
            let mapper = segment.mapper(outer);
            let staff = mapper.bounds();
            painter.rect_filled(
                to_rect(paper_bounds(staff), origin),
                0.0,
                egui::Color32::from_rgb(250, 246, 232),
            );

            let line = egui::Stroke::new(1.0, egui::Color32::from_gray(170));
            let top = mapper.beat_top();
            for note in 0..=14u8 {
                if let Some(x) = mapper.note_x(note) {
                    painter.line_segment(
                        [origin + egui::vec2(x, top), origin + egui::vec2(x, staff.bottom())],
                        line,
                    );
                }
            }
            for beat in 0..=segment.beat_capacity() {
                if let Some(y) = mapper.beat_y(beat) {
                    let stroke = if beat % 4 == 0 {
                        egui::Stroke::new(1.0, egui::Color32::from_gray(120))
                    } else {
                        line
                    };
                    painter.line_segment(
                        [origin + egui::vec2(staff.x, y), origin + egui::vec2(staff.right(), y)],
                        stroke,
                    );
                }
            }

            if segment.kind == StripKind::Start {
                let header = origin + egui::vec2(staff.x + staff.width / 2.0, (staff.y + top) / 2.0);
                painter.text(
                    header,
                    egui::Align2::CENTER_CENTER,
                    "Music Box",
                    egui::FontId::proportional(20.0),
                    egui::Color32::from_gray(60),
                );
                for note in (0..=14u8).step_by(7) {
                    if let (Some(x), Some(midi)) = (mapper.note_x(note), note_to_midi(note)) {
                        painter.text(
                            origin + egui::vec2(x, top - 6.0),
                            egui::Align2::CENTER_BOTTOM,
                            midi_note_name(midi),
                            egui::FontId::proportional(11.0),
                            egui::Color32::from_gray(90),
                        );
                    }
                }
            }
        }

        self.paint_notes(&painter, origin);
    }

    /// Notes are drawn on one overlay spanning every strip, scaled like the
    /// start strip so global beats are evenly spaced down the column
    fn paint_notes(&self, painter: &egui::Painter, origin: egui::Pos2) {
        let pagination = self.editor.pagination();
        let Some(first) = pagination.segment(SegmentId(0)) else {
            return;
        };
        let mapper = first.mapper(pagination.segment_bounds(0));
        let note_width = mapper.note_width();
        let beat_height = mapper.beat_height();
        let overlay = self
            .animator
            .bounds(AnimationTarget::Overlay, pagination.overlay_bounds());

        let grid = self.editor.grid();
        let drawn = egui::vec2(note_width / 2.0, beat_height / 3.0);
        let rounding = drawn.x.min(drawn.y) / 5.0;
        let beat_span = self.editor.pagination().total_capacity();

        for beat in 0..beat_span {
            let intensity = grid.highlight(beat);
            if intensity <= 0.0 {
                continue;
            }
            let y = overlay.y + beat as f32 * beat_height;
            let band = egui::Rect::from_min_size(
                origin + egui::vec2(overlay.x, y - beat_height / 2.0),
                egui::vec2(note_width * 14.0, beat_height),
            );
            let alpha = (intensity * 120.0) as u8;
            painter.rect_filled(band, 0.0, egui::Color32::from_rgba_unmultiplied(90, 160, 90, alpha));
        }

        for (beat, notes) in grid.iter() {
            let y = overlay.y + beat as f32 * beat_height;
            for &note in notes {
                let x = overlay.x + f32::from(note) * note_width;
                let center = origin + egui::vec2(x, y);
                painter.rect_filled(
                    egui::Rect::from_center_size(center, drawn),
                    rounding,
                    egui::Color32::BLACK,
                );
            }
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for MusicBoxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_playback_events();
        self.animator.update(now);
        self.editor
            .grid_mut()
            .decay_highlights(self.config.editor.highlight_decay);

        if ctx.input(|i| i.key_pressed(egui::Key::ArrowDown)) {
            self.scroll(1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowUp)) {
            self.scroll(-1);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.toolbar(ui);
            ui.add_space(4.0);
        });

        egui::SidePanel::right("navigation")
            .exact_width(NAV_WIDTH)
            .resizable(false)
            .show(ctx, |ui| self.navigation(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.strips(ui));

        let grid_dirty = self.editor.grid_mut().take_dirty();
        if self.animator.is_animating() || self.editor.grid().has_highlights() || grid_dirty {
            ctx.request_repaint();
        } else if let Some(wait) = self.editor.scheduler().time_until_next_tick(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}
