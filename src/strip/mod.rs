/// Strip geometry - maps pixels on one paper strip to note columns and beat rows
///
/// A strip is drawn 14 note-widths wide and 32 beat-heights tall. The start
/// strip spends its first 8 rows on a header, so it only holds 24 beats.
use crate::sequencer::MAX_NOTE;

/// Note-width units across a strip
pub const NOTE_COLUMNS: f32 = 14.0;

/// Beat-height units down a strip
pub const BEAT_ROWS: f32 = 32.0;

/// Rows the start strip reserves above its first beat
pub const START_HEADER_ROWS: f32 = 8.0;

pub const START_BEAT_CAPACITY: usize = 24;
pub const MIDDLE_BEAT_CAPACITY: usize = 32;

// Strip artwork proportions
const STAFF_WIDTH: f32 = 107.0;
const STAFF_HEIGHT: f32 = 243.0;
const PAPER_WIDTH: f32 = 165.0;

/// Share of a cell ignored as float rounding when checking the hit distance
const ROUNDING_SLACK: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn with_y(self, y: f32) -> Self {
        Self { y, ..self }
    }

    /// Same centre, new size
    pub fn with_size_keeping_centre(self, width: f32, height: f32) -> Self {
        Self {
            x: self.x + (self.width - width) / 2.0,
            y: self.y + (self.height - height) / 2.0,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripKind {
    Start,
    Middle,
}

impl StripKind {
    pub fn beat_capacity(self) -> usize {
        match self {
            StripKind::Start => START_BEAT_CAPACITY,
            StripKind::Middle => MIDDLE_BEAT_CAPACITY,
        }
    }

    fn header_rows(self) -> f32 {
        match self {
            StripKind::Start => START_HEADER_ROWS,
            StripKind::Middle => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripSegment {
    pub kind: StripKind,
    pub ordinal: usize,
}

impl StripSegment {
    pub fn new(kind: StripKind, ordinal: usize) -> Self {
        Self { kind, ordinal }
    }

    pub fn beat_capacity(&self) -> usize {
        self.kind.beat_capacity()
    }

    /// Geometry for this segment when laid out in `outer`
    pub fn mapper(&self, outer: Bounds) -> StripCoordinateMapper {
        StripCoordinateMapper::new(self.kind, fit_image_bounds(outer))
    }
}

/// Largest staff area with the artwork's aspect ratio, centred in `outer`
pub fn fit_image_bounds(outer: Bounds) -> Bounds {
    let height = outer.height;
    let width = height * STAFF_WIDTH / STAFF_HEIGHT;
    outer.with_size_keeping_centre(width, height)
}

/// Paper artwork area (staff plus margins) around a staff area
pub fn paper_bounds(image: Bounds) -> Bounds {
    let width = PAPER_WIDTH * image.height / STAFF_HEIGHT;
    image.with_size_keeping_centre(width, image.height)
}

/// Pixel <-> grid transform for one strip's staff area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripCoordinateMapper {
    kind: StripKind,
    bounds: Bounds,
}

impl StripCoordinateMapper {
    pub fn new(kind: StripKind, bounds: Bounds) -> Self {
        Self { kind, bounds }
    }

    pub fn kind(&self) -> StripKind {
        self.kind
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn beat_capacity(&self) -> usize {
        self.kind.beat_capacity()
    }

    pub fn note_width(&self) -> f32 {
        self.bounds.width / NOTE_COLUMNS
    }

    pub fn beat_height(&self) -> f32 {
        self.bounds.height / BEAT_ROWS
    }

    /// y-coordinate of the first playable beat line
    pub fn beat_top(&self) -> f32 {
        self.bounds.y + self.kind.header_rows() * self.beat_height()
    }

    /// Hit tolerance scaled to the strip: its width over `divisor`
    pub fn tolerance(&self, divisor: f32) -> f32 {
        if divisor <= 0.0 {
            return 0.0;
        }
        self.bounds.width / divisor
    }

    pub fn note_x(&self, note: u8) -> Option<f32> {
        if note > MAX_NOTE {
            log::trace!("Invalid note {}", note);
            return None;
        }
        Some(self.bounds.x + self.note_width() * f32::from(note))
    }

    pub fn beat_y(&self, beat: usize) -> Option<f32> {
        if beat > self.beat_capacity() {
            log::trace!("Invalid beat {}", beat);
            return None;
        }
        Some(self.beat_top() + self.beat_height() * beat as f32)
    }

    pub fn closest_note(&self, x: f32, max_error: f32) -> Option<u8> {
        let offset = x - self.bounds.x;
        let margin = max_error + self.note_width() * ROUNDING_SLACK;
        if offset < -margin || offset > self.bounds.width + margin {
            return None;
        }
        let index = snap(offset, self.note_width(), max_error)?;
        u8::try_from(index).ok().filter(|&note| note <= MAX_NOTE)
    }

    pub fn closest_beat(&self, y: f32, max_error: f32) -> Option<usize> {
        let top = self.beat_top();
        let usable_height = self.bounds.height - (top - self.bounds.y);
        let offset = y - top;
        let margin = max_error + self.beat_height() * ROUNDING_SLACK;
        if offset < -margin || offset > usable_height + margin {
            return None;
        }
        snap(offset, self.beat_height(), max_error).filter(|&beat| beat <= self.beat_capacity())
    }

    /// Both lookups at once; `None` unless the point is near a grid crossing
    pub fn hit(&self, x: f32, y: f32, max_error: f32) -> Option<(u8, usize)> {
        let note = self.closest_note(x, max_error)?;
        let beat = self.closest_beat(y, max_error)?;
        Some((note, beat))
    }
}

/// Round `offset` to the nearest multiple of `cell`, ties going up.
/// Rejects the result when the remaining distance exceeds `max_error`.
fn snap(offset: f32, cell: f32, max_error: f32) -> Option<usize> {
    if !(cell > 0.0) {
        return None;
    }
    let mut index = (offset / cell).floor();
    let mut error = offset - cell * index;
    if error >= cell / 2.0 {
        index += 1.0;
        error = cell - error;
    }
    if error > max_error + cell * ROUNDING_SLACK || index < 0.0 {
        return None;
    }
    Some(index as usize)
}
