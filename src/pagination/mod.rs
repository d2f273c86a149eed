/// Pagination - the scrolling column of paper strips
///
/// Strips are stacked vertically, each one viewport tall. The first strip is
/// a start strip and every later one is a middle strip. Strips are only ever
/// appended, so a strip's index never changes and can be handed out as a
/// stable `SegmentId`.
use std::ops::Range;
use std::time::Duration;

use crate::sequencer::NoteGrid;
use crate::strip::{Bounds, StripCoordinateMapper, StripKind, StripSegment};

/// Scroll position is kept in quarter strips
const QUARTERS_PER_SEGMENT: f32 = 4.0;

/// Scrolling this close to the last strip appends another one
const GROW_MARGIN_SEGMENTS: f32 = 2.0;

pub const DEFAULT_TOLERANCE_DIVISOR: f32 = 40.0;
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub usize);

/// Something whose on-screen bounds move when the page scrolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationTarget {
    Segment(SegmentId),
    /// The note overlay drawn across all strips
    Overlay,
}

/// Moves components to new bounds over time. Interpolation is up to the
/// implementor; pagination only asks for targets.
pub trait BoundsAnimator {
    fn is_animating(&self) -> bool;
    fn animate_bounds(&mut self, target: AnimationTarget, to: Bounds, duration: Duration);
}

/// Notified after a click lands on a note position of a strip
pub trait NoteClickListener {
    fn note_clicked(&mut self, segment: SegmentId, note: u8, beat: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteHit {
    pub segment: SegmentId,
    pub note: u8,
    pub local_beat: usize,
    pub global_beat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// A transition was still running, the request was dropped
    Busy,
    /// Already at the top
    Unchanged,
    Scrolled { grew: bool },
}

pub struct Pagination {
    segments: Vec<StripSegment>,
    scroll_quarters: usize,
    viewport_width: f32,
    viewport_height: f32,
    tolerance_divisor: f32,
    animation: Duration,
    listeners: Vec<(ListenerId, Box<dyn NoteClickListener>)>,
    next_listener: usize,
}

impl Pagination {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            segments: vec![
                StripSegment::new(StripKind::Start, 0),
                StripSegment::new(StripKind::Middle, 1),
            ],
            scroll_quarters: 0,
            viewport_width,
            viewport_height,
            tolerance_divisor: DEFAULT_TOLERANCE_DIVISOR,
            animation: DEFAULT_ANIMATION,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn with_tolerance_divisor(mut self, divisor: f32) -> Self {
        self.tolerance_divisor = divisor;
        self
    }

    pub fn with_animation(mut self, duration: Duration) -> Self {
        self.animation = duration;
        self
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&StripSegment> {
        self.segments.get(id.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &StripSegment)> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, segment)| (SegmentId(i), segment))
    }

    pub fn total_capacity(&self) -> usize {
        self.segments.iter().map(StripSegment::beat_capacity).sum()
    }

    /// Convert a beat inside a strip to the composition-wide beat index
    pub fn global_beat(&self, segment: SegmentId, local_beat: usize) -> Option<usize> {
        if segment.0 >= self.segments.len() {
            return None;
        }
        let before: usize = self.segments[..segment.0]
            .iter()
            .map(StripSegment::beat_capacity)
            .sum();
        Some(before + local_beat)
    }

    /// Find the strip holding a composition-wide beat
    pub fn locate(&self, global_beat: usize) -> Option<(SegmentId, usize)> {
        let mut first = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            let capacity = segment.beat_capacity();
            if global_beat < first + capacity {
                return Some((SegmentId(i), global_beat - first));
            }
            first += capacity;
        }
        None
    }

    /// Append middle strips until `target` fits. Returns how many were added.
    pub fn ensure_capacity(&mut self, target: usize) -> usize {
        let mut added = 0;
        while self.total_capacity() <= target {
            self.append_middle();
            added += 1;
        }
        if added > 0 {
            log::debug!(
                "Added {} strip(s) to hold beat {}, now {}",
                added,
                target,
                self.segments.len()
            );
        }
        added
    }

    /// Make room for everything in `grid`
    pub fn fit_grid(&mut self, grid: &NoteGrid) -> usize {
        self.ensure_capacity(grid.beat_count())
    }

    pub fn scroll_position(&self) -> f32 {
        self.scroll_quarters as f32 / QUARTERS_PER_SEGMENT
    }

    /// Move by `delta_quarters` quarter strips, growing the column near its end
    pub fn scroll(
        &mut self,
        delta_quarters: i32,
        animator: &mut dyn BoundsAnimator,
    ) -> ScrollOutcome {
        if animator.is_animating() {
            log::debug!("Still animating, ignoring scroll request");
            return ScrollOutcome::Busy;
        }
        let target = (self.scroll_quarters as i64 + i64::from(delta_quarters)).max(0) as usize;
        if target == self.scroll_quarters {
            return ScrollOutcome::Unchanged;
        }
        self.scroll_quarters = target;

        let grew =
            self.scroll_position() >= self.segments.len() as f32 - GROW_MARGIN_SEGMENTS;
        if grew {
            self.append_middle();
        }

        for i in 0..self.segments.len() {
            animator.animate_bounds(
                AnimationTarget::Segment(SegmentId(i)),
                self.segment_bounds(i),
                self.animation,
            );
        }
        animator.animate_bounds(AnimationTarget::Overlay, self.overlay_bounds(), self.animation);
        ScrollOutcome::Scrolled { grew }
    }

    /// Where a strip sits for the current scroll position
    pub fn segment_bounds(&self, index: usize) -> Bounds {
        let y = (index as f32 - self.scroll_position()) * self.viewport_height;
        Bounds::new(0.0, y, self.viewport_width, self.viewport_height)
    }

    pub fn mapper(&self, id: SegmentId) -> Option<StripCoordinateMapper> {
        self.segments
            .get(id.0)
            .map(|segment| segment.mapper(self.segment_bounds(id.0)))
    }

    /// Area covered by the note overlay: from the first note column and first
    /// beat line of the start strip down to the bottom of the last strip
    pub fn overlay_bounds(&self) -> Bounds {
        let Some(first) = self.mapper(SegmentId(0)) else {
            return Bounds::default();
        };
        let x = first.note_x(0).unwrap_or(first.bounds().x);
        let y = first.beat_top();
        let bottom = self.segment_bounds(self.segments.len().saturating_sub(1)).bottom();
        Bounds::new(x, y, self.viewport_width - x, bottom - y)
    }

    /// Strips that overlap the viewport
    pub fn visible_segments(&self) -> Range<usize> {
        if self.viewport_height <= 0.0 {
            return 0..0;
        }
        let first = self.scroll_position().floor() as usize;
        let last = (self.scroll_position() + 1.0).ceil() as usize;
        first.min(self.segments.len())..last.min(self.segments.len())
    }

    /// Pixel position of a composition-wide note, if its strip exists
    pub fn note_position(&self, note: u8, global_beat: usize) -> Option<(f32, f32)> {
        let (segment, local) = self.locate(global_beat)?;
        let mapper = self.mapper(segment)?;
        Some((mapper.note_x(note)?, mapper.beat_y(local)?))
    }

    pub fn add_listener(&mut self, listener: Box<dyn NoteClickListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn NoteClickListener>> {
        let index = self.listeners.iter().position(|(other, _)| *other == id)?;
        Some(self.listeners.remove(index).1)
    }

    /// Resolve a click in viewport coordinates to a note, telling listeners
    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<NoteHit> {
        if self.viewport_height <= 0.0 || y < 0.0 {
            return None;
        }
        let index = (y / self.viewport_height + self.scroll_position()).floor() as usize;
        let segment = SegmentId(index);
        let mapper = self.mapper(segment)?;
        let max_error = mapper.tolerance(self.tolerance_divisor);
        let (note, local_beat) = mapper.hit(x, y, max_error)?;
        let global_beat = self.global_beat(segment, local_beat)?;

        log::debug!(
            "Clicked note {}, beat {} in strip {}, notifying {} listener(s)",
            note,
            local_beat,
            index,
            self.listeners.len()
        );
        for (_, listener) in &mut self.listeners {
            listener.note_clicked(segment, note, local_beat);
        }
        Some(NoteHit {
            segment,
            note,
            local_beat,
            global_beat,
        })
    }

    fn append_middle(&mut self) {
        let ordinal = self.segments.len();
        self.segments
            .push(StripSegment::new(StripKind::Middle, ordinal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingAnimator {
        busy: bool,
        requests: Vec<(AnimationTarget, Bounds)>,
    }

    impl BoundsAnimator for RecordingAnimator {
        fn is_animating(&self) -> bool {
            self.busy
        }

        fn animate_bounds(&mut self, target: AnimationTarget, to: Bounds, _duration: Duration) {
            self.requests.push((target, to));
        }
    }

    struct SharedClicks(Rc<RefCell<Vec<(SegmentId, u8, usize)>>>);

    impl NoteClickListener for SharedClicks {
        fn note_clicked(&mut self, segment: SegmentId, note: u8, beat: usize) {
            self.0.borrow_mut().push((segment, note, beat));
        }
    }

    // 486 tall strips give a 214 wide staff, so cells are 15.29 x 15.19
    fn page() -> Pagination {
        Pagination::new(400.0, 486.0)
    }

    #[test]
    fn test_starts_with_two_strips() {
        let page = page();
        assert_eq!(page.segment_count(), 2);
        assert_eq!(page.segment(SegmentId(0)).unwrap().kind, StripKind::Start);
        assert_eq!(page.segment(SegmentId(1)).unwrap().kind, StripKind::Middle);
        assert_eq!(page.total_capacity(), 56);
    }

    #[test]
    fn test_global_beat() {
        let mut page = page();
        page.ensure_capacity(200);
        assert_eq!(page.global_beat(SegmentId(0), 5), Some(5));
        assert_eq!(page.global_beat(SegmentId(1), 0), Some(24));
        assert_eq!(page.global_beat(SegmentId(2), 3), Some(59));
        assert_eq!(page.global_beat(SegmentId(99), 0), None);
    }

    #[test]
    fn test_segments_partition_beats() {
        let mut page = page();
        page.ensure_capacity(300);
        let mut expected = 0;
        let mut previous = None;
        for (id, segment) in page.segments() {
            let first = page.global_beat(id, 0).unwrap();
            if let Some(prev) = previous {
                assert!(first > prev);
            }
            previous = Some(first);
            for local in 0..segment.beat_capacity() {
                assert_eq!(page.global_beat(id, local), Some(expected));
                assert_eq!(page.locate(expected), Some((id, local)));
                expected += 1;
            }
        }
        assert_eq!(expected, page.total_capacity());
        assert_eq!(page.locate(expected), None);
    }

    #[test]
    fn test_ensure_capacity() {
        let mut page = page();
        assert_eq!(page.ensure_capacity(55), 0);
        assert_eq!(page.ensure_capacity(56), 1);
        assert_eq!(page.total_capacity(), 88);
        assert_eq!(page.ensure_capacity(200), 4);
        assert!(page.total_capacity() > 200);
        assert!(page
            .segments()
            .skip(1)
            .all(|(id, s)| s.kind == StripKind::Middle && s.ordinal == id.0));
    }

    #[test]
    fn test_fit_grid() {
        let mut page = page();
        let mut grid = NoteGrid::new();
        grid.add_note(1, 100);
        page.fit_grid(&grid);
        assert!(page.total_capacity() > 101);
    }

    #[test]
    fn test_segment_bounds_follow_scroll() {
        let mut page = page();
        let mut animator = RecordingAnimator::default();
        assert_eq!(page.segment_bounds(1), Bounds::new(0.0, 486.0, 400.0, 486.0));
        page.scroll(2, &mut animator);
        assert_eq!(page.scroll_position(), 0.5);
        assert_eq!(page.segment_bounds(0).y, -243.0);
        assert_eq!(page.segment_bounds(1).y, 243.0);
    }

    #[test]
    fn test_scroll_clamps_at_top() {
        let mut page = page();
        let mut animator = RecordingAnimator::default();
        assert_eq!(page.scroll(-1, &mut animator), ScrollOutcome::Unchanged);
        assert!(animator.requests.is_empty());
        page.scroll(1, &mut animator);
        page.scroll(-5, &mut animator);
        assert_eq!(page.scroll_position(), 0.0);
    }

    #[test]
    fn test_scroll_grows_and_animates_everything() {
        let mut page = page();
        let mut animator = RecordingAnimator::default();
        let outcome = page.scroll(1, &mut animator);
        assert_eq!(outcome, ScrollOutcome::Scrolled { grew: true });
        assert_eq!(page.segment_count(), 3);
        assert_eq!(animator.requests.len(), 4);
        assert_eq!(
            animator.requests[2],
            (AnimationTarget::Segment(SegmentId(2)), page.segment_bounds(2))
        );
        assert_eq!(
            animator.requests[3],
            (AnimationTarget::Overlay, page.overlay_bounds())
        );

        // 0.5 is still more than two strips from the end of three
        animator.requests.clear();
        assert_eq!(page.scroll(1, &mut animator), ScrollOutcome::Scrolled { grew: false });
        assert_eq!(page.segment_count(), 3);
    }

    #[test]
    fn test_scroll_dropped_while_animating() {
        let mut page = page();
        let mut animator = RecordingAnimator {
            busy: true,
            ..Default::default()
        };
        assert_eq!(page.scroll(1, &mut animator), ScrollOutcome::Busy);
        assert_eq!(page.scroll_position(), 0.0);
        assert_eq!(page.segment_count(), 2);
        assert!(animator.requests.is_empty());
    }

    #[test]
    fn test_overlay_bounds() {
        let page = page();
        let first = page.mapper(SegmentId(0)).unwrap();
        let overlay = page.overlay_bounds();
        assert_eq!(overlay.x, first.note_x(0).unwrap());
        assert_eq!(overlay.y, first.beat_top());
        assert_eq!(overlay.bottom(), 972.0);
        assert_eq!(overlay.right(), 400.0);
    }

    #[test]
    fn test_visible_segments() {
        let mut page = page();
        let mut animator = RecordingAnimator::default();
        assert_eq!(page.visible_segments(), 0..1);
        page.scroll(1, &mut animator);
        assert_eq!(page.visible_segments(), 0..2);
    }

    #[test]
    fn test_pointer_down_hits_and_notifies() {
        let mut page = page();
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let id = page.add_listener(Box::new(SharedClicks(Rc::clone(&clicks))));

        let (x, y) = page.note_position(3, 30).unwrap();
        let hit = page.pointer_down(x + 1.0, y - 1.0).unwrap();
        assert_eq!(
            hit,
            NoteHit {
                segment: SegmentId(1),
                note: 3,
                local_beat: 6,
                global_beat: 30,
            }
        );
        assert_eq!(clicks.borrow().as_slice(), &[(SegmentId(1), 3, 6)]);

        // Halfway between two columns is outside the tolerance
        let mapper = page.mapper(SegmentId(0)).unwrap();
        let between = x + mapper.note_width() / 2.0;
        assert_eq!(page.pointer_down(between, y), None);

        assert!(page.remove_listener(id).is_some());
        page.pointer_down(x, y);
        assert_eq!(clicks.borrow().len(), 1);
        assert!(page.remove_listener(id).is_none());
    }

    #[test]
    fn test_pointer_in_start_header_misses() {
        let mut page = page();
        let mapper = page.mapper(SegmentId(0)).unwrap();
        let x = mapper.note_x(4).unwrap();
        assert_eq!(page.pointer_down(x, mapper.beat_height() * 2.0), None);
    }
}
