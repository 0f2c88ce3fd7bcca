//! Hit-testing: offset ⇄ coordinate translation over an opaque layout.
//!
//! The layout collaborator is a rebuildable snapshot owned by the host's
//! rendering side; the hit tester consumes it read-only and keeps no state
//! of its own beyond the viewport geometry and the last touch offset used
//! to seed initial-focus cursor placement.

/// Line-oriented text layout snapshot, as produced by the host's renderer.
///
/// Never mutated by the editing core. Vertical coordinates grow downward;
/// horizontal positions are in the same unit the host paints in.
pub trait TextLayout {
    /// Number of laid-out lines; at least 1 for an empty buffer.
    fn line_count(&self) -> usize;

    /// Line containing the given buffer offset.
    fn line_for_offset(&self, offset: usize) -> usize;

    /// Top coordinate of a line.
    fn line_top(&self, line: usize) -> f32;

    /// Bottom coordinate of a line.
    fn line_bottom(&self, line: usize) -> f32;

    /// Buffer offset closest to horizontal position `x` on `line`.
    fn offset_for_horizontal(&self, line: usize, x: f32) -> usize;

    /// Horizontal position of the leading edge of the glyph at `offset`.
    fn primary_horizontal(&self, offset: usize) -> f32;
}

/// Viewport geometry for coordinate translation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    /// Visible text area width.
    pub width: f32,
    /// Visible text area height.
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

/// Translates touch coordinates into buffer offsets and back.
pub struct HitTester {
    viewport: Viewport,
    last_touch_offset: Option<usize>,
}

impl HitTester {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            last_touch_offset: None,
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Offset of the most recent hit test, used to seed cursor placement
    /// when the field gains focus from a touch.
    pub fn last_touch_offset(&self) -> Option<usize> {
        self.last_touch_offset
    }

    /// Buffer offset under the view-relative coordinate `(x, y)`.
    ///
    /// Coordinates are clamped into the visible text area (one unit short
    /// of the trailing edges, so a touch exactly on the border still maps
    /// inside the content) before scroll is re-added; a pure function of
    /// the layout snapshot apart from recording the last touch offset.
    pub fn offset_for_coordinate(&mut self, layout: &dyn TextLayout, x: f32, y: f32) -> usize {
        let x = clamp_into(x, self.viewport.width) + self.viewport.scroll_x;
        let y = clamp_into(y, self.viewport.height) + self.viewport.scroll_y;
        let line = line_for_vertical(layout, y);
        let offset = layout.offset_for_horizontal(line, x);
        self.last_touch_offset = Some(offset);
        offset
    }

    /// View-relative `(x, y)` of the leading edge of the glyph at `offset`,
    /// with `y` at the top of its line.
    pub fn coordinate_for_offset(&self, layout: &dyn TextLayout, offset: usize) -> (f32, f32) {
        let line = layout.line_for_offset(offset);
        (
            layout.primary_horizontal(offset) - self.viewport.scroll_x,
            layout.line_top(line) - self.viewport.scroll_y,
        )
    }
}

fn clamp_into(v: f32, extent: f32) -> f32 {
    v.max(0.0).min((extent - 1.0).max(0.0))
}

// First line whose bottom lies below y; past the last line, the last line.
fn line_for_vertical(layout: &dyn TextLayout, y: f32) -> usize {
    let count = layout.line_count().max(1);
    for line in 0..count {
        if y < layout.line_bottom(line) {
            return line;
        }
    }
    count - 1
}
