//! Rendering surface collaborator.

/// Visible grid size of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Geometry {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// The terminal widget a session renders into
pub trait RenderSurface: Send + 'static {
    /// Write process output verbatim
    fn write(&mut self, data: &str);

    fn focus(&mut self);

    fn has_focus(&self) -> bool;

    /// Release the widget; no further calls follow
    fn dispose(&mut self);

    fn geometry(&self) -> Geometry;

    /// Scroll the viewport; negative scrolls up
    fn scroll_lines(&mut self, lines: i32);
}
