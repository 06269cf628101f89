//! Wheel delta to scroll line normalization.
//!
//! Hosts report wheel deltas in pixels, lines or pages. Small pixel deltas
//! would truncate to zero lines every time, so the fractional part is handed
//! back to the caller and fed into the next call.

use serde::{Deserialize, Serialize};

/// Pixels that make up one terminal line
pub const PIXELS_PER_LINE: f64 = 16.0;

/// Unit of a wheel delta
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelDeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

impl WheelDeltaMode {
    /// Map the numeric DOM `deltaMode` value (0, 1, 2)
    pub fn from_dom(mode: u32) -> Self {
        match mode {
            1 => WheelDeltaMode::Line,
            2 => WheelDeltaMode::Page,
            _ => WheelDeltaMode::Pixel,
        }
    }
}

/// Result of one normalization step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelScroll {
    /// Whole lines to scroll (positive = down)
    pub lines: i32,
    /// Fractional lines to carry into the next call
    pub remainder: f64,
}

/// Convert a wheel delta into whole scroll lines plus a carried remainder.
///
/// Page deltas scroll `rows - 1` lines per unit (at least one).
pub fn normalize_wheel_delta_to_scroll_lines(
    delta_y: f64,
    mode: WheelDeltaMode,
    rows: u16,
    remainder: f64,
) -> WheelScroll {
    if !delta_y.is_finite() {
        return WheelScroll {
            lines: 0,
            remainder: if remainder.is_finite() { remainder } else { 0.0 },
        };
    }

    let delta_lines = match mode {
        WheelDeltaMode::Pixel => delta_y / PIXELS_PER_LINE,
        WheelDeltaMode::Line => delta_y,
        WheelDeltaMode::Page => delta_y * f64::from(rows.saturating_sub(1).max(1)),
    };

    let carried = if remainder.is_finite() { remainder } else { 0.0 };
    let total = carried + delta_lines;
    let lines = total.trunc();

    WheelScroll {
        lines: lines.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32,
        remainder: total - lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_remainder_is_carried() {
        let first = normalize_wheel_delta_to_scroll_lines(8.0, WheelDeltaMode::Pixel, 40, 0.0);
        assert_eq!(first, WheelScroll { lines: 0, remainder: 0.5 });

        let second =
            normalize_wheel_delta_to_scroll_lines(8.0, WheelDeltaMode::Pixel, 40, first.remainder);
        assert_eq!(second, WheelScroll { lines: 1, remainder: 0.0 });
    }

    #[test]
    fn test_negative_pixels_scroll_up() {
        let scroll = normalize_wheel_delta_to_scroll_lines(-40.0, WheelDeltaMode::Pixel, 24, 0.0);
        assert_eq!(scroll.lines, -2);
        assert_eq!(scroll.remainder, -0.5);
    }

    #[test]
    fn test_line_mode_passthrough() {
        let scroll = normalize_wheel_delta_to_scroll_lines(3.0, WheelDeltaMode::Line, 24, 0.0);
        assert_eq!(scroll, WheelScroll { lines: 3, remainder: 0.0 });
    }

    #[test]
    fn test_page_mode_uses_visible_rows_minus_one() {
        let scroll = normalize_wheel_delta_to_scroll_lines(1.0, WheelDeltaMode::Page, 40, 0.0);
        assert_eq!(scroll.lines, 39);

        let tiny = normalize_wheel_delta_to_scroll_lines(2.0, WheelDeltaMode::Page, 1, 0.0);
        assert_eq!(tiny.lines, 2);
    }

    #[test]
    fn test_non_finite_delta_keeps_remainder() {
        let scroll = normalize_wheel_delta_to_scroll_lines(f64::NAN, WheelDeltaMode::Pixel, 24, 0.25);
        assert_eq!(scroll, WheelScroll { lines: 0, remainder: 0.25 });
    }

    #[test]
    fn test_dom_mode_mapping() {
        assert_eq!(WheelDeltaMode::from_dom(0), WheelDeltaMode::Pixel);
        assert_eq!(WheelDeltaMode::from_dom(1), WheelDeltaMode::Line);
        assert_eq!(WheelDeltaMode::from_dom(2), WheelDeltaMode::Page);
    }
}
