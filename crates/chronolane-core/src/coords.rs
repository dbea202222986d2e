//! Time ↔ pixel mapping for renderers.
//!
//! Horizontal position is linear in time:
//!
//! ```text
//! x     = left_padding + scale * (start - offset)
//! width = scale * (end - start) + 1
//! ```
//!
//! The `+ 1` keeps zero-length and sub-pixel intervals visible. Fractional
//! pixels are truncated toward zero.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::interval::Interval;

/// Horizontal extent of an interval on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSpan {
    pub x: i64,
    pub width: i64,
}

fn check_scale(pixel_scale: f64) -> Result<(), ValidationError> {
    if !pixel_scale.is_finite() || pixel_scale < 0.0 {
        return Err(ValidationError::InvalidScale(pixel_scale));
    }
    Ok(())
}

/// Map an interval to its pixel span.
///
/// A scale of zero collapses every interval to a 1-pixel span at
/// `left_padding`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidScale`] for a negative, NaN or
/// infinite scale.
pub fn to_pixel_span(
    interval: &Interval,
    visible_offset: i64,
    pixel_scale: f64,
    left_padding: i64,
) -> Result<PixelSpan, ValidationError> {
    check_scale(pixel_scale)?;
    // Differences of two i64 instants need 65 bits; float-to-int casts saturate.
    let from_offset = i128::from(interval.start()) - i128::from(visible_offset);
    let length = i128::from(interval.end()) - i128::from(interval.start());
    let x = left_padding.saturating_add((pixel_scale * from_offset as f64) as i64);
    let width = ((pixel_scale * length as f64) as i64).saturating_add(1);
    Ok(PixelSpan { x, width })
}

/// Inverse of [`to_pixel_span`] for a single x coordinate.
///
/// `None` when the scale is zero or invalid, since every instant maps to
/// the same column.
pub fn to_instant(x: i64, visible_offset: i64, pixel_scale: f64, left_padding: i64) -> Option<i64> {
    if check_scale(pixel_scale).is_err() || pixel_scale == 0.0 {
        return None;
    }
    let columns = (i128::from(x) - i128::from(left_padding)) as f64;
    Some(visible_offset.saturating_add((columns / pixel_scale).floor() as i64))
}

/// The visible part of the timeline and how it is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewWindow {
    /// Instant shown at `left_padding`.
    pub offset: i64,
    /// Pixels per time unit.
    pub scale: f64,
    pub left_padding: i64,
    pub right_padding: i64,
}

impl Default for ViewWindow {
    fn default() -> Self {
        Self {
            offset: 0,
            scale: 1.0,
            left_padding: 20,
            right_padding: 20,
        }
    }
}

impl ViewWindow {
    pub fn span(&self, interval: &Interval) -> Result<PixelSpan, ValidationError> {
        to_pixel_span(interval, self.offset, self.scale, self.left_padding)
    }

    /// Window that shows `range` across `total_width` pixels, paddings included.
    ///
    /// Falls back to a zero scale when there is no room or the range is empty.
    pub fn fit(range: &Interval, total_width: i64, left_padding: i64, right_padding: i64) -> Self {
        let usable = total_width
            .saturating_sub(left_padding)
            .saturating_sub(right_padding);
        let length = i128::from(range.end()) - i128::from(range.start());
        let scale = if usable > 0 && length > 0 {
            usable as f64 / length as f64
        } else {
            0.0
        };
        Self {
            offset: range.start(),
            scale,
            left_padding,
            right_padding,
        }
    }
}

/// Vertical metrics of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMetrics {
    pub row_height: i64,
    pub row_spacing: i64,
}

impl Default for RowMetrics {
    fn default() -> Self {
        Self {
            row_height: 24,
            row_spacing: 4,
        }
    }
}

impl RowMetrics {
    /// Top edge of the `row`-th row counted across all lanes.
    pub fn row_top(&self, row: usize) -> i64 {
        (row as i64).saturating_mul(self.row_height.saturating_add(self.row_spacing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: i64, end: i64) -> Interval {
        Interval::new(start, end).unwrap()
    }

    #[test]
    fn test_scale_two_without_padding() {
        let span = to_pixel_span(&iv(10, 20), 0, 2.0, 0).unwrap();
        assert_eq!(span, PixelSpan { x: 20, width: 21 });
    }

    #[test]
    fn test_zero_duration_is_one_pixel() {
        let span = to_pixel_span(&Interval::point(5), 0, 3.0, 0).unwrap();
        assert_eq!(span.width, 1);
        assert_eq!(span.x, 15);
    }

    #[test]
    fn test_zero_scale_collapses_to_padding() {
        let span = to_pixel_span(&iv(100, 5000), 40, 0.0, 12).unwrap();
        assert_eq!(span, PixelSpan { x: 12, width: 1 });
        assert_eq!(to_instant(50, 0, 0.0, 0), None);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        assert!(matches!(
            to_pixel_span(&iv(0, 1), 0, -1.0, 0),
            Err(ValidationError::InvalidScale(_))
        ));
        assert!(to_pixel_span(&iv(0, 1), 0, f64::NAN, 0).is_err());
    }

    #[test]
    fn test_offset_and_padding() {
        let span = to_pixel_span(&iv(1_000, 1_500), 800, 0.5, 30).unwrap();
        assert_eq!(span, PixelSpan { x: 130, width: 251 });
        assert_eq!(to_instant(130, 800, 0.5, 30), Some(1_000));
    }

    #[test]
    fn test_fit_fills_usable_width() {
        let window = ViewWindow::fit(&iv(0, 1_000), 540, 20, 20);
        assert_eq!(window.scale, 0.5);
        let span = window.span(&iv(0, 1_000)).unwrap();
        assert_eq!(span.x, 20);
        assert_eq!(span.x + span.width - 1, 520);

        assert_eq!(ViewWindow::fit(&Interval::point(3), 540, 20, 20).scale, 0.0);
    }

    #[test]
    fn test_extreme_instants_saturate() {
        let all = iv(i64::MIN, i64::MAX);
        let span = to_pixel_span(&all, 0, 1.0, 0).unwrap();
        assert_eq!(span.x, i64::MIN);
        assert_eq!(span.width, i64::MAX);

        let span = to_pixel_span(&iv(i64::MAX, i64::MAX), i64::MIN, 1.0, 20).unwrap();
        assert_eq!(span, PixelSpan { x: i64::MAX, width: 1 });

        assert_eq!(to_instant(i64::MAX, i64::MAX, 0.5, i64::MIN), Some(i64::MAX));

        let window = ViewWindow::fit(&all, 1_000, 20, 20);
        assert!(window.scale > 0.0 && window.scale.is_finite());
        let span = window.span(&all).unwrap();
        assert_eq!(span.x, 20);
        assert!((959..=961).contains(&span.width));
        assert_eq!(ViewWindow::fit(&all, i64::MIN, i64::MAX, 0).scale, 0.0);
    }

    #[test]
    fn test_row_top() {
        let rows = RowMetrics::default();
        assert_eq!(rows.row_top(0), 0);
        assert_eq!(rows.row_top(3), 84);
    }
}
