//! Resize coordination: pixel dimensions in, terminal dimensions out.

/// Largest dimension ever requested from a session, columns or rows.
pub const MAX_FIT_DIM: u16 = 500;

/// Measured size of one terminal cell, in pixels.
#[derive(Clone, Copy, Debug)]
pub struct FontMetrics {
    pub cell_width: f64,
    pub cell_height: f64,
}

/// Available drawing area, in pixels.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Compute the `(cols, rows)` that fit the viewport.
///
/// Returns `None` when any input is non-finite or non-positive, or when the
/// viewport is too small for even one cell; the caller skips the resize
/// entirely rather than applying a partial or degenerate geometry. Results
/// are clamped to the session-side maximum.
pub fn fit(viewport: Viewport, metrics: FontMetrics) -> Option<(u16, u16)> {
    if !viewport.width.is_finite()
        || !viewport.height.is_finite()
        || !metrics.cell_width.is_finite()
        || !metrics.cell_height.is_finite()
    {
        return None;
    }
    if viewport.width <= 0.0
        || viewport.height <= 0.0
        || metrics.cell_width <= 0.0
        || metrics.cell_height <= 0.0
    {
        return None;
    }

    let cols = (viewport.width / metrics.cell_width).floor();
    let rows = (viewport.height / metrics.cell_height).floor();
    if cols < 1.0 || rows < 1.0 {
        return None;
    }

    let cols = (cols as u64).min(MAX_FIT_DIM as u64) as u16;
    let rows = (rows as u64).min(MAX_FIT_DIM as u64) as u16;
    Some((cols, rows))
}
