//! Affordance placement
//!
//! Positions a tooltip or menu next to its anchor inside the viewport. Bad
//! geometry (zero-size anchor, NaN, popup larger than the viewport) is
//! clamped, never reported.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    /// True when flipped above the anchor
    pub above: bool,
    /// Height the popup may use without leaving the viewport
    pub max_height: f64,
}

fn sane(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn extent(v: f64) -> f64 {
    sane(v).max(0.0)
}

/// Below the anchor when it fits, above when only that fits, clamped otherwise
pub fn place_affordance(anchor: Rect, popup: Size, viewport: Size, margin: f64) -> Placement {
    let margin = extent(margin);
    let (vw, vh) = (extent(viewport.width), extent(viewport.height));
    let (pw, ph) = (extent(popup.width), extent(popup.height));
    let (ax, ay) = (sane(anchor.x), sane(anchor.y));
    let ah = extent(anchor.height);

    let below_y = ay + ah + margin;
    let above_y = ay - margin - ph;
    let above = below_y + ph > vh && above_y >= 0.0;

    let y = (if above { above_y } else { below_y }).clamp(0.0, (vh - ph).max(0.0));
    let room = if above {
        (ay - margin).clamp(0.0, vh)
    } else {
        (vh - y).max(0.0)
    };

    Placement {
        x: ax.clamp(0.0, (vw - pw).max(0.0)),
        y,
        above,
        max_height: ph.min(room),
    }
}
