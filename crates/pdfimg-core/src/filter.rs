//! Header/footer geometric filter.
//!
//! Images repeated as running headers or footers (logos, banners) are dropped
//! only when every placement on the page sits inside a header or footer zone.
//! Missing geometry or any placement touching the content band keeps the image.

use tracing::warn;

use crate::models::image::Rect;

/// Ratio substituted for values outside `[0, 1)`.
pub const DEFAULT_ZONE_RATIO: f32 = 0.10;

/// Validated header and footer fractions of the page height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneRatios {
    header: f32,
    footer: f32,
}

impl ZoneRatios {
    /// Validate ratios, replacing out-of-range values with [`DEFAULT_ZONE_RATIO`].
    ///
    /// Overlapping zones (`header + footer >= 1`) are accepted with a warning; the
    /// predicate is then applied to the literal limits.
    pub fn new(header: f32, footer: f32) -> Self {
        let ratios = Self {
            header: sanitize(header),
            footer: sanitize(footer),
        };

        if ratios.overlapping() {
            warn!(
                "Header+footer ratio >= 1.0 ({} + {}), zones overlap",
                ratios.header, ratios.footer
            );
        }

        ratios
    }

    pub fn header(&self) -> f32 {
        self.header
    }

    pub fn footer(&self) -> f32 {
        self.footer
    }

    /// Whether the two zones together cover the whole page.
    pub fn overlapping(&self) -> bool {
        self.header + self.footer >= 1.0
    }
}

impl Default for ZoneRatios {
    fn default() -> Self {
        Self {
            header: DEFAULT_ZONE_RATIO,
            footer: DEFAULT_ZONE_RATIO,
        }
    }
}

fn sanitize(ratio: f32) -> f32 {
    if (0.0..1.0).contains(&ratio) {
        ratio
    } else {
        DEFAULT_ZONE_RATIO
    }
}

/// Absolute zone limits for one page, in top-down coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLimits {
    /// Anything whose bottom edge is at or above this lies in the header.
    pub header_limit: f32,
    /// Anything whose top edge is at or below this lies in the footer.
    pub footer_limit: f32,
}

impl ZoneLimits {
    pub fn for_page(page_height: f32, ratios: ZoneRatios) -> Self {
        Self {
            header_limit: page_height * ratios.header,
            footer_limit: page_height * (1.0 - ratios.footer),
        }
    }

    /// Whether a rectangle lies entirely inside the header or the footer zone.
    pub fn outside_content(&self, rect: &Rect) -> bool {
        rect.y1 <= self.header_limit || rect.y0 >= self.footer_limit
    }
}

/// Decide whether an image should be skipped as header/footer decoration.
///
/// Returns `false` for an empty placement list: missing geometry never drops content.
pub fn is_header_footer_only(placements: &[Rect], limits: ZoneLimits) -> bool {
    !placements.is_empty() && placements.iter().all(|rect| limits.outside_content(rect))
}
