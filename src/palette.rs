//! Color palettes for indexed pixel formats.

use alloc::vec::Vec;

use rgb::Rgba;

use crate::color::{Color32, WorkingColorSpace, blend_with_background};
use crate::error::TransformError;
use crate::format::PixelFormat;

/// Ordered palette entries with the settings used to map colors onto them.
///
/// Entries are identified by position; duplicates are allowed.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    entries: Vec<Color32>,
    back_color: Color32,
    alpha_threshold: u8,
    working_space: WorkingColorSpace,
    transparent_index: Option<usize>,
}

const BLACK: Color32 = Rgba { r: 0, g: 0, b: 0, a: 255 };
const WHITE: Color32 = Rgba { r: 255, g: 255, b: 255, a: 255 };

impl Palette {
    /// Create a palette from its entries.
    ///
    /// The back color defaults to black and the alpha threshold to 128.
    pub fn new(entries: Vec<Color32>) -> Result<Self, TransformError> {
        if entries.is_empty() {
            return Err(TransformError::EmptyPalette);
        }
        let transparent_index = entries.iter().position(|c| c.a == 0);
        Ok(Self {
            entries,
            back_color: BLACK,
            alpha_threshold: 128,
            working_space: WorkingColorSpace::Default,
            transparent_index,
        })
    }

    /// Set the color that translucent colors are blended with before lookup.
    ///
    /// The alpha of `color` is ignored.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.back_color = Rgba { a: 255, ..color };
        self
    }

    /// Set the alpha below which colors map to the transparent entry.
    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    /// Set the color space used for blending with the back color.
    pub fn with_working_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_space = space;
        self
    }

    /// Black and white.
    pub fn black_and_white() -> Self {
        Self::from_entries(alloc::vec![BLACK, WHITE])
    }

    /// `levels` evenly spaced gray shades, clamped to `2..=256`.
    pub fn grayscale(levels: usize) -> Self {
        let levels = levels.clamp(2, 256);
        let entries = (0..levels)
            .map(|i| {
                let v = ((i * 255 + (levels - 1) / 2) / (levels - 1)) as u8;
                Rgba::new(v, v, v, 255)
            })
            .collect();
        Self::from_entries(entries)
    }

    /// The 16 classic system colors.
    pub fn system_16() -> Self {
        const C: [(u8, u8, u8); 16] = [
            (0, 0, 0),
            (128, 0, 0),
            (0, 128, 0),
            (128, 128, 0),
            (0, 0, 128),
            (128, 0, 128),
            (0, 128, 128),
            (192, 192, 192),
            (128, 128, 128),
            (255, 0, 0),
            (0, 255, 0),
            (255, 255, 0),
            (0, 0, 255),
            (255, 0, 255),
            (0, 255, 255),
            (255, 255, 255),
        ];
        Self::from_entries(C.iter().map(|&(r, g, b)| Rgba::new(r, g, b, 255)).collect())
    }

    /// A 6x6x6 color cube, 39 gray shades and a transparent entry.
    pub fn system_256() -> Self {
        let mut entries = Vec::with_capacity(256);
        for r in 0..6u8 {
            for g in 0..6u8 {
                for b in 0..6u8 {
                    entries.push(Rgba::new(r * 51, g * 51, b * 51, 255));
                }
            }
        }
        for i in 1..40u32 {
            let v = (i * 255 / 40) as u8;
            entries.push(Rgba::new(v, v, v, 255));
        }
        entries.push(Rgba::new(0, 0, 0, 0));
        Self::from_entries(entries)
    }

    /// Default palette for an indexed format, `None` for other formats.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Indexed1 => Some(Self::black_and_white()),
            PixelFormat::Indexed4 => Some(Self::system_16()),
            PixelFormat::Indexed8 => Some(Self::system_256()),
            _ => None,
        }
    }

    /// Build from entries known to be non-empty.
    pub(crate) fn from_entries(entries: Vec<Color32>) -> Self {
        debug_assert!(!entries.is_empty());
        let transparent_index = entries.iter().position(|c| c.a == 0);
        Self {
            entries,
            back_color: BLACK,
            alpha_threshold: 128,
            working_space: WorkingColorSpace::Default,
            transparent_index,
        }
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[Color32] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; a palette has at least one entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, or the first entry when out of range.
    pub fn get(&self, index: usize) -> Color32 {
        self.entries.get(index).copied().unwrap_or(self.entries[0])
    }

    /// Opaque color that translucent colors are blended with.
    pub fn back_color(&self) -> Color32 {
        self.back_color
    }

    /// Alpha below which colors are considered transparent.
    pub fn alpha_threshold(&self) -> u8 {
        self.alpha_threshold
    }

    /// Working color space for blending.
    pub fn working_space(&self) -> WorkingColorSpace {
        self.working_space
    }

    /// Index of the first fully transparent entry.
    pub fn transparent_index(&self) -> Option<usize> {
        self.transparent_index
    }

    /// Whether any entry is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.entries.iter().any(|c| c.a != 255)
    }

    /// Index of the entry closest to `color`.
    ///
    /// Colors below the alpha threshold map to the transparent entry when
    /// the palette has one; everything else is flattened onto the back
    /// color and matched by squared RGB distance. Ties go to the lower index.
    pub fn nearest_index(&self, color: Color32) -> usize {
        if color.a < self.alpha_threshold
            && let Some(index) = self.transparent_index
        {
            return index;
        }
        let c = blend_with_background(color, self.back_color, self.working_space);
        let mut best = 0;
        let mut best_distance = u32::MAX;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.a == 0 {
                continue;
            }
            let dr = c.r.abs_diff(entry.r) as u32;
            let dg = c.g.abs_diff(entry.g) as u32;
            let db = c.b.abs_diff(entry.b) as u32;
            let distance = dr * dr + dg * dg + db * db;
            if distance < best_distance {
                best = index;
                best_distance = distance;
                if distance == 0 {
                    break;
                }
            }
        }
        best
    }

    /// The entry closest to `color`.
    pub fn nearest_color(&self, color: Color32) -> Color32 {
        self.entries[self.nearest_index(color)]
    }

    /// Fail if the palette has more entries than `format` can address.
    pub fn check_capacity(&self, format: PixelFormat) -> Result<(), TransformError> {
        let max = format
            .max_palette_entries()
            .ok_or(TransformError::FormatMismatch)?;
        if self.entries.len() > max {
            return Err(TransformError::PaletteTooLarge {
                entries: self.entries.len(),
                max,
            });
        }
        Ok(())
    }
}
