//! Reference ditherers.

use alloc::boxed::Box;
use alloc::vec::Vec;

use enough::{Stop, StopReason};
use rgb::Rgba;

use crate::bitmap::BitmapData;
use crate::color::{Color32, WorkingColorSpace, blend_with_background};
use crate::session::{Ditherer, DitheringSession, QuantizingSession};

const BAYER2: [u8; 4] = [0, 2, 3, 1];

const BAYER4: [u8; 16] = [0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5];

const BAYER8: [u8; 64] = [
    0, 32, 8, 40, 2, 34, 10, 42, 48, 16, 56, 24, 50, 18, 58, 26, 12, 44, 4, 36, 14, 46, 6, 38, 60,
    28, 52, 20, 62, 30, 54, 22, 3, 35, 11, 43, 1, 33, 9, 41, 51, 19, 59, 27, 49, 17, 57, 25, 15, 47,
    7, 39, 13, 45, 5, 37, 63, 31, 55, 23, 61, 29, 53, 21,
];

/// Size of a Bayer threshold matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BayerMatrix {
    /// 2x2
    Bayer2,
    /// 4x4
    Bayer4,
    /// 8x8
    Bayer8,
}

impl BayerMatrix {
    fn cells(self) -> (&'static [u8], u32) {
        match self {
            Self::Bayer2 => (&BAYER2, 2),
            Self::Bayer4 => (&BAYER4, 4),
            Self::Bayer8 => (&BAYER8, 8),
        }
    }
}

/// Ordered dithering with a Bayer matrix.
///
/// Each pixel is offset by a position-dependent threshold before it is
/// quantized. The pattern depends only on coordinates, so the ditherer
/// never needs to see the rendered content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrderedDitherer {
    matrix: BayerMatrix,
    strength: Option<f32>,
}

impl OrderedDitherer {
    /// Dither with `matrix` at automatic strength.
    pub fn new(matrix: BayerMatrix) -> Self {
        Self {
            matrix,
            strength: None,
        }
    }

    /// Fixed offset range in 8-bit channel units. Without it the strength
    /// is the widest gap between the gray levels the quantizer produces.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }
}

/// Widest gap between consecutive quantized gray levels.
fn measure_strength(quantizer: &dyn QuantizingSession) -> f32 {
    let mut previous: Option<u8> = None;
    let mut widest = 0u8;
    for v in 0..=255u8 {
        let level = quantizer.quantize(Rgba::new(v, v, v, 255)).r;
        if let Some(p) = previous
            && level > p
        {
            widest = widest.max(level - p);
        }
        previous = Some(previous.map_or(level, |p| p.max(level)));
    }
    if widest == 0 { 255.0 } else { widest as f32 }
}

struct OrderedSession<'a> {
    quantizer: &'a dyn QuantizingSession,
    cells: &'static [u8],
    size: u32,
    strength: f32,
}

impl DitheringSession for OrderedSession<'_> {
    fn dither(&mut self, color: Color32, x: u32, y: u32) -> Color32 {
        if color.a < self.quantizer.alpha_threshold() {
            return self.quantizer.quantize(color);
        }
        let cell = self.cells[((y % self.size) * self.size + x % self.size) as usize];
        let n = (self.size * self.size) as f32;
        let offset = ((cell as f32 + 0.5) / n - 0.5) * self.strength;
        let shift = |v: u8| (v as f32 + offset + 0.5).clamp(0.0, 255.0) as u8;
        self.quantizer
            .quantize(Rgba::new(shift(color.r), shift(color.g), shift(color.b), color.a))
    }
}

impl Ditherer for OrderedDitherer {
    fn initialize_reads_content(&self) -> bool {
        false
    }

    fn initialize<'a>(
        &'a self,
        _source: &dyn BitmapData,
        quantizer: &'a dyn QuantizingSession,
        stop: &dyn Stop,
    ) -> Result<Box<dyn DitheringSession + 'a>, StopReason> {
        stop.check()?;
        let (cells, size) = self.matrix.cells();
        let strength = self.strength.unwrap_or_else(|| measure_strength(quantizer));
        Ok(Box::new(OrderedSession {
            quantizer,
            cells,
            size,
            strength,
        }))
    }
}

/// Floyd–Steinberg error diffusion.
///
/// Pushes the quantization error of each pixel onto its right and lower
/// neighbours, so pixels must arrive row by row, left to right. The
/// engine renders the final content before diffusing into it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorDiffusionDitherer;

impl ErrorDiffusionDitherer {
    /// Floyd–Steinberg with the standard 7/3/5/1 weights.
    pub fn floyd_steinberg() -> Self {
        Self
    }
}

struct DiffusionSession<'a> {
    quantizer: &'a dyn QuantizingSession,
    back_color: Color32,
    working_space: WorkingColorSpace,
    row: u32,
    current: Vec<[f32; 3]>,
    next: Vec<[f32; 3]>,
}

impl DiffusionSession<'_> {
    fn advance_to(&mut self, y: u32) {
        while self.row < y {
            core::mem::swap(&mut self.current, &mut self.next);
            self.next.iter_mut().for_each(|e| *e = [0.0; 3]);
            self.row += 1;
        }
    }

    fn ensure_width(&mut self, width: usize) {
        if self.current.len() < width {
            self.current.resize(width, [0.0; 3]);
            self.next.resize(width, [0.0; 3]);
        }
    }
}

impl DitheringSession for DiffusionSession<'_> {
    fn dither(&mut self, color: Color32, x: u32, y: u32) -> Color32 {
        self.advance_to(y);
        let x = x as usize;
        self.ensure_width(x + 2);
        if color.a < self.quantizer.alpha_threshold() {
            return self.quantizer.quantize(color);
        }
        let flat = blend_with_background(color, self.back_color, self.working_space);
        let error = self.current[x];
        let wanted = [
            flat.r as f32 + error[0],
            flat.g as f32 + error[1],
            flat.b as f32 + error[2],
        ];
        let to_u8 = |v: f32| (v + 0.5).clamp(0.0, 255.0) as u8;
        let adjusted = Rgba::new(to_u8(wanted[0]), to_u8(wanted[1]), to_u8(wanted[2]), 255);
        let result = self.quantizer.quantize(adjusted);
        let diff = [
            wanted[0] - result.r as f32,
            wanted[1] - result.g as f32,
            wanted[2] - result.b as f32,
        ];
        for (i, d) in diff.into_iter().enumerate() {
            self.current[x + 1][i] += d * 7.0 / 16.0;
            if x > 0 {
                self.next[x - 1][i] += d * 3.0 / 16.0;
            }
            self.next[x][i] += d * 5.0 / 16.0;
            self.next[x + 1][i] += d / 16.0;
        }
        result
    }
}

impl Ditherer for ErrorDiffusionDitherer {
    fn initialize_reads_content(&self) -> bool {
        true
    }

    fn initialize<'a>(
        &'a self,
        source: &dyn BitmapData,
        quantizer: &'a dyn QuantizingSession,
        stop: &dyn Stop,
    ) -> Result<Box<dyn DitheringSession + 'a>, StopReason> {
        stop.check()?;
        let width = source.width() as usize + 1;
        Ok(Box::new(DiffusionSession {
            quantizer,
            back_color: quantizer.back_color(),
            working_space: quantizer.working_space(),
            row: 0,
            current: alloc::vec![[0.0; 3]; width],
            next: alloc::vec![[0.0; 3]; width],
        }))
    }
}
