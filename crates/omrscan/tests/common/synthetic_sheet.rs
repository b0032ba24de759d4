//! Renders synthetic answer sheets laid out like the printed templates:
//! a header bar, then column blocks of bubble rows with a small question
//! number box left of each row.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use omrscan::{AnswerKey, LayoutConfig, RasterImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const PAPER: u8 = 232;
pub const INK: u8 = 30;
/// Shaded share of a bubble for an ordinary pencil mark.
pub const FIRM_MARK: f32 = 0.9;

#[derive(Debug, Clone)]
pub struct Noise {
    pub seed: u64,
    /// Uniform per-pixel noise amplitude (gray levels).
    pub amplitude: i16,
    /// Isolated dark specks scattered over the sheet.
    pub specks: usize,
    /// Brightness falloff from left to right edge, as a fraction.
    pub shading: f32,
}

#[derive(Debug, Clone)]
pub struct SheetSpec {
    pub questions: usize,
    pub options: usize,
    pub columns: usize,
    pub radius: f32,
    pub stroke: f32,
    pub option_pitch: f32,
    pub row_pitch: f32,
    pub block_gap: f32,
    pub margin: f32,
    pub header: f32,
    pub rotation_deg: f32,
    /// question -> (option, shaded fraction)
    pub marks: BTreeMap<u32, Vec<(usize, f32)>>,
    pub noise: Option<Noise>,
}

impl SheetSpec {
    pub fn new(questions: usize, options: usize, columns: usize) -> Self {
        Self {
            questions,
            options,
            columns,
            radius: 12.5,
            stroke: 3.0,
            option_pitch: 36.0,
            row_pitch: 44.0,
            block_gap: 80.0,
            margin: 60.0,
            header: 40.0,
            rotation_deg: 0.0,
            marks: BTreeMap::new(),
            noise: None,
        }
    }

    pub fn mark(self, question: u32, option: usize) -> Self {
        self.mark_with(question, option, FIRM_MARK)
    }

    pub fn mark_with(mut self, question: u32, option: usize, coverage: f32) -> Self {
        self.marks.entry(question).or_default().push((option, coverage));
        self
    }

    /// Mark one option for every question.
    pub fn mark_all(mut self, answers: &BTreeMap<u32, usize>) -> Self {
        for (&q, &o) in answers {
            self = self.mark(q, o);
        }
        self
    }

    /// Bubble radius with option and row pitch scaled to match.
    pub fn bubble_radius(mut self, radius: f32) -> Self {
        let scale = radius / self.radius;
        self.radius = radius;
        self.option_pitch *= scale;
        self.row_pitch *= scale;
        self
    }

    pub fn pitch(mut self, option_pitch: f32, row_pitch: f32) -> Self {
        self.option_pitch = option_pitch;
        self.row_pitch = row_pitch;
        self
    }

    pub fn rotated(mut self, deg: f32) -> Self {
        self.rotation_deg = deg;
        self
    }

    pub fn noisy(mut self, noise: Noise) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig::new(self.questions, self.options, self.columns)
    }

    fn rows_per_column(&self) -> usize {
        self.questions.div_ceil(self.columns)
    }

    fn block_width(&self) -> f32 {
        self.options as f32 * self.option_pitch
    }

    fn sheet_size(&self) -> (u32, u32) {
        let w = 2.0 * self.margin
            + self.columns as f32 * self.block_width()
            + (self.columns - 1) as f32 * self.block_gap;
        let h = 2.0 * self.margin + self.header + self.rows_per_column() as f32 * self.row_pitch;
        (w.ceil() as u32, h.ceil() as u32)
    }

    /// Canvas size: the bare sheet, or a square that holds it at any angle.
    pub fn canvas_size(&self) -> (u32, u32) {
        let (w, h) = self.sheet_size();
        if self.rotation_deg == 0.0 {
            return (w, h);
        }
        let d = ((w * w + h * h) as f32).sqrt().ceil() as u32 + 20;
        (d, d)
    }

    fn sheet_offset(&self) -> [f32; 2] {
        let (w, h) = self.sheet_size();
        let (cw, ch) = self.canvas_size();
        [
            ((cw - w) / 2) as f32,
            ((ch - h) / 2) as f32,
        ]
    }

    /// Bubble center before rotation, in canvas pixels.
    fn upright_center(&self, question: u32, option: usize) -> [f32; 2] {
        let q = question as usize - 1;
        let rpc = self.rows_per_column();
        let (block, row) = (q / rpc, q % rpc);
        let off = self.sheet_offset();
        let x0 = off[0] + self.margin + block as f32 * (self.block_width() + self.block_gap);
        [
            x0 + (option as f32 + 0.5) * self.option_pitch,
            off[1] + self.margin + self.header + (row as f32 + 0.5) * self.row_pitch,
        ]
    }

    /// Bubble center in the rendered image.
    pub fn bubble_center(&self, question: u32, option: usize) -> [f32; 2] {
        let p = self.upright_center(question, option);
        let (cw, ch) = self.canvas_size();
        let c = [0.5 * cw as f32, 0.5 * ch as f32];
        let (s, co) = self.rotation_deg.to_radians().sin_cos();
        let (dx, dy) = (p[0] - c[0], p[1] - c[1]);
        [c[0] + co * dx - s * dy, c[1] + s * dx + co * dy]
    }

    pub fn render(&self) -> GrayImage {
        let (cw, ch) = self.canvas_size();
        let mut img = GrayImage::from_pixel(cw, ch, Luma([PAPER]));
        let off = self.sheet_offset();
        let (w, _) = self.sheet_size();

        fill_rect(
            &mut img,
            off[0] + self.margin,
            off[1] + self.margin,
            w as f32 - 2.0 * self.margin,
            8.0,
        );

        for q in 1..=self.questions as u32 {
            let first = self.upright_center(q, 0);
            let label_x = first[0] - 0.5 * self.option_pitch - 22.0;
            fill_rect(&mut img, label_x, first[1] - 7.0, 8.0, 14.0);
            for o in 0..self.options {
                let c = self.upright_center(q, o);
                paint_disk(&mut img, c, self.radius, |d| d > self.radius - self.stroke);
                let coverage = self
                    .marks
                    .get(&q)
                    .and_then(|m| m.iter().find(|(mo, _)| *mo == o))
                    .map_or(0.0, |&(_, cov)| cov);
                if coverage > 0.0 {
                    let r = self.radius * coverage.clamp(0.0, 1.0).sqrt();
                    paint_disk(&mut img, c, r, |_| true);
                }
            }
        }

        if self.rotation_deg != 0.0 {
            img = rotate_bilinear(&img, self.rotation_deg);
        }
        if let Some(noise) = &self.noise {
            apply_noise(&mut img, noise);
        }
        img
    }

    pub fn raster(&self) -> RasterImage {
        RasterImage::from_gray(self.render()).expect("rendered sheet is non-empty")
    }
}

fn fill_rect(img: &mut GrayImage, x: f32, y: f32, w: f32, h: f32) {
    let (iw, ih) = img.dimensions();
    let x0 = x.round().max(0.0) as u32;
    let y0 = y.round().max(0.0) as u32;
    let x1 = ((x + w).round().max(0.0) as u32).min(iw);
    let y1 = ((y + h).round().max(0.0) as u32).min(ih);
    for yy in y0..y1 {
        for xx in x0..x1 {
            img.put_pixel(xx, yy, Luma([INK]));
        }
    }
}

fn paint_disk(img: &mut GrayImage, c: [f32; 2], r: f32, keep: impl Fn(f32) -> bool) {
    let (iw, ih) = img.dimensions();
    let x0 = (c[0] - r - 1.0).floor().max(0.0) as u32;
    let y0 = (c[1] - r - 1.0).floor().max(0.0) as u32;
    let x1 = ((c[0] + r + 1.0).ceil() as u32).min(iw);
    let y1 = ((c[1] + r + 1.0).ceil() as u32).min(ih);
    for y in y0..y1 {
        for x in x0..x1 {
            let d = ((x as f32 - c[0]).powi(2) + (y as f32 - c[1]).powi(2)).sqrt();
            if d <= r && keep(d) {
                img.put_pixel(x, y, Luma([INK]));
            }
        }
    }
}

/// Rotate about the canvas center by `deg` (positive turns rows to descend
/// to the right), sampling bilinearly; uncovered pixels become paper.
fn rotate_bilinear(src: &GrayImage, deg: f32) -> GrayImage {
    let (w, h) = src.dimensions();
    let c = [0.5 * w as f32, 0.5 * h as f32];
    let (s, co) = deg.to_radians().sin_cos();
    let sample = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            PAPER as f32
        } else {
            src.get_pixel(x as u32, y as u32)[0] as f32
        }
    };
    GrayImage::from_fn(w, h, |x, y| {
        let (dx, dy) = (x as f32 - c[0], y as f32 - c[1]);
        let sx = c[0] + co * dx + s * dy;
        let sy = c[1] - s * dx + co * dy;
        let (x0, y0) = (sx.floor(), sy.floor());
        let (fx, fy) = (sx - x0, sy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let v = sample(x0, y0) * (1.0 - fx) * (1.0 - fy)
            + sample(x0 + 1, y0) * fx * (1.0 - fy)
            + sample(x0, y0 + 1) * (1.0 - fx) * fy
            + sample(x0 + 1, y0 + 1) * fx * fy;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

fn apply_noise(img: &mut GrayImage, noise: &Noise) {
    let mut rng = StdRng::seed_from_u64(noise.seed);
    let w = img.width() as f32;
    for (x, _, p) in img.enumerate_pixels_mut() {
        let shade = 1.0 - noise.shading * x as f32 / w;
        let jitter = if noise.amplitude > 0 {
            rng.gen_range(-noise.amplitude..=noise.amplitude)
        } else {
            0
        };
        let v = (p[0] as f32 * shade) as i16 + jitter;
        p[0] = v.clamp(0, 255) as u8;
    }
    let (iw, ih) = img.dimensions();
    for _ in 0..noise.specks {
        let x = rng.gen_range(0..iw);
        let y = rng.gen_range(0..ih);
        img.put_pixel(x, y, Luma([0]));
    }
}

/// Deterministic pseudo-random answer per question.
pub fn random_answers(questions: usize, options: usize, seed: u64) -> BTreeMap<u32, usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=questions as u32)
        .map(|q| (q, rng.gen_range(0..options)))
        .collect()
}

pub fn key_from(answers: &BTreeMap<u32, usize>) -> AnswerKey {
    AnswerKey::new(answers.clone())
}
