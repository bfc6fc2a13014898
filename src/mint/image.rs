//! Placeholder artwork rendering
//!
//! Every minted collectible gets a small PNG: a randomized solid background
//! with the asset label burned into the pixels. Purely cosmetic — the only
//! requirement is a viewable image artifact.

use image::{Rgb, RgbImage};
use rand::Rng;

/// Canvas size of generated artwork, in pixels.
pub const CANVAS_SIZE: u32 = 200;

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
const GLYPH_SCALE: u32 = 4;
const GLYPH_GAP: u32 = GLYPH_SCALE;

/// 3x5 bitmap glyphs for the characters that can appear in an asset label
/// (digits plus "NFT-"). Rows are bottom three bits of each byte.
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'N' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => [0b000, 0b000, 0b000, 0b000, 0b000],
    }
}

/// Render the placeholder image for a freshly minted asset.
///
/// The background color is randomized per mint; the label is drawn centered
/// in white. Labels too wide for the canvas are truncated, not wrapped.
pub fn render_placeholder(label: &str) -> RgbImage {
    let mut rng = rand::thread_rng();
    let background = Rgb([rng.gen_range(0..=255u8), rng.gen_range(0..=255u8), rng.gen_range(0..=255u8)]);

    let mut img = RgbImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, background);

    let glyph_advance = GLYPH_WIDTH * GLYPH_SCALE + GLYPH_GAP;
    let max_chars = (CANVAS_SIZE / glyph_advance) as usize;
    let label: String = label.chars().take(max_chars).collect();

    let text_width = (label.chars().count() as u32 * glyph_advance).saturating_sub(GLYPH_GAP);
    let origin_x = CANVAS_SIZE.saturating_sub(text_width) / 2;
    let origin_y = (CANVAS_SIZE - GLYPH_HEIGHT * GLYPH_SCALE) / 2;

    let ink = Rgb([255, 255, 255]);
    for (i, c) in label.chars().enumerate() {
        let rows = glyph(c.to_ascii_uppercase());
        let base_x = origin_x + i as u32 * glyph_advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let x = base_x + col * GLYPH_SCALE + dx;
                        let y = origin_y + row as u32 * GLYPH_SCALE + dy;
                        if x < CANVAS_SIZE && y < CANVAS_SIZE {
                            img.put_pixel(x, y, ink);
                        }
                    }
                }
            }
        }
    }

    img
}
