//! 5x7 bitmap font for confidence labels.

use crate::shared::frame::Frame;

const GLYPH_W: i32 = 5;
const GLYPH_H: i32 = 7;
/// Glyph width plus one blank column.
const ADVANCE: i32 = GLYPH_W + 1;

fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        _ => [0; 7],
    }
}

pub fn text_width(text: &str, scale: i32) -> i32 {
    let n = text.chars().count() as i32;
    if n == 0 {
        0
    } else {
        (n * ADVANCE - 1) * scale
    }
}

pub fn text_height(scale: i32) -> i32 {
    GLYPH_H * scale
}

/// Rasterized text as a row-major coverage mask of
/// `text_width x text_height`.
fn text_mask(text: &str, scale: i32) -> Vec<bool> {
    let w = text_width(text, scale) as usize;
    let h = text_height(scale) as usize;
    let mut mask = vec![false; w * h];
    for (i, ch) in text.chars().enumerate() {
        let origin = i as i32 * ADVANCE * scale;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_W {
                if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let u = (origin + col * scale + dx) as usize;
                        let v = row * scale as usize + dy as usize;
                        mask[v * w + u] = true;
                    }
                }
            }
        }
    }
    mask
}

/// Draws `text` with its top-left corner at `(x, y)`.
///
/// With `mirrored` set the glyphs are laid down flipped within the same
/// `text_width` span, so they read upright once the surface is displayed
/// mirrored. Pixels outside the frame are dropped.
pub fn draw_text(
    frame: &mut Frame,
    x: i32,
    y: i32,
    text: &str,
    scale: i32,
    color: [u8; 3],
    mirrored: bool,
) {
    let w = text_width(text, scale);
    let h = text_height(scale);
    if w == 0 {
        return;
    }
    let mask = text_mask(text, scale);
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let c = frame.channels() as usize;
    let data = frame.data_mut();
    for v in 0..h {
        for u in 0..w {
            if !mask[(v * w + u) as usize] {
                continue;
            }
            let px = if mirrored { x + w - 1 - u } else { x + u };
            let py = y + v;
            if px < 0 || py < 0 || px >= fw || py >= fh {
                continue;
            }
            let offset = (py as usize * fw as usize + px as usize) * c;
            data[offset..offset + 3].copy_from_slice(&color);
        }
    }
}
