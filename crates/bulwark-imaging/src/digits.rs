//! Seven-segment digit rendering. Keeps number stamping free of any font
//! files: every glyph is a handful of filled rectangles.

use image::{Rgba, RgbaImage};

/// Segment bits per digit: a=1 (top), b=2 (upper right), c=4 (lower right),
/// d=8 (bottom), e=16 (lower left), f=32 (upper left), g=64 (middle).
const SEGMENTS: [u8; 10] = [
    0b011_1111, // 0
    0b000_0110, // 1
    0b101_1011, // 2
    0b100_1111, // 3
    0b110_0110, // 4
    0b110_1101, // 5
    0b111_1101, // 6
    0b000_0111, // 7
    0b111_1111, // 8
    0b110_1111, // 9
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    fn grow(self, by: u32) -> Self {
        Self {
            x: self.x - by as i64,
            y: self.y - by as i64,
            w: self.w + 2 * by,
            h: self.h + 2 * by,
        }
    }

    fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stroke {
    pub fill: Rgba<u8>,
    pub outline: Rgba<u8>,
    pub outline_width: u32,
}

fn glyph_width(height: u32) -> u32 {
    (height / 2).max(1)
}

fn thickness(height: u32) -> u32 {
    (height / 8).max(2)
}

/// Rectangles making up `digit` at the given glyph height, relative to the
/// glyph's top-left corner.
pub fn glyph_rects(digit: u8, height: u32) -> Vec<Rect> {
    let Some(&bits) = SEGMENTS.get(digit as usize) else {
        return Vec::new();
    };

    let w = glyph_width(height);
    let t = thickness(height).min(w);
    let mid = (height / 2) as i64;
    let half_t = (t / 2) as i64;
    let upper_h = (mid + half_t).max(1) as u32;
    let lower_y = mid - half_t;
    let lower_h = (height as i64 - lower_y).max(1) as u32;

    let segments = [
        Rect { x: 0, y: 0, w, h: t },
        Rect { x: (w - t) as i64, y: 0, w: t, h: upper_h },
        Rect { x: (w - t) as i64, y: lower_y, w: t, h: lower_h },
        Rect { x: 0, y: height as i64 - t as i64, w, h: t },
        Rect { x: 0, y: lower_y, w: t, h: lower_h },
        Rect { x: 0, y: 0, w: t, h: upper_h },
        Rect { x: 0, y: lower_y, w, h: t },
    ];

    segments
        .into_iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, r)| r)
        .collect()
}

/// Horizontal space `text` takes at the given glyph height.
pub fn text_width(text: &str, height: u32) -> u32 {
    let n = text.chars().filter(char::is_ascii_digit).count() as u32;
    if n == 0 {
        return 0;
    }
    n * glyph_width(height) + (n - 1) * thickness(height)
}

/// Stamp the decimal form of `number` with its top-left corner at (`x`, `y`).
/// Anything falling outside the image is clipped.
pub fn draw_number(img: &mut RgbaImage, number: i64, x: i64, y: i64, height: u32, stroke: Stroke) {
    let text = number.to_string();
    let advance = (glyph_width(height) + thickness(height)) as i64;

    let rects: Vec<Rect> = text
        .bytes()
        .filter(u8::is_ascii_digit)
        .enumerate()
        .flat_map(|(i, b)| {
            glyph_rects(b - b'0', height)
                .into_iter()
                .map(move |r| r.offset(x + i as i64 * advance, y))
        })
        .collect();

    // Outline everything first so neighbouring segments don't paint over
    // each other's fill.
    if stroke.outline_width > 0 {
        for r in &rects {
            fill_rect(img, r.grow(stroke.outline_width), stroke.outline);
        }
    }
    for r in &rects {
        fill_rect(img, *r, stroke.fill);
    }
}

fn fill_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let (iw, ih) = img.dimensions();
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.w as i64).min(iw as i64);
    let y1 = (rect.y + rect.h as i64).min(ih as i64);

    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn eight_lights_every_segment() {
        assert_eq!(glyph_rects(8, 40).len(), 7);
        assert_eq!(glyph_rects(1, 40).len(), 2);
        assert!(glyph_rects(12, 40).is_empty());
    }

    #[test]
    fn width_grows_with_digit_count() {
        assert_eq!(text_width("", 40), 0);
        assert!(text_width("12", 40) > text_width("1", 40));
    }

    #[test]
    fn stamps_fill_over_outline() {
        let mut img = RgbaImage::from_pixel(60, 60, BLACK);
        let stroke = Stroke {
            fill: RED,
            outline: WHITE,
            outline_width: 2,
        };

        draw_number(&mut img, 7, 10, 10, 20, stroke);

        // inside the top bar of the 7
        assert_eq!(*img.get_pixel(14, 10), RED);
        // just above it, inside the outline
        assert_eq!(*img.get_pixel(14, 9), WHITE);
        // far away, untouched
        assert_eq!(*img.get_pixel(55, 55), BLACK);
    }

    #[test]
    fn clips_at_image_edges() {
        let mut img = RgbaImage::from_pixel(8, 8, BLACK);
        let stroke = Stroke {
            fill: RED,
            outline: WHITE,
            outline_width: 3,
        };
        draw_number(&mut img, 1234, -5, -5, 30, stroke);
        draw_number(&mut img, 9, 6, 6, 30, stroke);
    }
}
