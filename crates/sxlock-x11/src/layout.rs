//! Placement of the prompt on the selected output

use crate::geometry::OutputGeometry;

/// Vertical distance between the rule and each text line
pub const LINE_DIST: i32 = 15;

/// Text positions around the output centre
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLayout {
    base_x: i32,
    base_y: i32,
    half_rule: i32,
    ascent: i32,
}

impl TextLayout {
    pub fn new(output: OutputGeometry, ascent: i16) -> Self {
        Self {
            base_x: i32::from(output.x) + i32::from(output.width) / 2,
            base_y: i32::from(output.y) + i32::from(output.height) / 2,
            half_rule: i32::from(output.width) / 8,
            ascent: i32::from(ascent),
        }
    }

    /// Baseline origin of the username, centred above the rule
    pub fn username_origin(&self, text_width: i32) -> (i16, i16) {
        clamp_point(self.base_x - text_width / 2, self.base_y - LINE_DIST)
    }

    /// Endpoints of the horizontal rule
    pub fn rule(&self) -> ((i16, i16), (i16, i16)) {
        (
            clamp_point(self.base_x - self.half_rule, self.base_y),
            clamp_point(self.base_x + self.half_rule, self.base_y),
        )
    }

    /// Baseline origin of the indicator, centred below the rule
    pub fn indicator_origin(&self, text_width: i32) -> (i16, i16) {
        clamp_point(
            self.base_x - text_width / 2,
            self.base_y + self.ascent + LINE_DIST,
        )
    }
}

fn clamp_point(x: i32, y: i32) -> (i16, i16) {
    (clamp(x), clamp(y))
}

fn clamp(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Encodes text for an 8-bit core font; characters outside Latin-1 become `?`
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
