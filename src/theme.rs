// Theme module - console colors for narration output
use crossterm::style::Color;

use crate::types::Label;

pub struct NarrationTheme;

impl NarrationTheme {
    pub fn label() -> Color {
        Color::Rgb { r: 152, g: 195, b: 121 }  // Soft green
    }

    pub fn section_text() -> Color {
        Color::Rgb { r: 219, g: 112, b: 147 }  // Soft pink
    }

    pub fn body_text() -> Color {
        Color::Rgb { r: 176, g: 196, b: 222 }  // Light steel blue
    }

    pub fn text_for(label: Label) -> Color {
        match label {
            Label::SectionHeader => Self::section_text(),
            _ => Self::body_text(),
        }
    }
}
