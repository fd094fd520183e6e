#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod reshaper;

use reshaper::ReshaperConfiguration;

/// Whether right-to-left shaping can be performed by this process. It is resolved once when
/// the program starts and handed to the `TextShaper`, which keeps it for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapingCapability {
    Available,
    Unavailable,
}

impl ShapingCapability {
    /// Shaping is available when the crate has been built with the `shaping` feature.
    pub fn detect() -> ShapingCapability {
        if cfg!(feature = "shaping") {
            ShapingCapability::Available
        } else {
            ShapingCapability::Unavailable
        }
    }

    /// Like `detect`, but lets the caller switch shaping off.
    pub fn detect_if_enabled(enabled: bool) -> ShapingCapability {
        if enabled {
            ShapingCapability::detect()
        } else {
            ShapingCapability::Unavailable
        }
    }
}

/// Turns logical-order text, possibly in an Arabic script, into the joined and visually
/// ordered text expected by a renderer which lays glyphs out from left to right.
#[derive(Debug, Clone)]
pub struct TextShaper {
    capability: ShapingCapability,
    configuration: ReshaperConfiguration,
}

impl TextShaper {
    pub fn new(capability: ShapingCapability) -> TextShaper {
        TextShaper {
            capability,
            configuration: ReshaperConfiguration::persian(),
        }
    }

    pub fn capability(&self) -> ShapingCapability {
        self.capability
    }

    /// Shapes the text, a missing text being shaped as the empty string. This never fails:
    /// when the text cannot be reshaped it is returned as it was given.
    pub fn shape(&self, text: Option<&str>) -> String {
        let Some(text) = text else {
            return String::new();
        };
        if self.capability == ShapingCapability::Unavailable {
            return text.to_string();
        }

        let reshaped_text = match reshaper::reshape(text, &self.configuration) {
            Ok(reshaped_text) => reshaped_text,
            Err(error) => {
                log::warn!("Error reshaping the text {:?}: {}", text, error);
                // Retry with the default configuration before giving up
                match reshaper::reshape(text, &ReshaperConfiguration::default()) {
                    Ok(reshaped_text) => reshaped_text,
                    Err(_) => return text.to_string(),
                }
            }
        };

        visual_order(&reshaped_text)
    }

    pub fn shape_str(&self, text: &str) -> String {
        self.shape(Some(text))
    }
}

/// Reorders every paragraph of the text from logical to visual order with the Unicode
/// bidirectional algorithm, the paragraph direction being detected from its content.
/// Right-to-left runs are reversed with their brackets mirrored.
#[cfg(feature = "shaping")]
fn visual_order(text: &str) -> String {
    let bidi_info = unicode_bidi::BidiInfo::new(text, None);
    let mut visual_text = String::with_capacity(text.len());

    for paragraph in &bidi_info.paragraphs {
        let (levels, runs) = bidi_info.visual_runs(paragraph, paragraph.range.clone());
        for run in runs {
            if levels[run.start].is_rtl() {
                visual_text.extend(
                    text[run]
                        .chars()
                        .rev()
                        .map(|character| unicode_bidi_mirroring::get_mirrored(character).unwrap_or(character)),
                );
            } else {
                visual_text.push_str(&text[run]);
            }
        }
    }

    visual_text
}

#[cfg(not(feature = "shaping"))]
fn visual_order(text: &str) -> String {
    text.to_string()
}
