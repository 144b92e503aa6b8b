//! Configuration persistence and the fixed problem-label color table

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ShapeKind;

/// The six predefined problem labels and their colors, in legend order.
pub const PROBLEM_LABELS: [(&str, &str); 6] = [
    ("Inflammed/Red gums", "#A855F7"),
    ("Malaligned", "#EAB308"),
    ("Receded gums", "#78716C"),
    ("Stains", "#EF4444"),
    ("Attrition", "#22D3EE"),
    ("Crowns", "#EC4899"),
];

/// Color used for labels outside the fixed table.
pub const FALLBACK_COLOR: ShapeColor = ShapeColor {
    r: 136.0 / 255.0,
    g: 136.0 / 255.0,
    b: 136.0 / 255.0,
};

/// Serializable color representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Default for ShapeColor {
    fn default() -> Self {
        FALLBACK_COLOR
    }
}

impl ShapeColor {
    /// Parse a `#RRGGBB` or `#RGB` hex string
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return None,
        };
        let channel = |i: usize| -> Option<f32> {
            let value = u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok()?;
            Some(f32::from(value) / 255.0)
        };
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Convert to image crate RGBA format (0-255)
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [
            (self.r * 255.0).round() as u8,
            (self.g * 255.0).round() as u8,
            (self.b * 255.0).round() as u8,
            255,
        ]
    }
}

/// Look up the color for a problem label.
///
/// Labels outside [`PROBLEM_LABELS`] are legal and always map to
/// [`FALLBACK_COLOR`].
pub fn label_color(label: &str) -> ShapeColor {
    PROBLEM_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .and_then(|(_, hex)| ShapeColor::from_hex(hex))
        .unwrap_or(FALLBACK_COLOR)
}

/// Whether the label is one of the six predefined ones
pub fn is_known_label(label: &str) -> bool {
    PROBLEM_LABELS.iter().any(|(name, _)| *name == label)
}

/// Drawing tool selected in the annotation toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Rectangle,
    Circle,
    Arrow,
    Freehand,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Rectangle, Tool::Circle, Tool::Arrow, Tool::Freehand];

    /// Get the next tool in the cycle
    pub fn next(self) -> Self {
        match self {
            Tool::Rectangle => Tool::Circle,
            Tool::Circle => Tool::Arrow,
            Tool::Arrow => Tool::Freehand,
            Tool::Freehand => Tool::Rectangle,
        }
    }

    /// Display name for toolbars
    pub fn name(self) -> &'static str {
        match self {
            Tool::Rectangle => "Rectangle",
            Tool::Circle => "Circle",
            Tool::Arrow => "Arrow",
            Tool::Freehand => "Freehand",
        }
    }

    /// Shape kind produced by this tool
    pub fn shape_kind(self) -> ShapeKind {
        match self {
            Tool::Rectangle => ShapeKind::Rectangle,
            Tool::Circle => ShapeKind::Circle,
            Tool::Arrow => ShapeKind::Arrow,
            Tool::Freehand => ShapeKind::Freehand,
        }
    }

    /// Freehand shapes come from strokes; the others are added whole
    pub fn is_stroke_tool(self) -> bool {
        matches!(self, Tool::Freehand)
    }
}

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// JPEG quality of the flattened annotated image (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Stroke width for shapes in canvas pixels
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
    /// Tool selected when a session opens
    #[serde(default)]
    pub default_tool: Tool,
    /// Problem label selected when a session opens
    #[serde(default = "default_label")]
    pub default_label: String,
    /// Where the directory-backed stores keep their files
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Title printed in the report header
    #[serde(default = "default_report_title")]
    pub report_title: String,
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_stroke_width() -> f32 {
    3.0
}

fn default_label() -> String {
    "Stains".to_string()
}

fn default_report_title() -> String {
    "Oral Health Screening Report".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            stroke_width: default_stroke_width(),
            default_tool: Tool::default(),
            default_label: default_label(),
            data_dir: None,
            report_title: default_report_title(),
        }
    }
}

impl AppConfig {
    /// Directory name used under the platform config and data dirs
    pub const ID: &'static str = "oralscreen";

    /// Location of the config file, if the platform has a config dir
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(err) => {
                log::warn!("Could not read config {}: {:?}", path.display(), err);
                return Self::default();
            }
        };
        match serde_json::from_str::<Self>(&text) {
            Ok(config) => config.sanitized(),
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    /// Save configuration to the platform config dir and return its path
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory available")
        })?;
        self.save_to(&path)?;
        log::info!("Saved configuration to {}", path.display());
        Ok(path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Data directory for the directory-backed stores
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
                .unwrap_or_else(|| PathBuf::from("."))
                .join(Self::ID)
        })
    }

    fn sanitized(mut self) -> Self {
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            self.stroke_width = default_stroke_width();
        }
        if self.default_label.trim().is_empty() {
            self.default_label = default_label();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_color_lookup() {
        let stains = label_color("Stains");
        assert_eq!(stains.to_rgba_u8(), [0xEF, 0x44, 0x44, 255]);
        let crowns = label_color("Crowns");
        assert_eq!(crowns.to_rgba_u8(), [0xEC, 0x48, 0x99, 255]);
    }

    #[test]
    fn test_unknown_label_uses_fallback() {
        assert_eq!(label_color("Chipped enamel"), FALLBACK_COLOR);
        assert_eq!(label_color(""), FALLBACK_COLOR);
        assert_eq!(FALLBACK_COLOR.to_rgba_u8(), [136, 136, 136, 255]);
        assert!(!is_known_label("Chipped enamel"));
        assert!(is_known_label("Receded gums"));
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(
            ShapeColor::from_hex("#888").map(ShapeColor::to_rgba_u8),
            Some([136, 136, 136, 255])
        );
        assert!(ShapeColor::from_hex("#12345").is_none());
        assert!(ShapeColor::from_hex("#GG0000").is_none());
    }

    #[test]
    fn test_tool_cycle() {
        let mut tool = Tool::default();
        for _ in 0..Tool::ALL.len() {
            tool = tool.next();
        }
        assert_eq!(tool, Tool::Rectangle);
        assert!(Tool::Freehand.is_stroke_tool());
        assert_eq!(Tool::Arrow.shape_kind(), ShapeKind::Arrow);
        assert_eq!(Tool::Freehand.name(), "Freehand");
    }

    #[test]
    fn test_config_roundtrip_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        // Missing file falls back to defaults
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());

        let config = AppConfig {
            jpeg_quality: 75,
            default_label: "Crowns".to_string(),
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path), config);

        // Corrupt file falls back to defaults
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn test_config_partial_and_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"jpeg_quality": 0, "stroke_width": -2.0}"#).unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.jpeg_quality, 1);
        assert_eq!(config.stroke_width, 3.0);
        assert_eq!(config.default_label, "Stains");
    }
}
