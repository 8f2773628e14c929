//! QR codes for upload links.

use std::fmt::Write;

use photowall_common::{AppError, AppResult};
use qrcode::{Color, QrCode};

/// Quiet zone around the code, in modules.
const QUIET_ZONE: usize = 4;

/// Square module matrix of a QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encode `data`.
    pub fn encode(data: &str) -> AppResult<Self> {
        let code = QrCode::new(data.as_bytes())
            .map_err(|e| AppError::Internal(format!("Failed to encode QR code: {e}")))?;
        Ok(Self {
            width: code.width(),
            dark: code
                .to_colors()
                .into_iter()
                .map(|c| c == Color::Dark)
                .collect(),
        })
    }

    /// Modules per side, without quiet zone.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Path data drawing every dark module as a unit square, offset by `origin`.
    ///
    /// Horizontal runs are merged into one rectangle.
    #[must_use]
    pub fn path_data(&self, origin: usize) -> String {
        let mut path = String::new();
        for y in 0..self.width {
            let mut x = 0;
            while x < self.width {
                if !self.is_dark(x, y) {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < self.width && self.is_dark(x, y) {
                    x += 1;
                }
                let _ = write!(
                    path,
                    "M{} {}h{}v1h-{}z",
                    start + origin,
                    y + origin,
                    x - start,
                    x - start
                );
            }
        }
        path
    }
}

/// Standalone SVG of a QR code with white quiet zone.
pub fn qr_svg(data: &str) -> AppResult<String> {
    let matrix = QrMatrix::encode(data)?;
    let size = matrix.width() + 2 * QUIET_ZONE;
    Ok(format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {size} {size}" "#,
            r#"shape-rendering="crispEdges">"#,
            r##"<rect width="{size}" height="{size}" fill="#ffffff"/>"##,
            r##"<path d="{path}" fill="#000000"/></svg>"##
        ),
        size = size,
        path = matrix.path_data(QUIET_ZONE),
    ))
}
