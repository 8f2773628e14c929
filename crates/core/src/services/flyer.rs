//! Printable flyers inviting guests to upload.
//!
//! A flyer is composed as SVG, rasterised with resvg at the paper size and
//! resolution, and optionally packaged as a single page PDF.

use std::fmt::Write as _;
use std::io::{Cursor, Write as _};
use std::sync::{Arc, LazyLock};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use photowall_common::{AppError, AppResult};
use regex::Regex;
use resvg::{tiny_skia, usvg};
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use super::event::EventService;
use super::qr::QrMatrix;

const MM_PER_INCH: f32 = 25.4;
const PT_PER_INCH: f32 = 72.0;
/// Margin around the flyer on the PDF page.
const PDF_MARGIN_MM: f32 = 10.0;

#[allow(clippy::unwrap_used)]
static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// Supported paper formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    A5,
    A6,
    Letter,
}

impl PaperSize {
    /// Portrait width and height in millimetres.
    #[must_use]
    pub const fn dimensions_mm(self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::A6 => (105.0, 148.0),
            Self::Letter => (215.9, 279.4),
        }
    }

    /// Pixel size when printed at `dpi`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn pixels(self, dpi: u32) -> (u32, u32) {
        let (w, h) = self.dimensions_mm();
        let scale = dpi as f32 / MM_PER_INCH;
        ((w * scale).round() as u32, (h * scale).round() as u32)
    }

    /// Size in PDF points.
    #[must_use]
    pub fn points(self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (mm_to_pt(w), mm_to_pt(h))
    }
}

fn mm_to_pt(mm: f32) -> f32 {
    mm / MM_PER_INCH * PT_PER_INCH
}

fn validate_color(color: &str) -> Result<(), validator::ValidationError> {
    if HEX_COLOR.is_match(color) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("hex_color"))
    }
}

fn default_primary() -> String {
    "#e11d48".to_string()
}

fn default_background() -> String {
    "#ffffff".to_string()
}

fn default_text() -> String {
    "#111827".to_string()
}

fn default_font() -> String {
    "sans-serif".to_string()
}

const fn default_qr_size() -> u32 {
    45
}

const fn default_dpi() -> u32 {
    150
}

/// Organizer choices for a flyer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FlyerOptions {
    /// Heading, defaults to the event name.
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 300))]
    #[serde(default)]
    pub message: String,
    #[validate(length(max = 600))]
    #[serde(default)]
    pub instructions: String,
    #[validate(length(max = 120))]
    #[serde(default)]
    pub footer: String,
    #[validate(custom(function = "validate_color"))]
    #[serde(default = "default_primary")]
    pub primary_color: String,
    #[validate(custom(function = "validate_color"))]
    #[serde(default = "default_background")]
    pub background_color: String,
    #[validate(custom(function = "validate_color"))]
    #[serde(default = "default_text")]
    pub text_color: String,
    #[validate(length(min = 1, max = 64))]
    #[serde(default = "default_font")]
    pub font_family: String,
    /// QR code width in percent of the paper width.
    #[validate(range(min = 20, max = 80))]
    #[serde(default = "default_qr_size")]
    pub qr_size: u32,
    #[serde(default)]
    pub show_password: bool,
    #[serde(default)]
    pub paper: PaperSize,
    #[validate(range(min = 72, max = 300))]
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl Default for FlyerOptions {
    fn default() -> Self {
        Self {
            title: None,
            message: String::new(),
            instructions: String::new(),
            footer: String::new(),
            primary_color: default_primary(),
            background_color: default_background(),
            text_color: default_text(),
            font_family: default_font(),
            qr_size: default_qr_size(),
            show_password: false,
            paper: PaperSize::default(),
            dpi: default_dpi(),
        }
    }
}

/// Everything printed on one flyer.
#[derive(Debug, Clone)]
pub struct FlyerContent {
    pub title: String,
    pub upload_url: String,
    pub password: Option<String>,
    pub options: FlyerOptions,
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Greedy word wrap. Paragraph breaks in `text` are kept.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > max_chars {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

fn text_block(
    svg: &mut String,
    lines: &[String],
    center_x: f32,
    mut y: f32,
    font_size: f32,
    fill: &str,
    weight: &str,
) -> f32 {
    for line in lines {
        let _ = write!(
            svg,
            r#"<text x="{center_x:.1}" y="{y:.1}" font-size="{font_size:.1}" font-weight="{weight}" fill="{fill}" text-anchor="middle">{}</text>"#,
            escape_xml(line)
        );
        y += font_size * 1.35;
    }
    y
}

/// Compose the flyer as an SVG document sized `width` × `height` pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn compose_svg(content: &FlyerContent, width: u32, height: u32) -> AppResult<String> {
    let options = &content.options;
    let (w, h) = (width as f32, height as f32);
    let cx = w / 2.0;
    let chars_per_line = |font_size: f32| ((w * 0.84) / (font_size * 0.55)).max(8.0) as usize;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="{}">"#,
        escape_xml(&options.font_family)
    );
    let _ = write!(
        svg,
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        options.background_color
    );
    let _ = write!(
        svg,
        r#"<rect width="{width}" height="{:.1}" fill="{}"/>"#,
        h * 0.015,
        options.primary_color
    );

    let heading_size = w * 0.07;
    let heading = wrap(&content.title, chars_per_line(heading_size));
    let mut y = text_block(
        &mut svg,
        &heading,
        cx,
        h * 0.1,
        heading_size,
        &options.primary_color,
        "bold",
    );

    let message_size = w * 0.04;
    y = text_block(
        &mut svg,
        &wrap(&options.message, chars_per_line(message_size)),
        cx,
        y + message_size * 0.5,
        message_size,
        &options.text_color,
        "normal",
    );

    let matrix = QrMatrix::encode(&content.upload_url)?;
    let qr_width = w * options.qr_size as f32 / 100.0;
    let padding = qr_width * 0.06;
    let qr_top = y.max(h * 0.25) + padding;
    let module = qr_width / matrix.width() as f32;
    let _ = write!(
        svg,
        r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="{:.1}" fill="#ffffff"/>"##,
        cx - qr_width / 2.0 - padding,
        qr_top - padding,
        qr_width + 2.0 * padding,
        qr_width + 2.0 * padding,
        padding
    );
    let _ = write!(
        svg,
        r##"<path transform="translate({:.2} {:.2}) scale({module:.4})" d="{}" fill="#000000" shape-rendering="crispEdges"/>"##,
        cx - qr_width / 2.0,
        qr_top,
        matrix.path_data(0)
    );

    let instructions_size = w * 0.032;
    y = text_block(
        &mut svg,
        &wrap(&options.instructions, chars_per_line(instructions_size)),
        cx,
        qr_top + qr_width + padding + instructions_size * 2.0,
        instructions_size,
        &options.text_color,
        "normal",
    );

    if let Some(password) = content.password.as_deref().filter(|_| options.show_password) {
        text_block(
            &mut svg,
            &[format!("Passwort: {password}")],
            cx,
            y + instructions_size * 0.5,
            instructions_size,
            &options.primary_color,
            "bold",
        );
    }

    let footer = if options.footer.is_empty() {
        content.upload_url.as_str()
    } else {
        options.footer.as_str()
    };
    text_block(
        &mut svg,
        &[footer.to_string()],
        cx,
        h * 0.96,
        w * 0.022,
        &options.text_color,
        "normal",
    );

    svg.push_str("</svg>");
    Ok(svg)
}

/// Light red canvas with a cross, drawn when rendering fails.
#[must_use]
pub fn error_placeholder(width: u32, height: u32) -> RgbaImage {
    let background = Rgba([254, 226, 226, 255]);
    let ink = Rgba([220, 38, 38, 255]);
    let stroke = (width.min(height) / 100).max(2);
    let mut image = RgbaImage::from_pixel(width.max(1), height.max(1), background);
    let (w, h) = (u64::from(image.width()), u64::from(image.height()));

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let (x64, y64) = (u64::from(x), u64::from(y));
        let border = x < stroke || y < stroke || x + stroke >= width || y + stroke >= height;
        // Distance of (x, y) to both diagonals, scaled by the longer side.
        let diagonal = (x64 * h).abs_diff(y64 * w) <= u64::from(stroke) * w.max(h)
            || (x64 * h).abs_diff((h - 1 - y64.min(h - 1)) * w) <= u64::from(stroke) * w.max(h);
        if border || diagonal {
            *pixel = ink;
        }
    }
    image
}

/// Rasterise an SVG document to `width` × `height` pixels.
#[allow(clippy::cast_precision_loss)]
pub fn rasterize(
    svg: &str,
    width: u32,
    height: u32,
    fontdb: &Arc<usvg::fontdb::Database>,
) -> AppResult<RgbaImage> {
    let options = usvg::Options {
        fontdb: fontdb.clone(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| AppError::Internal(format!("Invalid flyer SVG: {e}")))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| AppError::Internal("Invalid flyer size".to_string()))?;
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / tree.size().width(),
        height as f32 / tree.size().height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().into())
        .ok_or_else(|| AppError::Internal("Failed to convert flyer bitmap".to_string()))
}

/// Render a flyer. Failures yield [`error_placeholder`].
#[must_use]
pub fn render_flyer(content: &FlyerContent, fontdb: &Arc<usvg::fontdb::Database>) -> RgbaImage {
    let (width, height) = content.options.paper.pixels(content.options.dpi);
    compose_svg(content, width, height)
        .and_then(|svg| rasterize(&svg, width, height, fontdb))
        .unwrap_or_else(|e| {
            warn!(error = %e, "Flyer rendering failed");
            error_placeholder(width, height)
        })
}

/// Encode a bitmap as PNG.
pub fn encode_png(image: RgbaImage) -> AppResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to encode PNG: {e}")))?;
    Ok(buffer.into_inner())
}

/// Where an image of `image_size` pixels lands on `page` (points): `(x, y, w, h)`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn pdf_placement(page: (f32, f32), image_size: (u32, u32)) -> (f32, f32, f32, f32) {
    let margin = mm_to_pt(PDF_MARGIN_MM);
    let (avail_w, avail_h) = (page.0 - 2.0 * margin, page.1 - 2.0 * margin);
    let (iw, ih) = (image_size.0.max(1) as f32, image_size.1.max(1) as f32);
    let scale = (avail_w / iw).min(avail_h / ih);
    let (w, h) = (iw * scale, ih * scale);
    ((page.0 - w) / 2.0, (page.1 - h) / 2.0, w, h)
}

/// Package a bitmap as a single page PDF of the given paper size.
pub fn package_pdf(image: RgbaImage, paper: PaperSize) -> AppResult<Vec<u8>> {
    let (img_w, img_h) = image.dimensions();
    let mut jpeg = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8())
        .write_to(&mut jpeg, ImageFormat::Jpeg)
        .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {e}")))?;
    let jpeg = jpeg.into_inner();

    let (page_w, page_h) = paper.points();
    let (x, y, w, h) = pdf_placement((page_w, page_h), (img_w, img_h));
    let contents = format!("q\n{w:.2} 0 0 {h:.2} {x:.2} {y:.2} cm\n/Im0 Do\nQ\n");

    let mut pdf: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(5);
    let io = |e: std::io::Error| AppError::Internal(format!("Failed to write PDF: {e}"));

    offsets.push(pdf.len());
    pdf.write_all(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n")
        .map_err(io)?;
    offsets.push(pdf.len());
    pdf.write_all(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n")
        .map_err(io)?;
    offsets.push(pdf.len());
    write!(
        pdf,
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {page_w:.2} {page_h:.2}] \
         /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>\nendobj\n"
    )
    .map_err(io)?;
    offsets.push(pdf.len());
    write!(
        pdf,
        "4 0 obj\n<< /Type /XObject /Subtype /Image /Width {img_w} /Height {img_h} \
         /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
        jpeg.len()
    )
    .map_err(io)?;
    pdf.write_all(&jpeg).map_err(io)?;
    pdf.write_all(b"\nendstream\nendobj\n").map_err(io)?;
    offsets.push(pdf.len());
    write!(
        pdf,
        "5 0 obj\n<< /Length {} >>\nstream\n{contents}endstream\nendobj\n",
        contents.len()
    )
    .map_err(io)?;

    let xref = pdf.len();
    write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1).map_err(io)?;
    for offset in &offsets {
        write!(pdf, "{offset:010} 00000 n \n").map_err(io)?;
    }
    write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        offsets.len() + 1
    )
    .map_err(io)?;

    Ok(pdf)
}

/// Flyer service.
#[derive(Clone)]
pub struct FlyerService {
    events: EventService,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl FlyerService {
    /// Create a flyer service, loading the system fonts once.
    #[must_use]
    pub fn new(events: EventService) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        Self {
            events,
            fontdb: Arc::new(fontdb),
        }
    }

    async fn content(
        &self,
        owner_id: &str,
        event_id: &str,
        options: FlyerOptions,
    ) -> AppResult<FlyerContent> {
        options.validate()?;
        let event = self.events.get_owned(owner_id, event_id).await?;
        let password = if options.show_password {
            self.events.password(owner_id, event_id).await?
        } else {
            None
        };

        Ok(FlyerContent {
            title: options.title.clone().unwrap_or_else(|| event.name.clone()),
            upload_url: self.events.upload_url(&event.code),
            password,
            options,
        })
    }

    async fn render(&self, content: FlyerContent) -> AppResult<RgbaImage> {
        let fontdb = self.fontdb.clone();
        tokio::task::spawn_blocking(move || render_flyer(&content, &fontdb))
            .await
            .map_err(|e| AppError::Internal(format!("Flyer rendering task failed: {e}")))
    }

    /// PNG preview of a flyer.
    pub async fn preview_png(
        &self,
        owner_id: &str,
        event_id: &str,
        options: FlyerOptions,
    ) -> AppResult<Vec<u8>> {
        let content = self.content(owner_id, event_id, options).await?;
        encode_png(self.render(content).await?)
    }

    /// Printable PDF of a flyer.
    pub async fn pdf(
        &self,
        owner_id: &str,
        event_id: &str,
        options: FlyerOptions,
    ) -> AppResult<Vec<u8>> {
        let content = self.content(owner_id, event_id, options).await?;
        let paper = content.options.paper;
        package_pdf(self.render(content).await?, paper)
    }
}
