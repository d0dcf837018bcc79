//! 签名采集
//!
//! 手写签名面板：固定像素尺寸的白色画布，每完成一笔就把当前光栅编码成
//! PNG 数据URI 通知宿主；清除时通知空签名。

use std::io::Cursor;

use anamnese_core::{AnamneseError, Result, Signature, PNG_DATA_URI_PREFIX};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 签名面板参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PadSettings {
    pub width_px: u32,
    pub height_px: u32,
    pub stroke_width_px: f32,
    /// `#rrggbb`
    pub stroke_color: String,
}

impl Default for PadSettings {
    fn default() -> Self {
        Self {
            width_px: 400,
            height_px: 150,
            stroke_width_px: 2.0,
            stroke_color: "#1a1a2e".to_string(),
        }
    }
}

/// 解析 `#rrggbb` 颜色
pub fn parse_hex_color(value: &str) -> Result<[u8; 3]> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AnamneseError::Validation(format!("Invalid colour: {}", value)));
    }

    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|e| AnamneseError::Validation(format!("Invalid colour {}: {}", value, e)))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// 签名变更回调
pub type SignatureListener = Box<dyn FnMut(Option<Signature>) + Send>;

/// 手写签名输入面
pub trait SignatureSurface {
    /// 画布像素尺寸
    fn size(&self) -> (u32, u32);

    /// 绘制一笔并通知当前签名
    fn add_stroke(&mut self, points: &[(f32, f32)]) -> Result<()>;

    /// 清除画布并通知空签名
    fn clear(&mut self);
}

/// 基于内存光栅的签名面板
pub struct RasterSignaturePad {
    canvas: RgbaImage,
    ink: Rgba<u8>,
    stroke_width: f32,
    strokes: usize,
    listener: Option<SignatureListener>,
}

impl RasterSignaturePad {
    pub fn new(settings: &PadSettings) -> Result<Self> {
        if settings.width_px == 0 || settings.height_px == 0 {
            return Err(AnamneseError::Validation(
                "Signature pad size must be non-zero".to_string(),
            ));
        }
        let [r, g, b] = parse_hex_color(&settings.stroke_color)?;

        Ok(Self {
            canvas: RgbaImage::from_pixel(settings.width_px, settings.height_px, BACKGROUND),
            ink: Rgba([r, g, b, 255]),
            stroke_width: settings.stroke_width_px.max(1.0),
            strokes: 0,
            listener: None,
        })
    }

    /// 注册签名变更回调
    pub fn on_change(&mut self, listener: SignatureListener) {
        self.listener = Some(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.strokes == 0
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes
    }

    /// 当前签名，空画布为 None
    pub fn snapshot(&self) -> Result<Option<Signature>> {
        if self.is_empty() {
            return Ok(None);
        }
        encode_png_data_uri(&DynamicImage::ImageRgba8(self.canvas.clone())).map(Some)
    }

    fn notify(&mut self, signature: Option<Signature>) {
        if let Some(listener) = self.listener.as_mut() {
            listener(signature);
        }
    }

    fn stamp(&mut self, cx: f32, cy: f32) {
        let radius = self.stroke_width / 2.0;
        let (width, height) = self.canvas.dimensions();

        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(width.saturating_sub(1));
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(height.saturating_sub(1));

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius + 0.25 {
                    self.canvas.put_pixel(x, y, self.ink);
                }
            }
        }
    }

    /// 把线段裁剪到画布（外扩笔宽）范围内，完全在外时返回 None
    fn clip_segment(&self, from: (f32, f32), to: (f32, f32)) -> Option<((f32, f32), (f32, f32))> {
        if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
            return None;
        }

        let margin = f64::from(self.stroke_width) / 2.0 + 1.0;
        let (width, height) = self.canvas.dimensions();
        let (x0, y0) = (f64::from(from.0), f64::from(from.1));
        let dx = f64::from(to.0) - x0;
        let dy = f64::from(to.1) - y0;

        // Liang-Barsky
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        let edges = [
            (-dx, x0 + margin),
            (dx, f64::from(width) + margin - x0),
            (-dy, y0 + margin),
            (dy, f64::from(height) + margin - y0),
        ];
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }

        let point = |t: f64| ((x0 + dx * t) as f32, (y0 + dy * t) as f32);
        Some((point(t0), point(t1)))
    }

    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let Some((from, to)) = self.clip_segment(from, to) else {
            return;
        };
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(from.0 + dx * t, from.1 + dy * t);
        }
    }
}

impl SignatureSurface for RasterSignaturePad {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn add_stroke(&mut self, points: &[(f32, f32)]) -> Result<()> {
        let Some(first) = points.first() else {
            return Err(AnamneseError::Validation("Stroke has no points".to_string()));
        };

        if first.0.is_finite() && first.1.is_finite() {
            self.stamp(first.0, first.1);
        }
        for pair in points.windows(2) {
            self.draw_segment(pair[0], pair[1]);
        }
        self.strokes += 1;

        let signature = self.snapshot()?;
        tracing::debug!("Signature stroke {} captured ({} points)", self.strokes, points.len());
        self.notify(signature);
        Ok(())
    }

    fn clear(&mut self) {
        self.canvas = RgbaImage::from_pixel(self.canvas.width(), self.canvas.height(), BACKGROUND);
        self.strokes = 0;
        self.notify(None);
    }
}

impl std::fmt::Debug for RasterSignaturePad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSignaturePad")
            .field("size", &self.canvas.dimensions())
            .field("strokes", &self.strokes)
            .finish()
    }
}

/// 把光栅编码为 PNG 数据URI
pub fn encode_png_data_uri(image: &DynamicImage) -> Result<Signature> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| AnamneseError::Signature(format!("PNG encoding failed: {}", e)))?;

    Signature::from_data_uri(format!(
        "{}{}",
        PNG_DATA_URI_PREFIX,
        STANDARD.encode(buffer.into_inner())
    ))
}

/// 从 PNG 文件内容构造签名，内容必须能解码
pub fn signature_from_png_bytes(bytes: &[u8]) -> Result<Signature> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| AnamneseError::Signature(format!("Invalid PNG: {}", e)))?;
    Signature::from_data_uri(format!("{}{}", PNG_DATA_URI_PREFIX, STANDARD.encode(bytes)))
}

/// 用签名面板绘制一组笔画，返回最终签名
pub fn render_strokes(settings: &PadSettings, strokes: &[Vec<(f32, f32)>]) -> Result<Signature> {
    let mut pad = RasterSignaturePad::new(settings)?;
    tracing::debug!("Rendering {} stroke(s) on a {:?} pad", strokes.len(), pad.size());
    for stroke in strokes {
        pad.add_stroke(stroke)?;
    }
    pad.snapshot()?
        .ok_or_else(|| AnamneseError::Signature("No strokes were drawn".to_string()))
}

/// 解码签名光栅
pub fn decode_signature(signature: &Signature) -> Result<DynamicImage> {
    let bytes = STANDARD
        .decode(signature.payload())
        .map_err(|e| AnamneseError::Signature(format!("Invalid base64 payload: {}", e)))?;

    image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| AnamneseError::Signature(format!("Invalid PNG payload: {}", e)))
}
