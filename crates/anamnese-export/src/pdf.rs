//! PDF 导出
//!
//! 先按自上而下的毫米坐标计算版面（标题、患者信息、逐条问答、签名），再交给
//! `printpdf` 绘制。printpdf 的原点在页面左下角，绘制时统一换算。

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anamnese_core::utils::digits_only;
use anamnese_core::{AnamneseError, Report, Result, Signature};
use image::{DynamicImage, GenericImageView};
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};
use serde::{Deserialize, Serialize};

use crate::signature::decode_signature;

pub const DOCUMENT_TITLE: &str = "Relatório de Anamnese";
pub const PATIENT_SIGNATURE_CAPTION: &str = "Assinatura Paciente/Responsável";
pub const TECHNICIAN_SIGNATURE_CAPTION: &str = "Assinatura Técnico";

const IMAGE_DPI: f32 = 300.0;
const MM_PER_INCH: f32 = 25.4;
const PT_TO_MM: f32 = 0.3528;

/// 页面版式参数（毫米）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    /// 问答起始纵坐标
    pub answers_start_mm: f32,
    /// 超过该纵坐标时换页
    pub page_break_mm: f32,
    /// 新页面起始纵坐标
    pub page_top_mm: f32,
    pub signature_width_mm: f32,
    pub signature_height_mm: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            answers_start_mm: 70.0,
            page_break_mm: 250.0,
            page_top_mm: 20.0,
            signature_width_mm: 60.0,
            signature_height_mm: 25.0,
        }
    }
}

/// 签名位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureSlot {
    Patient,
    Technician,
}

/// 版面元素，纵坐标自页面顶端起算
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        text: String,
        size: f32,
        x: f32,
        y: f32,
        centered: bool,
    },
    Signature {
        slot: SignatureSlot,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// 计算完成的版面
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentPlan {
    pub pages: Vec<Vec<Element>>,
}

impl DocumentPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.push(element);
        }
    }

    fn text(&mut self, text: impl Into<String>, size: f32, x: f32, y: f32) {
        self.push(Element::Text {
            text: text.into(),
            size,
            x,
            y,
            centered: false,
        });
    }
}

/// 文档导出器
#[derive(Debug, Clone)]
pub struct DocumentExporter {
    layout: PageLayout,
    file_prefix: String,
}

impl DocumentExporter {
    pub fn new(layout: PageLayout, file_prefix: impl Into<String>) -> Self {
        Self {
            layout,
            file_prefix: file_prefix.into(),
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// 输出文件名，由去格式的患者 CPF 决定
    pub fn file_name(&self, report: &Report) -> String {
        format!("{}_{}.pdf", self.file_prefix, digits_only(&report.patient.cpf))
    }

    /// 计算版面
    pub fn plan(&self, report: &Report) -> DocumentPlan {
        let layout = &self.layout;
        let mut plan = DocumentPlan {
            pages: vec![Vec::new()],
        };

        plan.push(Element::Text {
            text: DOCUMENT_TITLE.to_string(),
            size: 18.0,
            x: layout.width_mm / 2.0,
            y: 20.0,
            centered: true,
        });
        plan.text(format!("Paciente: {}", report.patient.name), 12.0, 20.0, 40.0);
        plan.text(format!("CPF: {}", report.patient.cpf), 12.0, 20.0, 48.0);
        plan.text(format!("Exame: {}", report.exam_type.code()), 12.0, 20.0, 56.0);

        let mut y = layout.answers_start_mm;
        for qa in &report.answers {
            if y > layout.page_break_mm {
                plan.pages.push(Vec::new());
                y = layout.page_top_mm;
            }
            plan.text(qa.question.clone(), 10.0, 20.0, y);
            plan.text(format!("R: {}", qa.answer), 9.0, 25.0, y + 6.0);
            y += 14.0;
        }

        // 签名块需要 y+10 到 y+40 的空间
        if y + 45.0 > layout.height_mm - layout.page_top_mm / 2.0 {
            plan.pages.push(Vec::new());
            y = layout.page_top_mm;
        }

        let slots = [
            (SignatureSlot::Patient, &report.patient_signature, 20.0, PATIENT_SIGNATURE_CAPTION),
            (SignatureSlot::Technician, &report.technician_signature, 110.0, TECHNICIAN_SIGNATURE_CAPTION),
        ];
        for (slot, signature, x, caption) in slots {
            if signature.is_some() {
                plan.push(Element::Signature {
                    slot,
                    x,
                    y: y + 10.0,
                    width: layout.signature_width_mm,
                    height: layout.signature_height_mm,
                });
                plan.text(caption, 12.0, x, y + 40.0);
            }
        }

        plan
    }

    /// 生成 PDF 字节
    pub fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let patient = decode_optional(report.patient_signature.as_ref())?;
        let technician = decode_optional(report.technician_signature.as_ref())?;
        let plan = self.plan(report);
        let layout = &self.layout;

        let (doc, first_page, first_layer) = PdfDocument::new(
            DOCUMENT_TITLE,
            Mm(layout.width_mm),
            Mm(layout.height_mm),
            "Layer 1",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AnamneseError::Export(format!("PDF font error: {}", e)))?;

        for (index, elements) in plan.pages.iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) =
                    doc.add_page(Mm(layout.width_mm), Mm(layout.height_mm), "Layer 1");
                doc.get_page(page).get_layer(layer)
            };

            for element in elements {
                match element {
                    Element::Text {
                        text,
                        size,
                        x,
                        y,
                        centered,
                    } => {
                        let x = if *centered {
                            x - estimate_text_width(text, *size) / 2.0
                        } else {
                            *x
                        };
                        layer.use_text(text.as_str(), *size, Mm(x), Mm(layout.height_mm - y), &font);
                    }
                    Element::Signature {
                        slot,
                        x,
                        y,
                        width,
                        height,
                    } => {
                        let image = match slot {
                            SignatureSlot::Patient => patient.as_ref(),
                            SignatureSlot::Technician => technician.as_ref(),
                        };
                        if let Some(image) = image {
                            let bottom = layout.height_mm - (y + height);
                            place_image(&layer, image, *x, bottom, *width, *height);
                        }
                    }
                }
            }
        }

        let mut buffer = BufWriter::new(Vec::new());
        doc.save(&mut buffer)
            .map_err(|e| AnamneseError::Export(format!("PDF save error: {}", e)))?;
        let bytes = buffer
            .into_inner()
            .map_err(|e| AnamneseError::Export(format!("PDF buffer error: {}", e)))?;

        tracing::info!(
            "Rendered report {} ({} answers, {} page(s), {} bytes)",
            report.id,
            report.answers.len(),
            plan.page_count(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// 生成 PDF 并写入目录，返回文件路径
    pub fn export_to_dir(&self, report: &Report, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let bytes = self.render(report)?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name(report));
        std::fs::write(&path, bytes)?;

        tracing::info!("Saved report {} to {}", report.id, path.display());
        Ok(path)
    }
}

impl Default for DocumentExporter {
    fn default() -> Self {
        Self::new(PageLayout::default(), "anamnese")
    }
}

fn decode_optional(signature: Option<&Signature>) -> Result<Option<DynamicImage>> {
    signature.map(decode_signature).transpose()
}

/// Helvetica 平均字宽的粗略估计
fn estimate_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

fn place_image(layer: &PdfLayerReference, image: &DynamicImage, x: f32, bottom: f32, width: f32, height: f32) {
    let (px_w, px_h) = image.dimensions();
    let natural_w = px_w as f32 / IMAGE_DPI * MM_PER_INCH;
    let natural_h = px_h as f32 / IMAGE_DPI * MM_PER_INCH;

    // 去掉透明通道，签名画布本身是白底
    let flattened = DynamicImage::ImageRgb8(image.to_rgb8());
    Image::from_dynamic_image(&flattened).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(bottom)),
            scale_x: Some(width / natural_w),
            scale_y: Some(height / natural_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
}
