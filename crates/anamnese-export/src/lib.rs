//! # 文档导出模块
//!
//! - 签名采集：手写签名面板与 PNG 数据URI 编解码
//! - PDF 导出：分页的问卷文档，附两处签名

pub mod pdf;
pub mod signature;

pub use pdf::{DocumentExporter, DocumentPlan, Element, PageLayout, SignatureSlot};
pub use signature::{
    decode_signature, encode_png_data_uri, render_strokes, signature_from_png_bytes, PadSettings,
    RasterSignaturePad, SignatureListener, SignatureSurface,
};
