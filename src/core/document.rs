//! PDF 导出：每帧一页

use crate::core::video::error::{SlidesError, SlidesResult};
use crate::core::video::frame::Frame;
use image::ImageOutputFormat;
use log::info;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::Path;

const POINTS_PER_INCH: f32 = 72.0;
const DEFAULT_JPEG_QUALITY: u8 = 90;

pub struct DocumentExporter {
    resolution_dpi: f32,
    jpeg_quality: u8,
}

impl DocumentExporter {
    pub fn new(resolution_dpi: f32) -> Self {
        Self {
            resolution_dpi,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// 像素尺寸换算为页面尺寸 (pt)
    pub fn page_size(&self, frame: &Frame) -> (f32, f32) {
        let scale = POINTS_PER_INCH / self.resolution_dpi;
        (frame.width() as f32 * scale, frame.height() as f32 * scale)
    }

    /// 生成 PDF 字节；空列表返回 EmptyResult
    pub fn render(&self, frames: &[Frame]) -> SlidesResult<Vec<u8>> {
        if frames.is_empty() {
            return Err(SlidesError::EmptyResult);
        }

        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(frames.len());

        for frame in frames {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => frame.width() as i64,
                    "Height" => frame.height() as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                self.encode_jpeg(frame)?,
            ));

            let (width_pt, height_pt) = self.page_size(frame);
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            width_pt.into(),
                            0.into(),
                            0.into(),
                            height_pt.into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec!["Im0".into()]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn export(&self, frames: &[Frame], path: &Path) -> SlidesResult<()> {
        let bytes = self.render(frames)?;
        std::fs::write(path, &bytes)?;
        info!(
            "📄 exported {} pages ({} bytes) to {}",
            frames.len(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    fn encode_jpeg(&self, frame: &Frame) -> SlidesResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        frame
            .to_image()
            .write_to(&mut buffer, ImageOutputFormat::Jpeg(self.jpeg_quality))?;
        Ok(buffer.into_inner())
    }
}
