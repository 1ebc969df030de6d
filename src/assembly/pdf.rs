//! PDF encoding.
//!
//! Each image becomes one page whose media box equals the image's pixel
//! size, so one PDF unit maps to one device pixel. Pixels are stored as an
//! RGB8 image XObject compressed with zlib (`FlateDecode`).

// ============================================================================
// Imports
// ============================================================================

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use miniz_oxide::deflate::compress_to_vec_zlib;
use tracing::trace;

use crate::capture::PageImage;
use crate::error::{Error, Result};

use super::DocumentEncoder;

// ============================================================================
// Constants
// ============================================================================

const PDF_VERSION: &str = "1.5";
const IMAGE_NAME: &str = "Im0";
const DEFAULT_COMPRESSION: u8 = 6;

// ============================================================================
// PdfEncoder
// ============================================================================

/// Image-per-page PDF writer.
#[derive(Debug, Clone, Copy)]
pub struct PdfEncoder {
    compression: u8,
}

impl Default for PdfEncoder {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
        }
    }
}

impl PdfEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the zlib level, 0 (store) to 10.
    #[must_use]
    pub fn with_compression(mut self, level: u8) -> Self {
        self.compression = level.min(10);
        self
    }

    fn add_page(&self, doc: &mut Document, pages_id: ObjectId, image: &PageImage) -> Result<ObjectId> {
        let rgb = image::load_from_memory(image.png())
            .map_err(|e| Error::assembly(format!("cannot decode page image: {e}")))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        let (w, h) = (i64::from(width), i64::from(height));

        let pixels = compress_to_vec_zlib(rgb.as_raw(), self.compression);
        let xobject = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            pixels,
        )
        .with_compression(false);
        let image_id = doc.add_object(xobject);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| Error::assembly(format!("cannot encode page content: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    IMAGE_NAME => image_id,
                },
            },
        });

        trace!(width, height, "PDF page added");
        Ok(page_id)
    }
}

impl DocumentEncoder for PdfEncoder {
    fn media_type(&self) -> &'static str {
        "application/pdf"
    }

    fn encode(&self, pages: &[(u32, PageImage)], on_page: &mut dyn FnMut(u32)) -> Result<Vec<u8>> {
        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for (page, image) in pages {
            on_page(*page);
            kids.push(self.add_page(&mut doc, pages_id, image)?.into());
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

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| Error::assembly(format!("cannot write PDF: {e}")))?;
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    fn page(width: u32, height: u32) -> PageImage {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 240]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode");
        PageImage::new(out.into_inner(), width, height)
    }

    #[test]
    fn test_one_page_per_image_at_pixel_size() {
        let pages = vec![(1, page(40, 30)), (2, page(20, 50))];
        let mut seen = Vec::new();
        let bytes = PdfEncoder::new()
            .encode(&pages, &mut |p| seen.push(p))
            .expect("encode");

        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(seen, vec![1, 2]);

        let doc = Document::load_mem(&bytes).expect("reload");
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(page_ids.len(), 2);

        let first = doc.get_dictionary(page_ids[0]).expect("page");
        let media_box = first.get(b"MediaBox").and_then(Object::as_array).expect("media box");
        let dims: Vec<i64> = media_box.iter().map(|o| o.as_i64().expect("int")).collect();
        assert_eq!(dims, vec![0, 0, 40, 30]);
    }

    #[test]
    fn test_compression_level() {
        let pages = vec![(1, page(64, 64))];
        let stored = PdfEncoder::new().with_compression(0).encode(&pages, &mut |_| {}).expect("encode");
        let packed = PdfEncoder::new().with_compression(42).encode(&pages, &mut |_| {}).expect("encode");

        assert!(stored.len() > packed.len());
        assert_eq!(Document::load_mem(&packed).expect("reload").get_pages().len(), 1);
    }

    #[test]
    fn test_undecodable_page_is_assembly_error() {
        let pages = vec![(1, PageImage::new(vec![0, 1, 2], 1, 1))];
        let err = PdfEncoder::new()
            .encode(&pages, &mut |_| {})
            .expect_err("should fail");
        assert!(matches!(err, Error::Assembly { .. }));
    }
}
