//! Merged image document: one page per image, assembled with `lopdf`.
//!
//! ## Embedding strategy
//!
//! Every image is decoded first, both to learn its pixel size and to reject
//! truncated or unknown files before they reach the document. Then:
//!
//! * 8-bit baseline/progressive JPEGs with 1 or 3 components are embedded
//!   byte-for-byte with `DCTDecode`; re-encoding would only lose quality.
//! * Everything else (PNG, GIF, WebP, CMYK JPEG, …) is flattened onto a white
//!   background, converted to 8-bit RGB and stored losslessly with
//!   `FlateDecode`.
//!
//! Decoding is CPU-bound; callers on an async runtime should drive this type
//! from `spawn_blocking`.

use crate::config::PageLayout;
use crate::error::{Docs2PdfError, FileError};
use crate::pipeline::layout::{fit_image, Placement, PT_PER_MM};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tracing::debug;

const IMAGE_RESOURCE: &[u8] = b"Im0";

/// Raw image XObject payload ready to be written into the document.
struct EmbeddedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

/// An in-memory PDF built incrementally, one image per page.
pub struct MergedImageDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    layout: PageLayout,
    image_dpi: f32,
    allow_upscale: bool,
}

impl MergedImageDocument {
    pub fn new(layout: PageLayout, image_dpi: f32, allow_upscale: bool) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            layout,
            image_dpi,
            allow_upscale,
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Decode `bytes`, place the image and append it as a new page.
    ///
    /// On error the document is unchanged and the image is reported as
    /// rejected under `name`.
    pub fn add_image(&mut self, name: &str, bytes: &[u8]) -> Result<Placement, FileError> {
        let reject = |detail: String| FileError::ImageRejected {
            name: name.to_string(),
            detail,
        };

        let img = image::load_from_memory(bytes).map_err(|e| reject(e.to_string()))?;
        let (width, height) = img.dimensions();
        let placement = fit_image(
            width,
            height,
            &self.layout,
            self.image_dpi,
            self.allow_upscale,
        )
        .map_err(|e| reject(e.to_string()))?;

        let embedded = embed(bytes, &img).map_err(|e| reject(e.to_string()))?;
        self.push_page(embedded, &placement)
            .map_err(|e| reject(e.to_string()))?;

        debug!(
            "Placed {} ({}x{} px) at {:.1}x{:.1} mm, scale {:.3}",
            name, width, height, placement.width_mm, placement.height_mm, placement.scale
        );
        Ok(placement)
    }

    fn push_page(&mut self, image: EmbeddedImage, placement: &Placement) -> lopdf::Result<()> {
        let [x, y, w, h] = placement.pdf_rect(&self.layout);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(w.into()),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(h.into()),
                        Object::Real(x.into()),
                        Object::Real(y.into()),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode()?;

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(image.width)),
                "Height" => Object::Integer(i64::from(image.height)),
                "ColorSpace" => image.color_space,
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => image.filter,
            },
            image.data,
        ));
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content_bytes));

        let page_w = self.layout.width_mm * PT_PER_MM;
        let page_h = self.layout.height_mm * PT_PER_MM;
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_w.into()),
                Object::Real(page_h.into()),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        self.kids.push(Object::Reference(page_id));
        Ok(())
    }

    /// Close the page tree and serialise the document.
    pub fn to_bytes(mut self) -> Result<Vec<u8>, Docs2PdfError> {
        if self.kids.is_empty() {
            return Err(Docs2PdfError::PdfAssembly(
                "document has no pages".to_string(),
            ));
        }

        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => Object::Integer(count),
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| Docs2PdfError::PdfAssembly(e.to_string()))?;
        Ok(buf)
    }
}

/// Choose the cheapest faithful encoding for one decoded image.
fn embed(original: &[u8], img: &DynamicImage) -> std::io::Result<EmbeddedImage> {
    let (width, height) = img.dimensions();

    if image::guess_format(original).ok() == Some(ImageFormat::Jpeg) {
        let color_space = match jpeg_components(original) {
            Some(1) => Some("DeviceGray"),
            Some(3) => Some("DeviceRGB"),
            _ => None,
        };
        if let Some(color_space) = color_space {
            return Ok(EmbeddedImage {
                width,
                height,
                color_space,
                filter: "DCTDecode",
                data: original.to_vec(),
            });
        }
    }

    let rgb = flatten_to_rgb(img);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&rgb)?;
    Ok(EmbeddedImage {
        width,
        height,
        color_space: "DeviceRGB",
        filter: "FlateDecode",
        data: encoder.finish()?,
    })
}

/// 8-bit RGB samples, with any alpha composited over white.
fn flatten_to_rgb(img: &DynamicImage) -> Vec<u8> {
    if !img.color().has_alpha() {
        return img.to_rgb8().into_raw();
    }
    let rgba = img.to_rgba8();
    let mut out = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
    for px in rgba.pixels() {
        let [r, g, b, a] = px.0;
        let a = u16::from(a);
        for c in [r, g, b] {
            out.push(((u16::from(c) * a + 255 * (255 - a)) / 255) as u8);
        }
    }
    out
}

/// Component count from the first 8-bit SOF segment of a JPEG stream.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            // fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // standalone markers carry no length
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            // start of scan: no frame header seen
            0xDA => return None,
            _ => {}
        }

        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let precision = *bytes.get(i + 4)?;
            return if precision == 8 {
                bytes.get(i + 9).copied()
            } else {
                None
            };
        }
        i += 2 + len;
    }
    None
}
