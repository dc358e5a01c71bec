//! PDF mutation backend
//!
//! `PdfWriter` is the contract the exporter drives: open a document, look up
//! page sizes, embed fonts and rasters, draw them onto pages and serialize.
//! `LopdfWriter` implements it on top of `lopdf` by appending one overlay
//! content stream per touched page.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::annotation::{Rgb, StandardFont};
use crate::error::EditorError;
use crate::raster::{decode_png, inspect_jpeg};

/// Page tree depth limit when walking up for inherited attributes
const MAX_TREE_DEPTH: usize = 32;

/// Page dimensions in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextDrawOptions<F> {
    /// Baseline of the first line, PDF user space
    pub x: f64,
    pub y: f64,
    pub size: f64,
    /// Distance between consecutive baselines
    pub line_height: f64,
    pub font: F,
    pub color: Rgb,
}

/// Placement of an image; `(x, y)` is its bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDrawOptions {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Document mutation operations used by the exporter.
/// Pages are 1-indexed.
pub trait PdfWriter: Sized {
    type Font: Copy;
    type Image: Copy;

    fn load(bytes: &[u8]) -> Result<Self, EditorError>;

    fn page_sizes(&self) -> Vec<PageSize>;

    fn embed_font(&mut self, font: StandardFont) -> Result<Self::Font, EditorError>;

    fn draw_text(
        &mut self,
        page: u32,
        text: &str,
        options: &TextDrawOptions<Self::Font>,
    ) -> Result<(), EditorError>;

    /// Embed PNG bytes. Fails for anything that is not a PNG.
    fn embed_png(&mut self, bytes: &[u8]) -> Result<Self::Image, EditorError>;

    fn embed_jpg(&mut self, bytes: &[u8]) -> Result<Self::Image, EditorError>;

    fn draw_image(
        &mut self,
        page: u32,
        image: Self::Image,
        options: &ImageDrawOptions,
    ) -> Result<(), EditorError>;

    fn save(self) -> Result<Vec<u8>, EditorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(usize);

#[derive(Debug, Default)]
struct PageOverlay {
    operations: Vec<Operation>,
    fonts: BTreeSet<usize>,
    images: BTreeSet<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PageGeometry {
    id: ObjectId,
    origin: (f64, f64),
    size: PageSize,
}

/// `PdfWriter` backed by an in-memory `lopdf::Document`
pub struct LopdfWriter {
    doc: Document,
    pages: Vec<PageGeometry>,
    fonts: Vec<ObjectId>,
    images: Vec<ObjectId>,
    overlays: BTreeMap<u32, PageOverlay>,
}

impl LopdfWriter {
    fn page(&self, page: u32) -> Result<&PageGeometry, EditorError> {
        let total = self.pages.len() as u32;
        if page == 0 || page > total {
            return Err(EditorError::PageOutOfRange { page, total });
        }
        Ok(&self.pages[page as usize - 1])
    }

    fn font_name(index: usize) -> String {
        format!("InkF{}", index + 1)
    }

    fn image_name(index: usize) -> String {
        format!("InkIm{}", index + 1)
    }

    fn flush_page(&mut self, page: u32, overlay: PageOverlay) -> Result<(), EditorError> {
        let geometry = *self.page(page)?;

        let mut operations = vec![Operation::new("Q", vec![])];
        let (ox, oy) = geometry.origin;
        let translated = ox != 0.0 || oy != 0.0;
        if translated {
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    real(ox),
                    real(oy),
                ],
            ));
        }
        operations.extend(overlay.operations);
        if translated {
            operations.push(Operation::new("Q", vec![]));
        }

        // Leading newline separates us from a previous stream lacking a trailing one
        let mut encoded = b"\n".to_vec();
        encoded.extend(
            Content { operations }
                .encode()
                .map_err(|e| EditorError::Export(e.to_string()))?,
        );

        let save_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let overlay_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), encoded));

        let fonts: Vec<(String, ObjectId)> = overlay
            .fonts
            .iter()
            .map(|&i| (Self::font_name(i), self.fonts[i]))
            .collect();
        let images: Vec<(String, ObjectId)> = overlay
            .images
            .iter()
            .map(|&i| (Self::image_name(i), self.images[i]))
            .collect();

        let mut resources = inherited_attribute(&self.doc, geometry.id, b"Resources")
            .and_then(|obj| resolve_dict(&self.doc, &obj))
            .unwrap_or_else(Dictionary::new);
        merge_resource_entries(&self.doc, &mut resources, b"Font", &fonts);
        merge_resource_entries(&self.doc, &mut resources, b"XObject", &images);

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(existing_contents(&self.doc, geometry.id));
        contents.push(Object::Reference(overlay_id));

        let page_dict = self
            .doc
            .get_object_mut(geometry.id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| EditorError::Export(e.to_string()))?;

        page_dict.set("Contents", Object::Array(contents));
        page_dict.set("Resources", Object::Dictionary(resources));

        debug!(page, fonts = fonts.len(), images = images.len(), "page overlay written");
        Ok(())
    }

    fn overlay_mut(&mut self, page: u32) -> &mut PageOverlay {
        self.overlays.entry(page).or_default()
    }
}

impl PdfWriter for LopdfWriter {
    type Font = FontRef;
    type Image = ImageRef;

    fn load(bytes: &[u8]) -> Result<Self, EditorError> {
        let doc = Document::load_mem(bytes).map_err(|e| EditorError::Load(e.to_string()))?;

        let pages = doc
            .get_pages()
            .into_values()
            .map(|id| {
                let [x0, y0, x1, y1] = media_box(&doc, id);
                PageGeometry {
                    id,
                    origin: (x0.min(x1), y0.min(y1)),
                    size: PageSize {
                        width: (x1 - x0).abs(),
                        height: (y1 - y0).abs(),
                    },
                }
            })
            .collect();

        Ok(Self {
            doc,
            pages,
            fonts: Vec::new(),
            images: Vec::new(),
            overlays: BTreeMap::new(),
        })
    }

    fn page_sizes(&self) -> Vec<PageSize> {
        self.pages.iter().map(|p| p.size).collect()
    }

    fn embed_font(&mut self, font: StandardFont) -> Result<FontRef, EditorError> {
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.push(id);
        Ok(FontRef(self.fonts.len() - 1))
    }

    fn draw_text(
        &mut self,
        page: u32,
        text: &str,
        options: &TextDrawOptions<FontRef>,
    ) -> Result<(), EditorError> {
        self.page(page)?;
        let FontRef(index) = options.font;
        if index >= self.fonts.len() {
            return Err(EditorError::Export(format!("Unknown font handle {}", index)));
        }

        let Rgb { r, g, b } = options.color;
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(Self::font_name(index).into_bytes()),
                    real(options.size),
                ],
            ),
            Operation::new(
                "rg",
                vec![Object::Real(r), Object::Real(g), Object::Real(b)],
            ),
            Operation::new("TL", vec![real(options.line_height)]),
            Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    real(options.x),
                    real(options.y),
                ],
            ),
        ];
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", vec![]));

        let overlay = self.overlay_mut(page);
        overlay.fonts.insert(index);
        overlay.operations.extend(ops);
        Ok(())
    }

    fn embed_png(&mut self, bytes: &[u8]) -> Result<ImageRef, EditorError> {
        let decoded = decode_png(bytes)?;

        let smask = match &decoded.alpha {
            Some(alpha) => {
                let stream = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => decoded.width as i64,
                        "Height" => decoded.height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                        "Filter" => "FlateDecode",
                    },
                    deflate(alpha)?,
                );
                Some(self.doc.add_object(stream))
            }
            None => None,
        };

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => decoded.width as i64,
            "Height" => decoded.height as i64,
            "ColorSpace" => Object::Name(decoded.color_space.pdf_name().to_vec()),
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        if let Some(smask_id) = smask {
            dict.set("SMask", Object::Reference(smask_id));
        }

        let id = self
            .doc
            .add_object(Stream::new(dict, deflate(&decoded.color)?));
        self.images.push(id);
        debug!(
            width = decoded.width,
            height = decoded.height,
            alpha = decoded.alpha.is_some(),
            "png embedded"
        );
        Ok(ImageRef(self.images.len() - 1))
    }

    fn embed_jpg(&mut self, bytes: &[u8]) -> Result<ImageRef, EditorError> {
        let info = inspect_jpeg(bytes)?;
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => info.width as i64,
                "Height" => info.height as i64,
                "ColorSpace" => Object::Name(info.color_space.pdf_name().to_vec()),
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes.to_vec(),
        );
        // Already compressed as DCT
        stream.allows_compression = false;

        let id = self.doc.add_object(stream);
        self.images.push(id);
        debug!(width = info.width, height = info.height, "jpeg embedded");
        Ok(ImageRef(self.images.len() - 1))
    }

    fn draw_image(
        &mut self,
        page: u32,
        image: ImageRef,
        options: &ImageDrawOptions,
    ) -> Result<(), EditorError> {
        self.page(page)?;
        let ImageRef(index) = image;
        if index >= self.images.len() {
            return Err(EditorError::Export(format!("Unknown image handle {}", index)));
        }

        let ops = [
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(options.width),
                    0.into(),
                    0.into(),
                    real(options.height),
                    real(options.x),
                    real(options.y),
                ],
            ),
            Operation::new(
                "Do",
                vec![Object::Name(Self::image_name(index).into_bytes())],
            ),
            Operation::new("Q", vec![]),
        ];

        let overlay = self.overlay_mut(page);
        overlay.images.insert(index);
        overlay.operations.extend(ops);
        Ok(())
    }

    fn save(mut self) -> Result<Vec<u8>, EditorError> {
        let overlays = std::mem::take(&mut self.overlays);
        for (page, overlay) in overlays {
            self.flush_page(page, overlay)?;
        }

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| EditorError::Export(e.to_string()))?;
        Ok(output)
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, EditorError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| EditorError::Embed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| EditorError::Embed(e.to_string()))
}

/// Look up a page attribute, walking up the page tree for inheritable keys
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// Copy a resource category into `resources` as a direct dictionary and add `entries` to it
fn merge_resource_entries(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    entries: &[(String, ObjectId)],
) {
    if entries.is_empty() {
        return;
    }
    let mut sub = resources
        .get(category)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_else(Dictionary::new);
    for (name, id) in entries {
        sub.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    resources.set(category.to_vec(), Object::Dictionary(sub));
}

/// MediaBox of a page, inheriting from ancestors; US Letter when absent
/// Stream entries of a page's `/Contents`, which may be a stream reference,
/// a direct array, or a reference to an array of streams
fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Stream(_)) => vec![Object::Reference(*id)],
            _ => Vec::new(),
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let array = inherited_attribute(doc, page_id, b"MediaBox").and_then(|obj| match obj {
        Object::Array(items) => Some(items),
        Object::Reference(id) => doc
            .get_object(id)
            .ok()
            .and_then(|o| o.as_array().ok().cloned()),
        _ => None,
    });

    array
        .and_then(|items| parse_box(&items))
        .unwrap_or([0.0, 0.0, 612.0, 792.0])
}

fn parse_box(items: &[Object]) -> Option<[f64; 4]> {
    if items.len() != 4 {
        return None;
    }
    let mut result = [0.0; 4];
    for (slot, obj) in result.iter_mut().zip(items) {
        *slot = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

/// Encode text for a simple font with /WinAnsiEncoding.
/// Characters outside the encoding become '?'.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
