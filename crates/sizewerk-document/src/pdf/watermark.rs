// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagonal text watermark stamped onto every page with `lopdf`.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use sizewerk_core::error::{Result, SizewerkError};
use tracing::{debug, info, instrument};

use crate::artifact::{discard, write_artifact};
use crate::pdf::reader::inherited_attribute;

/// Resource name of the injected font.
const FONT_RESOURCE: &str = "SwWatermark";

/// Letter-size fallback when a page has no usable /MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Mean Helvetica advance as a fraction of the font size.
const HELVETICA_ADVANCE: f32 = 0.5;

const GREY_LEVEL: f32 = 0.75;

/// Stamp `text` diagonally across every page of `input`, writing the result
/// to `output`. Returns the size of the written file.
#[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn add_text_watermark(input: &Path, output: &Path, text: &str) -> Result<u64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SizewerkError::InvalidInput(
            "watermark text must not be empty".into(),
        ));
    }
    if !input.is_file() {
        return Err(SizewerkError::NotFound(input.to_path_buf()));
    }

    let mut doc = Document::load(input).map_err(|err| {
        SizewerkError::PdfError(format!("failed to open {}: {}", input.display(), err))
    })?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(SizewerkError::PdfError("document has no pages".into()));
    }

    let font_id = doc.add_object(watermark_font());
    let encoded = latin1(text);

    // Original content is wrapped in q/Q so its graphics state cannot leak
    // into the stamp.
    let mut save_id: Option<ObjectId> = None;

    for page_id in &page_ids {
        let (media_box, resources, contents) = {
            let page = doc.get_dictionary(*page_id).map_err(|err| {
                SizewerkError::PdfError(format!("cannot read page {:?}: {}", page_id, err))
            })?;
            let media_box = inherited_attribute(&doc, page, b"MediaBox")
                .and_then(|obj| media_box_of(&doc, obj))
                .unwrap_or(DEFAULT_MEDIA_BOX);
            let resources = inherited_attribute(&doc, page, b"Resources")
                .and_then(|obj| resolve_dictionary(&doc, obj))
                .unwrap_or_default();
            let contents = page.get(b"Contents").ok().cloned();
            (media_box, resources, contents)
        };

        let parts = content_parts(&doc, contents);
        let stamp = stamp_operations(media_box, &encoded, !parts.is_empty())
            .encode()
            .map_err(|err| SizewerkError::PdfError(format!("cannot encode watermark: {err}")))?;
        let stamp_id = doc.add_object(Stream::new(Dictionary::new(), stamp));

        let resources = with_watermark_font(&doc, resources, font_id);
        let contents = if parts.is_empty() {
            Object::Reference(stamp_id)
        } else {
            let save = *save_id.get_or_insert_with(|| {
                doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()))
            });
            let mut items = Vec::with_capacity(parts.len() + 2);
            items.push(Object::Reference(save));
            items.extend(parts);
            items.push(Object::Reference(stamp_id));
            Object::Array(items)
        };

        let page = doc
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| SizewerkError::PdfError(format!("cannot update page: {err}")))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", contents);
    }

    debug!(pages = page_ids.len(), "Watermark stamped");

    let mut bytes = Vec::new();
    if let Err(err) = doc.save_to(&mut bytes) {
        discard(output);
        return Err(SizewerkError::PdfError(format!(
            "failed to serialise watermarked PDF: {err}"
        )));
    }
    write_artifact(output, &bytes)?;
    info!(pages = page_ids.len(), bytes = bytes.len(), "Watermarked PDF written");
    Ok(bytes.len() as u64)
}

fn watermark_font() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

/// The content streams a page's /Contents names, with a reference to an array
/// flattened. Empty when the page draws nothing.
fn content_parts(doc: &Document, contents: Option<Object>) -> Vec<Object> {
    match contents {
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(items)) => items.clone(),
            Ok(_) => vec![Object::Reference(id)],
            Err(_) => Vec::new(),
        },
        Some(Object::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Draw the text rotated 45 degrees about the page centre. With `restore`,
/// first close the q that wraps the page's own content.
fn stamp_operations(media_box: [f32; 4], text: &[u8], restore: bool) -> Content {
    let [llx, lly, urx, ury] = media_box;
    let (width, height) = ((urx - llx).abs(), (ury - lly).abs());
    let (cx, cy) = (llx + width / 2.0, lly + height / 2.0);

    let diagonal = (width * width + height * height).sqrt();
    let glyphs = text.len().max(1) as f32;
    let font_size = (diagonal * 0.6 / (glyphs * HELVETICA_ADVANCE)).clamp(12.0, 96.0);
    let text_width = glyphs * font_size * HELVETICA_ADVANCE;

    let angle = std::f32::consts::FRAC_PI_4;
    let (sin, cos) = angle.sin_cos();

    let mut operations = Vec::with_capacity(11);
    if restore {
        operations.push(Operation::new("Q", vec![]));
    }
    operations.extend([
        Operation::new("q", vec![]),
        Operation::new("g", vec![Object::Real(GREY_LEVEL)]),
        Operation::new(
            "cm",
            vec![
                Object::Real(cos),
                Object::Real(sin),
                Object::Real(-sin),
                Object::Real(cos),
                Object::Real(cx),
                Object::Real(cy),
            ],
        ),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                Object::Real(font_size),
            ],
        ),
        Operation::new(
            "Td",
            vec![
                Object::Real(-text_width / 2.0),
                Object::Real(-font_size / 3.0),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(text.to_vec(), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]);
    Content { operations }
}

/// WinAnsi covers Latin-1 for printable text; anything else becomes '?'.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn media_box_of(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let array = match object {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    if array.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(array) {
        *slot = value.as_float().ok()?;
    }
    Some(out)
}

fn resolve_dictionary(doc: &Document, object: &Object) -> Option<Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// A direct copy of `resources` whose /Font dictionary also names the
/// watermark font. Shared resource objects are left untouched.
fn with_watermark_font(doc: &Document, mut resources: Dictionary, font_id: ObjectId) -> Dictionary {
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dictionary(doc, obj))
        .unwrap_or_default();
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}
