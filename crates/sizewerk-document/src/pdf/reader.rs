// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open existing documents with `lopdf` and rewrite them
// structurally: every page copied into a fresh container, unreferenced objects
// dropped, streams deflated, and optionally embedded JPEGs re-encoded.

use std::collections::HashMap;
use std::path::Path;

use image::ColorType;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sizewerk_core::error::SizewerkError;
use sizewerk_core::types::RasterFormat;
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed page trees whose /Parent chain loops.
const MAX_TREE_DEPTH: usize = 64;

/// Reads existing PDF files and produces rewritten copies.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SizewerkError> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            SizewerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self { document })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, SizewerkError> {
        let document = Document::load_mem(data).map_err(|err| {
            SizewerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    // -- Rewriting ------------------------------------------------------------

    /// Copy every page, in order, into a brand-new document.
    ///
    /// Only what the pages reach (plus the /Info dictionary) survives:
    /// outlines, structure trees, form catalogs, and orphaned objects are
    /// left behind. Inherited page attributes are materialised on each page.
    #[instrument(skip(self))]
    pub fn rewrite_pages(&self) -> Result<Document, SizewerkError> {
        let source = &self.document;
        let pages = source.get_pages();
        if pages.is_empty() {
            return Err(SizewerkError::PdfError("document has no pages".into()));
        }

        let mut target = Document::with_version(source.version.clone());
        let pages_root = target.new_object_id();
        let mut cloner = ObjectCloner::new(source);

        // Reserve page ids up front so cross-page references (link
        // annotations, /P back-pointers) land on the copied pages, and fold
        // every intermediate page-tree node onto the new root.
        let mut page_ids = Vec::with_capacity(pages.len());
        for &page_id in pages.values() {
            let new_id = target.new_object_id();
            cloner.map(page_id, new_id);
            page_ids.push((page_id, new_id));
            for node in ancestors(source, page_id) {
                cloner.map(node, pages_root);
            }
        }

        let mut kids = Vec::with_capacity(page_ids.len());
        for (page_id, new_id) in page_ids {
            let page = source.get_dictionary(page_id).map_err(|err| {
                SizewerkError::PdfError(format!("cannot read page {:?}: {}", page_id, err))
            })?;

            let mut new_page = Dictionary::new();
            for (key, value) in page.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = cloner.clone_object(&mut target, value);
                new_page.set(key.clone(), cloned);
            }
            for key in INHERITABLE_KEYS {
                if page.has(key) {
                    continue;
                }
                if let Some(value) = inherited_attribute(source, page, key) {
                    let cloned = cloner.clone_object(&mut target, value);
                    new_page.set(key.to_vec(), cloned);
                }
            }
            new_page.set("Parent", Object::Reference(pages_root));

            target.objects.insert(new_id, Object::Dictionary(new_page));
            kids.push(Object::Reference(new_id));
        }

        let count = kids.len() as i64;
        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(count));
        target.objects.insert(pages_root, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_root));
        let catalog_id = target.add_object(catalog);
        target.trailer.set("Root", Object::Reference(catalog_id));

        if let Ok(info) = source.trailer.get(b"Info") {
            let cloned = cloner.clone_object(&mut target, info);
            target.trailer.set("Info", cloned);
        }

        debug!(pages = count, objects = target.objects.len(), "Pages copied");
        Ok(target)
    }

    /// Structural rewrite serialised to bytes.
    ///
    /// With `image_quality` set, baseline JPEG image XObjects are re-encoded
    /// at that quality first.
    #[instrument(skip(self))]
    pub fn rewrite_to_bytes(&self, image_quality: Option<u8>) -> Result<Vec<u8>, SizewerkError> {
        let mut document = self.rewrite_pages()?;
        if let Some(quality) = image_quality {
            let replaced = recompress_embedded_images(&mut document, quality);
            debug!(replaced, quality, "Embedded images re-encoded");
        }
        finalize(&mut document);

        let mut output = Vec::new();
        document.save_to(&mut output).map_err(|err| {
            SizewerkError::PdfError(format!("failed to serialise rewritten PDF: {}", err))
        })?;
        info!(
            pages = self.page_count(),
            output_bytes = output.len(),
            "Structural rewrite complete"
        );
        Ok(output)
    }
}

/// Drop unreferenced objects, deflate eligible streams, and renumber.
pub fn finalize(document: &mut Document) {
    let pruned = document.prune_objects();
    document.delete_zero_length_streams();
    document.compress();
    document.renumber_objects();
    debug!(pruned = pruned.len(), "Document finalised");
}

/// Re-encode 8-bit DeviceRGB / DeviceGray `DCTDecode` image streams at
/// `quality`, keeping a new encoding only when it is smaller. Returns the
/// number of streams replaced.
pub fn recompress_embedded_images(document: &mut Document, quality: u8) -> usize {
    let mut replaced = 0;
    for (id, object) in document.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        let Some(expected) = reencodable_color(stream) else {
            continue;
        };
        let processor = match ImageProcessor::from_bytes(&stream.content) {
            Ok(p) if p.color() == expected => p,
            Ok(p) => {
                debug!(?id, color = ?p.color(), "Skipping image with unexpected colour layout");
                continue;
            }
            Err(err) => {
                warn!(?id, %err, "Skipping undecodable embedded image");
                continue;
            }
        };
        match processor.encode(RasterFormat::Jpeg, quality) {
            Ok(bytes) if bytes.len() < stream.content.len() => {
                stream.set_content(bytes);
                replaced += 1;
            }
            Ok(_) => {}
            Err(err) => warn!(?id, %err, "Failed to re-encode embedded image"),
        }
    }
    replaced
}

/// Colour layout a JPEG image stream must decode to for safe replacement, or
/// `None` if the stream is not a plain 8-bit RGB/gray JPEG image.
fn reencodable_color(stream: &Stream) -> Option<ColorType> {
    let dict = &stream.dict;
    let is_image = matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image");
    if !is_image {
        return None;
    }
    let is_dct = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == b"DCTDecode",
        Ok(Object::Array(filters)) => {
            filters.len() == 1 && matches!(&filters[0], Object::Name(name) if name == b"DCTDecode")
        }
        _ => false,
    };
    if !is_dct {
        return None;
    }
    if !matches!(dict.get(b"BitsPerComponent"), Ok(Object::Integer(8))) {
        return None;
    }
    if dict.has(b"Decode") || dict.has(b"SMaskInData") {
        return None;
    }
    match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) if name == b"DeviceRGB" => Some(ColorType::Rgb8),
        Ok(Object::Name(name)) if name == b"DeviceGray" => Some(ColorType::L8),
        _ => None,
    }
}

/// Walk up the /Parent chain looking for `key`.
pub fn inherited_attribute<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
    None
}

/// Page-tree nodes above `page_id`.
fn ancestors(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut nodes = Vec::new();
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = document
            .get_dictionary(current)
            .ok()
            .and_then(|dict| dict.get(b"Parent").ok())
            .and_then(|parent| parent.as_reference().ok());
        match parent {
            Some(id) if !nodes.contains(&id) => {
                nodes.push(id);
                current = id;
            }
            _ => break,
        }
    }
    nodes
}

/// Deep-copies objects from one document into another, following references.
///
/// Each source object is copied at most once; the id is reserved before
/// descending, so reference cycles terminate.
struct ObjectCloner<'a> {
    source: &'a Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCloner<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapped: HashMap::new(),
        }
    }

    /// Pre-assign the target id for a source object.
    fn map(&mut self, from: ObjectId, to: ObjectId) {
        self.mapped.insert(from, to);
    }

    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dictionary(target, dict)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.clone_object(target, item))
                    .collect(),
            ),
            Object::Reference(id) => Object::Reference(self.clone_reference(target, *id)),
            Object::Stream(stream) => {
                let dict = self.clone_dictionary(target, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn clone_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            let cloned = self.clone_object(target, value);
            copy.set(key.clone(), cloned);
        }
        copy
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(&mapped) = self.mapped.get(&id) {
            return mapped;
        }
        let new_id = target.new_object_id();
        self.mapped.insert(id, new_id);
        let cloned = match self.source.get_object(id) {
            Ok(object) => self.clone_object(target, object),
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        target.objects.insert(new_id, cloned);
        new_id
    }
}
