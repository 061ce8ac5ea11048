// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — assemble raster images into a new PDF using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::{Path, PathBuf};

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use sizewerk_core::error::SizewerkError;
use tracing::{debug, info, instrument, warn};

use crate::artifact::write_artifact;
use crate::image::ImageProcessor;

/// Resolution at which image pixels are mapped onto the page.
pub const IMAGE_DPI: f32 = 150.0;

const MM_PER_INCH: f32 = 25.4;

/// Creates PDF documents from raster images, one page per image.
pub struct PdfWriter {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self { title: None }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Page size, in millimetres, that holds `width` x `height` pixels at
    /// [`IMAGE_DPI`].
    pub fn page_size_for(width: u32, height: u32) -> (Mm, Mm) {
        let to_mm = |px: u32| Mm(px as f32 / IMAGE_DPI * MM_PER_INCH);
        (to_mm(width), to_mm(height))
    }

    // -- Images to PDF --------------------------------------------------------

    /// Build a PDF with one page per image, in the order given.
    ///
    /// Each page is exactly the size of its image at 150 dpi. Alpha is
    /// flattened; the image crate decides what it can decode.
    #[instrument(skip(self, paths), fields(images = paths.len()))]
    pub fn images_to_pdf(&self, paths: &[PathBuf]) -> Result<Vec<u8>, SizewerkError> {
        if paths.is_empty() {
            return Err(SizewerkError::InvalidInput(
                "at least one image is required".into(),
            ));
        }

        let title = self.title.as_deref().unwrap_or("Sizewerk Images");
        let mut doc = PdfDocument::new(title);
        let mut pages = Vec::with_capacity(paths.len());

        for path in paths {
            if !path.is_file() {
                return Err(SizewerkError::NotFound(path.clone()));
            }
            let processor = ImageProcessor::open(path)?;
            let (width, height) = (processor.width(), processor.height());
            let rgb = processor.into_dynamic().to_rgb8();

            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: width as usize,
                height: height as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let (page_w, page_h) = Self::page_size_for(width, height);
            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: Some(1.0),
                    scale_y: Some(1.0),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }];
            debug!(path = %path.display(), width, height, "Image placed on page");
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings");
        }

        info!(pages = paths.len(), bytes = output.len(), "Image PDF created");
        Ok(output)
    }

    /// Build the image PDF and write it to `path`. Returns the bytes written.
    pub fn write_images_to_file(
        &self,
        paths: &[PathBuf],
        path: impl AsRef<Path>,
    ) -> Result<u64, SizewerkError> {
        let bytes = self.images_to_pdf(paths)?;
        write_artifact(path.as_ref(), &bytes)?;
        info!("Wrote image PDF to {}", path.as_ref().display());
        Ok(bytes.len() as u64)
    }
}
