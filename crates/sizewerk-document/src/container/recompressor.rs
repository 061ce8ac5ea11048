// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Container recompressor — unpack an office package, re-encode the rasters in
// its media directory once at a fixed quality, and repack it with the same
// entry order and names.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sizewerk_core::error::{Result, SizewerkError};
use sizewerk_core::types::{CompressionResult, ContainerFlavor, RasterFormat, Strategy};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::artifact::{discard, replace_file};
use crate::image::ImageProcessor;
use crate::probe::SizeProbe;
use crate::session::{CompressionJob, CompressionSession};

/// ODF requires this entry first and uncompressed.
const ODF_MIMETYPE: &str = "mimetype";

/// One archive member as it appeared in the source.
#[derive(Debug)]
struct Entry {
    name: String,
    relative: PathBuf,
    is_dir: bool,
}

/// Single-pass media recompression for one container flavour.
pub struct ContainerRecompressor {
    flavor: ContainerFlavor,
}

impl ContainerRecompressor {
    pub fn new(flavor: ContainerFlavor) -> Self {
        Self { flavor }
    }

    #[instrument(skip_all, fields(flavor = ?self.flavor, target = job.target_bytes))]
    pub fn compress(
        &self,
        job: &CompressionJob<'_>,
        strategies: &[Strategy],
        session: &mut CompressionSession<'_>,
    ) -> Result<CompressionResult> {
        let Some(quality) = strategies.iter().find_map(|s| match s {
            Strategy::ContainerMediaRecompress { quality } => Some(*quality),
            _ => None,
        }) else {
            return Err(SizewerkError::UnsupportedFormat(format!(
                "no container strategy configured for {:?}",
                self.flavor
            )));
        };
        let strategy = Strategy::ContainerMediaRecompress { quality };

        session.checkpoint()?;

        // Removed on drop, whichever way this function exits.
        let scratch = tempfile::Builder::new().prefix("sizewerk-").tempdir()?;
        let entries = extract(job.source, &scratch)?;
        let (replaced, saved) = recompress_media(scratch.path(), self.flavor, quality);
        debug!(entries = entries.len(), replaced, saved, "Media recompressed");

        if let Err(err) = repack(job.output, scratch.path(), &entries) {
            discard(job.output);
            return Err(err);
        }

        let size = SizeProbe::size_of(job.output)?;
        let fits = session.record(strategy, size, job.target_bytes);
        info!(size, fits, replaced, "Container repacked");
        Ok(job.conclude(session, strategy, size, fits))
    }
}

fn container_error(err: ZipError) -> SizewerkError {
    SizewerkError::ContainerError(err.to_string())
}

/// Unpack every entry of `source` under `scratch`, returning the entries in
/// archive order.
fn extract(source: &Path, scratch: &TempDir) -> Result<Vec<Entry>> {
    let mut archive = ZipArchive::new(File::open(source)?).map_err(container_error)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(container_error)?;
        let name = member.name().to_string();
        let relative = member.enclosed_name().ok_or_else(|| {
            SizewerkError::ContainerError(format!("unsafe entry name {name:?}"))
        })?;
        let dest = scratch.path().join(&relative);
        let is_dir = member.is_dir();

        if is_dir {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            io::copy(&mut member, &mut out)?;
        }
        entries.push(Entry {
            name,
            relative,
            is_dir,
        });
    }
    Ok(entries)
}

/// Raster formats re-encoded inside packages.
fn media_format(path: &Path) -> Option<RasterFormat> {
    let ext = path.extension()?.to_str()?;
    match RasterFormat::from_extension(ext)? {
        RasterFormat::WebP => None,
        format => Some(format),
    }
}

/// Re-encode each raster under the flavour's media directory. A file is only
/// replaced when the new encoding is strictly smaller. Returns the number of
/// files replaced and the bytes saved.
fn recompress_media(root: &Path, flavor: ContainerFlavor, quality: u8) -> (usize, u64) {
    let media_root = root.join(flavor.media_dir());
    if !media_root.is_dir() {
        debug!(dir = flavor.media_dir(), "Package has no media directory");
        return (0, 0);
    }

    let mut replaced = 0;
    let mut saved = 0;
    for entry in WalkDir::new(&media_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Some(format) = media_format(path) else {
            continue;
        };
        match recompress_file(path, format, quality) {
            Ok(Some(delta)) => {
                replaced += 1;
                saved += delta;
            }
            Ok(None) => {}
            Err(err) => warn!(path = %path.display(), %err, "Leaving media file unchanged"),
        }
    }
    (replaced, saved)
}

fn recompress_file(path: &Path, format: RasterFormat, quality: u8) -> Result<Option<u64>> {
    let before = SizeProbe::size_of(path)?;
    let bytes = ImageProcessor::open(path)?
        .normalize_for(format)
        .encode(format, quality)?;
    let after = bytes.len() as u64;
    if after >= before {
        return Ok(None);
    }
    replace_file(path, &bytes)?;
    Ok(Some(before - after))
}

/// Write the entries back out in their original order.
fn repack(output: &Path, root: &Path, entries: &[Entry]) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(output)?);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for entry in entries {
        if entry.is_dir {
            writer
                .add_directory(entry.name.clone(), deflated)
                .map_err(container_error)?;
            continue;
        }
        let options = if entry.name == ODF_MIMETYPE {
            stored
        } else {
            deflated
        };
        writer
            .start_file(entry.name.clone(), options)
            .map_err(container_error)?;
        let mut file = File::open(root.join(&entry.relative))?;
        io::copy(&mut file, &mut writer)?;
    }

    writer.finish().map_err(container_error)?;
    Ok(())
}
