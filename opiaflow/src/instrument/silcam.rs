//! SilCam stages and helpers.
//!
//! SilCam frames are named after their capture time, e.g.
//! `D20181101T142731.838206.silc`, and hold an `H x W x C` array of 8-bit
//! intensities. Decoding frame files is delegated to a [`FrameReader`].

use crate::context::{Context, IMAGE_KEY, INPUT_KEY, PREPARED_IMAGE_KEY, TIMESTAMP_KEY};
use crate::errors::{PipelineValidationError, StageError};
use crate::pipeline::{PipelineConfig, StageRegistry, CLASSIFIER_STAGE};
use crate::stages::{Producer, Stage};
use anyhow::Context as _;
use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, Axis};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.f";
const CONTEXT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Reads a raw frame from a file.
pub trait FrameReader: Send + Sync + Debug {
    /// Reads the frame stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    fn read_frame(&self, path: &Path) -> Result<Array3<u8>, StageError>;
}

/// Parses the capture time encoded in a SilCam filename.
///
/// The extension and the leading prefix character are dropped and the rest
/// is read as `YYYYMMDDTHHMMSS.ffffff`.
///
/// # Errors
///
/// Returns an error if the name does not carry a timestamp.
pub fn timestamp_from_filename(filename: &str) -> Result<NaiveDateTime, StageError> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("no file name in '{filename}'"))?;

    let mut chars = stem.chars();
    chars.next();
    let encoded = chars.as_str();

    let timestamp = NaiveDateTime::parse_from_str(encoded, FILENAME_TIMESTAMP_FORMAT)
        .with_context(|| format!("'{filename}' does not encode a capture time"))?;
    Ok(timestamp)
}

/// Loads one SilCam frame.
///
/// Requires `filename`; adds `timestamp` (ISO-8601 string) and `img`
/// (an `Array3<u8>` handle).
#[derive(Debug, Clone)]
pub struct SilCamLoad<R: FrameReader> {
    reader: R,
}

impl<R: FrameReader> SilCamLoad<R> {
    /// Creates a loader using `reader` to decode frames.
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: FrameReader> Stage for SilCamLoad<R> {
    fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
        let filename = ctx.require_str(INPUT_KEY)?.to_string();
        let timestamp = timestamp_from_filename(&filename)?;
        let img = self.reader.read_frame(Path::new(&filename))?;

        ctx.insert_data(
            TIMESTAMP_KEY,
            timestamp.format(CONTEXT_TIMESTAMP_FORMAT).to_string(),
        );
        ctx.insert_handle(IMAGE_KEY, img);
        Ok(())
    }
}

/// Collapses a multi-channel frame into a normalised single-channel image.
///
/// Requires `img`; adds `imc` (an `Array2<f64>` handle).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePrep;

impl Stage for ImagePrep {
    fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
        let img = ctx.require_handle::<Array3<u8>>(IMAGE_KEY)?;
        warn!("Background correction not implemented");

        let imc = prepare_frame(&img)?;
        ctx.insert_handle(PREPARED_IMAGE_KEY, imc);
        Ok(())
    }
}

/// Takes the per-pixel minimum over channels, then scales to `[0, 1]`.
///
/// The minimum keeps the strongest attenuation across wavelengths. A
/// constant frame maps to all zeros.
///
/// # Errors
///
/// Returns an error for an empty frame.
pub fn prepare_frame(img: &Array3<u8>) -> Result<Array2<f64>, StageError> {
    if img.is_empty() {
        return Err(StageError::failed("cannot prepare an empty frame"));
    }

    let mut imc = img.fold_axis(Axis(2), f64::INFINITY, |&acc, &v| acc.min(f64::from(v)));

    let min = imc.fold(f64::INFINITY, |acc, &v| acc.min(v));
    imc.mapv_inplace(|v| v - min);

    let max = imc.fold(0.0_f64, |acc, &v| acc.max(v));
    if max > 0.0 {
        imc.mapv_inplace(|v| v / max);
    }
    Ok(imc)
}

/// Builds the standard SilCam workflow.
///
/// The registry holds `classifier, load, imageprep, segmentation,
/// statextract, output`; the returned configuration runs only the
/// classifier at construction.
///
/// # Errors
///
/// Returns an error if the registry cannot be assembled.
pub fn silcam_steps<R: FrameReader + 'static>(
    classifier: Arc<dyn Producer>,
    reader: R,
    segmentation: Arc<dyn Stage>,
    statextract: Arc<dyn Stage>,
    output: Arc<dyn Stage>,
) -> Result<(StageRegistry, PipelineConfig), PipelineValidationError> {
    let registry = StageRegistry::new()
        .classifier(classifier)?
        .stage("load", Arc::new(SilCamLoad::new(reader)))?
        .stage("imageprep", Arc::new(ImagePrep))?
        .stage("segmentation", segmentation)?
        .stage("statextract", statextract)?
        .stage("output", output)?;

    let config = PipelineConfig::new()
        .with_initial_steps([CLASSIFIER_STAGE])
        .with_required_step("load")
        .with_required_step("statextract");

    Ok((registry, config))
}
