use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError};

use crate::error::ProcessingError;
use crate::sniffer::VARIANT_MIME_TYPES;

const QUALITY_STEP: u8 = 5;

/// Size and quality bounds for one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub max_width_px: u32,
    pub target_byte_size: usize,
    pub initial_quality: u8,
    pub min_quality: u8,
}

pub const HIGH: CompressionSettings = CompressionSettings {
    max_width_px: 2000,
    target_byte_size: 3 * 1024 * 1024,
    initial_quality: 100,
    min_quality: 90,
};

pub const MEDIUM: CompressionSettings = CompressionSettings {
    max_width_px: 1200,
    target_byte_size: 130 * 1024,
    initial_quality: 85,
    min_quality: 70,
};

pub const LOW: CompressionSettings = CompressionSettings {
    max_width_px: 800,
    target_byte_size: 20 * 1024,
    initial_quality: 70,
    min_quality: 10,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    High,
    Medium,
    Low,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::High, Variant::Medium, Variant::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::High => "high",
            Variant::Medium => "medium",
            Variant::Low => "low",
        }
    }

    /// Storage subfolder under the entity prefix
    pub fn folder(self) -> &'static str {
        match self {
            Variant::High => "H",
            Variant::Medium => "M",
            Variant::Low => "L",
        }
    }

    pub fn settings(self) -> CompressionSettings {
        match self {
            Variant::High => HIGH,
            Variant::Medium => MEDIUM,
            Variant::Low => LOW,
        }
    }
}

/// Local paths of the three variant files of one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSet {
    pub high: PathBuf,
    pub medium: PathBuf,
    pub low: PathBuf,
}

impl VariantSet {
    /// Variant paths next to an upload: `{stem}-high.{ext}` and so on.
    pub fn plan(work_dir: &Path, stem: &str, extension: &str) -> Self {
        let path_for = |variant: Variant| {
            work_dir.join(format!("{}-{}.{}", stem, variant.as_str(), extension))
        };
        VariantSet {
            high: path_for(Variant::High),
            medium: path_for(Variant::Medium),
            low: path_for(Variant::Low),
        }
    }

    pub fn path(&self, variant: Variant) -> &Path {
        match variant {
            Variant::High => &self.high,
            Variant::Medium => &self.medium,
            Variant::Low => &self.low,
        }
    }

    pub fn paths(&self) -> [PathBuf; 3] {
        [self.high.clone(), self.medium.clone(), self.low.clone()]
    }
}

/// Bytes of one encoded variant. `quality` is `None` when the source was kept verbatim.
#[derive(Debug, Clone)]
pub struct EncodedVariant {
    pub bytes: Vec<u8>,
    pub quality: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct EncodedVariants {
    pub high: EncodedVariant,
    pub medium: EncodedVariant,
    pub low: EncodedVariant,
}

impl EncodedVariants {
    pub fn get(&self, variant: Variant) -> &EncodedVariant {
        match variant {
            Variant::High => &self.high,
            Variant::Medium => &self.medium,
            Variant::Low => &self.low,
        }
    }
}

/// Multi-resolution JPEG variant generation
pub struct VariantCompressor;

impl VariantCompressor {
    /// Produce the three variant files for an image next to `work_dir/{stem}`.
    pub async fn compress(
        image_bytes: Vec<u8>,
        mime: &str,
        work_dir: &Path,
        stem: &str,
        extension: &str,
    ) -> Result<VariantSet, ProcessingError> {
        let set = VariantSet::plan(work_dir, stem, extension);
        Self::write_variants(image_bytes, mime, &set).await?;
        Ok(set)
    }

    /// Encode the variants on the blocking pool and write them to the planned paths.
    pub async fn write_variants(
        image_bytes: Vec<u8>,
        mime: &str,
        set: &VariantSet,
    ) -> Result<(), ProcessingError> {
        if !VARIANT_MIME_TYPES.contains(&mime) {
            return Err(ProcessingError::UnsupportedImageType(mime.to_string()));
        }

        let source_size = image_bytes.len();
        let start = std::time::Instant::now();
        let encoded =
            tokio::task::spawn_blocking(move || Self::encode_variants(&image_bytes)).await??;

        for variant in Variant::ALL {
            tokio::fs::write(set.path(variant), &encoded.get(variant).bytes).await?;
        }

        tracing::debug!(
            mime = %mime,
            source_bytes = source_size,
            high_bytes = encoded.high.bytes.len(),
            medium_bytes = encoded.medium.bytes.len(),
            low_bytes = encoded.low.bytes.len(),
            high_passthrough = encoded.high.quality.is_none(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image variants encoded"
        );

        Ok(())
    }

    /// Decode once and derive every variant from the decoded source.
    pub fn encode_variants(source: &[u8]) -> Result<EncodedVariants, ProcessingError> {
        let img = image::load_from_memory(source).map_err(|e| match e {
            ImageError::Unsupported(u) => ProcessingError::UnsupportedImageType(u.to_string()),
            other => ProcessingError::Decode(other.to_string()),
        })?;

        let high = if img.width() <= HIGH.max_width_px && source.len() <= HIGH.target_byte_size
        {
            EncodedVariant {
                bytes: source.to_vec(),
                quality: None,
            }
        } else {
            Self::search_quality(&img, &HIGH)?
        };

        Ok(EncodedVariants {
            high,
            medium: Self::search_quality(&img, &MEDIUM)?,
            low: Self::search_quality(&img, &LOW)?,
        })
    }

    /// Resize once, then step quality down until the target size or the floor is reached.
    pub fn search_quality(
        img: &DynamicImage,
        settings: &CompressionSettings,
    ) -> Result<EncodedVariant, ProcessingError> {
        let (width, height) = img.dimensions();
        let resized;
        let img = if width > settings.max_width_px {
            resized = img.resize(settings.max_width_px, height, FilterType::Lanczos3);
            &resized
        } else {
            img
        };

        let mut quality = settings.initial_quality;
        loop {
            let bytes = Self::encode_jpeg(img, quality)?;
            if bytes.len() <= settings.target_byte_size || quality <= settings.min_quality {
                return Ok(EncodedVariant {
                    bytes,
                    quality: Some(quality),
                });
            }
            quality = quality
                .saturating_sub(QUALITY_STEP)
                .max(settings.min_quality);
        }
    }

    /// Encode to JPEG using mozjpeg
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // libjpeg errors surface as panics
        let result = catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(quality as f32);
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);

            let mut comp = comp.start_compress(Vec::new())?;
            comp.write_scanlines(&rgb_img)?;
            comp.finish()
        }));

        match result {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(ProcessingError::Encode(e.to_string())),
            Err(_) => Err(ProcessingError::Encode(format!(
                "JPEG encoder aborted at quality {}",
                quality
            ))),
        }
    }
}
