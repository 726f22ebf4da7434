//! Decorative assets (the company logo). A missing or broken logo never
//! stops a document from being generated.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::RenderError;

/// A decoded PNG logo, kept both as the original file and as 8-bit RGB
/// samples with an optional alpha plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl Logo {
    pub fn from_png(bytes: &[u8]) -> Result<Self, RenderError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| RenderError::Image(format!("Invalid PNG header: {e}")))?;

        let mut buffer = vec![0; reader.output_buffer_size()];
        let frame = reader
            .next_frame(&mut buffer)
            .map_err(|e| RenderError::Image(format!("Invalid PNG data: {e}")))?;
        let pixels = &buffer[..frame.buffer_size()];

        let (rgb, alpha) = match frame.color_type {
            png::ColorType::Rgb => (pixels.to_vec(), None),
            png::ColorType::Rgba => split_alpha(pixels, 4),
            png::ColorType::Grayscale => (pixels.iter().flat_map(|g| [*g, *g, *g]).collect(), None),
            png::ColorType::GrayscaleAlpha => {
                let (gray, alpha) = split_alpha(pixels, 2);
                (gray.iter().flat_map(|g| [*g, *g, *g]).collect(), alpha)
            }
            png::ColorType::Indexed => {
                return Err(RenderError::Image("Unexpanded palette image".to_string()))
            }
        };

        Ok(Self {
            png: bytes.to_vec(),
            width: frame.width,
            height: frame.height,
            rgb,
            alpha,
        })
    }

    /// Height for a given width, keeping the aspect ratio.
    pub fn scaled_height(&self, width: f64) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        width * f64::from(self.height) / f64::from(self.width)
    }
}

/// Splits interleaved samples into colour samples and a separate alpha
/// plane; the alpha plane is dropped when fully opaque.
fn split_alpha(pixels: &[u8], stride: usize) -> (Vec<u8>, Option<Vec<u8>>) {
    let mut colour = Vec::with_capacity(pixels.len() / stride * (stride - 1));
    let mut alpha = Vec::with_capacity(pixels.len() / stride);
    for chunk in pixels.chunks_exact(stride) {
        colour.extend_from_slice(&chunk[..stride - 1]);
        alpha.push(chunk[stride - 1]);
    }
    let opaque = alpha.iter().all(|a| *a == u8::MAX);
    (colour, if opaque { None } else { Some(alpha) })
}

#[derive(Debug, Clone, Default)]
pub struct DocumentAssets {
    pub logo: Option<Arc<Logo>>,
}

impl DocumentAssets {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_logo(logo: Logo) -> Self {
        Self {
            logo: Some(Arc::new(logo)),
        }
    }

    /// Loads the logo if configured. Failures are logged and produce
    /// assets without a logo.
    pub fn load(logo_path: Option<&Path>) -> Self {
        let Some(path) = logo_path else {
            return Self::none();
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Logo not readable; documents will have no logo");
                return Self::none();
            }
        };

        match Logo::from_png(&bytes) {
            Ok(logo) => {
                info!(path = %path.display(), width = logo.width, height = logo.height, "Loaded logo");
                Self::with_logo(logo)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Logo not usable; documents will have no logo");
                Self::none()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::logo_png;
    use super::*;

    #[test]
    fn test_decodes_rgba_into_rgb_and_alpha() {
        let logo = Logo::from_png(&logo_png(4, 2)).unwrap();

        assert_eq!((logo.width, logo.height), (4, 2));
        assert_eq!(logo.rgb.len(), 4 * 2 * 3);
        let alpha = logo.alpha.as_ref().unwrap();
        assert_eq!(alpha[0], 0);
        assert_eq!(alpha[1], 255);
        assert_eq!(logo.scaled_height(40.0), 20.0);
    }

    #[test]
    fn test_missing_or_broken_logo_is_not_fatal() {
        assert!(DocumentAssets::load(None).logo.is_none());
        assert!(DocumentAssets::load(Some(Path::new("/nonexistent/logo.png"))).logo.is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(DocumentAssets::load(Some(&path)).logo.is_none());

        std::fs::write(&path, logo_png(3, 3)).unwrap();
        assert!(DocumentAssets::load(Some(&path)).logo.is_some());
    }
}
