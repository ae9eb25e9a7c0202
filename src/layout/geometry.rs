use base64::{Engine as _, engine::general_purpose};
use image::ImageReader;
use serde::Serialize;
use std::io::Cursor;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct FittedSize {
    pub width: f32,
    pub height: f32,
}

/// Scale `(width, height)` down to fit the box, keeping the aspect ratio.
/// Images smaller than the box keep their intrinsic size.
pub fn fit_within(intrinsic: (u32, u32), max_width: f32, max_height: f32) -> Option<FittedSize> {
    let (w, h) = intrinsic;
    if w == 0 || h == 0 || max_width <= 0.0 || max_height <= 0.0 {
        return None;
    }
    let (w, h) = (w as f32, h as f32);
    let scale = (max_width / w).min(max_height / h).min(1.0);
    Some(FittedSize {
        width: w * scale,
        height: h * scale,
    })
}

/// Raw bytes of a `data:` URL, or of a bare base64 payload.
pub fn decode_data_url(source: &str) -> Option<Vec<u8>> {
    let payload = match source.split_once("base64,") {
        Some((_, payload)) => payload,
        None if source.starts_with("data:") => return None,
        None => source,
    };
    general_purpose::STANDARD.decode(payload.trim()).ok()
}

/// Intrinsic pixel dimensions of an encoded image.
pub fn probe_dimensions(source: &str) -> Option<(u32, u32)> {
    let bytes = decode_data_url(source)?;
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2x1 RGB PNG.
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAIAAAABCAIAAAB7QOjdAAAADUlEQVR4nGP4zwAE/wEHAAH/4iOeWQAAAABJRU5ErkJggg==";

    #[test]
    fn wide_images_are_bounded_by_width() {
        let fitted = fit_within((2000, 1000), 650.0, 400.0).unwrap();
        assert!((fitted.width - 650.0).abs() < 0.01);
        assert!((fitted.height - 325.0).abs() < 0.01);
    }

    #[test]
    fn tall_images_are_bounded_by_height() {
        let fitted = fit_within((1000, 2000), 650.0, 400.0).unwrap();
        assert!((fitted.height - 400.0).abs() < 0.01);
        assert!((fitted.width - 200.0).abs() < 0.01);
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let fitted = fit_within((100, 50), 650.0, 400.0).unwrap();
        assert_eq!((fitted.width, fitted.height), (100.0, 50.0));
    }

    #[test]
    fn degenerate_sizes_do_not_fit() {
        assert!(fit_within((0, 10), 100.0, 100.0).is_none());
        assert!(fit_within((10, 10), 0.0, 100.0).is_none());
    }

    #[test]
    fn data_url_payload_is_decoded() {
        assert_eq!(decode_data_url("data:text/plain;base64,aGk="), Some(b"hi".to_vec()));
        assert_eq!(decode_data_url("aGk="), Some(b"hi".to_vec()));
        assert_eq!(decode_data_url("data:text/plain,hi"), None);
    }

    #[test]
    fn png_dimensions_are_probed() {
        let url = format!("data:image/png;base64,{TINY_PNG}");
        assert_eq!(probe_dimensions(&url), Some((2, 1)));
        assert_eq!(probe_dimensions("data:image/png;base64,bm90IGFuIGltYWdl"), None);
    }
}
