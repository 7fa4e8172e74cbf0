//! Image XObjects and inline images.
//!
//! An [`ImageXObject`] carries the image dictionary parameters and its
//! encoded samples. Turning samples into pixels is the job of an
//! [`ImageDecoder`]; [`DefaultImageDecoder`] handles raw and Flate samples in
//! any colour space, and DCT data through zune-jpeg when the
//! `jpeg-decoding` feature is on.

use super::color_space::ColorSpace;
use super::decode::Decoded;
use super::error::{PDFError, PDFResult};
use super::library::Library;
use super::parser::{Dict, ObjRef, PDFObject, PdfStream};
use log::warn;
use std::sync::Arc;

/// Largest image, in pixels, that is decoded (8192 x 8192).
const MAX_IMAGE_PIXELS: u64 = 1 << 26;

/// Missing sample bytes past this are an error rather than padding.
const MAX_SAMPLE_PADDING: usize = 1 << 20;

fn check_pixel_count(width: u64, height: u64) -> PDFResult<()> {
    match width.checked_mul(height) {
        Some(pixels) if pixels <= MAX_IMAGE_PIXELS => Ok(()),
        _ => Err(PDFError::decode(
            "image",
            format!("image of {}x{} exceeds the pixel limit", width, height),
        )),
    }
}

/// Decoded pixels, always 8-bit RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageXObject {
    /// Object number, or a library-issued id for inline images
    pub id: u32,
    pub obj_ref: Option<ObjRef>,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u32,
    /// `None` for stencil masks
    pub color_space: Option<ColorSpace>,
    pub image_mask: bool,
    pub decode: Option<Vec<f64>>,
    pub interpolate: bool,
    stream: Arc<PdfStream>,
}

impl ImageXObject {
    /// Builds an image from its stream. Named colour spaces that are not
    /// device spaces go through `named_space`.
    pub fn from_stream(
        library: &Library,
        stream: Arc<PdfStream>,
        named_space: &dyn Fn(&str) -> Option<ColorSpace>,
    ) -> PDFResult<ImageXObject> {
        let dict = &stream.dict;
        let width = library.get_int(dict, "Width").unwrap_or(0);
        let height = library.get_int(dict, "Height").unwrap_or(0);
        if width <= 0 || height <= 0 {
            return Err(PDFError::Generic(format!(
                "image with invalid size {}x{}",
                width, height
            )));
        }
        let (width, height) = (
            u32::try_from(width).map_err(|_| PDFError::decode("image", "width out of range"))?,
            u32::try_from(height).map_err(|_| PDFError::decode("image", "height out of range"))?,
        );
        check_pixel_count(u64::from(width), u64::from(height))?;
        let image_mask = library.get_bool(dict, "ImageMask").unwrap_or(false);

        let color_space = if image_mask {
            None
        } else {
            let space = match library.get_object(dict, "ColorSpace") {
                Some(PDFObject::Name(name)) => ColorSpace::from_device_name(name)
                    .or_else(|| named_space(name))
                    .or_else(|| ColorSpace::parse(library, &PDFObject::Name(name.clone()))),
                Some(other) => ColorSpace::parse(library, other),
                None => None,
            };
            // JPX carries its own colour space; everything else defaults to gray.
            Some(space.unwrap_or(ColorSpace::DeviceGray))
        };

        let bits_per_component = if image_mask {
            1
        } else {
            library
                .get_int(dict, "BitsPerComponent")
                .filter(|bpc| matches!(bpc, 1 | 2 | 4 | 8 | 16))
                .unwrap_or(8) as u32
        };

        Ok(ImageXObject {
            id: stream
                .obj_ref
                .map_or_else(|| library.next_id(), |obj_ref| obj_ref.num),
            obj_ref: stream.obj_ref,
            width,
            height,
            bits_per_component,
            color_space,
            image_mask,
            decode: library.get_number_array(dict, "Decode"),
            interpolate: library.get_bool(dict, "Interpolate").unwrap_or(false),
            stream,
        })
    }

    pub fn dict(&self) -> &Dict {
        &self.stream.dict
    }

    pub fn stream(&self) -> &Arc<PdfStream> {
        &self.stream
    }

    /// Sample data with generic filters removed.
    pub fn data(&self, library: &Library) -> PDFResult<Arc<Decoded>> {
        library.decode_stream(&self.stream)
    }

    fn decode_ranges(&self) -> Vec<f64> {
        let default = match &self.color_space {
            Some(space) => space.default_decode(self.bits_per_component),
            None => vec![0.0, 1.0],
        };
        match &self.decode {
            Some(decode) if decode.len() >= default.len() => decode.clone(),
            _ => default,
        }
    }
}

/// Turns image samples into pixels.
pub trait ImageDecoder: Send + Sync {
    /// `Ok(None)` means the codec is not supported; the image is still
    /// placed on the page without pixels.
    fn decode(&self, image: &ImageXObject, data: &Decoded) -> PDFResult<Option<ImageData>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImageDecoder;

impl ImageDecoder for DefaultImageDecoder {
    fn decode(&self, image: &ImageXObject, data: &Decoded) -> PDFResult<Option<ImageData>> {
        match data.codec.as_deref() {
            None => decode_samples(image, &data.data).map(Some),
            Some("DCTDecode") => decode_jpeg(image, &data.data),
            Some(codec) => {
                warn!("no decoder for {} image {}", codec, image.id);
                Ok(None)
            }
        }
    }
}

/// Unpacks `bits_per_component`-wide samples and converts them to RGBA.
fn decode_samples(image: &ImageXObject, data: &[u8]) -> PDFResult<ImageData> {
    let components = image
        .color_space
        .as_ref()
        .map_or(1, |space| space.components().max(1));
    let bpc = image.bits_per_component as usize;
    check_pixel_count(u64::from(image.width), u64::from(image.height))?;
    let (width, height) = (image.width as usize, image.height as usize);
    let too_large = || PDFError::decode("image", "image too large");
    let row_bytes = width
        .checked_mul(components * bpc)
        .ok_or_else(too_large)?
        .div_ceil(8);
    let expected = row_bytes.checked_mul(height).ok_or_else(too_large)?;
    let pixel_bytes = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(too_large)?;
    if expected - data.len().min(expected) > MAX_SAMPLE_PADDING {
        return Err(PDFError::decode(
            "image",
            format!("image {} has {} of {} sample bytes", image.id, data.len(), expected),
        ));
    }
    if data.len() < expected {
        warn!(
            "image {} has {} of {} sample bytes, padding",
            image.id,
            data.len(),
            expected
        );
    }

    let ranges = image.decode_ranges();
    let max = ((1u64 << bpc) - 1) as f64;
    let mut rgba = Vec::with_capacity(pixel_bytes);
    let mut values = vec![0.0; components];

    for row in 0..height {
        let row_start = row * row_bytes;
        for column in 0..width {
            for (c, value) in values.iter_mut().enumerate() {
                let bit = (column * components + c) * bpc;
                let sample = read_bits(data, row_start, bit, bpc) as f64;
                let (low, high) = (ranges[2 * c], ranges[2 * c + 1]);
                *value = low + sample * (high - low) / max;
            }
            match &image.color_space {
                None => {
                    // Stencil: 0 paints with the fill colour.
                    let alpha = if values[0] < 0.5 { 255 } else { 0 };
                    rgba.extend_from_slice(&[0, 0, 0, alpha]);
                }
                Some(space) => {
                    let (r, g, b, a) = space.to_color(&values).rgba();
                    rgba.extend_from_slice(&[r, g, b, a]);
                }
            }
        }
    }

    Ok(ImageData {
        width: image.width,
        height: image.height,
        rgba,
    })
}

/// Reads `bits` bits starting `bit` bits into the row at `row_start`.
/// Bytes past the end read as zero.
fn read_bits(data: &[u8], row_start: usize, bit: usize, bits: usize) -> u32 {
    let byte_at = |index: usize| data.get(row_start + index).copied().unwrap_or(0) as u32;
    match bits {
        8 => byte_at(bit / 8),
        16 => (byte_at(bit / 8) << 8) | byte_at(bit / 8 + 1),
        _ => {
            let byte = byte_at(bit / 8);
            let shift = 8 - bits - bit % 8;
            (byte >> shift) & ((1 << bits) - 1)
        }
    }
}

#[cfg(feature = "jpeg-decoding")]
fn decode_jpeg(image: &ImageXObject, data: &[u8]) -> PDFResult<Option<ImageData>> {
    use std::io::Cursor;
    use zune_jpeg::zune_core::options::DecoderOptions;

    let options = DecoderOptions::default()
        .set_max_width(u16::MAX as usize)
        .set_max_height(u16::MAX as usize);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(Cursor::new(data), options);
    decoder
        .decode_headers()
        .map_err(|e| PDFError::decode("DCTDecode", format!("{:?}", e)))?;
    let info = decoder
        .info()
        .ok_or_else(|| PDFError::decode("DCTDecode", "missing frame header"))?;
    check_pixel_count(info.width as u64, info.height as u64)?;
    let pixels = decoder
        .decode()
        .map_err(|e| PDFError::decode("DCTDecode", format!("{:?}", e)))?;

    let (width, height) = (info.width as usize, info.height as usize);
    let channels = pixels.len() / (width * height).max(1);
    let mut rgba = Vec::with_capacity(width * height * 4);
    for pixel in pixels.chunks_exact(channels.max(1)) {
        match *pixel {
            [g] => rgba.extend_from_slice(&[g, g, g, 255]),
            [g, a] => rgba.extend_from_slice(&[g, g, g, a]),
            [r, g, b] => rgba.extend_from_slice(&[r, g, b, 255]),
            [r, g, b, a, ..] => rgba.extend_from_slice(&[r, g, b, a]),
            [] => {}
        }
    }
    if rgba.len() != width * height * 4 {
        warn!("JPEG image {} decoded to an unexpected size", image.id);
    }
    Ok(Some(ImageData {
        width: width as u32,
        height: height as u32,
        rgba,
    }))
}

#[cfg(not(feature = "jpeg-decoding"))]
fn decode_jpeg(image: &ImageXObject, _data: &[u8]) -> PDFResult<Option<ImageData>> {
    warn!(
        "JPEG image {} skipped, the jpeg-decoding feature is off",
        image.id
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;

    fn image(source: &[u8]) -> ImageXObject {
        let object = Parser::from_bytes(source.to_vec()).get_object().unwrap();
        let stream = object.as_stream().unwrap().clone();
        ImageXObject::from_stream(&Library::default(), stream, &|_| None).unwrap()
    }

    #[test]
    fn test_rgb_samples() {
        let image = image(
            b"<< /Width 2 /Height 1 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Length 6 >>\nstream\n\xFF\x00\x00\x00\x00\xFF\nendstream",
        );
        let data = DefaultImageDecoder
            .decode(&image, &image.data(&Library::default()).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(data.rgba, vec![255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn test_one_bit_gray_with_decode_inverted() {
        let image = image(
            b"<< /Width 3 /Height 1 /ColorSpace /DeviceGray /BitsPerComponent 1 /Decode [1 0] /Length 1 >>\nstream\n\xA0\nendstream",
        );
        let data = decode_samples(&image, &[0xA0]).unwrap();
        // bits 1 0 1 -> inverted -> black white black
        assert_eq!(
            data.rgba,
            vec![0, 0, 0, 255, 255, 255, 255, 255, 0, 0, 0, 255]
        );
    }

    #[test]
    fn test_stencil_mask() {
        let image = image(
            b"<< /Width 2 /Height 1 /ImageMask true /Length 1 >>\nstream\n\x40\nendstream",
        );
        assert!(image.color_space.is_none());
        let data = decode_samples(&image, &[0x40]).unwrap();
        assert_eq!(data.rgba, vec![0, 0, 0, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn test_short_data_is_padded() {
        let image = image(
            b"<< /Width 2 /Height 2 /ColorSpace /DeviceGray /BitsPerComponent 8 /Length 1 >>\nstream\n\xFF\nendstream",
        );
        let data = decode_samples(&image, &[0xFF]).unwrap();
        assert_eq!(data.rgba.len(), 16);
        assert_eq!(&data.rgba[..4], &[255, 255, 255, 255]);
        assert_eq!(&data.rgba[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_missing_samples_past_padding_limit_fail() {
        let image = image(
            b"<< /Width 2048 /Height 1024 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Length 1 >>\nstream\n\xFF\nendstream",
        );
        assert!(matches!(
            decode_samples(&image, &[0xFF]),
            Err(PDFError::Decode { .. })
        ));
    }

    #[test]
    fn test_oversized_image_is_rejected() {
        let library = Library::default();
        let sized = |width: f64, height: f64| {
            Arc::new(PdfStream::new(
                [
                    ("Width".to_string(), PDFObject::Number(width)),
                    ("Height".to_string(), PDFObject::Number(height)),
                ]
                .into_iter()
                .collect(),
                vec![0],
            ))
        };
        for (width, height) in [(2e9, 2e9), (1e10, 1.0), (8193.0, 8192.0)] {
            assert!(matches!(
                ImageXObject::from_stream(&library, sized(width, height), &|_| None),
                Err(PDFError::Decode { .. })
            ));
        }
        assert!(ImageXObject::from_stream(&library, sized(8192.0, 8192.0), &|_| None).is_ok());
    }

    #[test]
    fn test_unsupported_codec_has_no_pixels() {
        let image = image(
            b"<< /Width 1 /Height 1 /ColorSpace /DeviceGray /Filter /JBIG2Decode /Length 1 >>\nstream\n\x00\nendstream",
        );
        let decoded = image.data(&Library::default()).unwrap();
        assert_eq!(decoded.codec.as_deref(), Some("JBIG2Decode"));
        assert_eq!(DefaultImageDecoder.decode(&image, &decoded).unwrap(), None);
    }

    #[test]
    fn test_invalid_size() {
        let object = Parser::from_bytes(b"<< /Width 0 /Height 1 /Length 0 >>\nstream\n\nendstream".to_vec())
            .get_object()
            .unwrap();
        let stream = object.as_stream().unwrap().clone();
        assert!(ImageXObject::from_stream(&Library::default(), stream, &|_| None).is_err());
    }

    #[test]
    fn test_inline_id_comes_from_library() {
        let library = Library::default();
        let stream = Arc::new(PdfStream::new(
            [("Width".to_string(), PDFObject::Number(1.0)), ("Height".to_string(), PDFObject::Number(1.0))]
                .into_iter()
                .collect(),
            vec![0],
        ));
        let first = ImageXObject::from_stream(&library, stream.clone(), &|_| None).unwrap();
        let second = ImageXObject::from_stream(&library, stream, &|_| None).unwrap();
        assert_ne!(first.id, second.id);
    }
}
