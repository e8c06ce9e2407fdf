//! Still-image reconstruction from raw-pixel payloads.
//!
//! An image packet's payload is either raw pixels in one of seven layouts
//! or an already-encoded JPEG/PNG bitstream. Raw layouts reconstruct into
//! pixel buffers that can be re-encoded to PNG or JPEG on export;
//! bitstreams pass through untouched. H264 payloads carry video, not a
//! still image, and are not reconstructable here.
use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use tracing::debug;

use crate::packet::{DataKind, ImageFormat, Packet};
use crate::{Error, Result};

/// 16-bit luma buffer, the pixel layout [`DynamicImage::ImageLuma16`] wraps.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Chroma subsampling layout of a [YcbcrBuffer].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsampling {
    /// 4:2:2, chroma halved horizontally only.
    Ratio422,
    /// 4:2:0, chroma halved in both directions.
    Ratio420,
}

/// Planar luma/chroma pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YcbcrBuffer {
    pub width: u32,
    pub height: u32,
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
    pub subsampling: Subsampling,
}

impl YcbcrBuffer {
    /// BT.601 full-range conversion to packed RGB.
    fn into_rgb(self) -> RgbImage {
        let (w, h) = (self.width as usize, self.height as usize);
        let chroma_w = w.div_ceil(2);
        let mut out = Vec::with_capacity(w * h * 3);
        for row in 0..h {
            let chroma_row = match self.subsampling {
                Subsampling::Ratio422 => row,
                Subsampling::Ratio420 => row / 2,
            };
            for col in 0..w {
                let luma = f32::from(self.y[row * w + col]);
                let ci = chroma_row * chroma_w + col / 2;
                let cb = f32::from(self.cb[ci]) - 128.0;
                let cr = f32::from(self.cr[ci]) - 128.0;
                out.push(clamp8(luma + 1.402 * cr));
                out.push(clamp8(luma - 0.344_136 * cb - 0.714_136 * cr));
                out.push(clamp8(luma + 1.772 * cb));
            }
        }
        // plane lengths were validated at reconstruction
        RgbImage::from_raw(self.width, self.height, out).unwrap()
    }
}

fn clamp8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// A reconstructed image: a pixel buffer, or the untouched bitstream for
/// payloads that were already encoded onboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    Gray(GrayImage),
    Gray16(Gray16Image),
    /// RGB triples with alpha fixed fully opaque.
    Rgb(RgbaImage),
    Ycbcr(YcbcrBuffer),
    /// Verbatim JPEG or PNG bytes.
    Bitstream(Vec<u8>),
}

impl Raster {
    /// Encode to `w` in the requested target format.
    ///
    /// [`Raster::Bitstream`] payloads are emitted as-is whatever target is
    /// requested; transcoding already-encoded bitstreams is out of scope
    /// and the limitation is deliberate.
    ///
    /// # Errors
    /// Any error from the underlying encoder or sink.
    pub fn write_to<W: Write>(self, mut w: W, format: ExportFormat) -> Result<()> {
        let img = match self {
            Raster::Bitstream(data) => {
                debug!(?format, "bitstream payload, emitting verbatim");
                w.write_all(&data)?;
                return Ok(());
            }
            Raster::Gray(img) => DynamicImage::ImageLuma8(img),
            Raster::Gray16(img) => DynamicImage::ImageLuma16(img),
            Raster::Rgb(img) => DynamicImage::ImageRgba8(img),
            Raster::Ycbcr(buf) => DynamicImage::ImageRgb8(buf.into_rgb()),
        };
        match format {
            ExportFormat::Png => img.write_with_encoder(PngEncoder::new(w))?,
            ExportFormat::Jpeg => {
                // jpeg handles neither 16-bit luma nor an alpha channel
                let img = if matches!(img, DynamicImage::ImageLuma16(_)) {
                    DynamicImage::ImageLuma8(img.to_luma8())
                } else if matches!(img, DynamicImage::ImageRgba8(_)) {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                } else {
                    img
                };
                img.write_with_encoder(JpegEncoder::new(w))?;
            }
        }
        Ok(())
    }
}

/// Target encoding for [`Raster::write_to`] and [`Packet::export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl FromStr for ExportFormat {
    type Err = Error;

    /// The empty string means the default target, png.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Png => f.write_str("png"),
            ExportFormat::Jpeg => f.write_str("jpg"),
        }
    }
}

/// Reconstruct a pixel buffer from `data` laid out per `format`.
///
/// # Errors
/// [Error::UnsupportedFormat] for h264, [Error::NotEnoughData] when `data`
/// cannot cover `width` x `height` pixels in the stated layout.
pub fn reconstruct(
    format: ImageFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<Raster> {
    let pixels = width as usize * height as usize;
    match format {
        ImageFormat::Gray => {
            need(data, pixels)?;
            let buf = data[..pixels].to_vec();
            Ok(Raster::Gray(gray_from_raw(width, height, buf)?))
        }
        ImageFormat::Gray16Be => Ok(Raster::Gray16(gray16(width, height, data, u16::from_be_bytes)?)),
        ImageFormat::Gray16Le => Ok(Raster::Gray16(gray16(width, height, data, u16::from_le_bytes)?)),
        ImageFormat::Rgb => {
            need(data, pixels * 3)?;
            let mut buf = Vec::with_capacity(pixels * 4);
            for px in data[..pixels * 3].chunks_exact(3) {
                buf.extend_from_slice(&[px[0], px[1], px[2], 0xff]);
            }
            RgbaImage::from_raw(width, height, buf)
                .map(Raster::Rgb)
                .ok_or(Error::NotEnoughData {
                    actual: data.len(),
                    minimum: pixels * 3,
                })
        }
        ImageFormat::Yuy2 => yuy2(width, height, data),
        ImageFormat::I420 => i420(width, height, data),
        ImageFormat::Jpeg | ImageFormat::Png => Ok(Raster::Bitstream(data.to_vec())),
        ImageFormat::H264 => Err(Error::UnsupportedFormat(format.to_string())),
    }
}

fn need(data: &[u8], minimum: usize) -> Result<()> {
    if data.len() < minimum {
        return Err(Error::NotEnoughData {
            actual: data.len(),
            minimum,
        });
    }
    Ok(())
}

fn gray_from_raw(width: u32, height: u32, buf: Vec<u8>) -> Result<GrayImage> {
    let minimum = buf.len();
    GrayImage::from_raw(width, height, buf).ok_or(Error::NotEnoughData {
        actual: minimum,
        minimum,
    })
}

fn gray16(
    width: u32,
    height: u32,
    data: &[u8],
    from_bytes: fn([u8; 2]) -> u16,
) -> Result<Gray16Image> {
    let pixels = width as usize * height as usize;
    need(data, pixels * 2)?;
    let buf: Vec<u16> = data[..pixels * 2]
        .chunks_exact(2)
        .map(|c| from_bytes([c[0], c[1]]))
        .collect();
    Gray16Image::from_raw(width, height, buf).ok_or(Error::NotEnoughData {
        actual: data.len(),
        minimum: pixels * 2,
    })
}

/// 4:2:2 packed unpacking. Each 4-byte group carries two horizontally
/// adjacent pixels as `Y0 Cb Y1 Cr`; both lumas land in the Y plane, the
/// shared chroma samples in their own planes.
fn yuy2(width: u32, height: u32, data: &[u8]) -> Result<Raster> {
    // each group covers two horizontally adjacent pixels; an odd width has
    // no well-formed final group and the planes come up short
    if width % 2 != 0 {
        return Err(Error::UnsupportedFormat(format!("yuy2 width {width}")));
    }
    let pixels = width as usize * height as usize;
    need(data, pixels * 2)?;
    let data = &data[..pixels * 2];

    let mut y = Vec::with_capacity(pixels);
    let mut cb = Vec::with_capacity(pixels / 2);
    let mut cr = Vec::with_capacity(pixels / 2);
    for group in data.chunks_exact(4) {
        y.push(group[0]);
        y.push(group[2]);
        cb.push(group[1]);
        cr.push(group[3]);
    }
    Ok(Raster::Ycbcr(YcbcrBuffer {
        width,
        height,
        y,
        cb,
        cr,
        subsampling: Subsampling::Ratio422,
    }))
}

/// 4:2:0 planar unpacking. The Cb plane immediately follows the luma
/// plane; the Cr plane is the final quarter of the payload, which differs
/// from immediately-following-Cb whenever the payload carries trailing
/// padding.
fn i420(width: u32, height: u32, data: &[u8]) -> Result<Raster> {
    // chroma is halved in both directions; odd dimensions leave the quarter
    // planes short of what conversion reads back
    if width % 2 != 0 || height % 2 != 0 {
        return Err(Error::UnsupportedFormat(format!("i420 {width}x{height}")));
    }
    let pixels = width as usize * height as usize;
    let quarter = pixels / 4;
    need(data, pixels + 2 * quarter)?;

    Ok(Raster::Ycbcr(YcbcrBuffer {
        width,
        height,
        y: data[..pixels].to_vec(),
        cb: data[pixels..pixels + quarter].to_vec(),
        cr: data[data.len() - quarter..].to_vec(),
        subsampling: Subsampling::Ratio420,
    }))
}

impl Packet {
    /// Reconstruct the still image carried by an image packet.
    ///
    /// # Errors
    /// [Error::UnsupportedFormat] for science packets and h264 payloads,
    /// or any reconstruction failure.
    pub fn raster(&self) -> Result<Raster> {
        match &self.data.kind {
            DataKind::Image(info) => reconstruct(
                info.format,
                u32::from(info.pixels_x),
                u32::from(info.pixels_y),
                &self.payload,
            ),
            DataKind::Science { .. } => Err(Error::UnsupportedFormat("science".to_string())),
        }
    }

    /// Reconstruct and encode to `w` in the requested target format.
    ///
    /// JPEG and PNG source payloads are emitted verbatim regardless of the
    /// requested target; see [`Raster::write_to`].
    ///
    /// # Errors
    /// As [`Packet::raster`] plus any encoder or sink error.
    pub fn export<W: Write>(&self, w: W, format: ExportFormat) -> Result<()> {
        self.raster()?.write_to(w, format)
    }
}
