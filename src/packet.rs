//! HRDP/HRDL/VMU container decoding.
//!
//! A record is an HRDL frame, optionally wrapped in an 18 byte HRDP archive
//! envelope when it was stored by the ground archive rather than received
//! live. The frame itself is an 8 byte sync-marked preamble, a 16 byte VMU
//! subheader, a science or image data header, the payload bytes, and a
//! trailing additive 32-bit checksum covering everything inside the frame
//! except the trailer itself.
use std::fmt::Display;

use hifitime::{Duration, Epoch, Unit};
use serde::{Deserialize, Serialize};

use crate::upi::user_info;
use crate::{integrity, timecode, Error, Result};

/// Marker word opening every HRDL frame, big-endian on the wire.
pub const SYNCWORD: u32 = 0xF82E_3553;

/// Size of the User Product Identifier field.
pub const UPI_LEN: usize = 32;

/// Frame preamble: syncword + frame size.
const PREAMBLE_LEN: usize = 8;
/// VMU subheader following the preamble.
const SUBHEADER_LEN: usize = 16;

/// Science (LRSD) data header size.
pub const SCIENCE_HEADER_LEN: usize = 56;
/// Image (VIC) data header size.
pub const IMAGE_HEADER_LEN: usize = 76;

/// Traffic class of a frame.
///
/// VIC1 and VIC2 are the two independent image sources; LRSD carries
/// low-rate science data. Any other wire value is rejected at decode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    Vic1 = 1,
    Vic2 = 2,
    Lrsd = 3,
}

impl Channel {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Channel::Vic1),
            2 => Some(Channel::Vic2),
            3 => Some(Channel::Lrsd),
            _ => None,
        }
    }

    /// Size of the data header this channel carries.
    #[must_use]
    pub fn data_header_len(self) -> usize {
        match self {
            Channel::Vic1 | Channel::Vic2 => IMAGE_HEADER_LEN,
            Channel::Lrsd => SCIENCE_HEADER_LEN,
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Channel::Vic1 => "vic1",
            Channel::Vic2 => "vic2",
            Channel::Lrsd => "lrsd",
        };
        f.write_str(name)
    }
}

/// Pixel encoding tag carried in an image data header.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageFormat {
    Gray = 1,
    Gray16Be = 2,
    Gray16Le = 3,
    Yuy2 = 4,
    I420 = 5,
    Rgb = 6,
    Jpeg = 7,
    Png = 8,
    H264 = 9,
}

impl ImageFormat {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ImageFormat::Gray),
            2 => Some(ImageFormat::Gray16Be),
            3 => Some(ImageFormat::Gray16Le),
            4 => Some(ImageFormat::Yuy2),
            5 => Some(ImageFormat::I420),
            6 => Some(ImageFormat::Rgb),
            7 => Some(ImageFormat::Jpeg),
            8 => Some(ImageFormat::Png),
            9 => Some(ImageFormat::H264),
            _ => None,
        }
    }

    /// Conventional file extension for this encoding.
    #[must_use]
    pub fn ext(self) -> &'static str {
        match self {
            ImageFormat::Gray => "gray",
            ImageFormat::Gray16Be => "gray16be",
            ImageFormat::Gray16Le => "gray16le",
            ImageFormat::Yuy2 => "yuy2",
            ImageFormat::I420 => "i420",
            ImageFormat::Rgb => "rgb",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::H264 => "h264",
        }
    }

    /// True for payloads that are already-encoded bitstreams rather than
    /// raw pixels.
    #[must_use]
    pub fn is_bitstream(self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Png)
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ext())
    }
}

/// Integrity classification of a decoded packet.
///
/// A checksum mismatch is a data-quality classification, not a parse
/// failure: the packet is fully populated either way.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Trailer checksum verified.
    Ok,
    /// Fully decoded, but the computed checksum does not match the wire
    /// trailer. Usable for metadata; payload integrity is not guaranteed.
    Invalid,
}

/// HRDP archive envelope wrapping a frame stored by the ground archive.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub size: u32,
    /// Error bitmask set by the archiver.
    pub error: u16,
    pub payload: u8,
    pub channel: u8,
    pub acq_coarse: u32,
    pub acq_fine: u8,
    pub archive_coarse: u32,
    pub archive_fine: u8,
}

impl ArchiveHeader {
    pub const LEN: usize = 18;

    /// Decode from bytes.
    ///
    /// # Errors
    /// [Error::Skip] if `buf` is shorter than [`ArchiveHeader::LEN`].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(Error::Skip);
        }
        Ok(Self {
            size: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            error: u16::from_be_bytes([buf[4], buf[5]]),
            payload: buf[6],
            channel: buf[7],
            acq_coarse: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            acq_fine: buf[12],
            archive_coarse: u32::from_be_bytes([buf[13], buf[14], buf[15], buf[16]]),
            archive_fine: buf[17],
        })
    }

    /// Onboard acquisition time.
    #[must_use]
    pub fn acquisition(&self) -> Epoch {
        timecode::from_coarse_fine8(self.acq_coarse, self.acq_fine)
    }

    /// Time the record was inserted into the ground archive.
    #[must_use]
    pub fn archive_time(&self) -> Epoch {
        timecode::from_coarse_fine8(self.archive_coarse, self.archive_fine)
    }

    /// Delay between acquisition and archive insertion.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.archive_time() - self.acquisition()
    }
}

/// HRDL frame preamble and VMU subheader.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Size of the subheader + data header + payload region that follows
    /// the preamble.
    pub size: u32,
    pub channel: Channel,
    /// Numeric id of the producing unit.
    pub origin: u8,
    /// Per-channel monotonically increasing counter, wrapping at 32 bits.
    pub sequence: u32,
    pub coarse: u32,
    pub fine: u16,
}

impl FrameHeader {
    /// Preamble plus subheader size.
    pub const LEN: usize = PREAMBLE_LEN + SUBHEADER_LEN;

    /// Decode from bytes starting at the frame preamble.
    ///
    /// # Errors
    /// [Error::Skip] if `buf` is shorter than [`FrameHeader::LEN`] or the
    /// channel byte is not a known [Channel]; [Error::Syncword] if the
    /// leading marker is not [SYNCWORD].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(Error::Skip);
        }
        let word = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if word != SYNCWORD {
            return Err(Error::Syncword);
        }
        let channel = Channel::from_u8(buf[8]).ok_or(Error::Skip)?;
        Ok(Self {
            size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            channel,
            origin: buf[9],
            // buf[10..12] reserved
            sequence: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            coarse: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            fine: u16::from_le_bytes([buf[20], buf[21]]),
        })
    }

    /// Onboard frame timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Epoch {
        timecode::from_coarse_fine16(self.coarse, self.fine)
    }
}

/// Image-specific fields of a VIC data header.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    /// Original image size in pixels.
    pub pixels_x: u16,
    pub pixels_y: u16,
    /// Region of interest settings.
    pub offset_x: u16,
    pub size_x: u16,
    pub offset_y: u16,
    pub size_y: u16,
    pub dropping: u16,
    /// Scaling settings.
    pub scale_x: u16,
    pub scale_y: u16,
    pub ratio: u8,
    pub upi: [u8; UPI_LEN],
}

/// Variant payload of a [DataHeader], selected by the Property nibble.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Science { upi: [u8; UPI_LEN] },
    Image(ImageInfo),
}

/// VMU data header, science or image flavored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub property: u8,
    pub stream: u16,
    /// Per-origin monotonically increasing counter.
    pub counter: u32,
    /// Acquisition time, nanoseconds from the GPS epoch.
    pub acq_time: i64,
    /// Auxiliary time, nanoseconds from the GPS epoch.
    pub aux_time: i64,
    pub origin: u8,
    pub kind: DataKind,
}

impl DataHeader {
    /// Decode from bytes.
    ///
    /// The high nibble of the leading Property byte selects the variant:
    /// 1 is science (56 bytes), 2 is image (76 bytes).
    ///
    /// # Errors
    /// [Error::Skip] on any other nibble value, an unknown image format
    /// tag, or a short buffer.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::Skip);
        }
        let property = buf[0];
        let expected = match property >> 4 {
            1 => SCIENCE_HEADER_LEN,
            2 => IMAGE_HEADER_LEN,
            _ => return Err(Error::Skip),
        };
        if buf.len() < expected {
            return Err(Error::Skip);
        }

        let kind = match property >> 4 {
            1 => {
                let mut upi = [0u8; UPI_LEN];
                upi.copy_from_slice(&buf[24..24 + UPI_LEN]);
                DataKind::Science { upi }
            }
            _ => {
                let format = ImageFormat::from_u8(buf[24]).ok_or(Error::Skip)?;
                let pixels = u32::from_le_bytes([buf[25], buf[26], buf[27], buf[28]]);
                let roi = u64::from_le_bytes([
                    buf[29], buf[30], buf[31], buf[32], buf[33], buf[34], buf[35], buf[36],
                ]);
                let dropping = u16::from_le_bytes([buf[37], buf[38]]);
                let scaling = u32::from_le_bytes([buf[39], buf[40], buf[41], buf[42]]);
                let mut upi = [0u8; UPI_LEN];
                upi.copy_from_slice(&buf[44..44 + UPI_LEN]);
                DataKind::Image(ImageInfo {
                    format,
                    pixels_x: (pixels >> 16) as u16,
                    pixels_y: (pixels & 0xffff) as u16,
                    offset_x: ((roi >> 48) & 0xffff) as u16,
                    size_x: ((roi >> 32) & 0xffff) as u16,
                    offset_y: ((roi >> 16) & 0xffff) as u16,
                    size_y: (roi & 0xffff) as u16,
                    dropping,
                    scale_x: (scaling >> 16) as u16,
                    scale_y: (scaling & 0xffff) as u16,
                    ratio: buf[43],
                    upi,
                })
            }
        };

        Ok(Self {
            property,
            stream: u16::from_le_bytes([buf[1], buf[2]]),
            counter: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
            acq_time: i64::from_le_bytes([
                buf[7], buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14],
            ]),
            aux_time: i64::from_le_bytes([
                buf[15], buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22],
            ]),
            origin: buf[23],
            kind,
        })
    }

    /// Size of this header on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        match self.kind {
            DataKind::Science { .. } => SCIENCE_HEADER_LEN,
            DataKind::Image(_) => IMAGE_HEADER_LEN,
        }
    }

    /// The raw 32 byte UPI field.
    #[must_use]
    pub fn upi(&self) -> &[u8; UPI_LEN] {
        match &self.kind {
            DataKind::Science { upi } => upi,
            DataKind::Image(info) => &info.upi,
        }
    }

    /// Printable UPI prefix; empty when the field carries no usable token.
    #[must_use]
    pub fn user_info(&self) -> String {
        user_info(self.upi())
    }

    #[must_use]
    pub fn acquisition(&self) -> Epoch {
        timecode::from_gps_nanoseconds(self.acq_time)
    }

    #[must_use]
    pub fn auxiliary(&self) -> Epoch {
        timecode::from_gps_nanoseconds(self.aux_time)
    }
}

/// One fully decoded telemetry unit.
///
/// The payload is owned outright: bytes are copied out of the decode buffer
/// so a packet stays valid after its byte source reuses that buffer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Present only when the record carried an HRDP archive envelope.
    pub archive: Option<ArchiveHeader>,
    pub frame: FrameHeader,
    pub data: DataHeader,
    pub payload: Vec<u8>,
    /// Checksum read from the wire trailer, valid or not.
    pub sum: u32,
}

impl Packet {
    /// Decode one complete record.
    ///
    /// When `with_data` is false the payload is not materialized, which
    /// makes metadata-only scans cheap. The returned [Outcome] classifies
    /// checksum integrity; a packet is returned either way.
    ///
    /// # Errors
    /// [Error::Skip] for records too short or structurally unrecognized,
    /// [Error::Syncword] when the frame marker is absent where required.
    pub fn decode(buf: &[u8], with_data: bool) -> Result<(Packet, Outcome)> {
        if buf.len() < 4 {
            return Err(Error::Skip);
        }

        let word = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let (archive, mut cursor) = if word == SYNCWORD {
            (None, 0)
        } else {
            (Some(ArchiveHeader::decode(buf)?), ArchiveHeader::LEN)
        };
        let span_start = cursor;

        let frame = FrameHeader::decode(&buf[cursor..])?;
        let data_header_len = frame.channel.data_header_len();
        if buf.len() < cursor + FrameHeader::LEN + data_header_len {
            return Err(Error::Skip);
        }
        cursor += FrameHeader::LEN;

        let data = DataHeader::decode(&buf[cursor..])?;
        cursor += data_header_len;

        let payload_len = i64::from(frame.size) - (SUBHEADER_LEN + data_header_len) as i64;
        if payload_len < 0 {
            return Err(Error::Skip);
        }
        let payload_len = payload_len as usize;

        let mut payload = Vec::new();
        if with_data {
            if payload_len >= buf.len() - cursor {
                return Err(Error::Skip);
            }
            payload.extend_from_slice(&buf[cursor..cursor + payload_len]);
        }

        let computed = integrity::sum32(&buf[span_start..buf.len() - 4]);
        let n = buf.len();
        let sum = u32::from_le_bytes([buf[n - 4], buf[n - 3], buf[n - 2], buf[n - 1]]);

        let outcome = if computed == sum {
            Outcome::Ok
        } else {
            Outcome::Invalid
        };
        Ok((
            Packet {
                archive,
                frame,
                data,
                payload,
                sum,
            },
            outcome,
        ))
    }

    /// Serialize back to wire bytes as a bare frame.
    ///
    /// The archive envelope, if any, is never written. The trailer is the
    /// packet's existing [`sum`](Packet::sum), written verbatim rather than
    /// recomputed: re-serialization is only meaningful for an unmodified,
    /// previously decoded packet. Mutating headers or payload before
    /// encoding produces a record that will classify as
    /// [`Outcome::Invalid`] on decode.
    ///
    /// # Errors
    /// [Error::EmptyPayload] when there are no payload bytes to write.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let total =
            FrameHeader::LEN + self.data.wire_len() + self.payload.len() + 4;
        let mut out = Vec::with_capacity(total);

        out.extend_from_slice(&SYNCWORD.to_be_bytes());
        out.extend_from_slice(&self.frame.size.to_le_bytes());
        out.push(self.frame.channel as u8);
        out.push(self.frame.origin);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.frame.sequence.to_le_bytes());
        out.extend_from_slice(&self.frame.coarse.to_le_bytes());
        out.extend_from_slice(&self.frame.fine.to_le_bytes());
        out.extend_from_slice(&[0, 0]);

        out.push(self.data.property);
        out.extend_from_slice(&self.data.stream.to_le_bytes());
        out.extend_from_slice(&self.data.counter.to_le_bytes());
        out.extend_from_slice(&self.data.acq_time.to_le_bytes());
        out.extend_from_slice(&self.data.aux_time.to_le_bytes());
        out.push(self.data.origin);
        match &self.data.kind {
            DataKind::Science { upi } => out.extend_from_slice(upi),
            DataKind::Image(info) => {
                out.push(info.format as u8);
                let pixels = (u32::from(info.pixels_x) << 16) | u32::from(info.pixels_y);
                out.extend_from_slice(&pixels.to_le_bytes());
                let roi = (u64::from(info.offset_x) << 48)
                    | (u64::from(info.size_x) << 32)
                    | (u64::from(info.offset_y) << 16)
                    | u64::from(info.size_y);
                out.extend_from_slice(&roi.to_le_bytes());
                out.extend_from_slice(&info.dropping.to_le_bytes());
                let scaling = (u32::from(info.scale_x) << 16) | u32::from(info.scale_y);
                out.extend_from_slice(&scaling.to_le_bytes());
                out.push(info.ratio);
                out.extend_from_slice(&info.upi);
            }
        }

        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.sum.to_le_bytes());
        Ok(out)
    }

    /// Number of frames missing between `other` and this packet.
    ///
    /// Sequences are comparable only within one channel; packets from
    /// different channels report 0.
    #[must_use]
    pub fn missing(&self, other: &Packet) -> u32 {
        if self.frame.channel != other.frame.channel {
            return 0;
        }
        let diff = self.frame.sequence.wrapping_sub(other.frame.sequence);
        if diff == self.frame.sequence {
            diff
        } else {
            diff.wrapping_sub(1)
        }
    }

    /// True when the frame was produced by the same unit that acquired the
    /// data, i.e. realtime traffic rather than playback.
    #[must_use]
    pub fn is_realtime(&self) -> bool {
        self.frame.origin == self.data.origin
    }

    /// Conventional file extension for this packet's payload.
    #[must_use]
    pub fn data_type(&self) -> &'static str {
        match &self.data.kind {
            DataKind::Science { .. } => "dat",
            DataKind::Image(info) => info.format.ext(),
        }
    }

    /// Archive naming convention for this packet; same as [Display].
    #[must_use]
    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl Display for Packet {
    /// `origin_upi_channel_counter_acqtime_delta.ext`, where delta is the
    /// whole minutes between the frame timestamp and data acquisition.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let acq = self.data.acquisition();
        let (year, month, day, hh, mm, ss, _) = acq.to_gregorian_utc();
        let delta = (self.frame.timestamp() - acq).to_unit(Unit::Minute) as i64;

        let mut upi = self.data.user_info();
        if upi.is_empty() {
            upi = match self.frame.channel {
                Channel::Lrsd => "science".to_string(),
                Channel::Vic1 | Channel::Vic2 => "image".to_string(),
            };
        }
        write!(
            f,
            "{:04x}_{}_{}_{:06}_{:04}{:02}{:02}_{:02}{:02}{:02}_{:09}.{}",
            self.data.origin,
            upi,
            self.frame.channel as u8,
            self.data.counter,
            year,
            month,
            day,
            hh,
            mm,
            ss,
            delta,
            self.data_type(),
        )
    }
}
