#![doc = include_str!("../README.md")]

mod error;
mod upi;

pub mod decoder;
pub mod integrity;
pub mod packet;
pub mod raster;
pub mod timecode;

pub use decoder::{by_channel, by_origin, Decoder, FilteredDecoder};
pub use error::{Error, Result};
pub use packet::{
    ArchiveHeader, Channel, DataHeader, DataKind, FrameHeader, ImageFormat, ImageInfo, Outcome,
    Packet, SYNCWORD, UPI_LEN,
};
pub use raster::{reconstruct, ExportFormat, Gray16Image, Raster, Subsampling, YcbcrBuffer};
pub use upi::user_info;
