use std::io::Read;

use hrdl::{
    by_channel, integrity, ArchiveHeader, Channel, DataHeader, DataKind, Decoder, ExportFormat,
    FilteredDecoder, FrameHeader, ImageFormat, ImageInfo, Outcome, Packet, UPI_LEN,
};

/// One complete record per read call, the HRDP archive reader contract.
struct Records {
    records: Vec<Vec<u8>>,
    next: usize,
}

impl Records {
    fn new(records: Vec<Vec<u8>>) -> Self {
        Self { records, next: 0 }
    }
}

impl Read for Records {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(rec) = self.records.get(self.next) else {
            return Ok(0);
        };
        self.next += 1;
        buf[..rec.len()].copy_from_slice(rec);
        Ok(rec.len())
    }
}

fn seal(packet: &Packet) -> Vec<u8> {
    let mut buf = packet.encode().unwrap();
    let n = buf.len();
    let sum = integrity::sum32(&buf[..n - 4]);
    buf[n - 4..].copy_from_slice(&sum.to_le_bytes());
    buf
}

fn science(origin: u8, sequence: u32, payload: &[u8]) -> Packet {
    Packet {
        archive: None,
        frame: FrameHeader {
            size: (16 + 56 + payload.len()) as u32,
            channel: Channel::Lrsd,
            origin,
            sequence,
            coarse: 700_000_000,
            fine: 0,
        },
        data: DataHeader {
            property: 0x10,
            stream: 4,
            counter: sequence,
            acq_time: 1_234_567_890 * 1_000_000_000,
            aux_time: 0,
            origin,
            kind: DataKind::Science {
                upi: *b"FLUID-SCIENCE\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0",
            },
        },
        payload: payload.to_vec(),
        sum: 0,
    }
}

fn image(origin: u8, sequence: u32, format: ImageFormat, w: u16, h: u16, payload: &[u8]) -> Packet {
    Packet {
        archive: None,
        frame: FrameHeader {
            size: (16 + 76 + payload.len()) as u32,
            channel: Channel::Vic1,
            origin,
            sequence,
            coarse: 700_000_000,
            fine: 0,
        },
        data: DataHeader {
            property: 0x20,
            stream: 1,
            counter: sequence,
            acq_time: 1_234_567_890 * 1_000_000_000,
            aux_time: 0,
            origin,
            kind: DataKind::Image(ImageInfo {
                format,
                pixels_x: w,
                pixels_y: h,
                offset_x: 0,
                size_x: w,
                offset_y: 0,
                size_y: h,
                dropping: 0,
                scale_x: 1,
                scale_y: 1,
                ratio: 1,
                upi: [0u8; UPI_LEN],
            }),
        },
        payload: payload.to_vec(),
        sum: 0,
    }
}

/// Wrap a sealed bare frame in an HRDP archive envelope. The trailer
/// checksum covers the frame span only, so the sealed sum stays valid.
fn archived(frame: &[u8]) -> Vec<u8> {
    let mut rec = vec![0u8; ArchiveHeader::LEN];
    rec[0..4].copy_from_slice(&(frame.len() as u32).to_le_bytes());
    rec[7] = 3;
    rec[8..12].copy_from_slice(&700_000_000u32.to_be_bytes());
    rec[13..17].copy_from_slice(&700_000_060u32.to_be_bytes());
    rec.extend_from_slice(frame);
    rec
}

#[test]
fn mixed_stream_decodes_in_order() {
    let recs = vec![
        seal(&science(0x42, 1, b"alpha")),
        seal(&image(0x51, 1, ImageFormat::Gray, 2, 2, &[1, 2, 3, 4])),
        seal(&science(0x42, 2, b"beta")),
    ];
    let packets: Vec<(Packet, Outcome)> = Decoder::new(Records::new(recs), true)
        .map(|zult| zult.unwrap())
        .collect();

    assert_eq!(packets.len(), 3);
    assert!(packets.iter().all(|(_, o)| *o == Outcome::Ok));
    assert_eq!(packets[0].0.payload, b"alpha");
    assert_eq!(packets[1].0.frame.channel, Channel::Vic1);
    assert_eq!(packets[2].0.frame.sequence, 2);
}

#[test]
fn archived_records_carry_the_envelope() {
    let recs = vec![archived(&seal(&science(0x42, 1, b"stored")))];
    let (packet, outcome) = Decoder::new(Records::new(recs), true)
        .next()
        .unwrap()
        .unwrap();

    assert_eq!(outcome, Outcome::Ok);
    let archive = packet.archive.expect("archive envelope");
    assert_eq!(archive.channel, 3);
    assert!((archive.elapsed().to_seconds() - 60.0).abs() < 1e-3);
    assert_eq!(packet.payload, b"stored");
}

#[test]
fn channel_filter_and_gap_accounting() {
    let recs = vec![
        seal(&science(0x42, 100, b"a")),
        seal(&image(0x51, 7, ImageFormat::Gray, 2, 2, &[0, 0, 0, 0])),
        seal(&science(0x42, 105, b"b")),
    ];
    let decoder = Decoder::new(Records::new(recs), false);
    let mut lrsd = FilteredDecoder::new(decoder, by_channel(Channel::Lrsd, false));

    let (first, _) = lrsd.decode().unwrap().unwrap();
    let (second, _) = lrsd.decode().unwrap().unwrap();
    assert!(lrsd.decode().is_none());

    assert_eq!(first.frame.sequence, 100);
    assert_eq!(second.frame.sequence, 105);
    assert_eq!(second.missing(&first), 4);
}

#[test]
fn corrupt_records_do_not_stop_the_stream() {
    let mut bad_sum = seal(&science(0x42, 2, b"damaged"));
    let n = bad_sum.len();
    bad_sum[n - 1] ^= 0x40;

    let recs = vec![
        seal(&science(0x42, 1, b"fine")),
        vec![0xde, 0xad], // skip
        bad_sum,          // invalid, fully decoded
        seal(&science(0x42, 3, b"fine again")),
    ];
    let mut decoder = Decoder::new(Records::new(recs), true);

    let (_, outcome) = decoder.decode().unwrap().unwrap();
    assert_eq!(outcome, Outcome::Ok);
    assert!(matches!(decoder.decode().unwrap(), Err(hrdl::Error::Skip)));
    let (p, outcome) = decoder.decode().unwrap().unwrap();
    assert_eq!(outcome, Outcome::Invalid);
    assert_eq!(p.payload, b"damaged");
    let (_, outcome) = decoder.decode().unwrap().unwrap();
    assert_eq!(outcome, Outcome::Ok);
    assert!(decoder.decode().is_none());
}

#[test]
fn decoded_image_packet_exports_to_png() {
    let payload: Vec<u8> = (0u8..16).collect();
    let rec = seal(&image(0x51, 1, ImageFormat::Gray, 4, 4, &payload));
    let (packet, outcome) = Packet::decode(&rec, true).unwrap();
    assert_eq!(outcome, Outcome::Ok);

    let mut out = Vec::new();
    packet.export(&mut out, ExportFormat::Png).unwrap();
    assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn science_packets_do_not_export() {
    let rec = seal(&science(0x42, 1, b"numbers"));
    let (packet, _) = Packet::decode(&rec, true).unwrap();
    let mut out = Vec::new();
    assert!(matches!(
        packet.export(&mut out, ExportFormat::Png),
        Err(hrdl::Error::UnsupportedFormat(_))
    ));
    assert!(out.is_empty());
}

#[test]
fn wire_roundtrip_preserves_every_field() {
    let payload: Vec<u8> = (0..512).map(|_| rand::random::<u8>()).collect();
    let rec = seal(&science(0x42, 9, &payload));
    let (packet, outcome) = Packet::decode(&rec, true).unwrap();
    assert_eq!(outcome, Outcome::Ok);
    assert_eq!(packet.encode().unwrap(), rec);

    let (again, outcome) = Packet::decode(&packet.encode().unwrap(), true).unwrap();
    assert_eq!(outcome, Outcome::Ok);
    assert_eq!(again, packet);
}

#[test]
fn filenames_are_stable_identifiers() {
    let rec = seal(&science(0x42, 9, b"x"));
    let (packet, _) = Packet::decode(&rec, true).unwrap();
    let name = packet.filename();
    assert!(name.starts_with("0042_FLUID-SCIENCE_3_000009_"));
    assert!(name.ends_with(".dat"));
}
