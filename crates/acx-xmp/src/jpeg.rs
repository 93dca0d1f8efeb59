//! APP1 splicing for JPEG streams.
//!
//! Segment layout: `FF <marker> <len_hi> <len_lo> <payload>` where the length
//! counts itself but not the marker. Entropy-coded data follows SOS and is
//! never touched.

use crate::error::XmpError;
use crate::XMP_HEADER;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const TEM: u8 = 0x01;

/// Largest packet that fits a single APP1 segment.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize - 2 - XMP_HEADER.len();

/// Insert `packet` as an XMP APP1 segment directly after SOI.
///
/// XMP segments already present before the scan data are dropped so that
/// repeated runs leave exactly one packet in the file.
pub fn inject_jpeg(data: &[u8], packet: &str) -> Result<Vec<u8>, XmpError> {
    if !data.starts_with(&SOI) {
        return Err(XmpError::NotJpeg);
    }
    let packet = packet.as_bytes();
    if packet.len() > MAX_PACKET_LEN {
        return Err(XmpError::PacketTooLarge {
            len: packet.len(),
            max: MAX_PACKET_LEN,
        });
    }

    let seg_len = (2 + XMP_HEADER.len() + packet.len()) as u16;
    let mut out = Vec::with_capacity(data.len() + seg_len as usize + 2);
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&[0xFF, APP1]);
    out.extend_from_slice(&seg_len.to_be_bytes());
    out.extend_from_slice(XMP_HEADER);
    out.extend_from_slice(packet);
    strip_xmp_segments(&data[SOI.len()..], &mut out);
    Ok(out)
}

/// Copy the header segments in `body` to `out`, leaving out XMP APP1 segments.
///
/// The walk stops at SOS, EOI or anything it cannot parse; the remainder is
/// copied verbatim.
fn strip_xmp_segments(body: &[u8], out: &mut Vec<u8>) {
    let mut pos = 0;
    let mut stripped = 0usize;

    while pos + 1 < body.len() && body[pos] == 0xFF {
        let marker = body[pos + 1];
        if marker == 0xFF {
            // fill byte
            out.push(0xFF);
            pos += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            break;
        }
        if marker == TEM || (0xD0..=0xD7).contains(&marker) {
            out.extend_from_slice(&body[pos..pos + 2]);
            pos += 2;
            continue;
        }
        if pos + 4 > body.len() {
            break;
        }
        let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > body.len() {
            break;
        }

        let payload = &body[pos + 4..end];
        if marker == APP1 && payload.starts_with(XMP_HEADER) {
            stripped += 1;
        } else {
            out.extend_from_slice(&body[pos..end]);
        }
        pos = end;
    }

    if stripped > 0 {
        tracing::debug!(stripped, "removed existing XMP segments");
    }
    out.extend_from_slice(&body[pos..]);
}
