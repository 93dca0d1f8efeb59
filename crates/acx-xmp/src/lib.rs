//! acx-xmp: Face pose metadata as XMP packets embedded in image files.
//!
//! JPEG sources receive a standard APP1 segment. Other formats get the packet
//! appended after the image data, which decoders ignore and byte scanners such
//! as [`has_required_pose_xmp`] still find.

pub mod error;
pub mod jpeg;
pub mod packet;
pub mod scan;
pub mod writer;

/// Namespace identifier that opens every XMP APP1 payload.
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

pub use error::XmpError;
pub use jpeg::inject_jpeg;
pub use packet::{display_name, generate_xmp};
pub use scan::{file_has_required_pose_xmp, has_required_pose_xmp, REQUIRED_TAGS};
pub use writer::{append_trailer, write_xmp_to_source, WriteOutcome};
