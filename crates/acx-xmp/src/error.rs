use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmpError {
    #[error("not a JPEG stream (missing SOI marker)")]
    NotJpeg,
    #[error("XMP packet is {len} bytes, a single APP1 segment holds at most {max}")]
    PacketTooLarge { len: usize, max: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
