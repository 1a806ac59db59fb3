//! Parsing and writing of the IDX binary layout used by MNIST and its
//! derivatives (Fashion-MNIST, EMNIST, …).
//!
//! # IDX1 label file layout
//! ```text
//! bytes  0-3:   magic       (0x00000801, big-endian u32)
//! bytes  4-7:   N           (number of labels, big-endian u32)
//! bytes  8..:   N bytes, each an unsigned class index
//! ```
//!
//! # IDX3 image file layout
//! ```text
//! bytes  0-3:   magic       (0x00000803, big-endian u32)
//! bytes  4-7:   N           (number of images, big-endian u32)
//! bytes  8-11:  rows        (big-endian u32)
//! bytes 12-15:  cols        (big-endian u32)
//! bytes 16..:   N * rows * cols bytes, row-major, uint8
//! ```
//!
//! Both decoders work on the already-decompressed file contents. They either
//! return a complete set or a [`DecodeError`]; the payload length must match
//! the header exactly.

use crate::data::dataset::{ImageSet, LabelSet};
use crate::data::error::{DecodeError, IdxKind};

pub const LABEL_MAGIC: u32 = 0x0000_0801;
pub const IMAGE_MAGIC: u32 = 0x0000_0803;

pub const LABEL_HEADER_LEN: usize = 8;
pub const IMAGE_HEADER_LEN: usize = 16;

/// Side length of an MNIST digit.
pub const MNIST_SIDE: usize = 28;

/// Height and width of every image in an IDX3 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub rows: usize,
    pub cols: usize,
}

impl Dims {
    pub const MNIST: Dims = Dims {
        rows: MNIST_SIDE,
        cols: MNIST_SIDE,
    };

    pub fn new(rows: usize, cols: usize) -> Self {
        Dims { rows, cols }
    }

    /// Pixels per image.
    pub fn pixels(&self) -> usize {
        self.rows * self.cols
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.rows, self.cols)
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn check_magic(kind: IdxKind, found: u32, expected: u32) -> Result<(), DecodeError> {
    if found != expected {
        return Err(DecodeError::format(
            kind,
            format!("magic number must be {expected:#010x}, got {found:#010x}"),
        ));
    }
    Ok(())
}

/// Checks that `payload` holds exactly `expected` bytes.
fn check_payload(kind: IdxKind, payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() < expected {
        return Err(DecodeError::TruncatedPayload {
            kind,
            expected,
            actual: payload.len(),
        });
    }
    if payload.len() > expected {
        return Err(DecodeError::format(
            kind,
            format!(
                "header declares {} payload bytes but {} follow the header",
                expected,
                payload.len()
            ),
        ));
    }
    Ok(())
}

/// Decodes the contents of an IDX1 label file.
///
/// Labels are taken as unsigned bytes, so every value lies in `[0, 255]`.
pub fn decode_labels(bytes: &[u8]) -> Result<LabelSet, DecodeError> {
    let kind = IdxKind::Labels;

    // ── Header ──────────────────────────────────────────────────────────────

    if bytes.len() < LABEL_HEADER_LEN {
        return Err(DecodeError::TruncatedHeader {
            kind,
            expected: LABEL_HEADER_LEN,
            actual: bytes.len(),
        });
    }
    check_magic(kind, be_u32(bytes, 0), LABEL_MAGIC)?;
    let count = be_u32(bytes, 4) as usize;

    // ── Payload ─────────────────────────────────────────────────────────────

    let payload = &bytes[LABEL_HEADER_LEN..];
    check_payload(kind, payload, count)?;

    log::debug!("decoded {count} labels");
    Ok(LabelSet::new(payload.to_vec()))
}

/// Decodes the contents of an IDX3 image file.
///
/// The header dimensions must equal `expected`; a file of 32×32 images is
/// rejected when 28×28 is expected instead of being reinterpreted.
pub fn decode_images(bytes: &[u8], expected: Dims) -> Result<ImageSet, DecodeError> {
    let kind = IdxKind::Images;

    // ── Header ──────────────────────────────────────────────────────────────

    if bytes.len() < IMAGE_HEADER_LEN {
        return Err(DecodeError::TruncatedHeader {
            kind,
            expected: IMAGE_HEADER_LEN,
            actual: bytes.len(),
        });
    }
    check_magic(kind, be_u32(bytes, 0), IMAGE_MAGIC)?;
    let count = be_u32(bytes, 4) as usize;
    let dims = Dims::new(be_u32(bytes, 8) as usize, be_u32(bytes, 12) as usize);

    if dims.rows == 0 || dims.cols == 0 {
        return Err(DecodeError::format(
            kind,
            format!("header declares {dims} images; both sides must be positive"),
        ));
    }
    if dims != expected {
        return Err(DecodeError::format(
            kind,
            format!("header declares {dims} images, expected {expected}"),
        ));
    }

    let payload_len = count
        .checked_mul(dims.pixels())
        .ok_or_else(|| {
            DecodeError::format(
                kind,
                format!("{count} images of {dims} pixels overflows usize"),
            )
        })?;

    // ── Payload ─────────────────────────────────────────────────────────────

    let payload = &bytes[IMAGE_HEADER_LEN..];
    check_payload(kind, payload, payload_len)?;

    log::debug!("decoded {count} images of {dims}");
    Ok(ImageSet::new(dims, payload.to_vec()))
}

/// Serializes labels as an IDX1 file.
pub fn encode_labels(labels: &LabelSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(LABEL_HEADER_LEN + labels.len());
    out.extend_from_slice(&LABEL_MAGIC.to_be_bytes());
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    out.extend_from_slice(labels.as_slice());
    out
}

/// Serializes images as an IDX3 file.
pub fn encode_images(images: &ImageSet) -> Vec<u8> {
    let dims = images.dims();
    let mut out = Vec::with_capacity(IMAGE_HEADER_LEN + images.as_bytes().len());
    out.extend_from_slice(&IMAGE_MAGIC.to_be_bytes());
    out.extend_from_slice(&(images.len() as u32).to_be_bytes());
    out.extend_from_slice(&(dims.rows as u32).to_be_bytes());
    out.extend_from_slice(&(dims.cols as u32).to_be_bytes());
    out.extend_from_slice(images.as_bytes());
    out
}
