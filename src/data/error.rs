use std::path::PathBuf;

/// Which of the two IDX files a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdxKind {
    Labels,
    Images,
}

impl std::fmt::Display for IdxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdxKind::Labels => write!(f, "label"),
            IdxKind::Images => write!(f, "image"),
        }
    }
}

/// Everything that can go wrong while turning a pair of IDX files into a dataset.
///
/// Every variant is terminal: the decoder never returns a partially filled set.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("cannot open {kind} file '{path}': {source}")]
    FileAccess {
        kind: IdxKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decompress {kind} file '{path}': {source}")]
    Decompression {
        kind: IdxKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IDX {kind} file too short: header needs {expected} bytes, got {actual}")]
    TruncatedHeader {
        kind: IdxKind,
        expected: usize,
        actual: usize,
    },

    #[error("IDX {kind} payload truncated: header declares {expected} bytes, found {actual}")]
    TruncatedPayload {
        kind: IdxKind,
        expected: usize,
        actual: usize,
    },

    #[error("IDX {kind} file malformed: {reason}")]
    Format { kind: IdxKind, reason: String },

    #[error("label file declares {labels} items but image file declares {images}")]
    CountMismatch { labels: usize, images: usize },
}

impl DecodeError {
    pub(crate) fn format(kind: IdxKind, reason: impl Into<String>) -> Self {
        DecodeError::Format {
            kind,
            reason: reason.into(),
        }
    }
}
