pub mod dataset;
pub mod error;
pub mod idx;
pub mod iter;

pub use dataset::{
    read_data, read_data_with_dims, read_images, read_labels, Dataset, ImageSet, ImageTensor,
    LabelSet, Split,
};
pub use error::{DecodeError, IdxKind};
pub use idx::{decode_images, decode_labels, encode_images, encode_labels, Dims, MNIST_SIDE};
pub use iter::{Batch, BatchIter, LastBatch};
