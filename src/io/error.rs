//! Errors that can occur in the io module

use thiserror::Error;

#[derive(Error, Debug)]
/// All the errors that can occur while reading measurement bundles
pub enum StoreError {
    /// The store has nothing under the requested name
    #[error("No dataset named {source_name} in {location}")]
    NotFound {
        /// The name that was asked for
        source_name: String,
        /// Where the store looked
        location: String,
    },

    /// Error when opening or reading a bundle file
    #[error("Couldn't read {filename}: {source}")]
    Io {
        /// The path of the bundle file
        filename: String,
        /// The underlying [`std::io::Error`]
        source: std::io::Error,
    },

    /// Error derived from [`serde_pickle::Error`]
    #[error("Couldn't unpickle {filename}: {source}")]
    Pickle {
        /// The path of the bundle file
        filename: String,
        /// The underlying [`serde_pickle::Error`]
        source: serde_pickle::Error,
    },

    /// An array in the file has the wrong shape
    #[error("{filename}: bad array shape for {argument}. expected {expected}, received {received}")]
    BadArrayShape {
        /// The path of the bundle file
        filename: String,
        /// The field within the bundle
        argument: String,
        /// The expected shape
        expected: String,
        /// The shape that was received instead
        received: String,
    },
}
