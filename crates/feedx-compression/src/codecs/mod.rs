//! Built-in compression codecs.

mod flate;
mod gzip;
mod none;
mod zstandard;

pub use flate::Flate;
pub use gzip::Gzip;
pub use none::NoCompression;
pub use zstandard::Zstd;
