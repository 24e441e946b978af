//! Blob cache store: durable copies of favorited media.

pub mod cache;
pub mod display;
pub mod fetch;

pub use cache::{BlobCache, CacheError, CacheRequest, CachedImage};
pub use display::{DisplayBlob, DisplayUrl, DisplayUrlRegistry};
pub use fetch::{
    FetchError, FetchedImage, HttpImageFetcher, ImageFetcher, Rasterizer, ReencodingRasterizer,
};
