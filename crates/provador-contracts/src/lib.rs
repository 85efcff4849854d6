pub mod assets;
pub mod cache;
pub mod chat;
pub mod description;
pub mod error;
pub mod events;
pub mod poses;
pub mod summary;

pub use assets::{EncodedImage, ImageAsset};
pub use cache::PoseCache;
pub use description::ClothingDescription;
pub use error::{AssetError, TryOnError};
pub use poses::Pose;
