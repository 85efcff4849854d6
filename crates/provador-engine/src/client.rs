use std::sync::Arc;

use provador_contracts::{ClothingDescription, EncodedImage, ImageAsset, Pose, TryOnError};

/// The only seam that talks to the generative service.
///
/// Implementations do not touch session state; the orchestrator decides what
/// to do with each result.
pub trait GenerationClient: Send + Sync {
    fn name(&self) -> &str;

    /// Composites `clothing` onto `person` in the requested pose.
    fn synthesize_try_on(
        &self,
        person: &ImageAsset,
        clothing: &ImageAsset,
        pose: Pose,
    ) -> Result<ImageAsset, TryOnError>;

    /// Callers substitute [`ClothingDescription::fallback`] on any error.
    fn describe(&self, clothing: &ImageAsset) -> Result<ClothingDescription, TryOnError>;

    fn edit_with_accessory(
        &self,
        base: &EncodedImage,
        accessory: &ImageAsset,
    ) -> Result<ImageAsset, TryOnError>;

    fn chat_advice(&self, image: &EncodedImage, user_text: &str) -> Result<String, TryOnError>;
}

impl<T: GenerationClient + ?Sized> GenerationClient for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn synthesize_try_on(
        &self,
        person: &ImageAsset,
        clothing: &ImageAsset,
        pose: Pose,
    ) -> Result<ImageAsset, TryOnError> {
        (**self).synthesize_try_on(person, clothing, pose)
    }

    fn describe(&self, clothing: &ImageAsset) -> Result<ClothingDescription, TryOnError> {
        (**self).describe(clothing)
    }

    fn edit_with_accessory(
        &self,
        base: &EncodedImage,
        accessory: &ImageAsset,
    ) -> Result<ImageAsset, TryOnError> {
        (**self).edit_with_accessory(base, accessory)
    }

    fn chat_advice(&self, image: &EncodedImage, user_text: &str) -> Result<String, TryOnError> {
        (**self).chat_advice(image, user_text)
    }
}

impl<T: GenerationClient + ?Sized> GenerationClient for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn synthesize_try_on(
        &self,
        person: &ImageAsset,
        clothing: &ImageAsset,
        pose: Pose,
    ) -> Result<ImageAsset, TryOnError> {
        (**self).synthesize_try_on(person, clothing, pose)
    }

    fn describe(&self, clothing: &ImageAsset) -> Result<ClothingDescription, TryOnError> {
        (**self).describe(clothing)
    }

    fn edit_with_accessory(
        &self,
        base: &EncodedImage,
        accessory: &ImageAsset,
    ) -> Result<ImageAsset, TryOnError> {
        (**self).edit_with_accessory(base, accessory)
    }

    fn chat_advice(&self, image: &EncodedImage, user_text: &str) -> Result<String, TryOnError> {
        (**self).chat_advice(image, user_text)
    }
}
