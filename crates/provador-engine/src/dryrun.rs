use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use provador_contracts::{ClothingDescription, EncodedImage, ImageAsset, Pose, TryOnError};
use sha2::{Digest, Sha256};

use crate::client::GenerationClient;

const DRYRUN_SIZE: (u32, u32) = (96, 128);

/// Offline client: solid-colour PNGs derived from the inputs, canned text.
#[derive(Debug, Clone, Default)]
pub struct DryrunClient;

impl DryrunClient {
    pub fn new() -> Self {
        Self
    }
}

impl GenerationClient for DryrunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn synthesize_try_on(
        &self,
        person: &ImageAsset,
        clothing: &ImageAsset,
        pose: Pose,
    ) -> Result<ImageAsset, TryOnError> {
        let color = color_from_inputs(&[person.bytes(), clothing.bytes(), pose.slug().as_bytes()]);
        solid_png(color, &format!("provador-{}.png", pose.slug()))
    }

    fn describe(&self, clothing: &ImageAsset) -> Result<ClothingDescription, TryOnError> {
        Ok(ClothingDescription {
            name: format!("Peça {}", clothing.fingerprint()),
            description: "Descrição gerada em modo de simulação.".to_string(),
            occasions: "Qualquer ocasião de teste.".to_string(),
        })
    }

    fn edit_with_accessory(
        &self,
        base: &EncodedImage,
        accessory: &ImageAsset,
    ) -> Result<ImageAsset, TryOnError> {
        let color = color_from_inputs(&[base.data.as_bytes(), accessory.bytes()]);
        solid_png(color, "provador-acessorio.png")
    }

    fn chat_advice(&self, _image: &EncodedImage, user_text: &str) -> Result<String, TryOnError> {
        Ok(format!(
            "(simulação) Sobre \"{}\": aposte em peças neutras para equilibrar o look.",
            user_text.trim()
        ))
    }
}

fn color_from_inputs(inputs: &[&[u8]]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update((input.len() as u64).to_be_bytes());
        hasher.update(input);
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn solid_png((r, g, b): (u8, u8, u8), label: &str) -> Result<ImageAsset, TryOnError> {
    let (width, height) = DRYRUN_SIZE;
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| TryOnError::InvalidResponse(format!("dryrun encode failed: {err}")))?;
    ImageAsset::new(buffer.into_inner(), "image/png", label).map_err(TryOnError::from)
}
