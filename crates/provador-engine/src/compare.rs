use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use provador_contracts::{AssetError, ImageAsset};

/// Renders the before/after slider at `split` as a single PNG.
///
/// Columns left of `split * width` come from `before` (resized to the `after`
/// dimensions), the rest from `after`.
pub fn compose_before_after(
    before: &ImageAsset,
    after: &ImageAsset,
    split: f64,
) -> Result<ImageAsset, AssetError> {
    let after_image = decode(after)?.to_rgba8();
    let (width, height) = after_image.dimensions();
    let before_image = decode(before)?
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgba8();

    let split = if split.is_finite() {
        split.clamp(0.0, 1.0)
    } else {
        0.5
    };
    let boundary = (split * width as f64).round() as u32;
    let composed = RgbaImage::from_fn(width, height, |x, y| {
        if x < boundary {
            *before_image.get_pixel(x, y)
        } else {
            *after_image.get_pixel(x, y)
        }
    });

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(composed)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| AssetError::Decode(err.to_string()))?;
    ImageAsset::new(buffer.into_inner(), "image/png", "antes-depois.png")
}

fn decode(asset: &ImageAsset) -> Result<DynamicImage, AssetError> {
    image::load_from_memory(asset.bytes())
        .map_err(|err| AssetError::Decode(format!("{}: {err}", asset.label())))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};
    use provador_contracts::{AssetError, ImageAsset};

    use super::compose_before_after;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> ImageAsset {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        ImageAsset::new(buffer.into_inner(), "image/png", "solid.png").unwrap()
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    #[test]
    fn split_divides_columns() -> anyhow::Result<()> {
        let before = solid(5, 5, RED);
        let after = solid(10, 4, BLUE);
        let composed = compose_before_after(&before, &after, 0.3)?;
        let decoded = image::load_from_memory(composed.bytes())?.to_rgba8();
        assert_eq!(decoded.dimensions(), (10, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, RED);
        assert_eq!(decoded.get_pixel(2, 3).0, RED);
        assert_eq!(decoded.get_pixel(3, 0).0, BLUE);
        assert_eq!(decoded.get_pixel(9, 3).0, BLUE);
        Ok(())
    }

    #[test]
    fn split_is_clamped() -> anyhow::Result<()> {
        let before = solid(4, 4, RED);
        let after = solid(4, 4, BLUE);
        let all_after = image::load_from_memory(
            compose_before_after(&before, &after, -2.0)?.bytes(),
        )?
        .to_rgba8();
        assert!(all_after.pixels().all(|pixel| pixel.0 == BLUE));
        let all_before =
            image::load_from_memory(compose_before_after(&before, &after, 7.0)?.bytes())?
                .to_rgba8();
        assert!(all_before.pixels().all(|pixel| pixel.0 == RED));
        Ok(())
    }

    #[test]
    fn undecodable_input_is_reported() -> anyhow::Result<()> {
        let garbage = ImageAsset::new(vec![1, 2, 3], "image/png", "broken.png")?;
        let after = solid(2, 2, BLUE);
        let err = compose_before_after(&garbage, &after, 0.5).unwrap_err();
        assert!(matches!(err, AssetError::Decode(message) if message.contains("broken.png")));
        Ok(())
    }
}
