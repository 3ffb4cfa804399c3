use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BACKGROUND: Rgba<u8> = Rgba([2, 3, 8, 255]);

/// Equirectangular starfield used when the sky texture is unavailable.
pub fn generate_starfield(width: u32, height: u32, stars: u32, seed: u64) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND);
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..stars {
        let x = rng.gen_range(0..image.width());
        let y = rng.gen_range(0..image.height());
        let brightness: u8 = rng.gen_range(90..=255);
        // slight blue or red cast
        let tint: i16 = rng.gen_range(-25..=25);
        let red = (brightness as i16 - tint).clamp(0, 255) as u8;
        let blue = (brightness as i16 + tint).clamp(0, 255) as u8;
        image.put_pixel(x, y, Rgba([red, brightness, blue, 255]));

        if brightness > 240 && x + 1 < image.width() {
            let halo = brightness / 3;
            image.put_pixel(x + 1, y, Rgba([halo, halo, halo, 255]));
        }
    }

    image
}

pub fn starfield_image(width: u32, height: u32, stars: u32, seed: u64) -> Image {
    let pixels = generate_starfield(width, height, stars, seed);
    Image::new(
        Extent3d {
            width: pixels.width(),
            height: pixels.height(),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        pixels.into_raw(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starfield_is_deterministic_per_seed() {
        let a = generate_starfield(64, 32, 200, 7);
        let b = generate_starfield(64, 32, 200, 7);
        let c = generate_starfield(64, 32, 200, 8);
        assert_eq!(a.as_raw(), b.as_raw());
        assert_ne!(a.as_raw(), c.as_raw());
    }

    #[test]
    fn starfield_has_dark_sky_and_stars() {
        let image = generate_starfield(128, 64, 300, 1);
        let lit = image.pixels().filter(|pixel| pixel.0[1] >= 90).count();
        assert!(lit > 100);
        assert!(lit < (128 * 64) / 2);
    }

    #[test]
    fn starfield_image_has_rgba_layout() {
        let image = starfield_image(16, 8, 10, 3);
        assert_eq!(image.data.len(), 16 * 8 * 4);
        assert_eq!(image.width(), 16);
    }
}
