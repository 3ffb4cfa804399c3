//! Renders a top-down view of a scene document's orbits to a PNG.
//!
//! Usage: `orbit_plot [scene.json] [output.png] [size]`

use std::env;
use std::error::Error;
use std::path::Path;

use image::{Rgba, RgbaImage};
use solar_sandbox::celestial::BodyKind;
use solar_sandbox::orbit::orbit_path;
use solar_sandbox::scene::persistence::load_document;
use solar_sandbox::scene::SolarSystem;

const BACKGROUND: Rgba<u8> = Rgba([8, 10, 20, 255]);
const ORBIT: Rgba<u8> = Rgba([60, 200, 90, 255]);

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let scene_path = args.get(1).map_or("assets/scene.json", String::as_str);
    let output_path = args.get(2).map_or("orbit_plot.png", String::as_str);
    let size: u32 = match args.get(3) {
        Some(value) => value.parse()?,
        None => 1024,
    };

    let root = load_document(Path::new(scene_path))?;
    let (system, report) = SolarSystem::build(&root);
    for diagnostic in &report.diagnostics {
        println!("Skipped {}: {}", diagnostic.path, diagnostic.error);
    }
    println!("Plotting {} bodies from {}", report.built, scene_path);

    let mut orbits = Vec::new();
    let mut extent: f32 = 1.0;
    for entry in system.iter() {
        let center = entry
            .parent
            .and_then(|parent| system.world_position(parent))
            .unwrap_or_default();
        let path: Vec<(f32, f32)> = orbit_path(entry.body.elements(), 256)
            .into_iter()
            .map(|point| (center.x + point.x, center.y + point.y))
            .collect();
        for &(x, y) in &path {
            extent = extent.max(x.abs()).max(y.abs());
        }
        orbits.push(path);
    }

    let mut image = RgbaImage::from_pixel(size, size, BACKGROUND);
    let scale = (size as f32 * 0.47) / extent;
    let half = size as f32 / 2.0;
    let to_pixel = |x: f32, y: f32| (half + x * scale, half - y * scale);

    for path in &orbits {
        for segment in path.windows(2) {
            let (x0, y0) = to_pixel(segment[0].0, segment[0].1);
            let (x1, y1) = to_pixel(segment[1].0, segment[1].1);
            draw_line(&mut image, (x0, y0), (x1, y1), ORBIT);
        }
    }

    for entry in system.iter() {
        let Some(position) = system.world_position(entry.id) else {
            continue;
        };
        let (x, y) = to_pixel(position.x, position.y);
        let radius = (entry.body.radius() * scale).max(2.0);
        fill_circle(&mut image, (x, y), radius, body_color(entry.body.kind()));
    }

    image.save(output_path)?;
    println!("Wrote {}x{} plot to {}", size, size, output_path);
    Ok(())
}

fn body_color(kind: BodyKind) -> Rgba<u8> {
    match kind {
        BodyKind::Star => Rgba([255, 220, 60, 255]),
        BodyKind::Planet => Rgba([120, 170, 255, 255]),
        BodyKind::Moon => Rgba([200, 200, 200, 255]),
    }
}

fn put(image: &mut RgbaImage, x: f32, y: f32, color: Rgba<u8>) {
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

fn draw_line(image: &mut RgbaImage, from: (f32, f32), to: (f32, f32), color: Rgba<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as u32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        put(
            image,
            from.0 + (to.0 - from.0) * t,
            from.1 + (to.1 - from.1) * t,
            color,
        );
    }
}

fn fill_circle(image: &mut RgbaImage, center: (f32, f32), radius: f32, color: Rgba<u8>) {
    let r = radius.ceil() as i32;
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f32 <= radius * radius {
                put(image, center.0 + dx as f32, center.1 + dy as f32, color);
            }
        }
    }
}
