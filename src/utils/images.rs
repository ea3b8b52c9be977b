use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Where an image is anchored on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    North,
    Center,
}

/// A single deterministic image operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Remove a band of `height` rows from the bottom edge.
    Chop { height: u32 },
    /// Place the image on a transparent `width`x`height` canvas, cropping overflow.
    Extent {
        width: u32,
        height: u32,
        gravity: Gravity,
    },
    /// Resize to exactly `width`x`height`.
    Resize { width: u32, height: u32 },
    /// Resize preserving aspect ratio so the image fits within `width`x`height`.
    Fit { width: u32, height: u32 },
    /// Flood-fill from the top-left pixel with `fuzz` colour tolerance (0.0..=1.0)
    /// and make the filled region transparent.
    KeyBackground { fuzz: f32 },
}

impl Transform {
    pub fn apply(&self, img: &RgbaImage) -> io::Result<RgbaImage> {
        match *self {
            Transform::Chop { height } => chop(img, height),
            Transform::Extent {
                width,
                height,
                gravity,
            } => Ok(extent(img, width, height, gravity)),
            Transform::Resize { width, height } => {
                Ok(imageops::resize(img, width, height, FilterType::Lanczos3))
            }
            Transform::Fit { width, height } => Ok(DynamicImage::ImageRgba8(img.clone())
                .resize(width, height, FilterType::Lanczos3)
                .into_rgba8()),
            Transform::KeyBackground { fuzz } => Ok(key_background(img, fuzz)),
        }
    }
}

/// Apply `transforms` in order.
pub fn apply_all(img: &RgbaImage, transforms: &[Transform]) -> io::Result<RgbaImage> {
    let mut current = img.clone();
    for transform in transforms {
        current = transform.apply(&current)?;
    }
    Ok(current)
}

fn chop(img: &RgbaImage, band: u32) -> io::Result<RgbaImage> {
    let (width, height) = img.dimensions();
    if band >= height {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("cannot chop {} rows from an image {} rows tall", band, height),
        ));
    }

    Ok(imageops::crop_imm(img, 0, 0, width, height - band).to_image())
}

fn extent(img: &RgbaImage, width: u32, height: u32, gravity: Gravity) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);
    let dx = width as i64 - img.width() as i64;
    let dy = height as i64 - img.height() as i64;

    let x = dx / 2;
    let y = match gravity {
        Gravity::North => 0,
        Gravity::Center => dy / 2,
    };

    imageops::replace(&mut canvas, img, x, y);
    canvas
}

fn colour_distance(a: &Rgba<u8>, b: &Rgba<u8>) -> f32 {
    let sum: f32 = (0..3)
        .map(|i| {
            let d = a[i] as f32 - b[i] as f32;
            d * d
        })
        .sum();
    sum.sqrt() / (255.0 * 3f32.sqrt())
}

fn key_background(img: &RgbaImage, fuzz: f32) -> RgbaImage {
    let mut output = img.clone();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return output;
    }

    let seed = *img.get_pixel(0, 0);
    let mut visited = vec![false; (width * height) as usize];
    let mut queue = VecDeque::from([(0u32, 0u32)]);
    visited[0] = true;

    while let Some((x, y)) = queue.pop_front() {
        output.put_pixel(x, y, TRANSPARENT);

        let neighbours = [
            (x.checked_sub(1), Some(y)),
            (Some(x + 1).filter(|&nx| nx < width), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1).filter(|&ny| ny < height)),
        ];
        for (nx, ny) in neighbours {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            let index = (ny * width + nx) as usize;
            if visited[index] {
                continue;
            }
            visited[index] = true;
            if colour_distance(img.get_pixel(nx, ny), &seed) <= fuzz {
                queue.push_back((nx, ny));
            }
        }
    }

    output
}

/// Open an image as RGBA, mapping decode failures to `InvalidData`.
pub fn open_rgba(path: &Path) -> io::Result<RgbaImage> {
    image::open(path)
        .map(|img| img.into_rgba8())
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to decode {}: {}", path.display(), e),
            )
        })
}

/// Write `img` as PNG, creating parent directories as needed.
pub fn save_png(img: &RgbaImage, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// Validate that an image file is not corrupted and has reasonable dimensions
pub fn validate_image(image_path: &Path) -> io::Result<()> {
    let file_size = fs::metadata(image_path)?.len();

    if file_size < 100 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Image file too small, likely corrupted",
        ));
    }

    if file_size > 50_000_000 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Image file too large, possibly corrupted or invalid",
        ));
    }

    match image::open(image_path) {
        Ok(img) => {
            let (width, height) = img.dimensions();
            if width == 0 || height == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Image has invalid dimensions (0x0)",
                ));
            }

            if width > 10000 || height > 10000 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Image dimensions unreasonably large",
                ));
            }

            Ok(())
        }
        Err(e) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Image validation failed: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn chop_removes_bottom_rows() {
        let mut img = RgbaImage::from_pixel(10, 50, WHITE);
        img.put_pixel(0, 0, RED);
        img.put_pixel(0, 13, RED);
        img.put_pixel(0, 14, RED);
        let out = Transform::Chop { height: 36 }.apply(&img).unwrap();
        assert_eq!(out.dimensions(), (10, 14));
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(0, 13), RED);
    }

    #[test]
    fn chop_keeps_a_single_row_above_the_band() {
        let img = RgbaImage::from_pixel(10, 37, WHITE);
        let out = Transform::Chop { height: 36 }.apply(&img).unwrap();
        assert_eq!(out.dimensions(), (10, 1));
    }

    #[test]
    fn chop_larger_than_image_fails() {
        let img = RgbaImage::from_pixel(10, 36, WHITE);
        let result = Transform::Chop { height: 36 }.apply(&img);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn extent_north_pads_below_and_centres_horizontally() {
        let img = RgbaImage::from_pixel(100, 50, RED);
        let out = extent(&img, 300, 300, Gravity::North);
        assert_eq!(out.dimensions(), (300, 300));
        assert_eq!(*out.get_pixel(100, 0), RED);
        assert_eq!(*out.get_pixel(199, 49), RED);
        assert_eq!(*out.get_pixel(99, 0), TRANSPARENT);
        assert_eq!(*out.get_pixel(150, 50), TRANSPARENT);
    }

    #[test]
    fn extent_center_crops_evenly() {
        let mut img = RgbaImage::from_pixel(300, 300, WHITE);
        img.put_pixel(30, 30, RED);
        let out = extent(&img, 240, 240, Gravity::Center);
        assert_eq!(out.dimensions(), (240, 240));
        assert_eq!(*out.get_pixel(0, 0), RED);
    }

    #[test]
    fn resize_is_exact_and_fit_keeps_aspect() {
        let img = RgbaImage::from_pixel(200, 100, WHITE);
        let exact = Transform::Resize {
            width: 96,
            height: 96,
        }
        .apply(&img)
        .unwrap();
        assert_eq!(exact.dimensions(), (96, 96));

        let fit = Transform::Fit {
            width: 120,
            height: 120,
        }
        .apply(&img)
        .unwrap();
        assert_eq!(fit.dimensions(), (120, 60));
    }

    #[test]
    fn key_background_clears_connected_region_only() {
        // White frame around a red block, with an isolated white pixel inside it.
        let mut img = RgbaImage::from_pixel(20, 20, WHITE);
        for y in 5..15 {
            for x in 5..15 {
                img.put_pixel(x, y, RED);
            }
        }
        img.put_pixel(10, 10, WHITE);
        img.put_pixel(19, 19, Rgba([250, 250, 250, 255]));

        let out = Transform::KeyBackground { fuzz: 0.05 }.apply(&img).unwrap();
        assert_eq!(*out.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*out.get_pixel(19, 19), TRANSPARENT);
        assert_eq!(*out.get_pixel(7, 7), RED);
        assert_eq!(*out.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn save_png_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.png");
        save_png(&RgbaImage::from_pixel(4, 4, RED), &path).unwrap();
        assert_eq!(open_rgba(&path).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn validate_image_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, vec![0u8; 512]).unwrap();
        assert!(validate_image(&path).is_err());
    }
}
