//! Dimension normalization: both screenshots of a pair are diffed on one canvas.

use image::RgbaImage;
use std::borrow::Cow;

use super::types::ImageSize;

/// Canvas covering both images: component-wise max of their dimensions
pub fn canvas_size(a: &RgbaImage, b: &RgbaImage) -> ImageSize {
    ImageSize {
        width: a.width().max(b.width()),
        height: a.height().max(b.height()),
    }
}

/// Place `image` in the top-left corner of a transparent-black canvas.
///
/// Images already at canvas size are borrowed unchanged. Content beyond the
/// canvas is never expected (the canvas is the max of both inputs) and is
/// clipped if present.
pub fn pad_to_canvas(image: &RgbaImage, canvas: ImageSize) -> Cow<'_, RgbaImage> {
    if image.width() == canvas.width && image.height() == canvas.height {
        return Cow::Borrowed(image);
    }

    let mut padded = RgbaImage::new(canvas.width, canvas.height);
    let copy_width = image.width().min(canvas.width) as usize * 4;
    let src_stride = image.width() as usize * 4;
    let dst_stride = canvas.width as usize * 4;

    let src = image.as_raw();
    let dst: &mut [u8] = &mut padded;
    for y in 0..image.height().min(canvas.height) as usize {
        let src_row = &src[y * src_stride..y * src_stride + copy_width];
        dst[y * dst_stride..y * dst_stride + copy_width].copy_from_slice(src_row);
    }

    Cow::Owned(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canvas_is_component_wise_max() {
        let tall = RgbaImage::new(10, 40);
        let wide = RgbaImage::new(30, 20);
        assert_eq!(
            canvas_size(&tall, &wide),
            ImageSize {
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn test_same_size_is_borrowed() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4]));
        let canvas = ImageSize {
            width: 4,
            height: 4,
        };
        assert!(matches!(pad_to_canvas(&img, canvas), Cow::Borrowed(_)));
    }

    #[test]
    fn test_padding_keeps_top_left_and_zeroes_the_rest() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([200, 100, 50, 255]));
        let canvas = ImageSize {
            width: 5,
            height: 4,
        };
        let padded = pad_to_canvas(&img, canvas);

        assert_eq!(padded.dimensions(), (5, 4));
        assert_eq!(padded.get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
        assert_eq!(padded.get_pixel(2, 1), &Rgba([200, 100, 50, 255]));
        assert_eq!(padded.get_pixel(3, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(padded.get_pixel(0, 2), &Rgba([0, 0, 0, 0]));
        assert_eq!(padded.get_pixel(4, 3), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_padding_height_only() {
        let img = RgbaImage::from_pixel(4, 2, Rgba([9, 9, 9, 255]));
        let padded = pad_to_canvas(
            &img,
            ImageSize {
                width: 4,
                height: 5,
            },
        );
        let opaque = padded.pixels().filter(|p| p.0[3] == 255).count();
        assert_eq!(opaque, 8);
        assert_eq!(padded.as_raw().len(), 4 * 5 * 4);
    }
}
