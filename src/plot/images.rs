//! Image grids and short videos, encoded client-side and shipped as data URIs.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::png::PngEncoder;
use image::{ColorType, Delay, Frame, ImageEncoder, RgbaImage};
use ndarray::{s, Array3, Array4, ArrayView3, ArrayView4, ArrayViewD, Axis, Ix4};

use crate::dashboard::{Dashboard, Panel, WindowEvent, WindowHandle};
use crate::error::{PlotError, Result};
use crate::session::Session;

/// Images per grid row.
pub const GRID_ROW: usize = 8;
/// Pixels between grid cells and around the border.
pub const GRID_PADDING: usize = 2;

/// Bring an image or a batch of images into `(N, C, H, W)` layout.
///
/// A single `(H, W, C)` image becomes a batch of one. A trailing axis of
/// size 1 or 3 is taken as channel-last and moved to position 1.
pub fn normalize_images(images: ArrayViewD<f32>) -> Result<Array4<f32>> {
    let batch = match images.ndim() {
        3 => images.insert_axis(Axis(0)),
        4 => images,
        n => {
            return Err(PlotError::InvalidArgument(format!(
                "images must have 3 or 4 axes, got {}",
                n
            )))
        }
    };
    let batch = batch
        .into_dimensionality::<Ix4>()
        .map_err(|e| PlotError::InvalidArgument(e.to_string()))?;

    let channels_last = matches!(batch.shape()[3], 1 | 3);
    let batch = if channels_last {
        batch.permuted_axes([0, 3, 1, 2])
    } else {
        batch
    };
    Ok(batch.as_standard_layout().into_owned())
}

/// Tile a `(N, C, H, W)` batch into one `(C, rows, cols)` image.
pub fn image_grid(batch: ArrayView4<f32>, per_row: usize, padding: usize) -> Array3<f32> {
    let (n, c, h, w) = batch.dim();
    let xmaps = per_row.max(1).min(n.max(1));
    let ymaps = n.div_ceil(xmaps).max(1);
    let cell_h = h + padding;
    let cell_w = w + padding;

    let mut grid = Array3::<f32>::zeros((c, cell_h * ymaps + padding, cell_w * xmaps + padding));
    for (k, image) in batch.outer_iter().enumerate() {
        let top = (k / xmaps) * cell_h + padding;
        let left = (k % xmaps) * cell_w + padding;
        grid.slice_mut(s![.., top..top + h, left..left + w])
            .assign(&image);
    }
    grid
}

/// PNG bytes of a `(C, H, W)` image with 1 or 3 channels.
///
/// Values are taken as 0..255, or as 0..1 when no value exceeds 1.
pub fn encode_png(image: ArrayView3<f32>) -> Result<Vec<u8>> {
    let (c, h, w) = image.dim();
    let color = match c {
        1 => ColorType::L8,
        3 => ColorType::Rgb8,
        other => {
            return Err(PlotError::InvalidArgument(format!(
                "images need 1 or 3 channels, got {}",
                other
            )))
        }
    };

    let scale = intensity_scale(image.iter());
    let pixels: Vec<u8> = image
        .permuted_axes([1, 2, 0])
        .iter()
        .map(|&v| to_byte(v, scale))
        .collect();

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&pixels, w as u32, h as u32, color)?;
    Ok(png)
}

/// Show a batch of images as one grid.
///
/// Accepts `(H, W, C)`, `(N, H, W, C)` or `(N, C, H, W)`; see
/// [`normalize_images`].
pub fn plot_images<D: Dashboard>(
    session: &mut Session<D>,
    images: ArrayViewD<f32>,
    caption: &str,
) -> Result<WindowHandle> {
    let batch = normalize_images(images)?;
    let grid = image_grid(batch.view(), GRID_ROW, GRID_PADDING);
    let png = encode_png(grid.view())?;
    let src = format!("data:image/png;base64,{}", BASE64.encode(png));

    let event = WindowEvent::new(session.env(), vec![Panel::image(src, caption)])
        .with_opt("caption", caption)
        .with_opt("title", caption);
    session.create(event)
}

/// Show `(L, H, W, C)` frames as an animation playing at `fps`.
pub fn plot_video<D: Dashboard>(
    session: &mut Session<D>,
    frames: ArrayView4<f32>,
    fps: u32,
) -> Result<WindowHandle> {
    if fps == 0 {
        return Err(PlotError::InvalidArgument("fps must be positive".into()));
    }
    let (len, h, w, c) = frames.dim();
    if len == 0 {
        return Err(PlotError::InvalidArgument("video has no frames".into()));
    }
    if !matches!(c, 1 | 3) {
        return Err(PlotError::InvalidArgument(format!(
            "video frames need 1 or 3 channels, got {}",
            c
        )));
    }

    let scale = intensity_scale(frames.iter());
    let delay = Delay::from_numer_denom_ms(1000, fps);
    let mut encoded = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut encoded);
        encoder.set_repeat(Repeat::Infinite)?;
        for frame in frames.outer_iter() {
            let mut rgba = Vec::with_capacity(h * w * 4);
            for pixel in frame.rows() {
                let (r, g, b) = match c {
                    1 => (pixel[0], pixel[0], pixel[0]),
                    _ => (pixel[0], pixel[1], pixel[2]),
                };
                rgba.extend([to_byte(r, scale), to_byte(g, scale), to_byte(b, scale), 255]);
            }
            let buffer = RgbaImage::from_raw(w as u32, h as u32, rgba)
                .ok_or_else(|| PlotError::shape(format!("{}x{} frame", w, h), "short buffer"))?;
            encoder.encode_frame(Frame::from_parts(buffer, 0, 0, delay))?;
        }
    }

    let html = format!(
        "<img src=\"data:image/gif;base64,{}\" alt=\"video\" />",
        BASE64.encode(encoded)
    );
    let event = WindowEvent::new(session.env(), vec![Panel::text(html)]).with_opt("fps", fps);
    session.create(event)
}

fn intensity_scale<'a>(values: impl Iterator<Item = &'a f32>) -> f32 {
    let max = values.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    if max <= 1.0 {
        255.0
    } else {
        1.0
    }
}

fn to_byte(value: f32, scale: f32) -> u8 {
    (value * scale).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{Content, DashboardCall};
    use ndarray::{Array, ArrayD, IxDyn};

    #[test]
    fn test_single_rgb_image_promoted_and_transposed() {
        let image = ArrayD::<f32>::zeros(IxDyn(&[5, 7, 3]));
        let batch = normalize_images(image.view()).unwrap();
        assert_eq!(batch.shape(), &[1, 3, 5, 7]);
    }

    #[test]
    fn test_grayscale_batch_transposed() {
        let images = Array::from_shape_fn(IxDyn(&[4, 6, 5, 1]), |idx| (idx[1] * 10 + idx[2]) as f32);
        let batch = normalize_images(images.view()).unwrap();
        assert_eq!(batch.shape(), &[4, 1, 6, 5]);
        assert_eq!(batch[[2, 0, 3, 4]], 34.0);
    }

    #[test]
    fn test_channel_first_batch_untouched() {
        let images = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 8, 8]));
        let batch = normalize_images(images.view()).unwrap();
        assert_eq!(batch.shape(), &[2, 3, 8, 8]);
    }

    #[test]
    fn test_rejects_wrong_rank() {
        let images = ArrayD::<f32>::zeros(IxDyn(&[8, 8]));
        assert!(matches!(
            normalize_images(images.view()),
            Err(PlotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_grid_geometry() {
        let batch = Array4::<f32>::ones((10, 1, 4, 4));
        let grid = image_grid(batch.view(), GRID_ROW, GRID_PADDING);
        // 8 columns, 2 rows of 4x4 cells with 2px padding
        assert_eq!(grid.dim(), (1, 14, 50));
        assert_eq!(grid[[0, 0, 0]], 0.0);
        assert_eq!(grid[[0, 2, 2]], 1.0);
        assert_eq!(grid[[0, 6, 6]], 0.0);
        // image 9 sits in row 1, column 1
        assert_eq!(grid[[0, 8, 8]], 1.0);
        // row 1 has only two images
        assert_eq!(grid[[0, 8, 14]], 0.0);
    }

    #[test]
    fn test_encode_png_signature() {
        let image = Array3::<f32>::from_elem((3, 2, 2), 0.5);
        let png = encode_png(image.view()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let bad = Array3::<f32>::zeros((2, 2, 2));
        assert!(encode_png(bad.view()).is_err());
    }

    #[test]
    fn test_plot_images_sends_data_uri() {
        let mut session = Session::offline("main");
        let images = ArrayD::<f32>::zeros(IxDyn(&[3, 4, 4, 1]));
        plot_images(&mut session, images.view(), "Samples, Epoch 3").unwrap();

        match &session.dashboard().calls()[0] {
            DashboardCall::Create { event, .. } => match &event.data[0] {
                Panel::Content {
                    content: Content::Image { src, caption },
                    kind,
                } => {
                    assert_eq!(*kind, "image");
                    assert!(src.starts_with("data:image/png;base64,"));
                    assert_eq!(caption, "Samples, Epoch 3");
                }
                other => panic!("unexpected panel {:?}", other),
            },
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_plot_video_encodes_gif() {
        let mut session = Session::offline("main");
        let frames = Array4::<f32>::from_shape_fn((3, 4, 4, 3), |(t, _, _, _)| t as f32 / 2.0);
        plot_video(&mut session, frames.view(), 4).unwrap();

        let (_, event) = session.dashboard().windows().next().unwrap();
        match &event.data[0] {
            Panel::Content {
                content: Content::Text(html),
                ..
            } => assert!(html.contains("data:image/gif;base64,")),
            other => panic!("unexpected panel {:?}", other),
        }
        assert_eq!(event.opts["fps"], serde_json::json!(4));

        assert!(plot_video(&mut session, frames.view(), 0).is_err());
    }
}
