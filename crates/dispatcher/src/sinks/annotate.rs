//! Frame annotation: track boxes, centre dots and id labels

use ab_glyph::{FontRef, PxScale};
use contracts::{AnalysisSnapshot, BoundingBox, CameraFrame, PixelFormat, TrackId};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::sync::LazyLock;

const BOX_THICKNESS: i32 = 2;
const DOT_RADIUS: i32 = 3;
const LABEL_SCALE: f32 = 12.0;
const LABEL_GAP: i32 = 2;

static LABEL_FONT: LazyLock<Option<FontRef<'static>>> = LazyLock::new(|| {
    FontRef::try_from_slice(include_bytes!("../../assets/DejaVuSansMono-Bold.ttf"))
        .inspect_err(|e| tracing::warn!(error = %e, "label font unusable, drawing boxes only"))
        .ok()
});

/// Stable colour per track id
pub(crate) fn track_color(id: TrackId) -> Rgb<u8> {
    let h = id.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    // keep every channel away from black
    Rgb([
        (h >> 16) as u8 | 0x40,
        (h >> 32) as u8 | 0x40,
        (h >> 48) as u8 | 0x40,
    ])
}

/// Convert a decoded frame to RGB
pub fn frame_to_rgb(frame: &CameraFrame) -> Option<RgbImage> {
    let pixels = &frame.pixels;
    let rgb: Vec<u8> = match frame.format {
        PixelFormat::Rgb8 => pixels.to_vec(),
        PixelFormat::Rgba8 => pixels
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect(),
        PixelFormat::Bgr8 => pixels
            .chunks_exact(3)
            .flat_map(|p| [p[2], p[1], p[0]])
            .collect(),
        PixelFormat::Gray8 => pixels.iter().flat_map(|&v| [v, v, v]).collect(),
    };
    RgbImage::from_raw(frame.width, frame.height, rgb)
}

fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (x1, y1) = (bbox.x1.round() as i32, bbox.y1.round() as i32);
    let (x2, y2) = (bbox.x2.round() as i32, bbox.y2.round() as i32);
    // nested outlines, outermost on the box edge
    for inset in 0..BOX_THICKNESS {
        let width = x2 - x1 + 1 - 2 * inset;
        let height = y2 - y1 + 1 - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

fn draw_label(img: &mut RgbImage, bbox: &BoundingBox, text: &str, color: Rgb<u8>) {
    let Some(font) = LABEL_FONT.as_ref() else {
        return;
    };
    let scale = PxScale::from(LABEL_SCALE);
    let (_, text_height) = text_size(scale, font, text);

    let x = bbox.x1.round() as i32;
    let top = bbox.y1.round() as i32;
    let above = top - text_height as i32 - LABEL_GAP;
    // fall inside the box when the frame edge leaves no room above
    let y = if above >= 0 {
        above
    } else {
        top + BOX_THICKNESS + LABEL_GAP
    };
    draw_text_mut(img, color, x, y, scale, font, text);
}

/// Render the snapshot's frame with one box, centre dot and `ID: n` label
/// per track
///
/// Returns `None` when the pixel buffer does not match the frame size.
pub fn annotate_frame(snapshot: &AnalysisSnapshot) -> Option<RgbImage> {
    let mut img = frame_to_rgb(&snapshot.camera_frame)?;

    for tracked in &snapshot.tracks {
        let track = &tracked.track;
        let color = track_color(track.id);
        draw_box(&mut img, &track.bbox, color);

        let (cx, cy) = track.bbox.center();
        draw_filled_circle_mut(
            &mut img,
            (cx.round() as i32, cy.round() as i32),
            DOT_RADIUS,
            color,
        );

        draw_label(&mut img, &track.bbox, &format!("ID: {}", track.id), color);
    }

    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::snapshot;
    use bytes::Bytes;
    use contracts::{GeoPoint, Track, TrackedObject};
    use std::sync::Arc;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn snapshot_with_box(id: TrackId, bbox: BoundingBox) -> AnalysisSnapshot {
        let mut snapshot = (*snapshot(1)).clone();
        snapshot.camera_frame = Arc::new(CameraFrame::new(
            Bytes::from(vec![0u8; 64 * 48 * 3]),
            64,
            48,
            PixelFormat::Rgb8,
            1.0,
        ));
        snapshot.tracks.push(TrackedObject {
            track: Track {
                id,
                bbox,
                class_id: 0,
            },
            location: GeoPoint::default(),
        });
        snapshot
    }

    fn snapshot_with_track(id: TrackId) -> AnalysisSnapshot {
        snapshot_with_box(id, BoundingBox::new(10.0, 20.0, 30.0, 40.0))
    }

    fn any_lit(img: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> bool {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .any(|(x, y)| *img.get_pixel(x, y) != BLACK)
    }

    #[test]
    fn test_box_and_dot_drawn_in_track_color() {
        let img = annotate_frame(&snapshot_with_track(9)).unwrap();
        let color = track_color(9);

        assert_eq!(img.dimensions(), (64, 48));
        assert_eq!(*img.get_pixel(10, 20), color);
        assert_eq!(*img.get_pixel(30, 40), color);
        // second outline
        assert_eq!(*img.get_pixel(11, 30), color);
        assert_eq!(*img.get_pixel(20, 30), color);
        assert_eq!(*img.get_pixel(0, 47), BLACK);
        // between the outline and the dot
        assert_eq!(*img.get_pixel(14, 34), BLACK);
    }

    #[test]
    fn test_label_drawn_above_box() {
        let img = annotate_frame(&snapshot_with_track(1)).unwrap();
        assert!(any_lit(&img, 10..64, 0..20));
        // nothing left of the box
        assert!(!any_lit(&img, 0..10, 0..48));
    }

    #[test]
    fn test_label_falls_inside_box_at_frame_top() {
        let img = annotate_frame(&snapshot_with_box(1, BoundingBox::new(10.0, 0.0, 60.0, 40.0))).unwrap();
        // clear of the outline and the centre dot
        assert!(any_lit(&img, 13..57, 3..16));
        assert!(!any_lit(&img, 0..10, 0..48));
    }

    #[test]
    fn test_degenerate_box_does_not_panic() {
        let img = annotate_frame(&snapshot_with_box(3, BoundingBox::new(5.0, 5.0, 5.0, 5.0))).unwrap();
        assert_eq!(*img.get_pixel(5, 5), track_color(3));
    }

    #[test]
    fn test_bgr_and_gray_conversion() {
        let bgr = CameraFrame::new(Bytes::from(vec![1, 2, 3]), 1, 1, PixelFormat::Bgr8, 1.0);
        assert_eq!(*frame_to_rgb(&bgr).unwrap().get_pixel(0, 0), Rgb([3, 2, 1]));

        let gray = CameraFrame::new(Bytes::from(vec![7]), 1, 1, PixelFormat::Gray8, 1.0);
        assert_eq!(*frame_to_rgb(&gray).unwrap().get_pixel(0, 0), Rgb([7, 7, 7]));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut snapshot = snapshot_with_track(1);
        snapshot.camera_frame = Arc::new(CameraFrame::new(
            Bytes::from(vec![0u8; 10]),
            64,
            48,
            PixelFormat::Rgb8,
            1.0,
        ));
        assert!(annotate_frame(&snapshot).is_none());
    }

    #[test]
    fn test_colors_differ_between_ids() {
        assert_ne!(track_color(1), track_color(2));
    }
}
