//! Crosshair and grid overlays, drawn by the main thread after all other
//! post-processing. Pixel values are post-tone-limit (range 0..1), so the
//! overlay writes 0.9 red directly.

use core_image::PixelRgb;

const OVERLAY_PIXEL: PixelRgb = PixelRgb {
    r: 0.9,
    g: 0.0,
    b: 0.0,
};

/// Four tick marks converging on the raster center, with a gap around the
/// exact center so the target stays visible.
pub fn draw_crosshairs(pixels: &mut [PixelRgb], width: u32, height: u32) {
    let res_x = f64::from(width);
    let res_y = f64::from(height);
    let half_res_x = res_x / 2.0;
    let half_res_y = res_y / 2.0;

    let center_row_start = (res_x as usize) * (half_res_y as usize);
    for x in ((half_res_x - (res_y * 0.02)) as usize)..((half_res_x - (res_y * 0.005)) as usize) {
        pixels[center_row_start + x] = OVERLAY_PIXEL;
    }
    for x in ((half_res_x + (res_y * 0.005)) as usize)..((half_res_x + (res_y * 0.02)) as usize) {
        pixels[center_row_start + x] = OVERLAY_PIXEL;
    }
    for y in ((half_res_y - (res_y * 0.02)) as usize)..((half_res_y - (res_y * 0.005)) as usize) {
        pixels[(res_x as usize * y) + half_res_x as usize] = OVERLAY_PIXEL;
    }
    for y in ((half_res_y + (res_y * 0.005)) as usize)..((half_res_y + (res_y * 0.02)) as usize) {
        pixels[(res_x as usize * y) + half_res_x as usize] = OVERLAY_PIXEL;
    }
}

/// Reference lines at the quarter, half, and three-quarter positions of
/// both axes.
pub fn draw_grid_lines(pixels: &mut [PixelRgb], width: u32, height: u32) {
    let width = width as usize;
    let height = height as usize;
    for row_fraction in [0.25, 0.5, 0.75] {
        let y = (height as f64 * row_fraction) as usize;
        if y < height {
            for x in 0..width {
                pixels[(y * width) + x] = OVERLAY_PIXEL;
            }
        }
    }
    for column_fraction in [0.25, 0.5, 0.75] {
        let x = (width as f64 * column_fraction) as usize;
        if x < width {
            for y in 0..height {
                pixels[(y * width) + x] = OVERLAY_PIXEL;
            }
        }
    }
}
