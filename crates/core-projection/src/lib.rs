//! Raster projections: camera-frame direction vector to floating-point
//! output coordinates.
//!
//! The camera looks down +x after the target rotation, so azimuth is the
//! angle in the xy plane and elevation the angle above it. All four
//! projections share the same scale: `pixels_per_radian` is fixed by the
//! horizontal field of view (`half_res_x / (fov/2)`), and both axes use it,
//! so a 2:1 raster at 360 degrees covers the whole sphere exactly.
//!
//! Projections return unclamped floating-point coordinates; the caller
//! truncates to integers and tests containment against `[0,W) x [0,H)`.
//! Stars exactly on a projection boundary are therefore accepted whenever
//! the truncated pixel lands inside the raster.

use core_geometry::Vec3;

use std::f64::consts::{FRAC_PI_2, PI};

/// The four supported raster projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionKind {
    /// Plate carree lat/lon.
    #[default]
    Equirectangular,
    /// Azimuthal/fisheye, one or two hemisphere disks.
    Spherical,
    /// Hammer ellipse.
    Hammer,
    /// Mollweide ellipse (equal-area), iterative.
    Mollweide,
}

impl ProjectionKind {
    /// Map the numeric `camera_projection` config value.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Equirectangular),
            1 => Some(Self::Spherical),
            2 => Some(Self::Hammer),
            3 => Some(Self::Mollweide),
            _ => None,
        }
    }
}

/// Placement of the back hemisphere in the spherical projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SphericalOrientation {
    /// Forward hemisphere centered; the back hemisphere splits into two
    /// side lobes.
    #[default]
    FrontCentered,
    /// Front hemisphere on the left half, back hemisphere on the right.
    SideBySide,
}

impl SphericalOrientation {
    pub fn from_index(index: u8) -> Self {
        if index == 1 {
            Self::SideBySide
        } else {
            Self::FrontCentered
        }
    }
}

/// Precomputed raster geometry shared by every star.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub res_x: u32,
    pub res_y: u32,
    pub half_res_x: f64,
    pub half_res_y: f64,
    pub pixels_per_radian: f64,
    pub projection: ProjectionKind,
    pub spherical_orientation: SphericalOrientation,
    pub mollweide_iterations: u32,
}

impl CameraFrame {
    pub fn new(
        res_x: u32,
        res_y: u32,
        fov_deg: f64,
        projection: ProjectionKind,
        spherical_orientation: SphericalOrientation,
        mollweide_iterations: u32,
    ) -> CameraFrame {
        let half_fov = fov_deg * PI / 360.0;
        let half_res_x = f64::from(res_x) / 2.0;
        CameraFrame {
            res_x,
            res_y,
            half_res_x,
            half_res_y: f64::from(res_y) / 2.0,
            pixels_per_radian: half_res_x / half_fov,
            projection,
            spherical_orientation,
            mollweide_iterations,
        }
    }

    /// Project a camera-frame direction to floating raster coordinates.
    #[inline]
    pub fn project(&self, p: Vec3) -> (f64, f64) {
        match self.projection {
            ProjectionKind::Equirectangular => self.project_equirectangular(p),
            ProjectionKind::Spherical => self.project_spherical(p),
            ProjectionKind::Hammer => self.project_hammer(p),
            ProjectionKind::Mollweide => self.project_mollweide(p),
        }
    }

    /// Truncate floating raster coordinates and test containment.
    #[inline]
    pub fn to_pixel(&self, x_d: f64, y_d: f64) -> Option<(u32, u32)> {
        let x = x_d as i64;
        let y = y_d as i64;
        if x_d >= 0.0 && x < i64::from(self.res_x) && y_d >= 0.0 && y < i64::from(self.res_y) {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    #[inline]
    fn place(&self, az: f64, el: f64) -> (f64, f64) {
        (
            (-self.pixels_per_radian * az) + self.half_res_x,
            (-self.pixels_per_radian * el) + self.half_res_y,
        )
    }

    #[inline]
    fn project_equirectangular(&self, p: Vec3) -> (f64, f64) {
        let xy_r = ((p.x * p.x) + (p.y * p.y)).sqrt();
        let az = p.y.atan2(p.x);
        let el = p.z.atan2(xy_r);
        self.place(az, el)
    }

    #[inline]
    fn project_spherical(&self, p: Vec3) -> (f64, f64) {
        let yz_r = ((p.y * p.y) + (p.z * p.z)).sqrt();
        let angle = p.z.atan2(p.y);
        let distance = yz_r.atan2(p.x.abs());
        let mut az = distance * angle.cos();
        let el = distance * angle.sin();
        match self.spherical_orientation {
            SphericalOrientation::SideBySide => {
                if p.x > 0.0 {
                    // front hemisphere, left frame
                    az += FRAC_PI_2;
                } else {
                    // back hemisphere, right frame
                    az = -FRAC_PI_2 - az;
                }
            }
            SphericalOrientation::FrontCentered => {
                if p.x < 0.0 {
                    // fold the back hemisphere into side lobes
                    az = if p.y > 0.0 { PI - az } else { -PI - az };
                }
            }
        }
        self.place(az, el)
    }

    #[inline]
    fn project_hammer(&self, p: Vec3) -> (f64, f64) {
        let xy_r = ((p.x * p.x) + (p.y * p.y)).sqrt();
        let half_az = p.y.atan2(p.x) / 2.0;
        let el = p.z.atan2(xy_r);
        let denom = (1.0 + (el.cos() * half_az.cos())).sqrt();
        let az_term = PI * el.cos() * half_az.sin() / denom;
        let el_term = FRAC_PI_2 * el.sin() / denom;
        (
            (-self.pixels_per_radian * az_term) + self.half_res_x,
            (-self.pixels_per_radian * el_term) + self.half_res_y,
        )
    }

    #[inline]
    fn project_mollweide(&self, p: Vec3) -> (f64, f64) {
        let xy_r = ((p.x * p.x) + (p.y * p.y)).sqrt();
        let az = p.y.atan2(p.x);
        let el = p.z.atan2(xy_r);
        // Newton iteration on 2t + sin 2t = pi sin(el)
        let mut two_theta = 2.0 * (2.0 * el / PI).asin();
        for _ in 0..self.mollweide_iterations {
            two_theta -= (two_theta + two_theta.sin() - (PI * el.sin())) / (1.0 + two_theta.cos());
        }
        let theta = two_theta * 0.5;
        (
            (-self.pixels_per_radian * az * theta.cos()) + self.half_res_x,
            (-self.pixels_per_radian * FRAC_PI_2 * theta.sin()) + self.half_res_y,
        )
    }
}
