//! Quaternion rotation core shared by render setup and the per-star hot loop.
//!
//! Coordinate convention
//! ---------------------
//! The whole pipeline uses a right-ascension-friendly frame with +y to the
//! *left* of +x instead of the usual right. Rather than mirroring every input
//! and output, both quaternion operations flip the sign of the j component on
//! the way in and on the way out:
//! * `Quaternion::product` negates j of both factors and of the result.
//! * `Quaternion::rotate` negates j of the vector only; the rotation operand
//!   is already stored in the flipped representation.
//!
//! Every quaternion produced by this crate is in the flipped representation,
//! so composition and rotation stay mutually consistent. Mixing in a
//! quaternion built with textbook Hamilton axes will silently rotate the
//! wrong way around y.
//!
//! Invariants:
//! * `rotate(IDENTITY, v) == v` exactly.
//! * `product(a, b)` composes "a, then b": `rotate(product(a, b), v)`
//!   equals `rotate(b, rotate(a, v))` to floating-point round-off for
//!   unit a and b, which is why the aim chain below reads in execution
//!   order (yaw, pitch, roll, pan, tilt).

/// A position or direction in parsecs, ICRS axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared length; the hot loop works with squared distances to avoid
    /// sqrt until a projection actually needs one.
    pub fn length_squared(&self) -> f64 {
        (self.x * self.x) + (self.y * self.y) + (self.z * self.z)
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Unit rotation quaternion in the flipped-j representation described in the
/// module docs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub r: f64,
    pub i: f64,
    pub j: f64,
    pub k: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        r: 1.0,
        i: 0.0,
        j: 0.0,
        k: 0.0,
    };

    /// Rotation by `angle` radians in the xy plane (about the z axis).
    pub fn xy_rotation(angle: f64) -> Self {
        Quaternion {
            r: (angle / 2.0).cos(),
            i: 0.0,
            j: 0.0,
            k: (angle / 2.0).sin(),
        }
    }

    /// Rotation by `angle` radians in the xz plane (about the y axis).
    pub fn xz_rotation(angle: f64) -> Self {
        Quaternion {
            r: (angle / 2.0).cos(),
            i: 0.0,
            j: (angle / 2.0).sin(),
            k: 0.0,
        }
    }

    /// Rotation by `angle` radians in the yz plane (about the x axis).
    pub fn yz_rotation(angle: f64) -> Self {
        Quaternion {
            r: (angle / 2.0).cos(),
            i: (angle / 2.0).sin(),
            j: 0.0,
            k: 0.0,
        }
    }

    /// Sequential composition: the rotation `self` followed by `right`.
    /// Inputs and output carry the flipped j convention.
    pub fn product(self, right: Quaternion) -> Quaternion {
        let mut left = self;
        let mut right = right;
        left.j = -left.j;
        right.j = -right.j;

        let mut result = Quaternion {
            r: (left.r * right.r) - (left.i * right.i) - (left.j * right.j) - (left.k * right.k),
            i: (left.r * right.i) + (left.i * right.r) - (left.j * right.k) + (left.k * right.j),
            j: (left.r * right.j) + (left.i * right.k) + (left.j * right.r) - (left.k * right.i),
            k: (left.r * right.k) - (left.i * right.j) + (left.j * right.i) + (left.k * right.r),
        };
        result.j = -result.j;
        result
    }

    /// Rotate `v` by conjugation, `q * v * q^-1`. The vector's j sign is
    /// flipped in and out; the rotation operand is used as stored.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let vi = v.x;
        let vj = -v.y;
        let vk = v.z;

        // inverse of the rotation
        let inv = Quaternion {
            r: self.r,
            i: -self.i,
            j: -self.j,
            k: -self.k,
        };

        // step 1: rotation * vector, dropping terms in the vector's zero
        // scalar part
        let im_r = -(self.i * vi) - (self.j * vj) - (self.k * vk);
        let im_i = (self.r * vi) - (self.j * vk) + (self.k * vj);
        let im_j = (self.r * vj) + (self.i * vk) - (self.k * vi);
        let im_k = (self.r * vk) - (self.i * vj) + (self.j * vi);

        // step 2: intermediate * inverse
        let out_i = (im_r * inv.i) + (im_i * inv.r) - (im_j * inv.k) + (im_k * inv.j);
        let out_j = (im_r * inv.j) + (im_i * inv.k) + (im_j * inv.r) - (im_k * inv.i);
        let out_k = (im_r * inv.k) - (im_i * inv.j) + (im_j * inv.i) + (im_k * inv.r);

        Vec3::new(out_i, -out_j, out_k)
    }
}

/// Camera aim angles, all in radians. `yaw`/`pitch` point the camera at the
/// target; `roll` spins about the aim axis; `pan`/`tilt` optionally look away
/// from the target after rolling.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraAim {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub pan: f64,
    pub tilt: f64,
}

impl CameraAim {
    /// Derive aim angles from the camera-relative target position plus the
    /// configured roll/pan/tilt (degrees). Yaw is taken in the xy plane;
    /// pitch is taken in the xz plane *after* the yaw has zeroed the target's
    /// xy angle, so the two angles chain rather than commute.
    pub fn toward(target: Vec3, roll_deg: f64, pan_deg: f64, tilt_deg: f64) -> Self {
        let deg = std::f64::consts::PI / 180.0;
        let yaw = target.y.atan2(target.x);
        let target_xy_r = ((target.x * target.x) + (target.y * target.y)).sqrt();
        let pitch = target.z.atan2(target_xy_r);
        CameraAim {
            yaw,
            pitch,
            roll: roll_deg * deg,
            pan: pan_deg * deg,
            tilt: tilt_deg * -deg,
        }
    }

    /// Compose the single rotation applied to every star: undo yaw, undo
    /// pitch, apply roll, then the optional pan and tilt.
    pub fn rotation(&self) -> Quaternion {
        let mut q = Quaternion::xy_rotation(-self.yaw).product(Quaternion::xz_rotation(-self.pitch));
        q = q.product(Quaternion::yz_rotation(self.roll));
        if self.pan != 0.0 {
            q = q.product(Quaternion::xy_rotation(self.pan));
        }
        if self.tilt != 0.0 {
            q = q.product(Quaternion::xz_rotation(self.tilt));
        }
        q
    }
}

/// Spherical ICRS (right ascension, declination, distance; angles in
/// degrees) to Cartesian ICRS.
pub fn icrs_spherical_to_cartesian(ra_deg: f64, dec_deg: f64, r: f64) -> Vec3 {
    let deg = std::f64::consts::PI / 180.0;
    let ra = ra_deg * deg;
    let dec = dec_deg * deg;
    Vec3::new(
        r * dec.cos() * ra.cos(),
        r * dec.cos() * ra.sin(),
        r * dec.sin(),
    )
}
