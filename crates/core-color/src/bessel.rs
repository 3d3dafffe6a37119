//! Bessel function of the first kind, order one, and the 0.1-step sample
//! table the Airy map generator indexes into.
//!
//! The table covers x in [0, 12800) — enough for thousands of diffraction
//! rings; a map pixel whose argument runs past the table is treated as zero
//! by the caller. Entries are f32: the Airy pattern is itself computed in
//! single precision and the table would double in size for no visible
//! benefit.

/// Number of samples per unit of x.
pub const SAMPLES_PER_X: f64 = 10.0;
/// One past the largest valid table index.
pub const TABLE_LEN: usize = 128_000;

/// J1(x) by the Abramowitz & Stegun rational approximations: series form
/// below |x| = 8, asymptotic form above. Absolute error stays below 1e-7
/// over the table range.
pub fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    let ans = if ax < 8.0 {
        let y = x * x;
        let numerator = x
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1
                        + y * (-2972611.439 + y * (15704.48260 + y * (-30.16036606))))));
        let denominator = 144725228442.0
            + y * (2300535178.0
                + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y))));
        return numerator / denominator;
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - 2.356194491;
        let p1 = 1.0
            + y * (0.183105e-2
                + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * (-0.240337019e-6))));
        let p2 = 0.04687499995
            + y * (-0.2002690873e-3
                + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        (0.636619772 / ax).sqrt() * (xx.cos() * p1 - z * xx.sin() * p2)
    };
    if x < 0.0 { -ans } else { ans }
}

/// J1 sampled at `i / 10` for `i in 0..TABLE_LEN`.
pub struct BesselTable {
    samples: Vec<f32>,
}

impl BesselTable {
    pub fn new() -> BesselTable {
        let samples = (0..TABLE_LEN)
            .map(|i| bessel_j1(i as f64 / SAMPLES_PER_X) as f32)
            .collect();
        BesselTable { samples }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample by table index (index = round(x * 10)). Callers bound-check
    /// against `TABLE_LEN` and zero the pixel past the end.
    #[inline]
    pub fn at(&self, index: usize) -> f32 {
        self.samples[index]
    }
}

impl Default for BesselTable {
    fn default() -> Self {
        Self::new()
    }
}
