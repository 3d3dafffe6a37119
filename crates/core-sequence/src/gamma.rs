//! Encoding transfer curves.

use core_config::ColorProfile;

/// The transfer curves the supported profiles resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCurve {
    Linear,
    /// sRGB piecewise curve (also Display-P3).
    Srgb,
    /// Rec. 601/709/2020 shared piecewise curve.
    Rec709,
    /// Flat gamma 2.0.
    Flat2,
    /// SMPTE ST 2084 perceptual quantizer (Rec. 2100 PQ).
    Pq,
}

impl TransferCurve {
    pub fn for_profile(profile: ColorProfile) -> TransferCurve {
        match profile {
            ColorProfile::Linear => TransferCurve::Linear,
            ColorProfile::Srgb | ColorProfile::DisplayP3 => TransferCurve::Srgb,
            ColorProfile::Rec2020
            | ColorProfile::Rec601Ntsc
            | ColorProfile::Rec601Pal
            | ColorProfile::Rec709 => TransferCurve::Rec709,
            ColorProfile::Flat2 => TransferCurve::Flat2,
            ColorProfile::Rec2100Pq => TransferCurve::Pq,
        }
    }
}

/// Encode one linear sample in [0, 1].
#[inline]
pub fn encode_sample(value: f64, curve: TransferCurve) -> f64 {
    match curve {
        TransferCurve::Linear => value,
        TransferCurve::Srgb => {
            if value <= 0.0031308 {
                value * 12.92
            } else {
                (1.055 * value.powf(1.0 / 2.4)) - 0.055
            }
        }
        TransferCurve::Rec709 => {
            if value < 0.018053968510807 {
                value * 4.5
            } else {
                (1.09929682680944 * value.powf(0.45)) - 0.09929682680944
            }
        }
        TransferCurve::Flat2 => value.sqrt(),
        TransferCurve::Pq => {
            // ST 2084 inverse EOTF with the scene value mapped onto the
            // full PQ signal range
            const M1: f64 = 0.1593017578125;
            const M2: f64 = 78.84375;
            const C1: f64 = 0.8359375;
            const C2: f64 = 18.8515625;
            const C3: f64 = 18.6875;
            let y = value.powf(M1);
            ((C1 + (C2 * y)) / (1.0 + (C3 * y))).powf(M2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_fixed() {
        for curve in [
            TransferCurve::Linear,
            TransferCurve::Srgb,
            TransferCurve::Rec709,
            TransferCurve::Flat2,
            TransferCurve::Pq,
        ] {
            // PQ's inverse EOTF leaves a ~7e-7 pedestal at zero
            assert!(encode_sample(0.0, curve).abs() < 1e-5, "{curve:?}");
            assert!((encode_sample(1.0, curve) - 1.0).abs() < 1e-9, "{curve:?}");
        }
    }

    #[test]
    fn srgb_piecewise_joins_continuously() {
        let below = encode_sample(0.0031307, TransferCurve::Srgb);
        let above = encode_sample(0.0031309, TransferCurve::Srgb);
        assert!((below - above).abs() < 1e-4);
        assert!((encode_sample(0.5, TransferCurve::Srgb) - 0.735357).abs() < 1e-5);
    }

    #[test]
    fn rec709_piecewise_joins_continuously() {
        let below = encode_sample(0.0180538, TransferCurve::Rec709);
        let above = encode_sample(0.0180541, TransferCurve::Rec709);
        assert!((below - above).abs() < 1e-4);
        assert!((encode_sample(0.018, TransferCurve::Rec709) - 0.081).abs() < 1e-3);
    }

    #[test]
    fn curves_are_monotonic() {
        for curve in [
            TransferCurve::Srgb,
            TransferCurve::Rec709,
            TransferCurve::Flat2,
            TransferCurve::Pq,
        ] {
            let mut previous = -1.0;
            for step in 0..=100 {
                let encoded = encode_sample(f64::from(step) / 100.0, curve);
                assert!(encoded > previous, "{curve:?} at {step}");
                previous = encoded;
            }
        }
    }
}
