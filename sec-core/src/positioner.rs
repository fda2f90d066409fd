//! USALS (DiSEqC 1.3) angular positioning.
//!
//! The hour angle is the rotation of a polar mount, seen from the site, that
//! points the dish at a geostationary satellite. It is encoded into the 16-bit
//! word carried by the `0x6E` goto command: a direction nibble, whole degrees,
//! and a tenths nibble mapped through [`DIGIT_LOOKUP`].
//!
//! The trigonometry needs `std` floating point; the word encoding does not.

use crate::config::Tenths;

/// Tenths-of-a-degree nibble encoding used by USALS positioners.
pub const DIGIT_LOOKUP: [u16; 10] = [0x0, 0x2, 0x3, 0x5, 0x6, 0x8, 0xA, 0xB, 0xD, 0xE];

/// Direction nibble selecting the `0xE` half of the rotor range.
pub const ROTOR_TAG_E: u16 = 0xE;
/// Direction nibble selecting the `0xD` half of the rotor range.
pub const ROTOR_TAG_D: u16 = 0xD;

/// Earth equatorial radius in km.
pub const EARTH_RADIUS_KM: f64 = 6_378.14;
/// Geostationary orbit radius in km.
pub const GEO_RADIUS_KM: f64 = 42_164.57;

/// Packs a direction tag and an angle in tenths of a degree into a rotor word.
#[must_use]
pub fn encode_angular(tag: u16, delta_tenths: u16) -> u16 {
    let whole = delta_tenths / 10;
    let fraction = DIGIT_LOOKUP[usize::from(delta_tenths % 10)];
    (tag << 12) | (whole << 4) | fraction
}

/// Converts tenths of a degree to degrees.
#[must_use]
pub fn tenths_to_degrees(value: Tenths) -> f64 {
    f64::from(value) / 10.0
}

/// Hour angle of a geostationary satellite seen from the site, in `[0, 360)`.
///
/// A satellite on the site meridian sits at 180; satellites to the east of
/// the site have smaller hour angles.
#[cfg(feature = "std")]
#[must_use]
pub fn calc_sat_hour_angle(sat_longitude: f64, site_latitude: f64, site_longitude: f64) -> f64 {
    let separation = (normalize_degrees(sat_longitude) - normalize_degrees(site_longitude))
        .to_radians();
    let latitude = site_latitude.to_radians();

    // Vector from the site to the satellite, projected on the equatorial plane.
    let x = GEO_RADIUS_KM * separation.cos() - EARTH_RADIUS_KM * latitude.cos();
    let y = GEO_RADIUS_KM * separation.sin();

    normalize_degrees(180.0 - y.atan2(x).to_degrees())
}

/// Rotor word for driving to `sat_longitude` (degrees, east positive).
#[cfg(feature = "std")]
#[must_use]
pub fn produce_angular_positioner(site_longitude: f64, site_latitude: f64, sat_longitude: f64) -> u16 {
    let hour_angle = calc_sat_hour_angle(sat_longitude, site_latitude, site_longitude);

    let (tag, degrees) = if site_latitude >= 0.0 {
        let tag = if hour_angle < 180.0 {
            ROTOR_TAG_E
        } else {
            ROTOR_TAG_D
        };
        (tag, (180.0 - hour_angle).abs())
    } else if hour_angle < 180.0 {
        (ROTOR_TAG_D, hour_angle.abs())
    } else {
        (ROTOR_TAG_E, (360.0 - hour_angle).abs())
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let delta = (degrees * 10.0).round() as u16;
    encode_angular(tag, delta)
}

#[cfg(feature = "std")]
fn normalize_degrees(value: f64) -> f64 {
    value.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_maps_every_tenths_digit() {
        let expected = [
            0xE0C0, 0xE0C2, 0xE0C3, 0xE0C5, 0xE0C6, 0xE0C8, 0xE0CA, 0xE0CB, 0xE0CD, 0xE0CE,
        ];
        for (delta, word) in (120u16..).zip(expected) {
            assert_eq!(encode_angular(ROTOR_TAG_E, delta), word, "delta {delta}");
        }
    }

    #[test]
    fn encodes_whole_degrees_in_the_middle_byte() {
        assert_eq!(encode_angular(ROTOR_TAG_D, 0), 0xD000);
        assert_eq!(encode_angular(ROTOR_TAG_E, 986), 0xE62A);
        assert_eq!(encode_angular(ROTOR_TAG_D, 1_800), 0xDB40);
    }

    #[cfg(feature = "std")]
    #[test]
    fn satellite_on_site_meridian_is_due_south() {
        let hour_angle = calc_sat_hour_angle(10.0, 50.0, 10.0);
        assert!((hour_angle - 180.0).abs() < 1e-9);
        assert_eq!(produce_angular_positioner(10.0, 50.0, 10.0), 0xD000);
    }

    #[cfg(feature = "std")]
    #[test]
    fn equator_site_looking_ninety_degrees_east() {
        let hour_angle = calc_sat_hour_angle(90.0, 0.0, 0.0);
        assert!((hour_angle - 81.398).abs() < 0.01, "hour angle {hour_angle}");
        assert_eq!(produce_angular_positioner(0.0, 0.0, 90.0), 0xE62A);
    }

    #[cfg(feature = "std")]
    #[test]
    fn northern_hemisphere_is_symmetric_about_the_meridian() {
        assert_eq!(produce_angular_positioner(0.0, 0.0, 10.0), 0xE0BD);
        assert_eq!(produce_angular_positioner(0.0, 0.0, -10.0), 0xD0BD);
        assert_eq!(produce_angular_positioner(10.0, 50.0, 19.2), 0xE0A3);
        assert_eq!(produce_angular_positioner(10.0, 50.0, 0.8), 0xD0A3);
        assert_eq!(produce_angular_positioner(-5.0, 40.0, 13.0), 0xE145);
    }

    #[cfg(feature = "std")]
    #[test]
    fn southern_hemisphere_swaps_direction_tags() {
        assert_eq!(produce_angular_positioner(151.0, -33.9, 156.0), 0xDAE5);
        assert_eq!(produce_angular_positioner(151.0, -33.9, 146.0), 0xEAE5);
    }

    #[cfg(feature = "std")]
    #[test]
    fn branch_flips_just_south_of_the_equator() {
        assert_eq!(produce_angular_positioner(0.0, 0.0, 10.0), 0xE0BD);
        assert_eq!(produce_angular_positioner(0.0, -0.1, 10.0), 0xDA83);
        assert_eq!(produce_angular_positioner(0.0, 0.0, -10.0), 0xD0BD);
        assert_eq!(produce_angular_positioner(0.0, -0.1, -10.0), 0xEA83);
    }

    #[cfg(feature = "std")]
    #[test]
    fn longitudes_are_normalised_before_use() {
        assert_eq!(
            produce_angular_positioner(-10.0, 45.0, -30.0),
            produce_angular_positioner(350.0, 45.0, 330.0)
        );
    }
}
