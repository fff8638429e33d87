//! Geodesic length and area, and locale-aware measurement labels.
//!
//! Length is the sum of great-circle (haversine) segment lengths on the mean
//! earth sphere. Area uses the spherical-excess ring approximation on the
//! equatorial sphere, the formula common web mapping toolkits ship.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{EARTH_EQUATORIAL_RADIUS_M, EARTH_MEAN_RADIUS_M, KM_THRESHOLD_M, KM2_THRESHOLD_M2};
use crate::geo::LngLat;

// =============================================================================
// GEODESY
// =============================================================================

/// Great-circle distance in meters.
#[must_use]
pub fn haversine_m(a: LngLat, b: LngLat) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Length of a polyline in meters.
#[must_use]
pub fn line_length_m(coords: &[LngLat]) -> f64 {
    coords.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Absolute area of a ring in square meters. The ring may or may not repeat
/// its first vertex; fewer than three distinct vertices yield zero.
#[must_use]
pub fn ring_area_m2(ring: &[LngLat]) -> f64 {
    let mut pts: Vec<LngLat> = ring.to_vec();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n {
        let lower = pts[i];
        let middle = pts[(i + 1) % n];
        let upper = pts[(i + 2) % n];
        total += (upper.lng.to_radians() - lower.lng.to_radians()) * middle.lat.to_radians().sin();
    }
    (total * EARTH_EQUATORIAL_RADIUS_M * EARTH_EQUATORIAL_RADIUS_M / 2.0).abs()
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Number formatting conventions for measurement labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumberLocale {
    #[default]
    #[serde(rename = "de-CH")]
    DeCh,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "de-DE")]
    DeDe,
}

impl NumberLocale {
    #[must_use]
    pub fn group_separator(self) -> char {
        match self {
            Self::DeCh => '\u{2019}',
            Self::EnUs => ',',
            Self::DeDe => '.',
        }
    }

    #[must_use]
    pub fn decimal_separator(self) -> char {
        match self {
            Self::DeCh | Self::EnUs => '.',
            Self::DeDe => ',',
        }
    }

    /// Whole number with thousands grouping.
    #[must_use]
    pub fn integer(self, value: f64) -> String {
        group_digits(round_u64(value), self.group_separator())
    }

    /// Fixed two-decimal number with thousands grouping.
    #[must_use]
    pub fn fixed2(self, value: f64) -> String {
        let cents = round_u64(value * 100.0);
        format!("{}{}{:02}", group_digits(cents / 100, self.group_separator()), self.decimal_separator(), cents % 100)
    }
}

impl FromStr for NumberLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "de-CH" => Ok(Self::DeCh),
            "en-US" => Ok(Self::EnUs),
            "de-DE" => Ok(Self::DeDe),
            other => Err(format!("unsupported number locale '{other}' (expected de-CH, en-US or de-DE)")),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_u64(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 { v.round() as u64 } else { 0 }
}

fn group_digits(n: u64, sep: char) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

/// `"950 m"` below one kilometer, `"1.50 km"` above.
#[must_use]
pub fn format_length(meters: f64, locale: NumberLocale) -> String {
    if meters < KM_THRESHOLD_M {
        format!("{} m", locale.integer(meters))
    } else {
        format!("{} km", locale.fixed2(meters / 1_000.0))
    }
}

/// Square meters below one square kilometer, square kilometers above.
#[must_use]
pub fn format_area(square_meters: f64, locale: NumberLocale) -> String {
    if square_meters < KM2_THRESHOLD_M2 {
        format!("{} m²", locale.integer(square_meters))
    } else {
        format!("{} km²", locale.fixed2(square_meters / 1_000_000.0))
    }
}

#[cfg(test)]
#[path = "measure_test.rs"]
mod measure_test;
