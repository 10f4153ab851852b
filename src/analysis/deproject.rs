//! Galactocentric deprojection of cluster positions.
//!
//! Angles cross the API in decimal degrees; every formula works in radians
//! internally. Sources for the equations:
//!
//! * van der Marel & Cioni (2001), eqs. 1-4, 7 and 8 (vdM&C01)
//! * Claria et al. (2005)
//! * Cioni (2009), eqs. 1-5
//!
//! ```text
//!          N
//!          ▲   Φ: position angle, East of North
//!          │ ╱
//!   E ◄────┼────  W      φ = Φ + 90°   (counter-clockwise from West)
//!          │             θ = PA + 90°  (line-of-nodes angle)
//! ```

use crate::config::GalaxyGeometry;
use crate::error::NumericError;

/// An ICRS position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyCoord {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    /// Parse RA and Dec given either as decimal degrees or in sexagesimal
    /// form (`05h20m47s`, `-69d28m41s`, `05h27.6m`, `-69.87d`).
    pub fn parse(ra: &str, dec: &str) -> Result<Self, NumericError> {
        Ok(Self {
            ra_deg: parse_hms(ra)?,
            dec_deg: parse_dms(dec)?,
        })
    }
}

/// Right ascension in degrees. Plain numbers are taken as degrees already.
pub fn parse_hms(s: &str) -> Result<f64, NumericError> {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Ok(v);
    }
    let (sign, [h, m, sec]) = parse_sexagesimal(s, ['h', 'm', 's'])?;
    Ok(sign * (h + m / 60.0 + sec / 3600.0) * 15.0)
}

/// Declination in degrees. Plain numbers are taken as degrees already.
pub fn parse_dms(s: &str) -> Result<f64, NumericError> {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Ok(v);
    }
    let (sign, [d, m, sec]) = parse_sexagesimal(s, ['d', 'm', 's'])?;
    Ok(sign * (d + m / 60.0 + sec / 3600.0))
}

fn parse_sexagesimal(s: &str, units: [char; 3]) -> Result<(f64, [f64; 3]), NumericError> {
    let bad = || NumericError::InvalidInput(format!("cannot parse angle '{s}'"));

    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };

    let mut fields = [0.0; 3];
    let mut seen = [false; 3];
    let mut number = String::new();
    for ch in body.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }
        let slot = units.iter().position(|&u| u == ch).ok_or_else(bad)?;
        if seen[slot] || number.is_empty() {
            return Err(bad());
        }
        fields[slot] = number.parse().map_err(|_| bad())?;
        seen[slot] = true;
        number.clear();
    }
    if !number.is_empty() || !seen.iter().any(|&s| s) {
        return Err(bad());
    }
    Ok((sign, fields))
}

/// Great-circle distance in degrees (Vincenty formula, stable at all
/// separations).
pub fn separation(a: SkyCoord, b: SkyCoord) -> f64 {
    let (lon1, lat1) = (a.ra_deg.to_radians(), a.dec_deg.to_radians());
    let (lon2, lat2) = (b.ra_deg.to_radians(), b.dec_deg.to_radians());
    let dlon = lon2 - lon1;

    let num1 = lat2.cos() * dlon.sin();
    let num2 = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let denom = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();

    num1.hypot(num2).atan2(denom).to_degrees()
}

/// Position angle of `to` as seen from `from`, East of North, in `[0, 360)`.
pub fn position_angle(from: SkyCoord, to: SkyCoord) -> f64 {
    let (lon1, lat1) = (from.ra_deg.to_radians(), from.dec_deg.to_radians());
    let (lon2, lat2) = (to.ra_deg.to_radians(), to.dec_deg.to_radians());
    let dlon = lon2 - lon1;

    let x = lat2.sin() * lat1.cos() - lat2.cos() * lat1.sin() * dlon.cos();
    let y = dlon.sin() * lat2.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// vdM&C01 eqs. 1-3: angular distance `rho` to the galaxy centre, the
/// position angle `Phi` and `phi = Phi + 90`.
pub fn rho_phi(coord: SkyCoord, center: SkyCoord) -> (f64, f64, f64) {
    let rho = separation(coord, center);
    let big_phi = position_angle(center, coord);
    (rho, big_phi, big_phi + 90.0)
}

/// Position angle of the line of nodes rotated by 90 degrees (vdM et al. 2002).
pub fn gal_theta(position_angle_deg: f64) -> f64 {
    position_angle_deg + 90.0
}

/// Alternative position angle derived from the spherical cosine law.
/// Returns `(Phi, phi)` with `Phi = phi - 90`. Undefined at the centre.
pub fn phi_palma(coord: SkyCoord, center: SkyCoord) -> (f64, f64) {
    let (ra, dec) = (coord.ra_deg.to_radians(), coord.dec_deg.to_radians());
    let (ra0, dec0) = (center.ra_deg.to_radians(), center.dec_deg.to_radians());

    let cos_rho = dec.cos() * dec0.cos() * (ra - ra0).cos() + dec.sin() * dec0.sin();
    let rho = cos_rho.clamp(-1.0, 1.0).acos();

    let cos_phi = -dec.cos() * (ra - ra0).sin() / rho.sin();
    let phi = cos_phi.clamp(-1.0, 1.0).acos().to_degrees();

    (phi - 90.0, phi)
}

/// vdM&C01 eq. 4: cartesian sky coordinates in degrees.
pub fn vdm_2001_xy(rho: f64, phi: f64) -> (f64, f64) {
    let phi = phi.to_radians();
    (rho * phi.cos(), rho * phi.sin())
}

fn vdm_2001_a(incl: f64, rho: f64, phi: f64, theta: f64) -> f64 {
    let (incl, rho) = (incl.to_radians(), rho.to_radians());
    let s = (phi - theta).to_radians().sin();
    0.5 * ((1.0 - s) * (incl - rho).cos() + (1.0 + s) * (incl + rho).cos())
}

/// vdM&C01 eq. 8: distance to a point on the inclined disk, in the units
/// of `d0`.
pub fn vdm_2001_distance(incl: f64, d0: f64, rho: f64, phi: f64, theta: f64) -> f64 {
    d0 * incl.to_radians().cos() / vdm_2001_a(incl, rho, phi, theta)
}

/// vdM&C01 eq. 7 written as the cosine law between the line of sight to the
/// centre and to the point.
pub fn vdm_2001_dep_dist(rho: f64, d: f64, d0: f64) -> f64 {
    (d0 * d0 + d * d - 2.0 * d0 * d * rho.to_radians().cos()).sqrt()
}

/// Deprojected distance in the units of `d0`, with the point distance
/// normalised by `d0` before applying the cosine law.
pub fn vdm_2001_dep_dist_kpc(rho: f64, phi: f64, theta: f64, incl: f64, d0: f64) -> f64 {
    let d = incl.to_radians().cos() / vdm_2001_a(incl, rho, phi, theta);
    d0 * (1.0 + d * d - 2.0 * d * rho.to_radians().cos()).sqrt()
}

/// Claria et al. (2005) deprojected angular distance, in degrees.
///
/// Equivalent to vdM&C01 `x, y` fed into Cioni (2009) with `p = phi`,
/// `p' = theta`, or with `p = Phi`, `p' = PA`.
pub fn claria_2005_dep_dist(rho: f64, phi: f64, theta: f64, incl: f64) -> f64 {
    let t = (phi - theta).to_radians().sin() * incl.to_radians().tan();
    rho * (1.0 + t * t).sqrt()
}

/// Cioni (2009) eqs. 1-4: rotate into the line-of-nodes frame and stretch
/// the minor axis. Degrees in and out.
pub fn cioni_2009_dep_dist(incl: f64, theta: f64, x: f64, y: f64) -> f64 {
    let th = theta.to_radians();
    let x1 = x * th.cos() + y * th.sin();
    let y1 = y * th.cos() - x * th.sin();
    let y2 = y1 / incl.to_radians().cos();
    x1.hypot(y2)
}

/// Cioni (2009) eq. 5: angular deprojected distance to the units of `d0`.
pub fn cioni_2009_dist_kpc(dep_dist_deg: f64, d0: f64) -> f64 {
    dep_dist_deg.to_radians().tan() * d0
}

/// Deprojected galactocentric distance in kpc of `coord` in the disk
/// described by `geometry` (vdM&C01).
pub fn deproj_dist(geometry: &GalaxyGeometry, coord: SkyCoord) -> f64 {
    let (rho, _, phi) = rho_phi(coord, geometry.center());
    let theta = gal_theta(geometry.position_angle_deg);
    vdm_2001_dep_dist_kpc(rho, phi, theta, geometry.inclination_deg, geometry.distance_kpc)
}

/// Deprojected angular distance in degrees (Claria et al. 2005).
pub fn deproj_dist_deg(geometry: &GalaxyGeometry, coord: SkyCoord) -> f64 {
    let (rho, _, phi) = rho_phi(coord, geometry.center());
    let theta = gal_theta(geometry.position_angle_deg);
    claria_2005_dep_dist(rho, phi, theta, geometry.inclination_deg)
}
