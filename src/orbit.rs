use bevy::math::Vec3;

/// Fixed orbital parameters of one body, relative to its parent's transform node.
///
/// Angles are in degrees and speeds in degrees per second. The semi-minor axis is
/// cached and only recomputed through the setters that change the ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    orbit_radius: f32,
    eccentricity: f32,
    pub inclination: f32,
    pub orbit_speed: f32,
    pub rotation_speed: f32,
    pub radius: f32,
    semi_minor: f32,
}

impl OrbitalElements {
    pub fn new(
        orbit_radius: f32,
        eccentricity: f32,
        inclination: f32,
        orbit_speed: f32,
        rotation_speed: f32,
        radius: f32,
    ) -> Self {
        debug_assert!(orbit_radius >= 0.0, "orbit radius must be non-negative");
        debug_assert!((0.0..1.0).contains(&eccentricity), "eccentricity must be in [0, 1)");
        Self {
            orbit_radius,
            eccentricity,
            inclination,
            orbit_speed,
            rotation_speed,
            radius,
            semi_minor: semi_minor_axis(orbit_radius, eccentricity),
        }
    }

    /// A body that sits on its parent's origin and never moves.
    pub fn stationary(radius: f32, rotation_speed: f32) -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, rotation_speed, radius)
    }

    #[inline]
    pub fn semi_major(&self) -> f32 {
        self.orbit_radius
    }

    #[inline]
    pub fn semi_minor(&self) -> f32 {
        self.semi_minor
    }

    #[inline]
    pub fn eccentricity(&self) -> f32 {
        self.eccentricity
    }

    /// Distance from the ellipse center to the focus holding the parent.
    #[inline]
    pub fn linear_eccentricity(&self) -> f32 {
        self.orbit_radius * self.eccentricity
    }

    pub fn set_orbit_radius(&mut self, orbit_radius: f32) {
        self.orbit_radius = orbit_radius.max(0.0);
        self.semi_minor = semi_minor_axis(self.orbit_radius, self.eccentricity);
    }

    pub fn set_eccentricity(&mut self, eccentricity: f32) {
        self.eccentricity = eccentricity.clamp(0.0, MAX_ECCENTRICITY);
        self.semi_minor = semi_minor_axis(self.orbit_radius, self.eccentricity);
    }

    pub fn is_stationary(&self) -> bool {
        self.orbit_radius == 0.0
    }

    pub fn periapsis(&self) -> f32 {
        self.orbit_radius * (1.0 - self.eccentricity)
    }

    pub fn apoapsis(&self) -> f32 {
        self.orbit_radius * (1.0 + self.eccentricity)
    }
}

/// Largest eccentricity the setters accept; 1.0 would be a parabola.
pub const MAX_ECCENTRICITY: f32 = 0.999;

fn semi_minor_axis(semi_major: f32, eccentricity: f32) -> f32 {
    semi_major * (1.0 - eccentricity * eccentricity).sqrt()
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn clamp_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Position on the inclined ellipse at `angle_degrees`, with the parent at one focus.
///
/// The orbital plane is XY before inclination; inclination rotates it about X.
pub fn orbit_position(elements: &OrbitalElements, angle_degrees: f32) -> Vec3 {
    if elements.is_stationary() {
        return Vec3::ZERO;
    }

    let t = angle_degrees.to_radians();
    let inclination = elements.inclination.to_radians();

    let x = elements.semi_major() * t.cos() - elements.linear_eccentricity();
    let y_flat = elements.semi_minor() * t.sin();

    Vec3::new(x, y_flat * inclination.cos(), y_flat * inclination.sin())
}

/// Samples `segments + 1` points around the orbit; first and last coincide.
pub fn orbit_path(elements: &OrbitalElements, segments: u32) -> Vec<Vec3> {
    if elements.is_stationary() {
        return Vec::new();
    }

    let segments = segments.max(3);
    (0..=segments)
        .map(|i| orbit_position(elements, i as f32 * 360.0 / segments as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn elements(orbit_radius: f32, eccentricity: f32, inclination: f32) -> OrbitalElements {
        OrbitalElements::new(orbit_radius, eccentricity, inclination, 10.0, 0.0, 1.0)
    }

    #[test]
    fn circular_orbit_stays_on_radius() {
        let orbit = elements(10.0, 0.0, 0.0);
        for step in 0..360 {
            let position = orbit_position(&orbit, step as f32);
            assert!((position.length() - 10.0).abs() < EPSILON, "angle {step}: {position:?}");
        }
    }

    #[test]
    fn inclined_circle_keeps_its_radius() {
        let orbit = elements(7.5, 0.0, 33.0);
        for step in (0..360).step_by(15) {
            let position = orbit_position(&orbit, step as f32);
            assert!((position.length() - 7.5).abs() < EPSILON);
        }
    }

    #[test]
    fn focus_distances_match_periapsis_and_apoapsis() {
        for &e in &[0.0, 0.1, 0.3, 0.5, 0.75, 0.9, 0.99] {
            let orbit = elements(20.0, e, 12.0);
            let near = orbit_position(&orbit, 0.0).length();
            let far = orbit_position(&orbit, 180.0).length();
            assert!((near - 20.0 * (1.0 - e)).abs() < EPSILON, "e={e}: periapsis {near}");
            assert!((far - 20.0 * (1.0 + e)).abs() < EPSILON, "e={e}: apoapsis {far}");
            assert!((near - orbit.periapsis()).abs() < EPSILON);
            assert!((far - orbit.apoapsis()).abs() < EPSILON);
        }
    }

    #[test]
    fn inclination_rotates_plane_about_x() {
        let orbit = elements(5.0, 0.0, 90.0);
        let quarter = orbit_position(&orbit, 90.0);
        assert!(quarter.x.abs() < EPSILON);
        assert!(quarter.y.abs() < EPSILON);
        assert!((quarter.z - 5.0).abs() < EPSILON);
    }

    #[test]
    fn stationary_body_sits_at_origin() {
        let star = OrbitalElements::stationary(5.0, 2.0);
        for angle in [0.0, 45.0, 180.0, 359.0] {
            assert_eq!(orbit_position(&star, angle), Vec3::ZERO);
        }
        assert!(orbit_path(&star, 128).is_empty());
    }

    #[test]
    fn clamp_angle_is_idempotent_and_in_range() {
        for &angle in &[-720.5, -360.0, -1e-7, -0.5, 0.0, 12.0, 359.999, 360.0, 725.25, 1e6] {
            let once = clamp_angle(angle);
            assert!((0.0..360.0).contains(&once), "{angle} -> {once}");
            assert_eq!(clamp_angle(once), once);
        }
        assert!((clamp_angle(-90.0) - 270.0).abs() < EPSILON);
        assert!((clamp_angle(450.0) - 90.0).abs() < EPSILON);
    }

    #[test]
    fn semi_minor_recomputed_on_change() {
        let mut orbit = elements(10.0, 0.0, 0.0);
        assert_eq!(orbit.semi_minor(), 10.0);
        orbit.set_eccentricity(0.6);
        assert!((orbit.semi_minor() - 8.0).abs() < EPSILON);
        orbit.set_orbit_radius(5.0);
        assert!((orbit.semi_minor() - 4.0).abs() < EPSILON);
    }

    #[test]
    fn orbit_path_is_closed() {
        let orbit = elements(12.0, 0.4, 20.0);
        let path = orbit_path(&orbit, 64);
        assert_eq!(path.len(), 65);
        assert!(path[0].distance(path[64]) < EPSILON);
    }
}
