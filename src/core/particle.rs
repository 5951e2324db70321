use crate::core::Vec2;
use crate::error::{Error, Result};

/// A circular particle in the 2-D arena.
///
/// Fields:
/// - `pos`: center position
/// - `vel`: velocity per unit of simulated time
/// - `radius`: disk radius (> 0)
/// - `mass`: particle mass (> 0)
/// - `needs_separation`: set when the particle's last state change was an
///   external displacement rather than a resolved collision, so the
///   intersection corrector must examine it before the next step
#[derive(Debug, Clone)]
pub struct Particle {
    /// Center position.
    pub pos: Vec2,
    /// Velocity per unit of simulated time.
    pub vel: Vec2,
    /// Disk radius (> 0).
    pub radius: f64,
    /// Mass (> 0).
    pub mass: f64,
    /// Pending intersection-correction flag.
    pub needs_separation: bool,
}

impl Particle {
    /// Create a new particle after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `radius` or `mass` is non-positive or any
    ///   component is NaN/inf.
    pub fn new(pos: Vec2, vel: Vec2, radius: f64, mass: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !pos.x.is_finite() || !pos.y.is_finite() {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !vel.x.is_finite() || !vel.y.is_finite() {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            pos,
            vel,
            radius,
            mass,
            needs_separation: false,
        })
    }

    /// Returns the particle's kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.vel.length_squared()
    }

    /// Returns the particle's momentum: m v.
    #[inline]
    pub fn momentum(&self) -> Vec2 {
        self.vel * self.mass
    }

    /// Set position (validated as finite).
    ///
    /// External position writes may create overlap, so this raises the
    /// separation flag; the corrector picks it up on the next step.
    pub fn set_position(&mut self, pos: Vec2) -> Result<()> {
        if !pos.x.is_finite() || !pos.y.is_finite() {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        self.pos = pos;
        self.needs_separation = true;
        Ok(())
    }

    /// Set velocity (validated as finite).
    ///
    /// This is the supported hook for external per-frame forces; velocity
    /// changes alone cannot create overlap, so no flag is raised.
    pub fn set_velocity(&mut self, vel: Vec2) -> Result<()> {
        if !vel.x.is_finite() || !vel.y.is_finite() {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        self.vel = vel;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_ok() -> Result<()> {
        let p = Particle::new(Vec2::new(1.0, 2.0), Vec2::new(-3.0, 0.5), 0.5, 2.0)?;
        assert_eq!(p.pos, Vec2::new(1.0, 2.0));
        assert_eq!(p.vel, Vec2::new(-3.0, 0.5));
        assert_eq!(p.radius, 0.5);
        assert_eq!(p.mass, 2.0);
        assert!(!p.needs_separation);
        Ok(())
    }

    #[test]
    fn invalid_radius_rejected() {
        let err = Particle::new(Vec2::ZERO, Vec2::ZERO, 0.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn invalid_mass_rejected() {
        let err = Particle::new(Vec2::ZERO, Vec2::ZERO, 1.0, -1.0).unwrap_err();
        assert!(err.to_string().contains("mass"));
    }

    #[test]
    fn non_finite_velocity_rejected() {
        let err = Particle::new(Vec2::ZERO, Vec2::new(f64::NAN, 0.0), 1.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("velocity"));
    }

    #[test]
    fn kinetic_energy_and_momentum() -> Result<()> {
        // v = (3,4), |v|^2 = 25; KE = 0.5 * m * 25
        let p = Particle::new(Vec2::ZERO, Vec2::new(3.0, 4.0), 1.0, 2.0)?;
        assert!((p.kinetic_energy() - 25.0).abs() < 1e-12);
        assert_eq!(p.momentum(), Vec2::new(6.0, 8.0));
        Ok(())
    }

    #[test]
    fn set_position_raises_separation_flag() -> Result<()> {
        let mut p = Particle::new(Vec2::ZERO, Vec2::ZERO, 1.0, 1.0)?;
        p.set_position(Vec2::new(5.0, 5.0))?;
        assert!(p.needs_separation);
        assert!(p.set_position(Vec2::new(f64::INFINITY, 0.0)).is_err());
        Ok(())
    }

    #[test]
    fn set_velocity_leaves_flag_alone() -> Result<()> {
        let mut p = Particle::new(Vec2::ZERO, Vec2::ZERO, 1.0, 1.0)?;
        p.set_velocity(Vec2::new(1.0, -1.0))?;
        assert!(!p.needs_separation);
        assert_eq!(p.vel, Vec2::new(1.0, -1.0));
        Ok(())
    }
}
