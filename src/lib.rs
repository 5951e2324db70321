use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

pub mod core;
pub mod error;

use crate::core::{Particle, Scene, Vec2};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// ArenaSim Python-facing wrapper around the Rust Scene core.
///
/// API:
/// - __new__(width, height, positions, velocities, radii, masses)
/// - with_random(num_particles, width, height, radius=1.0, mass=1.0, seed=None)
/// - step()
/// - get_positions() / get_velocities() -> np.ndarray, shape (N, 2)
/// - set_positions() / set_velocities()
///
/// Rendering and input handling live entirely on the Python side; the
/// simulation only hands out state and accepts velocity nudges between
/// frames.
#[pyclass]
pub struct ArenaSim {
    scene: Scene,
}

#[pymethods]
impl ArenaSim {
    /// Initialize a scene from a host-supplied particle collection.
    ///
    /// Parameters
    /// - width, height: arena bounds (positive floats)
    /// - positions: np.ndarray of shape (N, 2), dtype=float64
    /// - velocities: np.ndarray of shape (N, 2), dtype=float64
    /// - radii: np.ndarray of shape (N,), each > 0
    /// - masses: np.ndarray of shape (N,), each > 0
    ///
    /// Overlapping or out-of-bounds spawn positions are repaired by the
    /// intersection corrector before the constructor returns.
    ///
    /// Errors: raises ValueError on invalid parameters or shape mismatch.
    #[new]
    fn new<'py>(
        width: f64,
        height: f64,
        positions: PyReadonlyArray2<'py, f64>,
        velocities: PyReadonlyArray2<'py, f64>,
        radii: PyReadonlyArray1<'py, f64>,
        masses: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<Self> {
        let pos = positions.as_array();
        let vel = velocities.as_array();
        let radii = radii.as_array();
        let masses = masses.as_array();

        let n = pos.shape()[0];
        if pos.shape()[1] != 2 {
            return Err(py_err(format!(
                "positions must have shape (N, 2), got {:?}",
                pos.shape()
            )));
        }
        if vel.shape() != pos.shape() {
            return Err(py_err(format!(
                "velocities must have shape ({}, 2), got {:?}",
                n,
                vel.shape()
            )));
        }
        if radii.len() != n || masses.len() != n {
            return Err(py_err(format!(
                "radii and masses must have length {}, got {} and {}",
                n,
                radii.len(),
                masses.len()
            )));
        }

        let mut particles = Vec::with_capacity(n);
        for i in 0..n {
            let p = Particle::new(
                Vec2::new(pos[[i, 0]], pos[[i, 1]]),
                Vec2::new(vel[[i, 0]], vel[[i, 1]]),
                radii[i],
                masses[i],
            )
            .map_err(py_err)?;
            particles.push(p);
        }

        let scene = Scene::new(particles, width, height).map_err(py_err)?;
        Ok(Self { scene })
    }

    /// Initialize a scene with rejection-sampled non-overlapping particles
    /// of identical radius and mass.
    ///
    /// Parameters
    /// - num_particles: number of particles (int, > 0)
    /// - width, height: arena bounds (each >= 2 * radius)
    /// - radius: disk radius (float, > 0)
    /// - mass: particle mass (float, > 0)
    /// - seed: RNG seed (int) for reproducibility; None for nondeterministic
    #[staticmethod]
    #[pyo3(signature = (num_particles, width, height, radius=1.0, mass=1.0, seed=None))]
    fn with_random(
        num_particles: usize,
        width: f64,
        height: f64,
        radius: f64,
        mass: f64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let scene =
            Scene::with_random(num_particles, width, height, radius, mass, seed).map_err(py_err)?;
        Ok(Self { scene })
    }

    /// Advance the simulation by exactly one unit of simulated time
    /// (releases the GIL during computation).
    fn step(&mut self, py: Python<'_>) -> PyResult<()> {
        py.allow_threads(|| self.scene.step()).map_err(py_err)
    }

    /// Return positions as a NumPy array of shape (N, 2), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.scene.num_particles();
        let mut arr = Array2::<f64>::zeros((n, 2));
        for (i, p) in self.scene.particles.iter().enumerate() {
            arr[[i, 0]] = p.pos.x;
            arr[[i, 1]] = p.pos.y;
        }
        let pyarr = arr.into_pyarray(py);
        Ok(pyarr.to_owned().into())
    }

    /// Return velocities as a NumPy array of shape (N, 2), dtype=float64.
    fn get_velocities<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.scene.num_particles();
        let mut arr = Array2::<f64>::zeros((n, 2));
        for (i, p) in self.scene.particles.iter().enumerate() {
            arr[[i, 0]] = p.vel.x;
            arr[[i, 1]] = p.vel.y;
        }
        let pyarr = arr.into_pyarray(py);
        Ok(pyarr.to_owned().into())
    }

    /// Set all particle positions from a NumPy array of shape (N, 2),
    /// dtype=float64. Values must be finite.
    ///
    /// External position writes may create overlap, so the intersection
    /// corrector runs over the whole collection before this returns.
    fn set_positions<'py>(&mut self, positions: PyReadonlyArray2<'py, f64>) -> PyResult<()> {
        let arr = positions.as_array();
        let n = self.scene.num_particles();
        if arr.shape() != [n, 2] {
            return Err(py_err(format!(
                "positions must have shape ({}, 2), got {:?}",
                n,
                arr.shape()
            )));
        }
        for i in 0..n {
            self.scene.particles[i]
                .set_position(Vec2::new(arr[[i, 0]], arr[[i, 1]]))
                .map_err(py_err)?;
        }
        self.scene.settle_flagged();
        Ok(())
    }

    /// Set all particle velocities from a NumPy array of shape (N, 2),
    /// dtype=float64. Values must be finite.
    ///
    /// This is the hook for external per-frame forces (e.g. attraction
    /// toward a cursor): nudge velocities between step() calls.
    fn set_velocities<'py>(&mut self, velocities: PyReadonlyArray2<'py, f64>) -> PyResult<()> {
        let arr = velocities.as_array();
        let n = self.scene.num_particles();
        if arr.shape() != [n, 2] {
            return Err(py_err(format!(
                "velocities must have shape ({}, 2), got {:?}",
                n,
                arr.shape()
            )));
        }
        for i in 0..n {
            self.scene.particles[i]
                .set_velocity(Vec2::new(arr[[i, 0]], arr[[i, 1]]))
                .map_err(py_err)?;
        }
        Ok(())
    }

    /// Number of particles.
    fn num_particles(&self) -> usize {
        self.scene.num_particles()
    }

    /// Arena width.
    fn width(&self) -> f64 {
        self.scene.width()
    }

    /// Arena height.
    fn height(&self) -> f64 {
        self.scene.height()
    }

    /// Total kinetic energy (diagnostic).
    fn kinetic_energy(&self) -> f64 {
        self.scene.kinetic_energy()
    }

    /// Total momentum as an (x, y) tuple (diagnostic).
    fn momentum(&self) -> (f64, f64) {
        let m = self.scene.momentum();
        (m.x, m.y)
    }
}

/// The arenasim Python module entry point.
#[pymodule]
fn arenasim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ArenaSim>()?;
    Ok(())
}
