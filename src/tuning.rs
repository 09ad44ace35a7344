//! Step tuning constants, broken out into a `Deserialize` struct so a
//! host can load them from a settings file the way `castle-game` loads
//! its own `Settings`, rather than hardcoding them into the simulation.

use serde::Deserialize;
use vek::Vec2;

/// Tuning constants for [`crate::space::Space::step`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Constant acceleration applied to every dynamic body each step.
    pub gravity: Vec2<f64>,

    /// Per-step linear/angular velocity multiplier, applied as
    /// `damping.powf(dt)`. `1.0` means no damping; values must be in
    /// `(0.0, 1.0]` (`0.0` would zero all velocity in one step
    /// regardless of `dt`, which is never what a caller wants).
    pub damping: f64,

    /// Sequential-impulse solver iterations per step.
    pub iterations: u32,
    /// Of `iterations`, how many include restitution (`bounce`); the
    /// remainder only resolve penetration so bounce isn't re-added on
    /// every solver pass.
    pub elastic_iterations: u32,

    /// Bias (Baumgarte) coefficient for position correction.
    pub bias_coef: f64,
    /// Allowed penetration slop before bias kicks in, so resting
    /// contacts don't jitter fighting the last fraction of a unit of
    /// overlap.
    pub collision_slop: f64,
    /// Steps an arbiter survives without a fresh narrow-phase hit
    /// before it's dropped from the contact set.
    pub contact_persistence: u32,

    /// Spatial hash cell size for dynamic (moving) shapes.
    pub active_hash_cell_size: f64,
    /// Spatial hash cell size for static (non-moving) shapes, typically
    /// coarser since static geometry is usually larger on average.
    pub static_hash_cell_size: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -100.0),
            damping: 1.0,
            iterations: 10,
            elastic_iterations: 0,
            bias_coef: 0.1,
            collision_slop: 0.1,
            contact_persistence: 3,
            active_hash_cell_size: 5.0,
            static_hash_cell_size: 10.0,
        }
    }
}
