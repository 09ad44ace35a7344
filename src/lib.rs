//! 2D impulse-based rigid body physics core.
//!
//! This crate implements the simulation core of a Chipmunk2D-style engine:
//! a bucketed spatial hash for broad-phase, hand-written narrow-phase
//! collision routines per shape-pair, persistent contact arbiters with
//! warm starting, a sequential-impulse constraint solver, and a handful
//! of two-body joint constraints. It has no rendering, no asset loading,
//! and no opinion about what a "game loop" looks like; embed it and drive
//! [`space::Space::step`] yourself.

pub mod arbiter;
pub mod body;
pub mod broadphase;
pub mod collide;
pub mod constraint;
pub mod math;
pub mod shape;
pub mod space;
pub mod tuning;

slotmap::new_key_type! {
    /// Handle to a [`body::Body`] registered in a [`space::Space`].
    pub struct BodyKey;

    /// Handle to a [`shape::Shape`] registered in a [`space::Space`].
    pub struct ShapeKey;

    /// Handle to a [`constraint::Constraint`] registered in a [`space::Space`].
    pub struct ConstraintKey;
}

pub use arbiter::Arbiter;
pub use body::Body;
pub use shape::Shape;
pub use space::Space;
pub use tuning::Tuning;
