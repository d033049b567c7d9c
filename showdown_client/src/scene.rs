//! Scene abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The presenter drives whatever implements `SceneBackend`.

use showdown_shared::{
    game::Block,
    math::{Transform, Vec3},
};

/// Identifies one materialized block in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneKey(pub u64);

/// A minimal scene API.
pub trait SceneBackend {
    fn add_block(&mut self, key: SceneKey, block: &Block);
    fn set_transform(&mut self, key: SceneKey, transform: &Transform);
    fn remove_block(&mut self, key: SceneKey);
    /// Moves the camera to `eye`, looking at `target`.
    fn focus_camera(&mut self, eye: Vec3, target: Vec3);
}

/// A no-op scene useful for headless clients.
#[derive(Default)]
pub struct NullScene;

impl SceneBackend for NullScene {
    fn add_block(&mut self, _key: SceneKey, _block: &Block) {}
    fn set_transform(&mut self, _key: SceneKey, _transform: &Transform) {}
    fn remove_block(&mut self, _key: SceneKey) {}
    fn focus_camera(&mut self, _eye: Vec3, _target: Vec3) {}
}
