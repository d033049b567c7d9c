//! Physics abstraction.
//!
//! The session only needs to create and remove unit cubes, advance the world
//! by a fixed step, and read transforms back. `PhysicsBackend` is that seam;
//! `RapierPhysics` is the production backend and `NullPhysics` keeps bodies
//! exactly where they were created.

use std::collections::HashMap;
use std::fmt;

use rapier3d::prelude::*;

use crate::math::{Quat, Transform, Vec3};

/// Fixed physics step (60 Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Half extent of a placed cube.
pub const BLOCK_HALF_EXTENT: f32 = 0.5;

/// Mass of a placed cube.
pub const BLOCK_MASS: f32 = 1.0;

/// Opaque handle to a body owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u64);

/// Physics parameters.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Half extent of the static ground slab, whose top face is at y = 0.
    pub ground_half_extent: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.82, 0.0),
            ground_half_extent: 500.0,
        }
    }
}

/// Rigid-body world as the session sees it.
pub trait PhysicsBackend: Send {
    /// Adds a dynamic unit cube centered at `at`.
    fn add_cube(&mut self, at: Vec3, mass: f32) -> BodyHandle;
    /// Removes a body. Unknown handles are ignored.
    fn remove_body(&mut self, handle: BodyHandle);
    /// Advances the world.
    fn step(&mut self, dt_sec: f32);
    fn transform(&self, handle: BodyHandle) -> Option<Transform>;
    fn body_count(&self) -> usize;
}

/// Backend that never moves anything.
#[derive(Default)]
pub struct NullPhysics {
    next: u64,
    bodies: HashMap<BodyHandle, Vec3>,
}

impl PhysicsBackend for NullPhysics {
    fn add_cube(&mut self, at: Vec3, _mass: f32) -> BodyHandle {
        let h = BodyHandle(self.next);
        self.next += 1;
        self.bodies.insert(h, at);
        h
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(&handle);
    }

    fn step(&mut self, _dt_sec: f32) {}

    fn transform(&self, handle: BodyHandle) -> Option<Transform> {
        self.bodies.get(&handle).copied().map(Transform::at)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

/// Rapier-backed world with a static ground slab.
pub struct RapierPhysics {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    next: u64,
    handles: HashMap<BodyHandle, RigidBodyHandle>,
}

impl fmt::Debug for RapierPhysics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapierPhysics")
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .finish_non_exhaustive()
    }
}

impl Default for RapierPhysics {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl RapierPhysics {
    pub fn new(cfg: PhysicsConfig) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            ..Default::default()
        };

        let mut world = Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(cfg.gravity.x, cfg.gravity.y, cfg.gravity.z),
            next: 0,
            handles: HashMap::new(),
        };

        let e = cfg.ground_half_extent;
        let ground = ColliderBuilder::cuboid(e, BLOCK_HALF_EXTENT, e)
            .translation(Vector::new(0.0, -BLOCK_HALF_EXTENT, 0.0))
            .build();
        world.collider_set.insert(ground);
        world
    }
}

impl PhysicsBackend for RapierPhysics {
    fn add_cube(&mut self, at: Vec3, mass: f32) -> BodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(at.x, at.y, at.z))
            .build();
        let rb = self.rigid_body_set.insert(body);
        let collider =
            ColliderBuilder::cuboid(BLOCK_HALF_EXTENT, BLOCK_HALF_EXTENT, BLOCK_HALF_EXTENT)
                .mass(mass)
                .build();
        self.collider_set
            .insert_with_parent(collider, rb, &mut self.rigid_body_set);

        let h = BodyHandle(self.next);
        self.next += 1;
        self.handles.insert(h, rb);
        h
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        if let Some(rb) = self.handles.remove(&handle) {
            self.rigid_body_set.remove(
                rb,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
    }

    fn step(&mut self, dt_sec: f32) {
        self.integration_parameters.dt = dt_sec;
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn transform(&self, handle: BodyHandle) -> Option<Transform> {
        let rb = self.handles.get(&handle)?;
        let body = self.rigid_body_set.get(*rb)?;
        let pos = body.translation();
        let rot = body.rotation();
        Some(Transform {
            position: Vec3::new(pos.x, pos.y, pos.z),
            quaternion: Quat {
                x: rot.x,
                y: rot.y,
                z: rot.z,
                w: rot.w,
            },
        })
    }

    fn body_count(&self) -> usize {
        self.handles.len()
    }
}
