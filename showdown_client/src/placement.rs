//! Placement picking.
//!
//! A click becomes a ray from the camera. The ray is tested against the
//! ground plane and every materialized cube; the nearest hit decides where
//! the new block goes. Horizontal components snap to the integer grid and
//! the block center sits half a unit above the hit point.

use showdown_shared::{
    game::{Block, Color},
    math::{Ray, Transform, Vec3},
    physics::BLOCK_HALF_EXTENT,
};

/// A ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub point: Vec3,
    /// Distance along the ray.
    pub distance: f32,
}

/// Intersects the square ground plane at y = 0, centered on the origin.
pub fn ray_ground(ray: &Ray, ground_size: f32) -> Option<Hit> {
    if ray.dir.y.abs() <= f32::EPSILON {
        return None;
    }
    let t = -ray.origin.y / ray.dir.y;
    if t < 0.0 {
        return None;
    }
    let point = ray.at(t);
    let half = ground_size / 2.0;
    (point.x.abs() <= half && point.z.abs() <= half).then_some(Hit { point, distance: t })
}

/// Intersects a unit cube with the given transform (slab test in cube space).
///
/// Rays starting inside the cube do not hit it.
pub fn ray_cube(ray: &Ray, cube: &Transform) -> Option<Hit> {
    let inv = cube.quaternion.conjugate();
    let origin = inv.rotate(ray.origin - cube.position);
    let dir = inv.rotate(ray.dir);

    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;
    for (o, d) in [(origin.x, dir.x), (origin.y, dir.y), (origin.z, dir.z)] {
        if d.abs() <= f32::EPSILON {
            if o.abs() > BLOCK_HALF_EXTENT {
                return None;
            }
            continue;
        }
        let t1 = (-BLOCK_HALF_EXTENT - o) / d;
        let t2 = (BLOCK_HALF_EXTENT - o) / d;
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }

    if t_near > t_far || t_near < 0.0 {
        return None;
    }
    Some(Hit {
        point: ray.at(t_near),
        distance: t_near,
    })
}

/// Nearest hit among the ground and the given cubes.
pub fn pick<'a, I>(ray: &Ray, ground_size: f32, cubes: I) -> Option<Hit>
where
    I: IntoIterator<Item = &'a Transform>,
{
    cubes
        .into_iter()
        .filter_map(|c| ray_cube(ray, c))
        .chain(ray_ground(ray, ground_size))
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Nearest grid line; halves go toward positive infinity (`-2.5` -> `-2`).
fn snap(v: f32) -> f32 {
    (v + 0.5).floor()
}

/// Turns a hit point into the block to request.
pub fn resolve(point: Vec3, color: Color) -> Block {
    Block {
        x: snap(point.x),
        y: point.y + BLOCK_HALF_EXTENT,
        z: snap(point.z),
        color,
    }
}
