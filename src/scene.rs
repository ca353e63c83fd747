//! The planet-and-asteroid scene, stored in a `hecs` world.
//!
//! The world holds one [`Planet`] entity, one [`AsteroidField`] entity whose
//! rocks are drawn in a single instanced call, and one entity per
//! [`PointLight`]. Renderer passes query the world each frame instead of
//! holding their own copies of scene data.

use glam::{Mat4, Vec3};
use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::SceneSettings;
use crate::light::PointLight;
use crate::mesh::{InstanceData, Transform};

/// Which GPU mesh an entity draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Planet,
    Rock,
}

/// Component for entities drawn by the depth, colour and shadow passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderMesh {
    pub mesh: MeshKind,
}

/// Marker for the planet entity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Planet;

/// Per-rock world matrices for the instanced asteroid draw.
#[derive(Clone, Debug, Default)]
pub struct AsteroidField {
    pub instances: Vec<Mat4>,
}

/// Position of a light in the configured light list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LightSlot(pub usize);

/// Axis every asteroid spins around.
pub const ASTEROID_ROTATION_AXIS: Vec3 = Vec3::new(0.4, 0.6, 0.8);

/// Lays `count` rocks out on a ring of `radius` around the origin.
///
/// Each rock is pushed off the ring by up to `offset` on every axis (the
/// vertical push is damped to 40%), scaled into `[0.05, 0.25)` and spun a
/// whole number of radians about [`ASTEROID_ROTATION_AXIS`]. Positions step
/// in hundredths so the same seed always gives the same ring.
pub fn generate_asteroid_ring(count: u32, radius: f32, offset: f32, seed: u64) -> Vec<Mat4> {
    let mut rng = StdRng::seed_from_u64(seed);
    let steps = ((2.0 * offset * 100.0) as i32).max(1);
    let axis = ASTEROID_ROTATION_AXIS.normalize();

    (0..count)
        .map(|i| {
            // Degrees fed straight into sin/cos, matching the original layout.
            let angle = i as f32 / count as f32 * 360.0;
            let mut displacement = || rng.gen_range(0..steps) as f32 / 100.0 - offset;

            let x = angle.sin() * radius + displacement();
            let y = displacement() * 0.4;
            let z = angle.cos() * radius + displacement();

            let scale = rng.gen_range(0..20) as f32 / 100.0 + 0.05;
            let rotation = rng.gen_range(0..360) as f32;

            Mat4::from_translation(Vec3::new(x, y, z))
                * Mat4::from_scale(Vec3::splat(scale))
                * Mat4::from_axis_angle(axis, rotation)
        })
        .collect()
}

/// Scene entities plus a flag telling the shadow scheduler geometry moved.
pub struct Scene {
    pub world: World,
    planet: Entity,
    asteroids: Entity,
    geometry_dirty: bool,
}

impl Scene {
    pub fn new(settings: &SceneSettings, lights: &[PointLight]) -> Self {
        let mut world = World::new();

        let planet = world.spawn((
            Planet,
            Transform::new()
                .position(settings.planet_position)
                .uniform_scale(settings.planet_scale),
            RenderMesh {
                mesh: MeshKind::Planet,
            },
        ));

        let instances = generate_asteroid_ring(
            settings.asteroid_count,
            settings.ring_radius,
            settings.ring_offset,
            settings.seed,
        );
        debug!(count = instances.len(), "generated asteroid ring");
        let asteroids = world.spawn((
            AsteroidField { instances },
            RenderMesh {
                mesh: MeshKind::Rock,
            },
        ));

        for (slot, light) in lights.iter().enumerate() {
            world.spawn((LightSlot(slot), light.clone()));
        }

        Self {
            world,
            planet,
            asteroids,
            geometry_dirty: true,
        }
    }

    /// Lights in spawn order.
    pub fn lights(&self) -> Vec<PointLight> {
        let mut lights: Vec<(LightSlot, PointLight)> = self
            .world
            .query::<(&LightSlot, &PointLight)>()
            .iter()
            .map(|(_, (slot, l))| (*slot, l.clone()))
            .collect();
        lights.sort_by_key(|(slot, _)| *slot);
        lights.into_iter().map(|(_, l)| l).collect()
    }

    /// Replaces every light entity.
    pub fn set_lights(&mut self, lights: &[PointLight]) {
        let old: Vec<Entity> = self
            .world
            .query::<&PointLight>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        for entity in old {
            let _ = self.world.despawn(entity);
        }
        for (slot, light) in lights.iter().enumerate() {
            self.world.spawn((LightSlot(slot), light.clone()));
        }
    }

    /// Adopts a reloaded config's planet position and lights. The asteroid
    /// ring keeps its layout. Returns true when the lights changed.
    pub fn reload(&mut self, settings: &SceneSettings, lights: &[PointLight]) -> bool {
        self.set_planet_position(settings.planet_position);
        if self.lights() == lights {
            return false;
        }
        self.set_lights(lights);
        true
    }

    pub fn planet_transform(&self) -> Transform {
        self.world
            .get::<&Transform>(self.planet)
            .map(|t| *t)
            .unwrap_or_default()
    }

    /// Moves the planet and flags shadow maps for re-rendering.
    pub fn set_planet_position(&mut self, position: Vec3) {
        if let Ok(mut transform) = self.world.get::<&mut Transform>(self.planet) {
            if transform.position != position {
                transform.position = position;
                self.geometry_dirty = true;
            }
        }
    }

    pub fn asteroid_count(&self) -> u32 {
        self.world
            .get::<&AsteroidField>(self.asteroids)
            .map(|f| f.instances.len() as u32)
            .unwrap_or(0)
    }

    /// Instance data for the asteroid draw.
    pub fn instance_matrices(&self) -> Vec<InstanceData> {
        self.world
            .get::<&AsteroidField>(self.asteroids)
            .map(|f| f.instances.iter().copied().map(InstanceData::from_matrix).collect())
            .unwrap_or_default()
    }

    /// Returns and clears the geometry-changed flag.
    pub fn take_geometry_dirty(&mut self) -> bool {
        std::mem::take(&mut self.geometry_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::{FACES_PER_LIGHT, ShadowScheduler};
    use approx::assert_relative_eq;

    #[test]
    fn ring_is_deterministic_per_seed() {
        let a = generate_asteroid_ring(64, 50.0, 2.5, 1);
        let b = generate_asteroid_ring(64, 50.0, 2.5, 1);
        let c = generate_asteroid_ring(64, 50.0, 2.5, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ring_stays_within_offset() {
        let (radius, offset) = (50.0, 2.5);
        for m in generate_asteroid_ring(500, radius, offset, 9) {
            let (scale, _, translation) = m.to_scale_rotation_translation();
            let planar = Vec3::new(translation.x, 0.0, translation.z).length();
            assert!(planar > radius - 2.0 * offset && planar < radius + 2.0 * offset);
            assert!(translation.y.abs() <= offset * 0.4 + 1e-4);
            assert!(scale.x >= 0.05 - 1e-5 && scale.x < 0.25);
            assert_relative_eq!(scale.x, scale.y, epsilon = 1e-4);
        }
    }

    #[test]
    fn first_rock_sits_on_positive_z() {
        // Angle 0: sin = 0, cos = 1.
        let m = generate_asteroid_ring(10, 50.0, 2.5, 3)[0];
        let t = m.w_axis;
        assert!(t.x.abs() <= 2.5);
        assert!((t.z - 50.0).abs() <= 2.5);
    }

    #[test]
    fn scene_tracks_planet_moves() {
        let settings = SceneSettings {
            asteroid_count: 16,
            ..Default::default()
        };
        let mut scene = Scene::new(&settings, &[PointLight::default()]);
        assert!(scene.take_geometry_dirty());
        assert!(!scene.take_geometry_dirty());

        scene.set_planet_position(settings.planet_position);
        assert!(!scene.take_geometry_dirty());

        scene.set_planet_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(scene.take_geometry_dirty());
        assert_eq!(scene.planet_transform().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(scene.asteroid_count(), 16);
        assert_eq!(scene.instance_matrices().len(), 16);
    }

    #[test]
    fn set_lights_replaces_entities() {
        let settings = SceneSettings {
            asteroid_count: 0,
            ..Default::default()
        };
        let mut scene = Scene::new(&settings, &[PointLight::default()]);
        let moved = PointLight {
            position: Vec3::new(5.0, 0.0, 0.0),
            ..Default::default()
        };
        scene.set_lights(&[moved.clone(), PointLight::default()]);
        let lights = scene.lights();
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0], moved);
    }

    #[test]
    fn reloaded_light_reschedules_only_its_faces() {
        let settings = SceneSettings {
            asteroid_count: 0,
            ..Default::default()
        };
        let a = PointLight {
            position: Vec3::new(-4.0, 1.0, 0.0),
            ..Default::default()
        };
        let b = PointLight {
            position: Vec3::new(4.0, 1.0, 0.0),
            ..Default::default()
        };
        let mut scene = Scene::new(&settings, &[a.clone(), b.clone()]);
        let positions = |scene: &Scene| scene.lights().iter().map(|l| l.position).collect::<Vec<_>>();

        let mut scheduler = ShadowScheduler::new(2 * FACES_PER_LIGHT as u32);
        scheduler.update(&positions(&scene), scene.take_geometry_dirty());
        assert!(scheduler.is_converged());

        assert!(!scene.reload(&settings, &[a.clone(), b.clone()]));
        assert!(scheduler.update(&positions(&scene), scene.take_geometry_dirty()).is_empty());

        let moved = PointLight {
            position: Vec3::new(4.0, 3.0, 0.0),
            ..b
        };
        assert!(scene.reload(&settings, &[a, moved]));
        let faces = scheduler.update(&positions(&scene), scene.take_geometry_dirty());
        assert_eq!(faces.len(), FACES_PER_LIGHT);
        assert!(faces.iter().all(|f| f.light == 1));
        assert_eq!(scene.lights()[1].position, Vec3::new(4.0, 3.0, 0.0));
    }
}
