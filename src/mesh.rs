//! Meshes, instancing data and transforms.
//!
//! The demo renders two models: a planet (UV sphere) and a rock that is drawn
//! once per asteroid with per-instance world matrices. Geometry is built on
//! the CPU as [`RawGeometry`] and uploaded to a [`Mesh`].
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |
//!
//! Instanced draws add a second buffer ([`InstanceData::LAYOUT`]) carrying a
//! world matrix at locations 3 to 6, one column per location.

use std::collections::HashMap;
use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::gpu::GpuContext;

/// A vertex with position, normal, and texture coordinates.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Per-instance world matrix for instanced draws.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub world: [[f32; 4]; 4],
}

impl InstanceData {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceData>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &wgpu::vertex_attr_array![
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x4,
        ],
    };

    pub fn from_matrix(world: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
        }
    }
}

/// CPU-side triangle geometry.
#[derive(Clone, Debug, Default)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl RawGeometry {
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// A UV sphere centred on the origin.
    pub fn uv_sphere(segments: u32, rings: u32, radius: f32) -> Self {
        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for seg in 0..=segments {
                let theta = 2.0 * PI * seg as f32 / segments as f32;
                let normal = [ring_radius * theta.cos(), y, ring_radius * theta.sin()];
                let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];
                let uv = [seg as f32 / segments as f32, ring as f32 / rings as f32];
                vertices.push(Vertex3d::new(position, normal, uv));
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;

                indices.extend_from_slice(&[current, current + 1, next]);
                indices.extend_from_slice(&[current + 1, next + 1, next]);
            }
        }

        Self::new(vertices, indices)
    }

    /// A lumpy rock: a subdivided icosahedron with seeded radial displacement.
    ///
    /// Every vertex radius lies in `[0.75, 1.15]`. Normals are recomputed
    /// from the displaced faces.
    pub fn rock(subdivisions: u32, seed: u32) -> Self {
        let (positions, indices) = icosphere(subdivisions);

        let positions: Vec<Vec3> = positions
            .into_iter()
            .map(|p| {
                let lump = lattice_noise(p * 2.5, seed) * 0.25 + lattice_noise(p * 6.0, seed ^ 0x9e37) * 0.15;
                p * (0.95 + lump).clamp(0.75, 1.15)
            })
            .collect();

        let mut normals = vec![Vec3::ZERO; positions.len()];
        for tri in indices.chunks_exact(3) {
            let (a, b, c) = (
                positions[tri[0] as usize],
                positions[tri[1] as usize],
                positions[tri[2] as usize],
            );
            let face = (b - a).cross(c - a);
            for &i in tri {
                normals[i as usize] += face;
            }
        }

        let vertices = positions
            .iter()
            .zip(&normals)
            .map(|(p, n)| {
                let dir = p.normalize_or_zero();
                let uv = Vec2::new(
                    0.5 + dir.z.atan2(dir.x) / (2.0 * PI),
                    0.5 - dir.y.asin() / PI,
                );
                Vertex3d::new(p.to_array(), n.normalize_or_zero().to_array(), uv.to_array())
            })
            .collect();

        Self::new(vertices, indices)
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| {
                let p = Vec3::from_array(v.position);
                (min.min(p), max.max(p))
            },
        )
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn icosphere(subdivisions: u32) -> (Vec<Vec3>, Vec<u32>) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut positions: Vec<Vec3> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();

    #[rustfmt::skip]
    let mut indices: Vec<u32> = vec![
        0, 11, 5,   0, 5, 1,    0, 1, 7,    0, 7, 10,   0, 10, 11,
        1, 5, 9,    5, 11, 4,   11, 10, 2,  10, 7, 6,   7, 1, 8,
        3, 9, 4,    3, 4, 2,    3, 2, 6,    3, 6, 8,    3, 8, 9,
        4, 9, 5,    2, 4, 11,   6, 2, 10,   8, 6, 7,    9, 8, 1,
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let mid = (positions[a as usize] + positions[b as usize]).normalize();
                positions.push(mid);
                positions.len() as u32 - 1
            })
        };

        let mut next = Vec::with_capacity(indices.len() * 4);
        for tri in indices.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next.extend_from_slice(&[a, ab, ca, b, bc, ab, c, ca, bc, ab, bc, ca]);
        }
        indices = next;
    }

    (positions, indices)
}

/// Smoothly interpolated hash noise in roughly `[-1, 1]`.
fn lattice_noise(p: Vec3, seed: u32) -> f32 {
    let cell = p.floor();
    let f = p - cell;
    let w = f * f * (Vec3::splat(3.0) - 2.0 * f);

    let corner = |dx: i32, dy: i32, dz: i32| {
        let h = hash3(
            cell.x as i32 + dx,
            cell.y as i32 + dy,
            cell.z as i32 + dz,
            seed,
        );
        (h as f32 / u32::MAX as f32) * 2.0 - 1.0
    };

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), w.x);
    let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), w.x);
    let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), w.x);
    let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), w.x);
    lerp(lerp(x00, x10, w.y), lerp(x01, x11, w.y), w.z)
}

pub(crate) fn hash3(x: i32, y: i32, z: i32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add((x as u32).wrapping_mul(374_761_393));
    h = h.wrapping_add((y as u32).wrapping_mul(668_265_263));
    h = h.wrapping_add((z as u32).wrapping_mul(2_246_822_519));
    h ^= h >> 13;
    h = h.wrapping_mul(1_274_126_177);
    h ^= h >> 16;
    h
}

/// GPU-resident geometry.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl Mesh {
    pub fn new(gpu: &GpuContext, vertices: &[Vertex3d], indices: &[u32], label: &str) -> Self {
        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertex Buffer")),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    pub fn from_geometry(gpu: &GpuContext, geometry: &RawGeometry, label: &str) -> Self {
        Self::new(gpu, &geometry.vertices, &geometry.indices, label)
    }

    /// Binds vertex and index buffers and issues `instances` indexed draws.
    pub fn draw_instanced(&self, pass: &mut wgpu::RenderPass<'_>, instances: std::ops::Range<u32>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, instances);
    }
}

/// Position, rotation and scale, combined in SRT order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vertex_and_instance_strides() {
        assert_eq!(std::mem::size_of::<Vertex3d>(), 32);
        assert_eq!(std::mem::size_of::<InstanceData>(), 64);
    }

    #[test]
    fn uv_sphere_has_expected_counts_and_radius() {
        let sphere = RawGeometry::uv_sphere(32, 16, 1.0);
        assert_eq!(sphere.vertices.len(), 33 * 17);
        assert_eq!(sphere.triangle_count(), 32 * 16 * 2);
        for v in &sphere.vertices {
            assert_relative_eq!(Vec3::from_array(v.position).length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn icosphere_subdivision_quadruples_faces() {
        let (p0, i0) = icosphere(0);
        let (p2, i2) = icosphere(2);
        assert_eq!(p0.len(), 12);
        assert_eq!(i0.len() / 3, 20);
        assert_eq!(i2.len() / 3, 320);
        assert_eq!(p2.len(), 162);
    }

    #[test]
    fn rock_radius_is_bounded_and_seeded() {
        let a = RawGeometry::rock(2, 7);
        let b = RawGeometry::rock(2, 7);
        let c = RawGeometry::rock(2, 8);
        assert_eq!(a.vertices, b.vertices);
        assert_ne!(a.vertices, c.vertices);
        for v in &a.vertices {
            let r = Vec3::from_array(v.position).length();
            assert!((0.75 - 1e-4..=1.15 + 1e-4).contains(&r), "radius {r}");
            assert_relative_eq!(Vec3::from_array(v.normal).length(), 1.0, epsilon = 1e-4);
        }
        let (min, max) = a.bounds();
        assert!(min.cmpge(Vec3::splat(-1.16)).all());
        assert!(max.cmple(Vec3::splat(1.16)).all());
    }

    #[test]
    fn transform_applies_scale_then_translation() {
        let t = Transform::new()
            .position(Vec3::new(1.0, 0.0, 0.0))
            .uniform_scale(2.0);
        let p = t.matrix().transform_point3(Vec3::X);
        assert_relative_eq!(p.x, 3.0);
    }
}
