use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// A perspective camera for the fog scene.
///
/// Provides position, orientation, field of view and clip planes. The fog
/// volume is laid out between `near` and the fog far distance, so the clip
/// planes also feed the froxel grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 3.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_degrees: 45.0,
            near: 0.1,
            far: 150.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Compute the right vector from forward and up.
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }

    /// Packs the camera for the shared camera uniform buffer.
    pub fn uniforms(&self, aspect: f32) -> CameraUniforms {
        let view = self.view_matrix();
        let proj = self.projection_matrix(aspect);
        let view_proj = proj * view;
        CameraUniforms {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            position: self.position.to_array(),
            near: self.near,
            forward: self.forward.to_array(),
            far: self.far,
        }
    }
}

/// Camera data shared by every scene and fog shader (group 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub near: f32,
    pub forward: [f32; 3],
    pub far: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniforms_are_std140_sized() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 4 * 64 + 32);
    }

    #[test]
    fn inverse_view_projection_round_trips() {
        let camera = Camera::default();
        let u = camera.uniforms(16.0 / 9.0);
        let vp = Mat4::from_cols_array_2d(&u.view_proj);
        let inv = Mat4::from_cols_array_2d(&u.inv_view_proj);
        let p = Vec3::new(1.0, -2.0, -10.0);
        let back = inv.project_point3(vp.project_point3(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-3);
    }

    #[test]
    fn right_is_perpendicular() {
        let camera = Camera::default();
        assert_relative_eq!(camera.right().dot(camera.forward), 0.0);
        assert_relative_eq!(camera.right().x, 1.0);
    }
}
