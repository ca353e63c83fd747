//! A yaw/pitch fly camera matching the demo's original controls.
//!
//! Movement is along the camera basis (forward/right/up) or the world up axis:
//!
//! | Key | Motion |
//! |-----|--------|
//! | W / S | forward / back |
//! | A / D | left / right |
//! | Q / E | world down / up |
//! | R / F | camera up / down |
//! | Left Shift | fast speed |
//!
//! Mouse look only applies while the right mouse button is held; the shell
//! calls [`FlyCamera::reset_first_mouse`] when the button is released so the
//! next look gesture does not jump.

use glam::Vec3;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::config::CameraConfig;
use crate::input::Input;

const PITCH_LIMIT: f32 = 89.0;

#[derive(Clone, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    /// Horizontal angle in degrees. -90 looks down -Z.
    pub yaw: f32,
    /// Vertical angle in degrees, clamped to ±89.
    pub pitch: f32,
    pub sensitivity: f32,
    pub move_speed: f32,
    pub fast_speed: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    world_up: Vec3,
    first_mouse: bool,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

impl FlyCamera {
    pub fn from_config(config: &CameraConfig) -> Self {
        let mut camera = Self {
            position: config.position,
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            sensitivity: config.sensitivity,
            move_speed: config.move_speed,
            fast_speed: config.fast_speed,
            fov_degrees: config.fov_degrees,
            near: config.near,
            far: config.far,
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            world_up: Vec3::Y,
            first_mouse: true,
        };
        camera.find_forward();
        camera
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn move_forward(&mut self, distance: f32) {
        self.position += self.forward * distance;
    }

    pub fn move_right(&mut self, distance: f32) {
        self.position += self.right * distance;
    }

    pub fn move_world_up(&mut self, distance: f32) {
        self.position += self.world_up * distance;
    }

    pub fn move_up(&mut self, distance: f32) {
        self.position += self.up * distance;
    }

    /// Forgets the last mouse sample so the next delta is ignored.
    pub fn reset_first_mouse(&mut self) {
        self.first_mouse = true;
    }

    /// Applies a mouse delta in pixels.
    ///
    /// The first delta after [`reset_first_mouse`](Self::reset_first_mouse)
    /// is swallowed; it usually contains the cursor warp from grabbing.
    pub fn update_rotation(&mut self, dx: f32, dy: f32) {
        if self.first_mouse {
            self.first_mouse = false;
            return;
        }

        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.find_forward();
    }

    fn find_forward(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.forward = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        self.right = self.forward.cross(self.world_up).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }

    /// Applies keyboard movement and (while RMB is held) mouse look.
    pub fn update(&mut self, input: &Input, dt: f32) {
        let speed = if input.key_down(KeyCode::ShiftLeft) {
            self.fast_speed
        } else {
            self.move_speed
        } * dt;

        if input.key_down(KeyCode::KeyW) {
            self.move_forward(speed);
        }
        if input.key_down(KeyCode::KeyS) {
            self.move_forward(-speed);
        }
        if input.key_down(KeyCode::KeyA) {
            self.move_right(-speed);
        }
        if input.key_down(KeyCode::KeyD) {
            self.move_right(speed);
        }
        if input.key_down(KeyCode::KeyQ) {
            self.move_world_up(-speed);
        }
        if input.key_down(KeyCode::KeyE) {
            self.move_world_up(speed);
        }
        if input.key_down(KeyCode::KeyR) {
            self.move_up(speed);
        }
        if input.key_down(KeyCode::KeyF) {
            self.move_up(-speed);
        }

        if input.mouse_down(MouseButton::Right) {
            let delta = input.mouse_delta();
            if delta != glam::Vec2::ZERO {
                self.update_rotation(delta.x, delta.y);
            }
        } else if input.mouse_released(MouseButton::Right) {
            self.reset_first_mouse();
        }
    }

    /// Get the current camera state.
    pub fn camera(&self) -> Camera {
        Camera {
            position: self.position,
            forward: self.forward,
            up: self.up,
            fov_degrees: self.fov_degrees,
            near: self.near,
            far: self.far,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_looks_down_negative_z() {
        let cam = FlyCamera::default();
        assert_relative_eq!(cam.forward().z, -1.0, epsilon = 1e-6);
        assert_relative_eq!(cam.right().x, 1.0, epsilon = 1e-6);
        assert_eq!(cam.position, Vec3::new(0.0, 1.0, 3.0));
    }

    #[test]
    fn first_mouse_delta_is_ignored() {
        let mut cam = FlyCamera::default();
        cam.update_rotation(100.0, 0.0);
        assert_eq!(cam.yaw, -90.0);
        cam.update_rotation(100.0, 0.0);
        assert_relative_eq!(cam.yaw, -80.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.update_rotation(0.0, 0.0);
        cam.update_rotation(0.0, -10_000.0);
        assert_eq!(cam.pitch, 89.0);
        cam.update_rotation(0.0, 10_000.0);
        assert_eq!(cam.pitch, -89.0);
    }

    #[test]
    fn reset_first_mouse_swallows_next_delta() {
        let mut cam = FlyCamera::default();
        cam.update_rotation(0.0, 0.0);
        cam.reset_first_mouse();
        cam.update_rotation(50.0, 50.0);
        assert_eq!(cam.yaw, -90.0);
        assert_eq!(cam.pitch, 0.0);
    }

    #[test]
    fn keyboard_moves_along_basis() {
        let mut cam = FlyCamera::default();
        let mut input = Input::new();
        input.press_key(KeyCode::KeyW);
        cam.update(&input, 0.5);
        assert_relative_eq!(cam.position.z, 3.0 - 5.0, epsilon = 1e-5);

        input.press_key(KeyCode::ShiftLeft);
        cam.update(&input, 0.5);
        assert_relative_eq!(cam.position.z, -2.0 - 10.0, epsilon = 1e-4);

        let mut input = Input::new();
        input.press_key(KeyCode::KeyE);
        cam.update(&input, 1.0);
        assert_relative_eq!(cam.position.y, 11.0, epsilon = 1e-5);
    }

    #[test]
    fn mouse_look_requires_right_button() {
        let mut cam = FlyCamera::default();
        let mut input = Input::new();
        input.add_mouse_motion(40.0, 0.0);
        cam.update(&input, 0.016);
        assert_eq!(cam.yaw, -90.0);

        input.press_mouse(MouseButton::Right);
        cam.update(&input, 0.016);
        cam.update(&input, 0.016);
        assert_relative_eq!(cam.yaw, -86.0);
    }
}
