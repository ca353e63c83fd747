use glam::Vec3;
use tracing::trace;

use crate::shadow::{FACES_PER_LIGHT, ShadowFace};

/// Decides which cube faces get re-rendered each frame.
///
/// A face is dirty when its light moved, when scene geometry changed, or
/// after [`invalidate_all`](Self::invalidate_all). Each
/// [`update`](Self::update) hands out at most `faces_per_frame` dirty faces,
/// continuing round-robin after the last face it scheduled so no light
/// starves the others.
#[derive(Clone, Debug)]
pub struct ShadowScheduler {
    dirty: Vec<[bool; FACES_PER_LIGHT]>,
    positions: Vec<Vec3>,
    cursor: usize,
    faces_per_frame: usize,
}

impl ShadowScheduler {
    pub fn new(faces_per_frame: u32) -> Self {
        Self {
            dirty: Vec::new(),
            positions: Vec::new(),
            cursor: 0,
            faces_per_frame: faces_per_frame.max(1) as usize,
        }
    }

    pub fn set_faces_per_frame(&mut self, faces: u32) {
        self.faces_per_frame = faces.max(1) as usize;
    }

    pub fn faces_per_frame(&self) -> usize {
        self.faces_per_frame
    }

    /// Marks every face dirty.
    pub fn invalidate_all(&mut self) {
        for faces in &mut self.dirty {
            *faces = [true; FACES_PER_LIGHT];
        }
    }

    /// True when every face is up to date.
    pub fn is_converged(&self) -> bool {
        self.dirty.iter().all(|faces| faces.iter().all(|d| !d))
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.iter().flatten().filter(|d| **d).count()
    }

    /// Records light movement and scene changes, then schedules this
    /// frame's faces and marks them clean.
    pub fn update(&mut self, light_positions: &[Vec3], scene_dirty: bool) -> Vec<ShadowFace> {
        if light_positions.len() != self.positions.len() {
            self.dirty.resize(light_positions.len(), [true; FACES_PER_LIGHT]);
            self.positions.resize(light_positions.len(), Vec3::NAN);
        }

        for (light, position) in light_positions.iter().enumerate() {
            if self.positions[light] != *position {
                self.positions[light] = *position;
                self.dirty[light] = [true; FACES_PER_LIGHT];
            }
        }
        if scene_dirty {
            self.invalidate_all();
        }

        let total = self.dirty.len() * FACES_PER_LIGHT;
        if total == 0 {
            return Vec::new();
        }

        let mut scheduled = Vec::with_capacity(self.faces_per_frame);
        let start = self.cursor % total;
        for step in 0..total {
            if scheduled.len() == self.faces_per_frame {
                break;
            }
            let index = (start + step) % total;
            let (light, face) = (index / FACES_PER_LIGHT, index % FACES_PER_LIGHT);
            if self.dirty[light][face] {
                self.dirty[light][face] = false;
                scheduled.push(ShadowFace { light, face });
                self.cursor = index + 1;
            }
        }

        if !scheduled.is_empty() {
            trace!(
                faces = scheduled.len(),
                remaining = self.dirty_count(),
                "scheduled shadow faces"
            );
        }
        scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lights(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 3.0, 10.0)).collect()
    }

    #[test]
    fn new_lights_render_every_face_then_converge() {
        let mut scheduler = ShadowScheduler::new(6);
        let first = scheduler.update(&lights(1), false);
        assert_eq!(first.len(), 6);
        assert!(scheduler.is_converged());
        assert!(scheduler.update(&lights(1), false).is_empty());
    }

    #[test]
    fn budget_is_respected_round_robin() {
        let mut scheduler = ShadowScheduler::new(4);
        let positions = lights(2);
        let a = scheduler.update(&positions, false);
        let b = scheduler.update(&positions, false);
        let c = scheduler.update(&positions, false);
        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 4);
        assert_eq!(c.len(), 4);
        assert_eq!(a[0], ShadowFace { light: 0, face: 0 });
        assert_eq!(b[0], ShadowFace { light: 0, face: 4 });
        assert_eq!(c[3], ShadowFace { light: 1, face: 5 });
        assert!(scheduler.is_converged());
    }

    #[test]
    fn moving_a_light_dirties_only_its_faces() {
        let mut scheduler = ShadowScheduler::new(24);
        let mut positions = lights(3);
        scheduler.update(&positions, false);
        positions[1].x += 1.0;
        let faces = scheduler.update(&positions, false);
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.light == 1));
    }

    #[test]
    fn scene_change_dirties_everything() {
        let mut scheduler = ShadowScheduler::new(24);
        let positions = lights(2);
        scheduler.update(&positions, false);
        assert_eq!(scheduler.update(&positions, true).len(), 12);
    }

    #[test]
    fn round_robin_resumes_after_last_scheduled_face() {
        let mut scheduler = ShadowScheduler::new(2);
        let positions = lights(1);
        scheduler.update(&positions, false);
        scheduler.update(&positions, false);
        scheduler.update(&positions, false);
        assert!(scheduler.is_converged());

        // Cursor now wraps to face 0; invalidation starts there.
        scheduler.invalidate_all();
        let faces = scheduler.update(&positions, false);
        assert_eq!(faces, vec![ShadowFace { light: 0, face: 0 }, ShadowFace { light: 0, face: 1 }]);
    }

    #[test]
    fn removing_lights_shrinks_state() {
        let mut scheduler = ShadowScheduler::new(24);
        scheduler.update(&lights(3), false);
        assert!(scheduler.update(&lights(1), false).is_empty());
        assert_eq!(scheduler.dirty_count(), 0);
        assert!(scheduler.update(&[], false).is_empty());
    }
}
