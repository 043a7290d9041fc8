//! Perspective camera and the orbit controls that drive it.

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec3};
use vista_config::RenderConfig;

/// A perspective camera looking at a fixed target.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y,
            aspect_ratio,
            near,
            far,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Camera placed and aimed per the render settings.
    pub fn from_config(config: &RenderConfig, aspect_ratio: f32) -> Self {
        let mut camera = Self::new(
            config.fov_y_deg.to_radians(),
            aspect_ratio,
            config.near,
            config.far,
        );
        camera.position = Vec3::from_array(config.camera_position);
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Update the aspect ratio and rebuild the projection.
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        self.aspect_ratio = width / height.max(1.0);
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.near, self.far);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }
}

/// Pointer-driven orbit around the camera target.
///
/// A drag across the full viewport height turns the camera a full circle.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

/// Keeps the polar angle off the poles.
const POLAR_EPSILON: f32 = 1e-6;

impl OrbitControls {
    /// Look-around controls for a panorama: rotation only.
    pub fn panorama() -> Self {
        Self {
            enable_rotate: true,
            enable_zoom: false,
            enable_pan: false,
            ..Self::default()
        }
    }

    /// Orbit by a pointer delta in pixels. Returns whether the camera moved.
    pub fn rotate(
        &self,
        camera: &mut PerspectiveCamera,
        delta_x: f32,
        delta_y: f32,
        viewport_height: u32,
    ) -> bool {
        if !self.enable_rotate {
            return false;
        }
        let height = viewport_height.max(1) as f32;
        let left = TAU * delta_x / height * self.rotate_speed;
        let up = TAU * delta_y / height * self.rotate_speed;

        let offset = camera.position - camera.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return false;
        }
        let theta = offset.x.atan2(offset.z) - left;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() - up)
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        let sin_phi = phi.sin();
        let next = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        camera.position = camera.target + next;
        true
    }

    /// Move toward (`scale < 1`) or away from the target.
    pub fn dolly(&self, camera: &mut PerspectiveCamera, scale: f32) -> bool {
        if !self.enable_zoom || scale <= 0.0 {
            return false;
        }
        let offset = camera.position - camera.target;
        let distance = (offset.length() * scale).clamp(self.min_distance, self.max_distance);
        camera.position = camera.target + offset.normalize_or(Vec3::Z) * distance;
        true
    }

    /// Slide camera and target together in the view plane.
    pub fn pan(&self, camera: &mut PerspectiveCamera, delta_x: f32, delta_y: f32) -> bool {
        if !self.enable_pan {
            return false;
        }
        let shift = camera.right() * -delta_x + camera.up * delta_y;
        camera.position += shift;
        camera.target += shift;
        true
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enable_rotate: true,
            enable_zoom: true,
            enable_pan: true,
            rotate_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}
