//! The panorama scene: a back-faced sphere viewed from inside by a
//! perspective camera, plus the renderer drawing it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use vista_config::RenderConfig;

use crate::camera::{OrbitControls, PerspectiveCamera};
use crate::command::ControlStatus;
use crate::error::SceneError;
use crate::frame_loop::FrameThrottle;
use crate::host::{Renderer, RendererOptions, Surface};
use crate::material::{PanoramaMaterial, SharedMaterial};
use crate::sphere::{SphereGeometry, SphereMesh};
use crate::viewport::ViewportSize;

/// What a renderer sees for one composited frame.
pub struct FrameView<'a> {
    pub camera: &'a PerspectiveCamera,
    pub mesh: &'a SphereMesh,
    /// Sphere rotation about the vertical axis, in radians.
    pub rotation_y: f32,
    pub material: &'a PanoramaMaterial,
}

pub struct PanoramaScene {
    camera: PerspectiveCamera,
    controls: OrbitControls,
    renderer: Box<dyn Renderer>,
    mesh: Arc<SphereMesh>,
    material: SharedMaterial,
    throttle: FrameThrottle,
    rotation_y: f32,
    rotation_step: f32,
    viewport: ViewportSize,
    render_count: u64,
}

impl PanoramaScene {
    /// Build the scene against `surface`, sized to its current layout.
    pub fn new(
        config: &RenderConfig,
        surface: &dyn Surface,
        material: SharedMaterial,
    ) -> Result<Self, SceneError> {
        let viewport = surface.offset_size();
        let renderer = surface.create_renderer(RendererOptions {
            antialias: config.antialias,
            size: viewport,
            pixel_ratio: surface.pixel_ratio(),
        })?;
        let geometry = SphereGeometry::from_config(config);
        let mesh = Arc::new(geometry.build(material.snapshot().side));
        debug!(
            radius = geometry.radius,
            triangles = mesh.triangle_count(),
            "panorama sphere built"
        );

        let mut scene = Self {
            camera: PerspectiveCamera::from_config(config, viewport.aspect()),
            controls: OrbitControls::panorama(),
            renderer,
            mesh,
            material,
            throttle: FrameThrottle::new(config.frame_interval()),
            rotation_y: 0.0,
            rotation_step: config.rotation_step_rad,
            viewport,
            render_count: 0,
        };
        scene.renderer.set_pixel_ratio(surface.pixel_ratio());
        scene.resize(viewport);
        info!(width = viewport.width, height = viewport.height, "panorama scene ready");
        Ok(scene)
    }

    /// Match camera aspect and renderer size to the viewport.
    pub fn resize(&mut self, size: ViewportSize) {
        self.viewport = size;
        self.camera
            .set_aspect_ratio(size.width as f32, size.height as f32);
        self.renderer.set_size(size);
    }

    /// Per-display-frame step. Composites and advances the rotation only when
    /// the throttle lets the frame through. Returns whether it composited.
    pub fn frame(&mut self, timestamp: Duration, controls: ControlStatus) -> bool {
        if !self.throttle.advance(timestamp) {
            return false;
        }
        self.render();
        if !controls.disable_rotating {
            self.rotation_y += self.rotation_step;
        }
        true
    }

    /// Composite immediately.
    pub fn render(&mut self) {
        let slot = self.material.lock();
        let view = FrameView {
            camera: &self.camera,
            mesh: &self.mesh,
            rotation_y: self.rotation_y,
            material: &slot.material,
        };
        self.renderer.render(&view);
        self.render_count += 1;
    }

    /// Orbit the camera by a pointer drag delta.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) -> bool {
        self.controls
            .rotate(&mut self.camera, delta_x, delta_y, self.viewport.height)
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn throttle(&self) -> &FrameThrottle {
        &self.throttle
    }

    pub fn dispose(&mut self) {
        self.renderer.dispose();
    }
}
