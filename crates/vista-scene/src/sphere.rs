//! Latitude/longitude sphere used as the panorama backdrop.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use vista_config::RenderConfig;

use crate::material::Side;

/// Sphere parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereGeometry {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

/// Triangle mesh generated from a [`SphereGeometry`].
#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub positions: Vec<Vec3>,
    /// Equirectangular UVs, `v = 0` at the bottom pole.
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl SphereGeometry {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            radius: config.sphere_radius,
            width_segments: config.sphere_width_segments.max(3),
            height_segments: config.sphere_height_segments.max(2),
        }
    }

    /// Build the mesh. `Side::Back` flips winding and normals so the inside
    /// faces the viewer.
    pub fn build(&self, side: Side) -> SphereMesh {
        let columns = self.width_segments + 1;
        let rows = self.height_segments + 1;
        let count = (columns * rows) as usize;

        let mut positions = Vec::with_capacity(count);
        let mut normals = Vec::with_capacity(count);
        let mut uvs = Vec::with_capacity(count);

        for iy in 0..rows {
            let v = iy as f32 / self.height_segments as f32;
            for ix in 0..columns {
                let u = ix as f32 / self.width_segments as f32;
                let position = Vec3::new(
                    -self.radius * (u * TAU).cos() * (v * PI).sin(),
                    self.radius * (v * PI).cos(),
                    self.radius * (u * TAU).sin() * (v * PI).sin(),
                );
                let normal = position.normalize_or_zero();
                positions.push(position);
                normals.push(if side == Side::Back { -normal } else { normal });
                uvs.push([u, 1.0 - v]);
            }
        }

        let index = |ix: u32, iy: u32| iy * columns + ix;
        let mut indices = Vec::new();
        for iy in 0..self.height_segments {
            for ix in 0..self.width_segments {
                let a = index(ix + 1, iy);
                let b = index(ix, iy);
                let c = index(ix, iy + 1);
                let d = index(ix + 1, iy + 1);
                // Pole rows collapse to one triangle per quad.
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != self.height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        if side == Side::Back {
            for tri in indices.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
        }

        SphereMesh {
            positions,
            uvs,
            normals,
            indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> SphereGeometry {
        SphereGeometry::from_config(&RenderConfig::default())
    }

    #[test]
    fn test_vertices_on_sphere() {
        let geometry = geometry();
        let mesh = geometry.build(Side::Back);
        for p in &mesh.positions {
            assert!((p.length() - geometry.radius).abs() < 1e-3);
        }
    }

    #[test]
    fn test_counts() {
        let mesh = geometry().build(Side::Front);
        assert_eq!(mesh.positions.len(), 51 * 51);
        assert_eq!(mesh.triangle_count(), (50 * (2 * 50 - 2)) as usize);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn test_back_side_normals_point_inward() {
        let mesh = geometry().build(Side::Back);
        let (p, n) = (mesh.positions[60], mesh.normals[60]);
        assert!(p.dot(n) < 0.0);
    }

    #[test]
    fn test_back_side_reverses_winding() {
        let front = geometry().build(Side::Front);
        let back = geometry().build(Side::Back);
        assert_eq!(front.indices[0], back.indices[0]);
        assert_eq!(front.indices[1], back.indices[2]);
        assert_eq!(front.indices[2], back.indices[1]);
    }

    #[test]
    fn test_uvs_span_unit_square() {
        let mesh = geometry().build(Side::Back);
        for [u, v] in &mesh.uvs {
            assert!((0.0..=1.0).contains(u));
            assert!((0.0..=1.0).contains(v));
        }
    }
}
