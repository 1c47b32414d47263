use super::color::Color;
use super::math::Vec3;
use super::surface::SceneObject;

/// A point light with separate diffuse and specular intensities.
#[derive(Debug)]
pub struct Light {
    pub position: Vec3,
    pub diffuse: Color,
    pub specular: Color,
}

/// The rectangular virtual screen the scene is projected on, described by its
/// four corner points relative to the camera position.
#[derive(Debug)]
pub struct ImagePlane {
    pub top_left: Vec3,
    pub top_right: Vec3,
    pub bottom_left: Vec3,
    pub bottom_right: Vec3,
}

impl ImagePlane {
    /// Bilinear interpolation of the corners: xt runs left to right and
    /// yt from the bottom edge to the top one, both in [0, 1].
    pub fn point_at(&self, xt: f64, yt: f64) -> Vec3 {
        let top = self.top_left.lerp(self.top_right, xt);
        let bottom = self.bottom_left.lerp(self.bottom_right, xt);
        bottom.lerp(top, yt)
    }
}

/// Everything the tracer needs to know about the world.
/// The scene is built once and stays read-only for the whole render.
#[derive(Debug)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: Vec<Light>,
    pub camera: Vec3,
    pub image_plane: ImagePlane,
    pub ambient_light: Color,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_plane_corners_are_interpolated() {
        let plane = ImagePlane {
            top_left: Vec3::new(-1.0, 1.0, 1.0),
            top_right: Vec3::new(1.0, 1.0, 1.0),
            bottom_left: Vec3::new(-1.0, -1.0, 1.0),
            bottom_right: Vec3::new(1.0, -1.0, 1.0),
        };
        assert_eq!(plane.point_at(0.0, 1.0), plane.top_left);
        assert_eq!(plane.point_at(1.0, 0.0), plane.bottom_right);
        assert_eq!(plane.point_at(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0));
    }
}
