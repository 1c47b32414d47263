use std::error::Error;
use std::fs::File;
use std::io::BufReader;

use obj::{load_obj, Obj};

use super::color::Color;
use super::math::{Ray, Vec3, EPSILON};

/// Phong reflectance coefficients of a surface.
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub k_ambient: Color,
    pub k_diffuse: Color,
    pub k_specular: Color,
    /// specular exponent: higher values give a smaller, sharper highlight
    pub shininess: f64,
    /// in [0, 1], scales the color carried back by the reflection bounce
    pub k_reflection: f64,
}

impl Material {
    /// A non-reflective material with no highlight, lit only by its diffuse color.
    pub fn matte(color: Color) -> Material {
        Material {
            k_ambient: color,
            k_diffuse: color,
            k_specular: Color::black(),
            shininess: 1.0,
            k_reflection: 0.0,
        }
    }
}

pub type Triangle = (Vec3, Vec3, Vec3);

#[derive(Debug)]
pub enum Solid {
    Sphere { center: Vec3, radius: f64 },
    Plane { normal: Vec3, distance: f64 },
    Triangle(Triangle),
}

#[derive(Debug)]
pub struct SceneObject {
    pub solid: Solid,
    pub material: Material,
}

impl Solid {
    /// Returns the smallest ray parameter greater than EPSILON at which the
    /// ray meets this solid, or None when it misses entirely.
    pub fn earliest_intersection(&self, ray: &Ray) -> Option<f64> {
        match self {
            Solid::Sphere { center, radius } => {
                let oc = ray.origin - *center;
                let a = ray.direction.dot(ray.direction);
                let b = 2.0 * ray.direction.dot(oc);
                let c = oc.dot(oc) - radius * radius;
                let discriminant = b * b - 4.0 * a * c;
                if discriminant < 0.0 {
                    return None;
                }

                // prefer the near root, fall back to the far one when the
                // origin is inside the sphere
                let near = (-b - discriminant.sqrt()) / (2.0 * a);
                if near > EPSILON {
                    return Some(near);
                }
                let far = (-b + discriminant.sqrt()) / (2.0 * a);
                if far > EPSILON {
                    return Some(far);
                }
                None
            }
            Solid::Plane { normal, distance } => {
                let dv = normal.dot(ray.direction);
                if dv.abs() < EPSILON {
                    return None;
                }
                let center = *normal * *distance;
                let t = (center - ray.origin).dot(*normal) / dv;
                if t <= EPSILON {
                    return None;
                }
                Some(t)
            }
            Solid::Triangle(triangle) => {
                // https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm
                let (v0, v1, v2) = *triangle;
                let v0v1 = v1 - v0;
                let v0v2 = v2 - v0;
                let ray_cross_e2 = ray.direction.cross(v0v2);
                let determinant = v0v1.dot(ray_cross_e2);
                // ray and triangle are parallel if det is close to 0
                if determinant.abs() < EPSILON {
                    return None;
                }
                let inverse_determinant = 1.0 / determinant;
                let tvec = ray.origin - v0;
                let u = tvec.dot(ray_cross_e2) * inverse_determinant;
                if u < 0.0 || u > 1.0 {
                    return None;
                }

                let qvec = tvec.cross(v0v1);
                let v = ray.direction.dot(qvec) * inverse_determinant;
                if v < 0.0 || u + v > 1.0 {
                    return None;
                }

                let t = v0v2.dot(qvec) * inverse_determinant;
                if t <= EPSILON {
                    return None;
                }
                Some(t)
            }
        }
    }

    /// The outward unit normal of the solid at a point of its boundary.
    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        match self {
            Solid::Sphere { center, .. } => (point - *center).normalize(),
            Solid::Plane { normal, .. } => *normal,
            Solid::Triangle((v0, v1, v2)) => (*v1 - *v0).cross(*v2 - *v0).normalize(),
        }
    }
}

/// Loads a wavefront obj file as a list of triangle objects sharing the same
/// material, scaled and then translated by the given offset.
pub fn load_model(
    filename: &str,
    offset: Vec3,
    scale: f64,
    material: Material,
) -> Result<Vec<SceneObject>, Box<dyn Error>> {
    let input = BufReader::new(File::open(filename)?);
    let obj: Obj = load_obj(input)?;
    let vertex = |index: u16| -> Vec3 {
        let position: Vec3 = obj.vertices[index as usize].position.into();
        position * scale + offset
    };
    let mut objects = Vec::with_capacity(obj.indices.len() / 3);
    for face in obj.indices.chunks_exact(3) {
        let triangle = (vertex(face[0]), vertex(face[1]), vertex(face[2]));
        objects.push(SceneObject {
            solid: Solid::Triangle(triangle),
            material,
        });
    }
    Ok(objects)
}
