use log::debug;
use rand::{self, Rng};
use rayon::prelude::*;
use thiserror::Error;

use super::color::Color;
use super::math::{Ray, Vec3, EPSILON};
use super::scene::{Light, Scene};
use super::surface::SceneObject;

/// The nearest surface met along a ray, with the parameter it was met at and
/// the surface normal there. Only lives for the duration of one query.
pub struct RayHit<'a> {
    pub t: f64,
    pub object: &'a SceneObject,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// each pixel is sampled samples_per_axis² times
    pub samples_per_axis: u32,
    /// maximum number of recursive reflection bounces per ray
    pub bounces: u32,
    /// randomize every sample position inside its subpixel cell
    pub jitter: bool,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the output image must be at least one pixel wide and tall, got {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
    #[error("at least one sample per pixel axis is required")]
    InvalidSampleRate,
}

/// Finds the closest object hit by the ray, scanning every surface of the
/// scene except the excluded one. Reflection rays exclude the surface they
/// bounced off, so they cannot report it again at a parameter close to zero.
pub fn nearest_hit<'a>(
    scene: &'a Scene,
    ray: &Ray,
    exclude: Option<&SceneObject>,
) -> Option<RayHit<'a>> {
    let mut closest_t = f64::INFINITY;
    let mut closest_object = None;
    for object in &scene.objects {
        if let Some(excluded) = exclude {
            if std::ptr::eq(object, excluded) {
                continue;
            }
        }
        if let Some(t) = object.solid.earliest_intersection(ray) {
            // on a perfect tie the first object in scene order wins
            if t < closest_t {
                closest_t = t;
                closest_object = Some(object);
            }
        }
    }

    closest_object.map(|object| RayHit {
        t: closest_t,
        normal: object.solid.normal_at(ray.at(closest_t)),
        object,
    })
}

/// Tells whether another surface blocks the segment between the point and the
/// light. The shadow ray direction is left unnormalized on purpose: parameter
/// 1 lands exactly on the light, so any hit in (0, 1] occludes it.
pub fn in_shadow(scene: &Scene, origin_object: &SceneObject, point: Vec3, light: &Light) -> bool {
    let shadow_ray = Ray::new(point, light.position - point);
    for object in &scene.objects {
        if std::ptr::eq(object, origin_object) {
            continue;
        }
        if let Some(t) = object.solid.earliest_intersection(&shadow_ray) {
            if t <= 1.0 {
                return true;
            }
        }
    }
    false
}

/// Phong local illumination at a point of the given object: sums the diffuse
/// and specular contribution of every light that faces the point and is not
/// occluded, then adds the ambient term and clamps.
pub fn phong_lighting_at(
    scene: &Scene,
    object: &SceneObject,
    point: Vec3,
    normal: Vec3,
    view: Vec3,
) -> Color {
    let material = &object.material;
    let mut light_contributions = Color::black();
    for light in &scene.lights {
        if (light.position - point).dot(normal) < 0.0 || in_shadow(scene, object, point, light) {
            continue;
        }

        let l = (light.position - point).normalize();
        // both dot products are clamped to zero so a grazing light can never
        // subtract energy or feed powf a negative base
        let l_dot_n = l.dot(normal).max(0.0);
        let r = normal * (2.0 * l.dot(normal)) - l;
        let r_dot_v = r.dot(view).max(0.0);

        let diffuse = light.diffuse * material.k_diffuse * l_dot_n;
        let specular = light.specular * material.k_specular * r_dot_v.powf(material.shininess);
        light_contributions += diffuse + specular;
    }

    (light_contributions + scene.ambient_light * material.k_ambient).clamp()
}

/// Computes the color seen along a ray: local Phong shading at the nearest
/// hit plus, while the bounce budget lasts, the mirrored contribution of the
/// reflection ray scaled by the material reflection coefficient.
pub fn trace_color(scene: &Scene, ray: &Ray, bounces: u32, exclude: Option<&SceneObject>) -> Color {
    if ray.direction.squared_len() < EPSILON {
        return Color::black();
    }

    let Some(hit) = nearest_hit(scene, ray, exclude) else {
        return Color::black();
    };

    let point = ray.at(hit.t);
    let view = (-ray.direction).normalize();
    let mut color = phong_lighting_at(scene, hit.object, point, hit.normal, view);

    if bounces > 0 {
        let reflection = hit.normal * (2.0 * view.dot(hit.normal)) - view;
        let reflection_ray = Ray::new(point, reflection);
        let reflected = trace_color(scene, &reflection_ray, bounces - 1, Some(hit.object));
        if reflected != Color::black() {
            color += reflected * hit.object.material.k_reflection;
        }
    }

    color
}

fn trace_at_image_plane(scene: &Scene, xt: f64, yt: f64, bounces: u32) -> Color {
    let point = scene.image_plane.point_at(xt, yt) + scene.camera;
    let ray = Ray::new(point, point - scene.camera);
    trace_color(scene, &ray, bounces, None).clamp()
}

/// Supersamples one pixel: shoots a ray through every cell of the
/// samples_per_axis × samples_per_axis subgrid and averages the results.
pub fn trace_pixel(scene: &Scene, x: u32, y: u32, options: &RenderOptions) -> Color {
    let samples = options.samples_per_axis;
    let xt = x as f64 / options.width as f64;
    let yt = y as f64 / options.height as f64;
    let dx = 1.0 / (options.width * samples) as f64;
    let dy = 1.0 / (options.height * samples) as f64;

    let mut color = Color::black();
    for i in 0..samples {
        for j in 0..samples {
            let (x_offset, y_offset) = if options.jitter {
                let mut rng = rand::thread_rng();
                (rng.gen_range(0.0..dx), rng.gen_range(0.0..dy))
            } else {
                (0.0, 0.0)
            };
            let sample_xt = xt + dx * i as f64 + x_offset;
            let sample_yt = yt + dy * j as f64 + y_offset;
            color += trace_at_image_plane(scene, sample_xt, sample_yt, options.bounces);
        }
    }

    (color / (samples * samples) as f64).clamp()
}

/// Renders the whole image as a row-major grid of clamped colors.
/// Every pixel only reads the scene, so rows are traced in parallel.
pub fn render(scene: &Scene, options: &RenderOptions) -> Result<Vec<Color>, RenderError> {
    if options.width == 0 || options.height == 0 {
        return Err(RenderError::InvalidImageSize {
            width: options.width,
            height: options.height,
        });
    }
    if options.samples_per_axis == 0 {
        return Err(RenderError::InvalidSampleRate);
    }

    debug!(
        "tracing {}x{} pixels, {} samples each, {} bounces",
        options.width,
        options.height,
        options.samples_per_axis * options.samples_per_axis,
        options.bounces
    );

    let width = options.width as usize;
    let mut pixels = vec![Color::black(); width * options.height as usize];
    pixels
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = trace_pixel(scene, x as u32, y as u32, options);
            }
        });
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raytracing::scene::ImagePlane;
    use crate::raytracing::surface::{Material, Solid};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {} to be close to {}", a, b);
    }

    fn unit_image_plane() -> ImagePlane {
        ImagePlane {
            top_left: Vec3::new(-1.0, 1.0, 1.0),
            top_right: Vec3::new(1.0, 1.0, 1.0),
            bottom_left: Vec3::new(-1.0, -1.0, 1.0),
            bottom_right: Vec3::new(1.0, -1.0, 1.0),
        }
    }

    fn empty_scene() -> Scene {
        Scene {
            objects: Vec::new(),
            lights: Vec::new(),
            camera: Vec3::zero(),
            image_plane: unit_image_plane(),
            ambient_light: Color::black(),
        }
    }

    fn sphere(center: Vec3, radius: f64, material: Material) -> SceneObject {
        SceneObject {
            solid: Solid::Sphere { center, radius },
            material,
        }
    }

    fn white_light(position: Vec3) -> Light {
        Light {
            position,
            diffuse: Color::white(),
            specular: Color::white(),
        }
    }

    fn forward_ray() -> Ray {
        Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0))
    }

    #[test]
    fn missing_everything_gives_black_for_any_budget() {
        let scene = empty_scene();
        for bounces in [0, 1, 8] {
            assert_eq!(
                trace_color(&scene, &forward_ray(), bounces, None),
                Color::black()
            );
        }
    }

    #[test]
    fn zero_length_ray_direction_gives_black() {
        let mut scene = empty_scene();
        scene
            .objects
            .push(sphere(Vec3::zero(), 1.0, Material::matte(Color::white())));
        let degenerate = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::zero());
        assert_eq!(trace_color(&scene, &degenerate, 3, None), Color::black());
    }

    #[test]
    fn nearest_hit_picks_the_closest_surface() {
        let mut scene = empty_scene();
        let matte = Material::matte(Color::white());
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 10.0), 1.0, matte));
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, matte));
        let hit = nearest_hit(&scene, &forward_ray(), None).unwrap();
        assert_close(hit.t, 4.0);
        assert!(std::ptr::eq(hit.object, &scene.objects[1]));
    }

    #[test]
    fn excluded_surface_is_skipped() {
        let mut scene = empty_scene();
        let matte = Material::matte(Color::white());
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 10.0), 1.0, matte));
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, matte));
        let hit = nearest_hit(&scene, &forward_ray(), Some(&scene.objects[1])).unwrap();
        assert_close(hit.t, 9.0);
        assert!(std::ptr::eq(hit.object, &scene.objects[0]));
    }

    #[test]
    fn phong_terms_match_the_analytic_values() {
        // light sitting at the camera: the hit point of an axis-aligned ray
        // sees it exactly along the normal, so cos(theta) = cos(phi) = 1
        let material = Material {
            k_ambient: Color::new(0.2, 0.2, 0.2),
            k_diffuse: Color::new(0.6, 0.6, 0.6),
            k_specular: Color::new(0.4, 0.4, 0.4),
            shininess: 10.0,
            k_reflection: 0.0,
        };
        let mut scene = empty_scene();
        scene.ambient_light = Color::new(0.1, 0.1, 0.1);
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, material));
        scene.lights.push(Light {
            position: Vec3::zero(),
            diffuse: Color::new(0.8, 0.8, 0.8),
            specular: Color::new(0.5, 0.5, 0.5),
        });

        let color = trace_color(&scene, &forward_ray(), 0, None);
        // 0.8 * 0.6 * 1 + 0.5 * 0.4 * 1^10 + 0.1 * 0.2
        assert_close(color.r, 0.48 + 0.2 + 0.02);
        assert_close(color.g, color.r);
        assert_close(color.b, color.r);
    }

    #[test]
    fn zero_lights_leaves_only_the_ambient_term() {
        let mut scene = empty_scene();
        scene.ambient_light = Color::new(0.5, 0.5, 0.5);
        scene
            .objects
            .push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, Material::matte(Color::white())));
        let color = trace_color(&scene, &forward_ray(), 0, None);
        assert_close(color.r, 0.5);
    }

    #[test]
    fn occluder_between_point_and_light_darkens_the_color() {
        let matte = Material::matte(Color::white());
        let mut scene = empty_scene();
        scene.ambient_light = Color::new(0.1, 0.1, 0.1);
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, matte));
        scene.lights.push(white_light(Vec3::new(0.0, 5.0, 0.0)));

        let unoccluded = trace_color(&scene, &forward_ray(), 0, None);

        // small sphere halfway along the shadow ray from (0, 0, 4)
        scene.objects.push(sphere(Vec3::new(0.0, 2.5, 2.0), 0.5, matte));
        let occluded = trace_color(&scene, &forward_ray(), 0, None);

        assert!(occluded.r < unoccluded.r);
        // only the ambient term survives
        assert_close(occluded.r, 0.1);
    }

    #[test]
    fn shadow_test_uses_the_segment_up_to_the_light() {
        let matte = Material::matte(Color::white());
        let mut scene = empty_scene();
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, matte));
        // blocker placed past the light must not cast a shadow
        scene.objects.push(sphere(Vec3::new(0.0, 10.0, 4.0), 0.5, matte));
        let light = white_light(Vec3::new(0.0, 5.0, 4.0));

        let point = Vec3::new(0.0, 0.0, 4.0);
        assert!(!in_shadow(&scene, &scene.objects[0], point, &light));

        // moving the light past the blocker puts it inside the segment
        let far_light = white_light(Vec3::new(0.0, 20.0, 4.0));
        assert!(in_shadow(&scene, &scene.objects[0], point, &far_light));
    }

    #[test]
    fn reflection_ray_never_rehits_its_own_surface() {
        let mirror = Material {
            k_ambient: Color::new(0.1, 0.1, 0.1),
            k_diffuse: Color::new(0.2, 0.2, 0.2),
            k_specular: Color::white(),
            shininess: 50.0,
            k_reflection: 1.0,
        };
        let mut scene = empty_scene();
        scene.ambient_light = Color::new(0.2, 0.2, 0.2);
        scene.objects.push(sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, mirror));
        scene.lights.push(white_light(Vec3::new(0.0, 5.0, 0.0)));

        // with a single convex mirror the bounce can only escape the scene,
        // so the traced color must match the bounce-free one exactly
        let with_bounces = trace_color(&scene, &forward_ray(), 4, None);
        let without_bounces = trace_color(&scene, &forward_ray(), 0, None);
        assert_eq!(with_bounces, without_bounces);
        assert!(with_bounces.r.is_finite());
    }

    #[test]
    fn facing_mirrors_terminate_at_the_bounce_budget() {
        let mirror = Material {
            k_ambient: Color::new(0.05, 0.05, 0.05),
            k_diffuse: Color::new(0.1, 0.1, 0.1),
            k_specular: Color::white(),
            shininess: 100.0,
            k_reflection: 0.9,
        };
        let mut scene = empty_scene();
        scene.ambient_light = Color::new(0.3, 0.3, 0.3);
        scene.objects.push(SceneObject {
            solid: Solid::Plane {
                normal: Vec3::new(0.0, 0.0, -1.0),
                distance: -10.0,
            },
            material: mirror,
        });
        scene.objects.push(SceneObject {
            solid: Solid::Plane {
                normal: Vec3::new(0.0, 0.0, 1.0),
                distance: -10.0,
            },
            material: mirror,
        });

        let color = trace_color(&scene, &forward_ray(), 16, None);
        assert!(color.r.is_finite() && color.g.is_finite() && color.b.is_finite());
        // a larger budget keeps accumulating bounce energy
        let shallow = trace_color(&scene, &forward_ray(), 1, None);
        assert!(color.r >= shallow.r);
    }

    #[test]
    fn reflective_floor_shows_the_lit_sphere() {
        // ray (0,-1,2) hits the mirror floor at (0,-1,2) and reflects onto a
        // sphere centered two diagonal units further at (0,1,6)
        let mirror = Material {
            k_ambient: Color::black(),
            k_diffuse: Color::black(),
            k_specular: Color::black(),
            shininess: 1.0,
            k_reflection: 0.8,
        };
        let mut scene = empty_scene();
        scene.objects.push(SceneObject {
            solid: Solid::Plane {
                normal: Vec3::new(0.0, 1.0, 0.0),
                distance: -1.0,
            },
            material: mirror,
        });
        scene
            .objects
            .push(sphere(Vec3::new(0.0, 1.0, 6.0), 1.0, Material::matte(Color::white())));
        scene.lights.push(white_light(Vec3::new(0.0, 0.0, 5.0)));

        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, -1.0, 2.0));
        let flat = trace_color(&scene, &ray, 0, None);
        let reflected = trace_color(&scene, &ray, 1, None);
        // the floor itself is black, everything visible comes from the bounce
        assert_eq!(flat, Color::black());
        assert!(reflected.r > 0.0);
    }

    fn camera_filling_sphere_scene() -> Scene {
        // narrow screen so even the corner rays land on the unit sphere
        let mut scene = empty_scene();
        scene.image_plane = ImagePlane {
            top_left: Vec3::new(-0.2, 0.2, 1.0),
            top_right: Vec3::new(0.2, 0.2, 1.0),
            bottom_left: Vec3::new(-0.2, -0.2, 1.0),
            bottom_right: Vec3::new(0.2, -0.2, 1.0),
        };
        scene
            .objects
            .push(sphere(Vec3::new(0.0, 0.0, 3.0), 1.0, Material::matte(Color::white())));
        scene.lights.push(white_light(Vec3::zero()));
        scene
    }

    #[test]
    fn two_by_two_sphere_render_lights_every_pixel() {
        let scene = camera_filling_sphere_scene();
        let options = RenderOptions {
            width: 2,
            height: 2,
            samples_per_axis: 1,
            bounces: 0,
            jitter: false,
        };
        let pixels = render(&scene, &options).unwrap();
        assert_eq!(pixels.len(), 4);
        for pixel in pixels {
            assert!(pixel.r > 0.0 && pixel.g > 0.0 && pixel.b > 0.0);
            assert!(pixel.r <= 1.0);
        }
    }

    #[test]
    fn render_row_zero_samples_the_bottom_edge() {
        // a floor far below the camera under flat ambient light: only rays
        // leaving through the bottom of the screen point down enough to hit it
        let mut scene = empty_scene();
        scene.ambient_light = Color::white();
        scene.objects.push(SceneObject {
            solid: Solid::Plane {
                normal: Vec3::new(0.0, 1.0, 0.0),
                distance: -2.0,
            },
            material: Material::matte(Color::white()),
        });

        let options = RenderOptions {
            width: 1,
            height: 2,
            samples_per_axis: 1,
            bounces: 0,
            jitter: false,
        };
        let pixels = render(&scene, &options).unwrap();
        assert_eq!(pixels[0], Color::white());
        assert_eq!(pixels[1], Color::black());
    }

    #[test]
    fn render_rejects_degenerate_parameters() {
        let scene = empty_scene();
        let valid = RenderOptions {
            width: 4,
            height: 4,
            samples_per_axis: 1,
            bounces: 0,
            jitter: false,
        };
        assert!(render(&scene, &valid).is_ok());

        let no_width = RenderOptions { width: 0, ..valid };
        assert!(matches!(
            render(&scene, &no_width),
            Err(RenderError::InvalidImageSize { .. })
        ));

        let no_samples = RenderOptions {
            samples_per_axis: 0,
            ..valid
        };
        assert!(matches!(
            render(&scene, &no_samples),
            Err(RenderError::InvalidSampleRate)
        ));
    }

    #[test]
    fn empty_scene_renders_to_black() {
        let scene = empty_scene();
        let options = RenderOptions {
            width: 3,
            height: 2,
            samples_per_axis: 2,
            bounces: 2,
            jitter: false,
        };
        let pixels = render(&scene, &options).unwrap();
        assert_eq!(pixels.len(), 6);
        assert!(pixels.iter().all(|pixel| *pixel == Color::black()));
    }

    #[test]
    fn jittered_supersampling_reduces_edge_variance() {
        // a big triangle covering the left half of the frame under flat
        // ambient lighting: a sample is either fully lit or black, so the
        // pixel value is the fraction of samples landing on the triangle
        let mut scene = empty_scene();
        scene.ambient_light = Color::white();
        scene.objects.push(SceneObject {
            solid: Solid::Triangle((
                Vec3::new(0.0, -100.0, 2.0),
                Vec3::new(0.0, 100.0, 2.0),
                Vec3::new(-100.0, 0.0, 2.0),
            )),
            material: Material::matte(Color::white()),
        });

        let variance = |samples_per_axis: u32| {
            let options = RenderOptions {
                width: 1,
                height: 1,
                samples_per_axis,
                bounces: 0,
                jitter: true,
            };
            let runs = 30;
            let values: Vec<f64> = (0..runs)
                .map(|_| trace_pixel(&scene, 0, 0, &options).r)
                .collect();
            let mean = values.iter().sum::<f64>() / runs as f64;
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / runs as f64
        };

        // 16 samples per pixel against 1: the sample mean is far less noisy
        assert!(variance(4) < variance(1));
    }
}
