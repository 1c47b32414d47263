pub mod ray;
pub mod vec3;

pub use ray::*;
pub use vec3::*;

// tolerance used for parallel checks and to reject grazing intersections
pub const EPSILON: f64 = 1e-5;
