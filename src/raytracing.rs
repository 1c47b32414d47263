pub mod color;
pub mod core;
pub mod math;
pub mod parser;
pub mod scene;
pub mod surface;
