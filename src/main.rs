use std::error::Error;
use std::fs;
use std::time::Instant;

use clap::Parser;
use image::{ImageBuffer, Rgb};
use log::info;

mod raytracing;
use raytracing::color::Color;
use raytracing::core::{render, RenderOptions};
use raytracing::parser::SceneParser;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input path to the scene file
    scene: String,
    /// the path where the rendered image is saved
    #[arg(short, long, default_value = "output.bmp")]
    output: String,
    /// the number of samples taken per pixel along each axis
    #[arg(short, long, default_value_t = 2)]
    samples: u32,
    /// the maximum number of reflection bounces per ray
    #[arg(short, long, default_value_t = 3)]
    bounces: u32,
    /// randomize every sample position inside its subpixel cell
    #[arg(long, default_value = "false")]
    jitter: bool,
    /// apply gamma correction to the final image
    #[arg(long, default_value = "false")]
    gamma_correction: bool,
}

impl From<Color> for Rgb<u8> {
    fn from(value: Color) -> Self {
        // render output is already clamped to [0, 1]
        let r = (value.r * 255.0) as u8;
        let g = (value.g * 255.0) as u8;
        let b = (value.b * 255.0) as u8;
        Rgb([r, g, b])
    }
}

fn gamma_correction(value: f64) -> f64 {
    if value > 0.0 {
        value.powf(1.0 / 2.2)
    } else {
        0.0
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let content = fs::read_to_string(&args.scene)?;
    let mut parser = SceneParser::new(&content);
    let scene_file = match parser.parse_scene() {
        Ok(scene_file) => scene_file,
        Err(parser_error) => {
            parser_error.print_error_location(&content);
            return Err(Box::new(parser_error));
        }
    };

    let options = RenderOptions {
        width: scene_file.width,
        height: scene_file.height,
        samples_per_axis: args.samples,
        bounces: args.bounces,
        jitter: args.jitter,
    };

    let start = Instant::now();
    let pixels = render(&scene_file.scene, &options)?;
    info!(
        "traced {}x{} pixels in {:?}",
        options.width,
        options.height,
        start.elapsed()
    );

    let mut buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::new(options.width, options.height);
    for (x, y, pixel) in buffer.enumerate_pixels_mut() {
        // render row 0 samples the bottom edge of the image plane, while the
        // image crate puts y = 0 at the top, so the rows are written flipped
        let row = options.height - 1 - y;
        let mut color = pixels[(x + options.width * row) as usize];
        if args.gamma_correction {
            color.r = gamma_correction(color.r);
            color.g = gamma_correction(color.g);
            color.b = gamma_correction(color.b);
        }
        *pixel = color.into();
    }
    buffer.save(&args.output)?;
    info!("saved {}", args.output);
    Ok(())
}
