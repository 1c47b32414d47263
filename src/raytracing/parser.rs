use std::error::Error;
use std::fmt;

use super::color::Color;
use super::math::Vec3;
use super::scene::{ImagePlane, Light, Scene};
use super::surface::{load_model, Material, SceneObject, Solid};

/// Hand written parser for the plain text scene description format.
///
/// ```text
/// # a sphere over a mirror floor
/// size 640 480
/// camera (0, 0, 0)
/// screen (-1.33, 1, 1) (1.33, 1, 1) (-1.33, -1, 1) (1.33, -1, 1)
/// ambient (0.2, 0.2, 0.2)
/// light (5, 5, 0) diffuse (0.9, 0.9, 0.9) specular white
/// sphere (0, 0, 4) 1 diffuse red specular white shininess 40 reflection 0.3
/// plane (0, 1, 0) -1 diffuse (0.4, 0.4, 0.4)
/// ```
pub struct SceneParser {
    chars: Vec<char>,
    buffer: String,
    position: FilePosition,
}

#[derive(Debug, Clone, Copy)]
struct FilePosition {
    line: u32,
    column: u32,
    index: usize,
}

impl FilePosition {
    fn new() -> Self {
        FilePosition {
            line: 0,
            column: 0,
            index: 0,
        }
    }

    fn on_new_line(self: &mut Self) {
        self.line += 1;
        self.column = 0;
        self.index += 1;
    }

    fn advance(self: &mut Self) {
        self.column += 1;
        self.index += 1;
    }
}

#[derive(Debug)]
pub struct ParserError {
    position: FilePosition,
    pub message: String,
}

impl ParserError {
    fn new(message: &str, position: FilePosition) -> ParserError {
        ParserError {
            position,
            message: message.to_string(),
        }
    }

    /// Prints the error with the offending line of the source and a caret
    /// pointing at the column the parser stopped at.
    pub fn print_error_location(self: &Self, content: &str) {
        eprintln!("{}", self);
        if let Some(line) = content.lines().nth(self.position.line as usize) {
            eprintln!("{}", line);
            let spacing = " ".repeat(self.position.column as usize);
            eprintln!("{}^", spacing);
        }
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.message, self.position.line, self.position.column
        )
    }
}

impl Error for ParserError {}

type ParserResult<T> = Result<T, ParserError>;

/// The parsed scene file: the output resolution plus the scene itself.
#[derive(Debug)]
pub struct SceneFile {
    pub width: u32,
    pub height: u32,
    pub scene: Scene,
}

impl SceneParser {
    pub fn new(content: &str) -> SceneParser {
        SceneParser {
            chars: content.chars().collect(),
            position: FilePosition::new(),
            buffer: String::new(),
        }
    }

    fn current_char(self: &Self) -> Option<char> {
        self.chars.get(self.position.index).copied()
    }

    fn is_empty(self: &mut Self) -> bool {
        self.peek().is_empty()
    }

    fn advance(self: &mut Self) {
        if let Some(current_char) = self.current_char() {
            if current_char == '\n' {
                self.position.on_new_line();
            } else {
                self.position.advance();
            }
        }
    }

    fn eat_spaces(self: &mut Self) {
        // consume all the empty lines, spaces and comments before the next token
        while let Some(current_char) = self.current_char() {
            if current_char == '#' {
                // comments run to the end of the line
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if !current_char.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn eat_while(self: &mut Self, result: &mut String, predicate: impl Fn(char) -> bool) {
        while let Some(current_char) = self.current_char() {
            if !predicate(current_char) {
                break;
            }
            result.push(current_char);
            self.advance();
        }
    }

    fn pop(self: &mut Self) -> String {
        // check if we already peeked without eating the next token
        if !self.buffer.is_empty() {
            return std::mem::take(&mut self.buffer);
        }

        self.eat_spaces();
        let mut result = String::new();
        let Some(current_char) = self.current_char() else {
            return result;
        };

        match current_char {
            '(' | ')' | ',' => {
                result.push(current_char);
                self.advance();
            }
            '"' => {
                result.push(current_char);
                self.advance();
                // no escape handling, a quote always ends the string
                self.eat_while(&mut result, |c| c != '"' && c != '\n');
                if let Some('"') = self.current_char() {
                    result.push('"');
                    self.advance();
                }
            }
            '+' | '-' | '.' | '0'..='9' => {
                if current_char == '+' || current_char == '-' {
                    result.push(current_char);
                    self.advance();
                }
                self.eat_while(&mut result, |c| c.is_ascii_digit());
                if let Some('.') = self.current_char() {
                    result.push('.');
                    self.advance();
                    self.eat_while(&mut result, |c| c.is_ascii_digit());
                }
            }
            _ => {
                self.eat_while(&mut result, |c| c.is_alphabetic());
                if result.is_empty() {
                    // unknown symbol, return it alone so the caller can report it
                    result.push(current_char);
                    self.advance();
                }
            }
        }
        result
    }

    fn peek(self: &mut Self) -> &String {
        // peek always looks ahead and saves the result to the buffer
        if self.buffer.is_empty() {
            self.buffer = self.pop();
        }
        &self.buffer
    }

    fn error<T>(self: &Self, message: &str) -> ParserResult<T> {
        Err(ParserError::new(message, self.position))
    }

    fn parse_float(self: &mut Self) -> ParserResult<f64> {
        let next_token = self.pop();
        if let Ok(num) = next_token.parse::<f64>() {
            Ok(num)
        } else {
            let message = format!("cannot interpret '{}' as a number", next_token);
            self.error(&message)
        }
    }

    fn match_token(self: &mut Self, expected_lexem: &str) -> ParserResult<()> {
        // consume a lexem and raise an error when it differs from the expected one
        let next_lexem = self.pop();
        if next_lexem != expected_lexem {
            let message = format!("expected '{}', got '{}' instead", expected_lexem, next_lexem);
            self.error(&message)
        } else {
            Ok(())
        }
    }

    fn maybe_match(self: &mut Self, expected_lexem: &str) -> bool {
        // variant of match that can fail: consumes the lexem only when it is
        // the next one in the stream
        if *self.peek() == expected_lexem {
            self.pop();
            return true;
        }
        false
    }

    fn parse_vec3(self: &mut Self) -> ParserResult<Vec3> {
        self.match_token("(")?;
        let x = self.parse_float()?;
        self.match_token(",")?;
        let y = self.parse_float()?;
        self.match_token(",")?;
        let z = self.parse_float()?;
        self.match_token(")")?;
        Ok(Vec3::new(x, y, z))
    }

    fn parse_color(self: &mut Self) -> ParserResult<Color> {
        // predefined color names
        if self.maybe_match("red") {
            Ok(Color::new(1.0, 0.0, 0.0))
        } else if self.maybe_match("green") {
            Ok(Color::new(0.0, 1.0, 0.0))
        } else if self.maybe_match("blue") {
            Ok(Color::new(0.0, 0.0, 1.0))
        } else if self.maybe_match("white") {
            Ok(Color::white())
        } else if self.maybe_match("black") {
            Ok(Color::black())
        } else if self.maybe_match("yellow") {
            Ok(Color::new(1.0, 1.0, 0.0))
        } else if self.maybe_match("orange") {
            Ok(Color::new(0.98, 0.45, 0.02))
        } else if self.maybe_match("gray") {
            Ok(Color::new(0.5, 0.5, 0.5))
        } else {
            let value = self.parse_vec3()?;
            Ok(Color::new(value.x, value.y, value.z))
        }
    }

    fn parse_string(self: &mut Self) -> ParserResult<String> {
        let next_token = self.pop();
        if next_token.len() >= 2 && next_token.starts_with('"') && next_token.ends_with('"') {
            Ok(next_token[1..next_token.len() - 1].to_string())
        } else {
            let message = format!("expected a quoted string, got '{}'", next_token);
            self.error(&message)
        }
    }

    fn parse_material(self: &mut Self) -> ParserResult<Material> {
        let mut ambient = None;
        let mut diffuse = None;
        let mut specular = None;
        let mut shininess = None;
        let mut reflection = None;
        loop {
            if self.maybe_match("ambient") {
                ambient = Some(self.parse_color()?);
            } else if self.maybe_match("diffuse") {
                diffuse = Some(self.parse_color()?);
            } else if self.maybe_match("specular") {
                specular = Some(self.parse_color()?);
            } else if self.maybe_match("shininess") {
                shininess = Some(self.parse_float()?);
            } else if self.maybe_match("reflection") {
                reflection = Some(self.parse_float()?);
            } else {
                break;
            }
        }

        // the ambient coefficient follows the diffuse color unless overridden
        let diffuse = diffuse.unwrap_or(Color::white());
        Ok(Material {
            k_ambient: ambient.unwrap_or(diffuse),
            k_diffuse: diffuse,
            k_specular: specular.unwrap_or(Color::white()),
            shininess: shininess.unwrap_or(30.0),
            k_reflection: reflection.unwrap_or(0.0).clamp(0.0, 1.0),
        })
    }

    fn parse_header(self: &mut Self) -> ParserResult<(u32, u32)> {
        self.match_token("size")?;
        let width = self.parse_float()?;
        let height = self.parse_float()?;
        Ok((width as u32, height as u32))
    }

    fn parse_screen(self: &mut Self) -> ParserResult<ImagePlane> {
        self.match_token("screen")?;
        Ok(ImagePlane {
            top_left: self.parse_vec3()?,
            top_right: self.parse_vec3()?,
            bottom_left: self.parse_vec3()?,
            bottom_right: self.parse_vec3()?,
        })
    }

    fn parse_light(self: &mut Self) -> ParserResult<Light> {
        self.match_token("light")?;
        let position = self.parse_vec3()?;
        let mut diffuse = None;
        let mut specular = None;
        loop {
            if self.maybe_match("diffuse") {
                diffuse = Some(self.parse_color()?);
            } else if self.maybe_match("specular") {
                specular = Some(self.parse_color()?);
            } else {
                break;
            }
        }
        let diffuse = diffuse.unwrap_or(Color::white());
        Ok(Light {
            position,
            specular: specular.unwrap_or(diffuse),
            diffuse,
        })
    }

    fn parse_sphere(self: &mut Self) -> ParserResult<SceneObject> {
        self.match_token("sphere")?;
        let center = self.parse_vec3()?;
        let radius = self.parse_float()?;
        let material = self.parse_material()?;
        Ok(SceneObject {
            solid: Solid::Sphere { center, radius },
            material,
        })
    }

    fn parse_plane(self: &mut Self) -> ParserResult<SceneObject> {
        self.match_token("plane")?;
        let normal = self.parse_vec3()?;
        let distance = self.parse_float()?;
        let material = self.parse_material()?;
        if normal.squared_len() == 0.0 {
            return self.error("a plane normal cannot be the zero vector");
        }
        Ok(SceneObject {
            solid: Solid::Plane {
                normal: normal.normalize(),
                distance,
            },
            material,
        })
    }

    fn parse_triangle(self: &mut Self) -> ParserResult<SceneObject> {
        self.match_token("triangle")?;
        let triangle = (self.parse_vec3()?, self.parse_vec3()?, self.parse_vec3()?);
        let material = self.parse_material()?;
        Ok(SceneObject {
            solid: Solid::Triangle(triangle),
            material,
        })
    }

    fn parse_model(self: &mut Self) -> ParserResult<Vec<SceneObject>> {
        self.match_token("model")?;
        let path = self.parse_string()?;
        let mut offset = Vec3::zero();
        let mut scale = 1.0;
        loop {
            if self.maybe_match("at") {
                offset = self.parse_vec3()?;
            } else if self.maybe_match("scale") {
                scale = self.parse_float()?;
            } else {
                break;
            }
        }
        let material = self.parse_material()?;
        load_model(&path, offset, scale, material).map_err(|err| {
            let message = format!("cannot load model \"{}\": {}", path, err);
            ParserError::new(&message, self.position)
        })
    }

    pub fn parse_scene(self: &mut Self) -> ParserResult<SceneFile> {
        let (width, height) = self.parse_header()?;

        let mut camera = Vec3::zero();
        let mut screen = None;
        let mut ambient_light = Color::black();
        let mut objects = Vec::new();
        let mut lights = Vec::new();
        while !self.is_empty() {
            let next_token = self.peek().clone();
            match next_token.as_str() {
                "camera" => {
                    self.pop();
                    camera = self.parse_vec3()?;
                }
                "screen" => {
                    screen = Some(self.parse_screen()?);
                }
                "ambient" => {
                    self.pop();
                    ambient_light = self.parse_color()?;
                }
                "light" => {
                    lights.push(self.parse_light()?);
                }
                "sphere" => {
                    objects.push(self.parse_sphere()?);
                }
                "plane" => {
                    objects.push(self.parse_plane()?);
                }
                "triangle" => {
                    objects.push(self.parse_triangle()?);
                }
                "model" => {
                    objects.extend(self.parse_model()?);
                }
                _ => {
                    let message = format!("unexpected token '{}'", next_token);
                    return self.error(&message);
                }
            }
        }

        let scene = Scene {
            objects,
            lights,
            camera,
            image_plane: screen.unwrap_or_else(|| default_screen(width, height)),
            ambient_light,
        };
        Ok(SceneFile {
            width,
            height,
            scene,
        })
    }
}

/// A screen one unit in front of the camera, two units wide, with the
/// vertical extent following the aspect ratio of the output image.
fn default_screen(width: u32, height: u32) -> ImagePlane {
    let half_height = if width > 0 {
        height as f64 / width as f64
    } else {
        1.0
    };
    ImagePlane {
        top_left: Vec3::new(-1.0, half_height, 1.0),
        top_right: Vec3::new(1.0, half_height, 1.0),
        bottom_left: Vec3::new(-1.0, -half_height, 1.0),
        bottom_right: Vec3::new(1.0, -half_height, 1.0),
    }
}
