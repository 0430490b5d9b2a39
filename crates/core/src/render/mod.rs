//! Display list produced by the render loop.
//!
//! A [`Frame`] is the complete description of one tick: draw calls in
//! back-to-front order plus the transform from the logical canvas to the
//! viewport. Pixel backends consume it as is.

use serde::{Deserialize, Serialize};

use crate::{
    assets::{TextExtent, TextStyle},
    trail::TrailPoint,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size of the output surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Per-axis factor mapping logical coordinates onto the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub fn fit(viewport: Viewport, logical_width: f32, logical_height: f32) -> Self {
        Self {
            x: viewport.width / logical_width,
            y: viewport.height / logical_height,
        }
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(point.x * self.x, point.y * self.y)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// Z-order of the dashboard, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Background,
    Starfield,
    Foreground,
    Status,
    Warnings,
    Schedule,
    Stats,
    Ripples,
    Trail,
}

/// Coordinate space a layer is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    /// Logical canvas, scaled by [`Frame::scale`].
    Logical,
    /// Viewport pixels, the space pointer events arrive in.
    Viewport,
}

impl Layer {
    pub fn space(self) -> Space {
        match self {
            Layer::Ripples | Layer::Trail => Space::Viewport,
            _ => Space::Logical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Normal,
    Additive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Sprite {
        texture: String,
        position: Point,
        anchor: Point,
        scale: f32,
        rotation: f32,
        tint: u32,
    },
    Text {
        label: String,
        text: String,
        position: Point,
        anchor: Point,
        style: TextStyle,
        extent: TextExtent,
    },
    /// Unfilled circle outline.
    Ring {
        center: Point,
        radius: f32,
        line_width: f32,
        color: u32,
        alpha: f32,
    },
    /// Textured strip through `points`, tinted by a hue rotation in degrees.
    Ribbon {
        texture: String,
        points: Vec<TrailPoint>,
        hue: f32,
        blend: BlendMode,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCall {
    pub layer: Layer,
    pub command: DrawCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: u64,
    /// Monotonic timestamp of the tick in milliseconds.
    pub time: u64,
    pub fps: u32,
    pub scale: Scale,
    pub calls: Vec<DrawCall>,
}

impl Frame {
    pub fn new(index: u64, time: u64, fps: u32, scale: Scale) -> Self {
        Self {
            index,
            time,
            fps,
            scale,
            calls: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: Layer, command: DrawCommand) {
        self.calls.push(DrawCall { layer, command });
    }

    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &DrawCommand> {
        self.calls
            .iter()
            .filter(move |call| call.layer == layer)
            .map(|call| &call.command)
    }

    /// Text content of the label with the given id, if drawn this frame.
    pub fn text(&self, label_id: &str) -> Option<&str> {
        self.calls.iter().find_map(|call| match &call.command {
            DrawCommand::Text { label, text, .. } if label == label_id => Some(text.as_str()),
            _ => None,
        })
    }

    /// Whether draw calls never go back to a lower layer.
    pub fn is_z_ordered(&self) -> bool {
        self.calls
            .windows(2)
            .all(|pair| pair[0].layer <= pair[1].layer)
    }
}
