//! Core library for the ambient dashboard.
//!
//! The render loop in [`stage`] ties the subsystems together: a lazily filled
//! texture and label cache, a drifting starfield, a spline-smoothed pointer
//! trail, click ripples and the background data feeds. Each tick produces a
//! backend-agnostic [`render::Frame`].

pub mod assets;
pub mod config;
pub mod data;
pub mod error;
pub mod particles;
pub mod render;
pub mod ripples;
pub mod stage;
pub mod timeline;
pub mod trail;

pub use assets::{ResourceCache, TextLabel, TextureHandle, TextureLoader};
pub use config::AppConfig;
pub use data::{DataProvider, FeedProvider, LocationFeedSource};
pub use error::{DashboardError, Result};
pub use particles::ParticleField;
pub use render::{DrawCommand, Frame, Layer, Scale, Viewport};
pub use ripples::ClickRippleManager;
pub use stage::{channel_surface, PointerEvent, RenderLoop, StageParts, Surface, SurfaceHandle};
pub use timeline::{FrameClock, FrameTime};
pub use trail::{MouseTrailSpline, PointerTracker};
