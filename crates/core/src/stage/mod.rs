//! The render loop: one tick per display refresh.
//!
//! Every tick advances the clock, the starfield, the pointer trail and the
//! click ripples, lays out the dashboard texts and emits a [`Frame`].

use std::sync::{Arc, RwLock};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::{
    assets::{
        AssetManifest, ResourceCache, TextAlign, TextExtent, TextLabel, TextStyle, TextureHandle,
        TextureLoader,
    },
    config::{AppConfig, SurfaceConfig},
    data::DataProvider,
    particles::ParticleField,
    render::{BlendMode, DrawCommand, Frame, Layer, Point, Scale, Viewport},
    ripples::ClickRippleManager,
    timeline::{format_timestamp, FrameClock, FrameTime},
    trail::{MouseTrailSpline, PointerTracker},
    Result,
};

pub const BACKGROUND_GLYPH: &str = "LycorisLogo";
pub const FOREGROUND_GLYPH: &str = "ChisaTaki";
pub const STAR_TEXTURE: &str = "star";
pub const TRAIL_TEXTURE: &str = "trail";

pub const STATS_LABEL: &str = "StatsText";
pub const WEATHER_LABEL: &str = "WeatherText";
pub const LESSON_LABEL: &str = "nextLessonText";
pub const DEADLINES_LABEL: &str = "DeadlinesText";

const FONT_SIZE: f32 = 30.0;
const WHITE: u32 = 0xffffff;
const BACKGROUND_TINT: u32 = 0x111111;
const BACKGROUND_SCALE: f32 = 2.0;
const FOREGROUND_SCALE: f32 = 0.4;
const STATS_MARGIN: f32 = 40.0;
const DEADLINES_OFFSET: f32 = 60.0;
const LESSON_GAP: f32 = 280.0;
const WARNING_MARGIN: f32 = 20.0;
const WARNING_SPACING: f32 = 60.0;

const CENTER: Point = Point::new(0.5, 0.5);
const TOP_LEFT: Point = Point::new(0.0, 0.0);
const TOP_RIGHT: Point = Point::new(1.0, 0.0);
const BOTTOM_CENTER: Point = Point::new(0.5, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Move { x: f32, y: f32 },
    Down { x: f32, y: f32 },
}

/// Output surface the loop renders for: its current size and the pointer
/// events that happened since the last tick.
pub trait Surface {
    fn viewport(&self) -> Viewport;
    fn poll_event(&mut self) -> Option<PointerEvent>;
}

/// [`Surface`] fed through a channel. The paired [`SurfaceHandle`] can live
/// on whatever thread receives window events.
#[derive(Debug)]
pub struct ChannelSurface {
    viewport: Arc<RwLock<Viewport>>,
    events: Receiver<PointerEvent>,
}

#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    viewport: Arc<RwLock<Viewport>>,
    events: Sender<PointerEvent>,
}

pub fn channel_surface(initial: Viewport) -> (SurfaceHandle, ChannelSurface) {
    let viewport = Arc::new(RwLock::new(initial));
    let (sender, receiver) = unbounded();
    (
        SurfaceHandle {
            viewport: viewport.clone(),
            events: sender,
        },
        ChannelSurface {
            viewport,
            events: receiver,
        },
    )
}

impl SurfaceHandle {
    pub fn resize(&self, width: f32, height: f32) {
        let mut viewport = self
            .viewport
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *viewport = Viewport::new(width, height);
    }

    pub fn move_pointer(&self, x: f32, y: f32) {
        self.send(PointerEvent::Move { x, y });
    }

    pub fn press(&self, x: f32, y: f32) {
        self.send(PointerEvent::Down { x, y });
    }

    fn send(&self, event: PointerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(?event, "surface is gone, dropping pointer event");
        }
    }
}

impl Surface for ChannelSurface {
    fn viewport(&self) -> Viewport {
        *self
            .viewport
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poll_event(&mut self) -> Option<PointerEvent> {
        self.events.try_recv().ok()
    }
}

/// Components the render loop drives, built up front and handed over whole.
#[derive(Debug)]
pub struct StageParts {
    pub textures: ResourceCache<TextureHandle>,
    pub labels: ResourceCache<TextLabel>,
    pub particles: ParticleField,
    pub trail: MouseTrailSpline,
    pub ripples: ClickRippleManager,
    pub clock: FrameClock,
}

impl StageParts {
    /// Builds every component from `config` and starts loading the textures
    /// listed in the standard manifest.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let manifest = AssetManifest::standard(&config.assets.texture_dir);
        let ids: Vec<String> = manifest.ids().map(String::from).collect();
        let mut textures = ResourceCache::new(TextureLoader::new(manifest));
        for id in &ids {
            textures.get(id);
        }

        Ok(Self {
            textures,
            labels: ResourceCache::new(TextLabel::new),
            particles: ParticleField::new(
                config.stars.count,
                config.surface.logical_width,
                config.surface.logical_height,
                config.stars.rotation_step,
                config.stars.seed,
            ),
            trail: MouseTrailSpline::new(
                config.trail.history_size,
                config.trail.rope_size,
                config.trail.tangent_factor,
            )?,
            ripples: ClickRippleManager::new(config.ripples.ttl_ms, config.ripples.line_width),
            clock: FrameClock::new(&config.timing),
        })
    }
}

/// Text laid out for this frame.
struct TextBlock {
    label: &'static str,
    text: String,
    style: TextStyle,
    extent: TextExtent,
}

impl TextBlock {
    fn placed(self, position: Point, anchor: Point) -> DrawCommand {
        DrawCommand::Text {
            label: self.label.to_string(),
            text: self.text,
            position,
            anchor,
            style: self.style,
            extent: self.extent,
        }
    }
}

#[derive(Debug)]
pub struct RenderLoop<D> {
    textures: ResourceCache<TextureHandle>,
    labels: ResourceCache<TextLabel>,
    particles: ParticleField,
    trail: MouseTrailSpline,
    ripples: ClickRippleManager,
    clock: FrameClock,
    data: D,
    pointer: PointerTracker,
    logical_width: f32,
    logical_height: f32,
    scale: Scale,
    frame_index: u64,
    started: bool,
}

impl<D: DataProvider> RenderLoop<D> {
    pub fn new(parts: StageParts, data: D, surface: &SurfaceConfig) -> Self {
        let StageParts {
            textures,
            labels,
            particles,
            trail,
            ripples,
            clock,
        } = parts;

        Self {
            textures,
            labels,
            particles,
            trail,
            ripples,
            clock,
            data,
            pointer: PointerTracker::default(),
            logical_width: surface.logical_width,
            logical_height: surface.logical_height,
            scale: Scale::default(),
            frame_index: 0,
            started: false,
        }
    }

    /// Resets the timers and kicks off the first data refresh. Called by the
    /// first [`tick`](Self::tick) if the caller has not done so.
    pub fn start(&mut self, time: FrameTime) {
        self.clock.start(time.millis);
        self.data.update_date(time.local);
        self.data.refresh();
        self.started = true;
        tracing::info!(
            stars = self.particles.len(),
            logical_width = self.logical_width,
            logical_height = self.logical_height,
            "render loop started"
        );
    }

    /// Runs one tick. A failing step skips the frame instead of stopping the
    /// loop.
    pub fn tick(&mut self, time: FrameTime, surface: &mut dyn Surface) -> Option<Frame> {
        if !self.started {
            self.start(time);
        }

        match self.render_frame(time, surface) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::warn!(frame = self.frame_index, %err, "skipping frame");
                None
            }
        }
    }

    fn render_frame(&mut self, time: FrameTime, surface: &mut dyn Surface) -> Result<Frame> {
        let now = time.millis;
        let update = self.clock.advance(now);
        if update.fps_updated {
            tracing::trace!(fps = self.clock.fps(), "fps window closed");
        }

        self.data.update_date(time.local);
        self.data.poll();
        if update.fetch_due {
            tracing::debug!(now, "refreshing dashboard data");
            self.data.refresh();
        }

        let viewport = surface.viewport();
        while let Some(event) = surface.poll_event() {
            match event {
                PointerEvent::Move { x, y } => self.pointer.move_to(x, y),
                PointerEvent::Down { x, y } => self.ripples.record(
                    x,
                    y,
                    self.logical_width,
                    self.logical_height,
                    now,
                    self.pointer.hue,
                ),
            }
        }

        self.particles.advance(update.delta);
        self.trail.update(self.pointer.x, self.pointer.y)?;
        let ripples = self.ripples.tick(now, viewport.width);

        self.scale = Scale::fit(viewport, self.logical_width, self.logical_height);
        let mut frame = Frame::new(self.frame_index, now, self.clock.fps(), self.scale);
        self.draw_dashboard(&mut frame, &time)?;

        for ripple in ripples {
            frame.push(
                Layer::Ripples,
                DrawCommand::Ring {
                    center: Point::new(ripple.x, ripple.y),
                    radius: ripple.radius,
                    line_width: ripple.line_width,
                    color: WHITE,
                    alpha: ripple.opacity,
                },
            );
        }

        let trail_texture = self.textures.get(TRAIL_TEXTURE);
        frame.push(
            Layer::Trail,
            DrawCommand::Ribbon {
                texture: trail_texture.id().to_string(),
                points: self.trail.points().to_vec(),
                hue: self.pointer.hue,
                blend: BlendMode::Additive,
            },
        );

        self.frame_index += 1;
        Ok(frame)
    }

    /// Glyphs, stars, texts and warning icons, all on the logical canvas.
    fn draw_dashboard(&mut self, frame: &mut Frame, time: &FrameTime) -> Result<()> {
        let width = self.logical_width;
        let height = self.logical_height;

        // Positions depend on each other, so lay out before emitting.
        let stats = self.text_block(
            STATS_LABEL,
            format!("{} | FPS: {}", format_timestamp(&time.local), self.clock.fps()),
            TextAlign::Center,
        )?;
        let stats_position = Point::new(width / 2.0, height - STATS_MARGIN);

        let deadlines = self.text_block(
            DEADLINES_LABEL,
            self.data.deadlines_text(),
            TextAlign::Left,
        )?;
        let deadlines_position = Point::new(width, height / 2.0 - DEADLINES_OFFSET);

        let weather = self.text_block(WEATHER_LABEL, self.data.weather_text(), TextAlign::Right)?;
        let weather_position = Point::new(width, deadlines_position.y - weather.extent.height);

        let lesson = self.text_block(LESSON_LABEL, self.data.next_lesson_text(), TextAlign::Left)?;
        let lesson_position = Point::new(
            width / 2.0 - LESSON_GAP - lesson.extent.width,
            height / 2.0,
        );

        let glyph_position = Point::new(width / 2.0, height / 2.0 - stats.extent.height);

        self.push_sprite(
            frame,
            Layer::Background,
            BACKGROUND_GLYPH,
            glyph_position,
            CENTER,
            BACKGROUND_SCALE,
            BACKGROUND_TINT,
        );

        let star = self.textures.get(STAR_TEXTURE);
        let accumulator = self.particles.rotation();
        for particle in self.particles.stars() {
            frame.push(
                Layer::Starfield,
                DrawCommand::Sprite {
                    texture: star.id().to_string(),
                    position: Point::new(particle.x, particle.y),
                    anchor: CENTER,
                    scale: particle.sprite_scale(),
                    rotation: particle.rotation(accumulator),
                    tint: WHITE,
                },
            );
        }

        self.push_sprite(
            frame,
            Layer::Foreground,
            FOREGROUND_GLYPH,
            glyph_position,
            CENTER,
            FOREGROUND_SCALE,
            WHITE,
        );

        frame.push(Layer::Status, weather.placed(weather_position, TOP_RIGHT));

        for (i, code) in self.data.active_warning_icon_ids().iter().enumerate() {
            let position = Point::new(
                width - WARNING_MARGIN - WARNING_SPACING * i as f32,
                weather_position.y - WARNING_SPACING,
            );
            self.push_sprite(frame, Layer::Warnings, code, position, TOP_RIGHT, 1.0, WHITE);
        }

        frame.push(Layer::Schedule, lesson.placed(lesson_position, TOP_LEFT));
        frame.push(Layer::Schedule, deadlines.placed(deadlines_position, TOP_RIGHT));
        frame.push(Layer::Stats, stats.placed(stats_position, BOTTOM_CENTER));
        Ok(())
    }

    fn text_block(&mut self, label: &'static str, text: String, align: TextAlign) -> Result<TextBlock> {
        let style = TextStyle::new(FONT_SIZE, align);
        let extent = self.labels.get(label).update(&text, &style)?;
        Ok(TextBlock {
            label,
            text,
            style,
            extent,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn push_sprite(
        &mut self,
        frame: &mut Frame,
        layer: Layer,
        texture: &str,
        position: Point,
        anchor: Point,
        scale: f32,
        tint: u32,
    ) {
        let handle = self.textures.get(texture);
        frame.push(
            layer,
            DrawCommand::Sprite {
                texture: handle.id().to_string(),
                position,
                anchor,
                scale,
                rotation: 0.0,
                tint,
            },
        );
    }

    pub fn fps(&self) -> u32 {
        self.clock.fps()
    }

    /// Logical-to-viewport scale of the last frame.
    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn pointer(&self) -> &PointerTracker {
        &self.pointer
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn ripples(&self) -> &ClickRippleManager {
        &self.ripples
    }

    pub fn textures(&self) -> &ResourceCache<TextureHandle> {
        &self.textures
    }

    pub fn data(&self) -> &D {
        &self.data
    }
}
