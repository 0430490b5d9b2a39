use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, RwLock},
    thread,
};

use serde::{Deserialize, Serialize};

use crate::{DashboardError, Result};

/// Builds a drawable handle for an id the cache has not seen yet. Creation
/// must hand back a usable handle immediately even when the underlying data
/// arrives later.
pub trait ResourceFactory<H> {
    fn create(&mut self, id: &str) -> H;
}

impl<H, F> ResourceFactory<H> for F
where
    F: FnMut(&str) -> H,
{
    fn create(&mut self, id: &str) -> H {
        self(id)
    }
}

/// Handles that own a native resource which must be released explicitly.
pub trait Disposable {
    /// Releases the resource. Returns whether the handle ended up disposed.
    fn dispose(&self) -> bool;
    fn is_disposed(&self) -> bool;
}

/// Id keyed table of lazily created handles. Handles are cheap clones that
/// share their state, so every caller asking for the same id observes the
/// same instance until it is deleted.
pub struct ResourceCache<H> {
    entries: HashMap<String, H>,
    factory: Box<dyn ResourceFactory<H>>,
}

impl<H> ResourceCache<H>
where
    H: Clone + Disposable,
{
    pub fn new(factory: impl ResourceFactory<H> + 'static) -> Self {
        Self {
            entries: HashMap::new(),
            factory: Box::new(factory),
        }
    }

    /// Returns the handle stored under `id`, creating it on first use.
    pub fn get(&mut self, id: &str) -> H {
        if let Some(handle) = self.entries.get(id) {
            return handle.clone();
        }

        let handle = self.factory.create(id);
        self.entries.insert(id.to_string(), handle.clone());
        handle
    }

    /// Disposes and forgets the handle stored under `id`. Deleting an id that
    /// was never created is a caller bug and reported as
    /// [`DashboardError::NotFound`].
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let handle = self
            .entries
            .remove(id)
            .ok_or_else(|| DashboardError::NotFound(id.to_string()))?;
        Ok(handle.dispose())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H> fmt::Debug for ResourceCache<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ResourceCache").field("ids", &ids).finish()
    }
}

/// Loading state of a texture. Handles start as `Pending` and are resolved in
/// place by the loader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureState {
    Pending,
    Loaded { width: u32, height: u32 },
    /// The image could not be read; the backend draws a flat fallback.
    Failed,
    Destroyed,
}

#[derive(Clone)]
pub struct TextureHandle {
    id: Arc<str>,
    state: Arc<RwLock<TextureState>>,
}

impl TextureHandle {
    pub fn pending(id: &str) -> Self {
        Self::with_state(id, TextureState::Pending)
    }

    /// Handle for an id without a backing image.
    pub fn fallback(id: &str) -> Self {
        Self::with_state(id, TextureState::Failed)
    }

    fn with_state(id: &str, state: TextureState) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TextureState {
        self.state
            .read()
            .map(|state| *state)
            .unwrap_or(TextureState::Failed)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), TextureState::Loaded { .. })
    }

    /// Whether both handles point at the same underlying texture.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Replaces a pending state. A handle destroyed while its image was still
    /// loading stays destroyed.
    pub fn resolve(&self, resolved: TextureState) {
        if let Ok(mut state) = self.state.write() {
            if *state != TextureState::Destroyed {
                *state = resolved;
            }
        }
    }
}

impl Disposable for TextureHandle {
    fn dispose(&self) -> bool {
        match self.state.write() {
            Ok(mut state) => {
                *state = TextureState::Destroyed;
                true
            }
            Err(_) => false,
        }
    }

    fn is_disposed(&self) -> bool {
        self.state() == TextureState::Destroyed
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Texture files known to the dashboard, relative to a texture directory.
#[derive(Debug, Clone)]
pub struct AssetManifest {
    root: PathBuf,
    entries: Vec<(String, String)>,
}

impl AssetManifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
        }
    }

    /// Glyph, particle, trail and weather warning textures.
    pub fn standard(root: impl Into<PathBuf>) -> Self {
        const FILES: &[(&str, &str)] = &[
            ("LycorisLogo", "LycorisLogo.png"),
            ("ChisaTaki", "ChisaTaki.png"),
            ("trail", "trail.png"),
            ("star", "star.png"),
            ("TC1", "TC1.gif"),
            ("TC3", "TC3.gif"),
            ("TC8NE", "TC8NE.gif"),
            ("TC8NW", "TC8NW.gif"),
            ("TC8SE", "TC8SE.gif"),
            ("TC8SW", "TC8SW.gif"),
            ("TC9", "TC9.gif"),
            ("TC10", "TC10.gif"),
            ("WCOLD", "WCOLD.gif"),
            // The red fire danger warning shares the yellow pictogram.
            ("WFIRER", "WFIREY.gif"),
            ("WFIREY", "WFIREY.gif"),
            ("WFNTSA", "WFNTSA.gif"),
            ("WFROST", "WFROST.gif"),
            ("WHOT", "WHOT.gif"),
            ("WL", "WL.gif"),
            ("WMSGNL", "WMSGNL.gif"),
            ("WRAINA", "WRAINA.gif"),
            ("WRAINB", "WRAINB.gif"),
            ("WRAINR", "WRAINR.gif"),
            ("WTMW", "WTMW.gif"),
            ("WTS", "WTS.gif"),
        ];

        let mut manifest = Self::new(root);
        for (id, file) in FILES {
            manifest.register(id, file);
        }
        manifest
    }

    pub fn register(&mut self, id: &str, file: &str) {
        match self.entries.iter_mut().find(|(known, _)| known == id) {
            Some(entry) => entry.1 = file.to_string(),
            None => self.entries.push((id.to_string(), file.to_string())),
        }
    }

    pub fn path_of(&self, id: &str) -> Option<PathBuf> {
        self.entries
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, file)| self.root.join(file))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Manifest driven texture factory. Each handle is returned pending and a
/// short-lived thread reads the image header to resolve it.
#[derive(Debug, Clone)]
pub struct TextureLoader {
    manifest: AssetManifest,
}

impl TextureLoader {
    pub fn new(manifest: AssetManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }
}

impl ResourceFactory<TextureHandle> for TextureLoader {
    fn create(&mut self, id: &str) -> TextureHandle {
        let Some(path) = self.manifest.path_of(id) else {
            tracing::warn!(id, "texture is not in the asset manifest, using fallback");
            return TextureHandle::fallback(id);
        };

        let handle = TextureHandle::pending(id);
        let pending = handle.clone();
        let spawned = thread::Builder::new()
            .name(format!("texture-{id}"))
            .spawn(move || {
                let resolved = match image::image_dimensions(&path) {
                    Ok((width, height)) => TextureState::Loaded { width, height },
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "failed to load texture");
                        TextureState::Failed
                    }
                };
                pending.resolve(resolved);
            });

        if let Err(err) = spawned {
            tracing::warn!(id, %err, "could not start texture loader");
            handle.resolve(TextureState::Failed);
        }
        handle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f32,
    pub align: TextAlign,
    pub fill: u32,
}

impl TextStyle {
    pub fn new(font_size: f32, align: TextAlign) -> Self {
        Self {
            font_size,
            align,
            fill: 0xffffff,
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::new(30.0, TextAlign::Left)
    }
}

/// Measured size of a block of text in logical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

const LINE_HEIGHT: f32 = 1.25;
const NARROW_ADVANCE: f32 = 0.6;

/// Estimates the extent of `text` at `font_size`. Wide (CJK) glyphs advance a
/// full em, everything else a fixed narrow advance. A trailing newline opens
/// an empty last line, as canvas text layout does.
pub fn measure_text(text: &str, font_size: f32) -> TextExtent {
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines
        .iter()
        .map(|line| {
            line.chars()
                .map(|c| if is_wide(c) { 1.0 } else { NARROW_ADVANCE })
                .sum::<f32>()
        })
        .fold(0.0_f32, f32::max);

    TextExtent {
        width: width * font_size,
        height: lines.len().max(1) as f32 * font_size * LINE_HEIGHT,
    }
}

fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
    )
}

#[derive(Debug)]
struct LabelState {
    text: String,
    style: TextStyle,
    disposed: bool,
}

/// Reusable text label. The render loop rewrites its content every frame.
#[derive(Clone)]
pub struct TextLabel {
    id: Arc<str>,
    state: Arc<Mutex<LabelState>>,
}

impl TextLabel {
    pub fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(Mutex::new(LabelState {
                text: String::new(),
                style: TextStyle::default(),
                disposed: false,
            })),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Replaces the content and style, returning the new extent.
    pub fn update(&self, text: &str, style: &TextStyle) -> Result<TextExtent> {
        let mut state = self.lock()?;
        if state.text != text {
            state.text.clear();
            state.text.push_str(text);
        }
        state.style = style.clone();
        Ok(measure_text(&state.text, state.style.font_size))
    }

    pub fn text(&self) -> Result<String> {
        Ok(self.lock()?.text.clone())
    }

    pub fn extent(&self) -> Result<TextExtent> {
        let state = self.lock()?;
        Ok(measure_text(&state.text, state.style.font_size))
    }

    fn lock(&self) -> Result<MutexGuard<'_, LabelState>> {
        self.state
            .lock()
            .map_err(|_| DashboardError::msg(format!("text label `{}` has been poisoned", self.id)))
    }
}

impl Disposable for TextLabel {
    fn dispose(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) => {
                state.disposed = true;
                state.text.clear();
                true
            }
            Err(_) => false,
        }
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().map(|state| state.disposed).unwrap_or(true)
    }
}

impl fmt::Debug for TextLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextLabel").field("id", &self.id).finish()
    }
}
