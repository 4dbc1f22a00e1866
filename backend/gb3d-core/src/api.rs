//! Render session: owns the metadata, the renderer and the depth layers for one running game

use crate::command::{CommandError, EditCommand, FlagOp};
use crate::layers::{LayerStore, LayerTarget};
use crate::metadata::{MetadataError, MetadataStore};
use crate::ppu::{LineContext, ScanlineCallback, ScanlineRenderer, Vram};
use crate::texture::{DEFAULT_BACKUPS, TextureLayerStore};
use crate::tile::{TileHash, VramTiles};
use gb3d_config::{DisplayVariant, SpriteAccuracy};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderConfig {
    pub z_layers: usize,
    pub sprite_accuracy: SpriteAccuracy,
    pub display_variant: DisplayVariant,
    pub texture_backups: usize,
    pub frame_skip: bool,
    pub interlace: bool,
    pub metadata_dir: PathBuf,
}

impl RenderConfig {
    #[must_use]
    pub fn for_variant(display_variant: DisplayVariant) -> Self {
        Self {
            z_layers: display_variant.default_z_layers(),
            sprite_accuracy: SpriteAccuracy::default(),
            display_variant,
            texture_backups: DEFAULT_BACKUPS,
            frame_skip: false,
            interlace: false,
            metadata_dir: PathBuf::from("meta"),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::for_variant(DisplayVariant::default())
    }
}

#[derive(Debug, Clone)]
pub enum Layers {
    Framebuffer(LayerStore),
    Texture(TextureLayerStore),
}

impl Layers {
    fn new(config: &RenderConfig) -> Self {
        match config.display_variant {
            DisplayVariant::Framebuffer => Self::Framebuffer(LayerStore::new(config.z_layers)),
            DisplayVariant::Texture => {
                Self::Texture(TextureLayerStore::new(config.z_layers, config.texture_backups))
            }
        }
    }

    fn target(&mut self) -> &mut dyn LayerTarget {
        match self {
            Self::Framebuffer(layers) => layers,
            Self::Texture(layers) => layers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSession {
    config: RenderConfig,
    metadata: MetadataStore,
    renderer: ScanlineRenderer,
    tiles: VramTiles,
    layers: Layers,
    frame_count: u64,
}

impl RenderSession {
    /// # Panics
    ///
    /// Panics if `config.z_layers` or `config.texture_backups` is 0.
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        log::info!(
            "Creating render session: {} layers, {} display, {} sprites",
            config.z_layers,
            config.display_variant,
            config.sprite_accuracy
        );

        let renderer = ScanlineRenderer::new(config.sprite_accuracy)
            .with_frame_skip(config.frame_skip)
            .with_interlace(config.interlace);
        let layers = Layers::new(&config);

        Self {
            config,
            metadata: MetadataStore::new(),
            renderer,
            tiles: VramTiles::new(),
            layers,
            frame_count: 0,
        }
    }

    /// Prepare the layers for a new frame's lines.
    pub fn begin_frame(&mut self) {
        match &mut self.layers {
            Layers::Framebuffer(layers) => layers.reset(),
            Layers::Texture(layers) => {
                layers.advance_backup();
                let backup = layers.backup();
                layers.reset(backup);
            }
        }

        log::debug!("Beginning frame {}", self.frame_count);
    }

    /// Finish the frame: flatten onto layer 0 or leave the textures for the display to sample.
    pub fn end_frame(&mut self) {
        if let Layers::Framebuffer(layers) = &mut self.layers {
            layers.compose_all();
        }

        self.frame_count += 1;
    }

    pub fn render_line(&mut self, ctx: &LineContext<'_>) {
        self.renderer.render_line(ctx, &self.metadata, self.layers.target());
    }

    /// Hash every VRAM tile so the inspector and editing commands see current patterns.
    pub fn sample_vram_tiles(&mut self, vram: &Vram) {
        self.tiles.sample(vram);
    }

    /// Apply a command to the tile selected in the inspector.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range depths and metadata file failures. The store is not
    /// modified on error.
    pub fn execute(&mut self, command: &EditCommand) -> Result<(), CommandError> {
        let hash = self.tiles.selected_hash();
        self.execute_for(hash, command)
    }

    /// Apply a command to a specific tile hash.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range depths and metadata file failures. The store is not
    /// modified on error.
    pub fn execute_for(
        &mut self,
        hash: TileHash,
        command: &EditCommand,
    ) -> Result<(), CommandError> {
        command.validate(self.config.z_layers)?;

        if let Some(update) = command.to_update() {
            self.metadata.upsert(hash, &update);
            return Ok(());
        }

        match command {
            EditCommand::Flags { op, flags } => {
                self.metadata.create_if_missing(hash);
                match op {
                    FlagOp::Set => self.metadata.set_flags(hash, *flags),
                    FlagOp::Add => self.metadata.add_flags(hash, *flags),
                    FlagOp::Clear => self.metadata.clear_flags(hash, *flags),
                };
            }
            EditCommand::Save(file) => {
                let path = self.metadata_path(file);
                self.metadata.save_to_path(&path)?;
            }
            EditCommand::Load(file) => {
                let path = self.metadata_path(file);
                self.load_metadata(&path)?;
            }
            EditCommand::SetColor { .. }
            | EditCommand::SetAllDepths(_)
            | EditCommand::SetDepth { .. } => {}
        }

        Ok(())
    }

    /// Parse and run one line of command text, logging instead of returning failures.
    pub fn execute_line(&mut self, line: &str) {
        let result = line.parse::<EditCommand>().and_then(|command| self.execute(&command));
        if let Err(err) = result {
            log::error!("'{line}': {err}");
        }
    }

    /// Replace the metadata with the contents of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded; the current metadata is kept.
    pub fn load_metadata(&mut self, path: &Path) -> Result<(), MetadataError> {
        self.metadata.load_from_path(path)?;

        if let Some(max_depth) = self.metadata.max_depth() {
            if max_depth as usize >= self.config.z_layers {
                log::warn!(
                    "Metadata references depth {max_depth} but only {} layers are configured; \
                     those tiles will be drawn on layer {}",
                    self.config.z_layers,
                    self.config.z_layers - 1
                );
            }
        }

        Ok(())
    }

    fn metadata_path(&self, file: &str) -> PathBuf {
        self.config.metadata_dir.join(file)
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[must_use]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }

    #[must_use]
    pub fn tiles(&self) -> &VramTiles {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut VramTiles {
        &mut self.tiles
    }

    #[must_use]
    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    #[must_use]
    pub fn layer_store(&self) -> Option<&LayerStore> {
        match &self.layers {
            Layers::Framebuffer(layers) => Some(layers),
            Layers::Texture(_) => None,
        }
    }

    #[must_use]
    pub fn texture_store(&self) -> Option<&TextureLayerStore> {
        match &self.layers {
            Layers::Texture(layers) => Some(layers),
            Layers::Framebuffer(_) => None,
        }
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl ScanlineCallback for RenderSession {
    fn on_line_ready(&mut self, ctx: &LineContext<'_>) {
        self.render_line(ctx);
    }
}
