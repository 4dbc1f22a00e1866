mod snapshot;

use crate::snapshot::Snapshot;
use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use env_logger::Env;
use gb3d_config::{DisplayVariant, SpriteAccuracy};
use gb3d_core::api::{RenderConfig, RenderSession};
use gb3d_core::command::EditCommand;
use gb3d_core::layers::LayerStore;
use gb3d_core::metadata::{MetadataRecord, MetadataStore};
use gb3d_core::ppu::{LineContext, SCREEN_HEIGHT, SCREEN_WIDTH, ScanlineCallback};
use gb3d_core::tile::{TileHash, VRAM_TILE_COUNT, decode_tile};
use image::RgbaImage;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

const DEFAULT_Z_LAYERS: usize = 50;

// Color indices 0-3 from lightest to darkest
const SHADE_CHARS: [char; 4] = [' ', '.', '+', '#'];

#[derive(Debug, Parser)]
#[command(version, about = "Depth-layered Game Boy rendering tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every record in a metadata file
    Show { file: PathBuf },
    /// Convert a binary metadata file to JSON
    ToJson {
        file: PathBuf,
        /// Output path; prints to stdout if not set
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert a JSON metadata file back to the binary format
    FromJson {
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Apply one editing command (e.g. `set_meta obj_z 3`) to a tile, creating the file if needed
    Edit {
        file: PathBuf,
        /// Tile hash, decimal or 0x-prefixed hex
        #[arg(long)]
        tile: TileHash,
        /// Number of depth layers; depths at or above this are rejected
        #[arg(long, default_value_t = DEFAULT_Z_LAYERS, value_parser = parse_z_layers)]
        z_layers: usize,
        /// Directory that save_meta / load_meta file names are relative to
        #[arg(long, default_value = "meta")]
        meta_dir: PathBuf,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Render a VRAM/OAM/IO snapshot through the depth layers to PNG
    Render {
        snapshot: PathBuf,
        /// Metadata file to render with
        #[arg(long)]
        meta: Option<PathBuf>,
        /// Composited output image
        #[arg(short, long)]
        output: PathBuf,
        /// Also write every layer drawn this frame as layer_NN.png
        #[arg(long)]
        layers_dir: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_Z_LAYERS, value_parser = parse_z_layers)]
        z_layers: usize,
        #[arg(long, value_enum, default_value_t)]
        sprite_accuracy: SpriteAccuracy,
    },
    /// Preview one VRAM tile from a snapshot along with its hash and metadata
    Tiles {
        snapshot: PathBuf,
        /// Tile index in $8000-$97FF, 16 bytes per tile
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        meta: Option<PathBuf>,
    },
}

fn parse_z_layers(s: &str) -> Result<usize, String> {
    let z_layers: usize = s.parse().map_err(|err| format!("{err}"))?;
    if z_layers == 0 {
        return Err("at least one depth layer is required".into());
    }
    Ok(z_layers)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Show { file } => show(&file),
        Command::ToJson { file, output } => to_json(&file, output.as_deref()),
        Command::FromJson { file, output } => from_json(&file, &output),
        Command::Edit { file, tile, z_layers, meta_dir, command } => {
            edit(&file, tile, z_layers, meta_dir, &command)
        }
        Command::Render { snapshot, meta, output, layers_dir, z_layers, sprite_accuracy } => {
            let config = RenderConfig {
                z_layers,
                sprite_accuracy,
                ..RenderConfig::for_variant(DisplayVariant::Framebuffer)
            };
            render(&snapshot, meta.as_deref(), &output, layers_dir.as_deref(), config)
        }
        Command::Tiles { snapshot, index, meta } => {
            tiles(&snapshot, index, meta.as_deref(), &mut io::stdout().lock())
        }
    }
}

fn load_store(path: &Path) -> anyhow::Result<MetadataStore> {
    let mut store = MetadataStore::new();
    store.load_from_path(path)?;
    Ok(store)
}

fn show(path: &Path) -> anyhow::Result<()> {
    let store = load_store(path)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{} tiles in '{}'", store.len(), path.display())?;
    for record in store.records() {
        let (hash, metadata) = record.split();
        writeln!(stdout, "{hash}")?;
        writeln!(
            stdout,
            "  colors: bg {} win {} obj {}",
            metadata.bg_color, metadata.win_color, metadata.obj_color
        )?;
        writeln!(
            stdout,
            "  depths: bg front {} bg back {} win {} obj {} obj behind {}",
            metadata.bg_front_z,
            metadata.bg_back_z,
            metadata.win_z,
            metadata.obj_z,
            metadata.obj_behind_z
        )?;
        writeln!(stdout, "  flags: {:#X}", metadata.flags.bits())?;
    }

    Ok(())
}

fn to_json(path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let store = load_store(path)?;
    let records = store.records();

    match output {
        Some(output) => {
            let file = File::create(output)
                .with_context(|| format!("Unable to create '{}'", output.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &records)?;
            writer.flush()?;
            log::info!("Wrote {} records to '{}'", records.len(), output.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &records)?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}

fn from_json(path: &Path, output: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("Unable to open '{}'", path.display()))?;
    let records: Vec<MetadataRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid metadata JSON in '{}'", path.display()))?;

    let store = MetadataStore::from_records(records);
    store.save_to_path(output)?;

    Ok(())
}

fn edit(
    path: &Path,
    tile: TileHash,
    z_layers: usize,
    meta_dir: PathBuf,
    command: &[String],
) -> anyhow::Result<()> {
    let args: Vec<_> = command.iter().map(String::as_str).collect();
    let command = EditCommand::from_args(&args)?;

    let config = RenderConfig { z_layers, metadata_dir: meta_dir, ..RenderConfig::default() };
    let mut session = RenderSession::new(config);

    if path.exists() {
        session.load_metadata(path)?;
    } else {
        log::info!("'{}' does not exist, starting with empty metadata", path.display());
    }

    session.execute_for(tile, &command)?;
    session.metadata().save_to_path(path)?;

    Ok(())
}

fn render(
    snapshot_path: &Path,
    meta: Option<&Path>,
    output: &Path,
    layers_dir: Option<&Path>,
    config: RenderConfig,
) -> anyhow::Result<()> {
    let snapshot = Snapshot::read(snapshot_path)?;

    let mut session = RenderSession::new(config);
    if let Some(meta) = meta {
        session.load_metadata(meta)?;
    }

    session.begin_frame();
    for line in 0..SCREEN_HEIGHT as u8 {
        let ctx = LineContext::new(line, &snapshot.registers, &snapshot.vram, &snapshot.oam);
        session.on_line_ready(&ctx);
    }

    let layers = session
        .layer_store()
        .ok_or_else(|| anyhow!("Render requires framebuffer layers"))?;

    // Individual layers have to be written before compositing merges them downwards
    if let Some(layers_dir) = layers_dir {
        fs::create_dir_all(layers_dir)
            .with_context(|| format!("Unable to create '{}'", layers_dir.display()))?;

        for layer in (0..layers.z_layers()).filter(|&layer| layers.is_used(layer)) {
            save_layer(layers, layer, &layers_dir.join(format!("layer_{layer:02}.png")))?;
        }
    }

    session.end_frame();

    let layers = session
        .layer_store()
        .ok_or_else(|| anyhow!("Render requires framebuffer layers"))?;
    save_layer(layers, 0, output)?;

    Ok(())
}

fn tiles(
    snapshot_path: &Path,
    index: usize,
    meta: Option<&Path>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if index >= VRAM_TILE_COUNT {
        bail!("Tile index {index} is out of range, VRAM holds {VRAM_TILE_COUNT} tiles");
    }

    let snapshot = Snapshot::read(snapshot_path)?;

    let mut session = RenderSession::new(RenderConfig::default());
    if let Some(meta) = meta {
        session.load_metadata(meta)?;
    }
    session.sample_vram_tiles(&snapshot.vram);
    session.tiles_mut().select(index);

    let tiles = session.tiles();
    let hash = tiles.selected_hash();
    writeln!(out, "tile {index} at ${:04X}: {hash}", 0x8000 + 16 * index)?;
    match session.metadata().lookup(hash) {
        Some(metadata) => writeln!(
            out,
            "  depths: bg front {} bg back {} win {} obj {} obj behind {}",
            metadata.bg_front_z,
            metadata.bg_back_z,
            metadata.win_z,
            metadata.obj_z,
            metadata.obj_behind_z
        )?,
        None => writeln!(out, "  no metadata")?,
    }

    for row in decode_tile(tiles.pattern(tiles.selected())) {
        let line: String = row.iter().map(|&color| SHADE_CHARS[usize::from(color)]).collect();
        writeln!(out, "  |{line}|")?;
    }

    Ok(())
}

fn save_layer(layers: &LayerStore, layer: usize, path: &Path) -> anyhow::Result<()> {
    let pixels = layers.layer_bytes(layer).to_vec();
    let image = RgbaImage::from_raw(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, pixels)
        .context("Layer buffer does not match the screen size")?;
    image.save(path).with_context(|| format!("Unable to write '{}'", path.display()))?;

    log::info!("Wrote layer {layer} to '{}'", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SNAPSHOT_LEN;
    use gb3d_core::graphics::Color;
    use gb3d_core::metadata::MetadataUpdate;
    use gb3d_core::ppu::{OAM_LEN, VRAM_LEN};
    use std::env;
    use test_log::test;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("gb3d-cli-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn json_conversion_round_trip() {
        let dir = temp_dir("json");
        let binary = dir.join("meta.bin");
        let json = dir.join("meta.json");
        let converted = dir.join("converted.bin");

        let mut store = MetadataStore::new();
        store.upsert(
            TileHash(0x1234),
            &MetadataUpdate {
                win_color: Some(Color::rgb(1, 2, 3)),
                win_z: Some(9),
                ..MetadataUpdate::default()
            },
        );
        store.save_to_path(&binary).unwrap();

        to_json(&binary, Some(json.as_path())).unwrap();
        let text = fs::read_to_string(&json).unwrap();
        assert!(text.contains("\"tile_hash\": 4660"));
        assert!(text.contains("\"bg_for_z\""));

        from_json(&json, &converted).unwrap();
        assert_eq!(fs::read(&binary).unwrap(), fs::read(&converted).unwrap());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn edit_creates_file() {
        let dir = temp_dir("edit");
        let path = dir.join("meta.bin");
        let command = ["set_meta", "obj_z", "3"].map(String::from);

        edit(&path, TileHash(5), 8, dir.clone(), &command).unwrap();
        assert_eq!(load_store(&path).unwrap().lookup(TileHash(5)).unwrap().obj_z, 3);

        let too_deep = ["set_meta", "obj_z", "8"].map(String::from);
        assert!(edit(&path, TileHash(5), 8, dir.clone(), &too_deep).is_err());
        assert_eq!(load_store(&path).unwrap().lookup(TileHash(5)).unwrap().obj_z, 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn render_writes_composite_and_layers() {
        let dir = temp_dir("render");

        // Sprite 0 draws tile 1's top-left pixel at (20, 10)
        let mut bytes = vec![0; SNAPSHOT_LEN];
        bytes[16] = 0x80;
        bytes[17] = 0x80;
        bytes[VRAM_LEN..VRAM_LEN + 4].copy_from_slice(&[26, 28, 1, 0]);
        bytes[VRAM_LEN + OAM_LEN] = 0x83;
        bytes[VRAM_LEN + OAM_LEN + 8] = 0xE4;
        let snapshot_path = dir.join("frame.snap");
        fs::write(&snapshot_path, &bytes).unwrap();

        let mut tile = [0; 16];
        tile[..2].copy_from_slice(&[0x80, 0x80]);
        let meta_path = dir.join("meta.bin");
        let mut store = MetadataStore::new();
        store.upsert(
            TileHash::of(&tile),
            &MetadataUpdate {
                obj_color: Some(Color::rgb(255, 0, 0)),
                obj_z: Some(3),
                ..MetadataUpdate::default()
            },
        );
        store.save_to_path(&meta_path).unwrap();

        let output = dir.join("out.png");
        let layers_dir = dir.join("layers");
        let config = RenderConfig { z_layers: 8, ..RenderConfig::default() };
        render(&snapshot_path, Some(&*meta_path), &output, Some(&*layers_dir), config).unwrap();

        let composite = image::open(&output).unwrap().to_rgba8();
        assert_eq!(composite.get_pixel(20, 10).0, [255, 0, 0, 255]);
        assert_eq!(composite.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert!(layers_dir.join("layer_00.png").exists());
        assert!(layers_dir.join("layer_03.png").exists());
        assert!(!layers_dir.join("layer_01.png").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_layers_is_rejected_at_parse_time() {
        let parse = |z_layers: &str| {
            Args::try_parse_from([
                "gb3d-cli",
                "edit",
                "meta.bin",
                "--tile",
                "1",
                "--z-layers",
                z_layers,
                "set_meta",
                "obj_z",
                "0",
            ])
        };

        assert!(parse("0").is_err());
        assert!(parse("-3").is_err());
        let args = parse("4").unwrap();
        assert!(matches!(args.command, Command::Edit { z_layers: 4, .. }));
    }

    #[test]
    fn tile_preview() {
        let dir = temp_dir("tiles");

        let mut bytes = vec![0; SNAPSHOT_LEN];
        // Tile 1 row 0: colors 3, 1, 2 in the first three columns
        bytes[16] = 0b1100_0000;
        bytes[17] = 0b1010_0000;
        let snapshot_path = dir.join("frame.snap");
        fs::write(&snapshot_path, &bytes).unwrap();

        let mut tile = [0; 16];
        tile[..2].copy_from_slice(&[0b1100_0000, 0b1010_0000]);
        let meta_path = dir.join("meta.bin");
        let mut store = MetadataStore::new();
        store.upsert(
            TileHash::of(&tile),
            &MetadataUpdate { obj_z: Some(7), ..MetadataUpdate::default() },
        );
        store.save_to_path(&meta_path).unwrap();

        let mut out = Vec::new();
        tiles(&snapshot_path, 1, Some(&*meta_path), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], format!("tile 1 at $8010: {}", TileHash::of(&tile)));
        assert!(lines[1].contains("obj 7"));
        assert_eq!(lines[2], "  |#.+     |");
        assert_eq!(lines[3], "  |        |");
        assert_eq!(lines.len(), 10);

        let mut out = Vec::new();
        tiles(&snapshot_path, 0, None, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("no metadata"));

        assert!(tiles(&snapshot_path, VRAM_TILE_COUNT, None, &mut Vec::<u8>::new()).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
