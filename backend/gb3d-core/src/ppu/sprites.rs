use crate::graphics::{shade_color, shade_intensity};
use crate::layers::LayerTarget;
use crate::metadata::{MetadataFlags, MetadataStore};
use crate::num::GetBit;
use crate::ppu::registers::TileDataArea;
use crate::ppu::{LineContext, SCREEN_WIDTH, TileLookup, tile_pixel};
use gb3d_config::SpriteAccuracy;

pub(super) const OAM_SPRITE_COUNT: usize = 40;

// OAM X coordinates at or past this are fully off the right edge
const MAX_VISIBLE_X: u8 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpriteData {
    oam_index: u8,
    y: u8,
    x: u8,
    tile_number: u8,
    palette: usize,
    horizontal_flip: bool,
    vertical_flip: bool,
    behind_bg: bool,
}

impl SpriteData {
    fn from_oam(oam_index: u8, bytes: &[u8]) -> Self {
        let attributes = bytes[3];
        Self {
            oam_index,
            y: bytes[0],
            x: bytes[1],
            tile_number: bytes[2],
            palette: usize::from(attributes.bit(4)),
            horizontal_flip: attributes.bit(5),
            vertical_flip: attributes.bit(6),
            behind_bg: attributes.bit(7),
        }
    }

    // OAM Y is offset by 16 so that sprites can scroll in from the top
    fn covers_line(&self, line: u8, sprite_height: u8) -> bool {
        let line = u16::from(line) + 16;
        let top = u16::from(self.y);
        (top..top + u16::from(sprite_height)).contains(&line)
    }
}

fn scan_oam(ctx: &LineContext<'_>, accuracy: SpriteAccuracy, buffer: &mut Vec<SpriteData>) {
    let line = ctx.line();
    let sprite_height = ctx.registers().sprite_height();

    buffer.clear();
    buffer.extend(
        ctx.oam()
            .chunks_exact(4)
            .enumerate()
            .map(|(i, bytes)| SpriteData::from_oam(i as u8, bytes))
            .filter(|sprite| sprite.covers_line(line, sprite_height)),
    );

    if let Some(limit) = accuracy.sprite_limit() {
        // Lower X wins, ties broken by OAM index; sort is stable and the scan is in OAM order
        buffer.sort_by_key(|sprite| sprite.x);
        buffer.truncate(limit);
    }
}

pub(super) fn render_sprite_line<T: LayerTarget + ?Sized>(
    ctx: &LineContext<'_>,
    accuracy: SpriteAccuracy,
    buffer: &mut Vec<SpriteData>,
    metadata: &MetadataStore,
    target: &mut T,
) {
    scan_oam(ctx, accuracy, buffer);

    let registers = ctx.registers();
    let vram = ctx.vram();
    let line = ctx.line();
    let sprite_height = registers.sprite_height();

    let mut lookup = TileLookup::new(metadata, vram);

    // Highest priority sprite goes last so that its pixels overwrite the rest
    for sprite in buffer.iter().rev() {
        if sprite.x == 0 || sprite.x >= MAX_VISIBLE_X {
            continue;
        }

        let mut sprite_row = line + 16 - sprite.y;
        if sprite.vertical_flip {
            sprite_row = sprite_height - 1 - sprite_row;
        }

        // 8x16 sprites ignore bit 0 of the tile number and continue into the next tile
        let tile_number = if registers.double_height_sprites {
            (sprite.tile_number & !1) + sprite_row / 8
        } else {
            sprite.tile_number
        };
        let tile_row = sprite_row % 8;
        let tile_addr = TileDataArea::SPRITES.tile_address(tile_number);

        let tile_metadata = lookup.get(tile_addr);
        let draw_color0 = tile_metadata
            .is_some_and(|metadata| metadata.flags.contains(MetadataFlags::DRAW_OBJ_ON_COLOR0));
        let z = tile_metadata.map_or(0, |metadata| {
            if sprite.behind_bg { metadata.obj_behind_z } else { metadata.obj_z }
        });
        let tint = tile_metadata.map(|metadata| metadata.obj_color);
        let palette = &registers.sprite_palettes[sprite.palette];

        for pixel in 0..8_u8 {
            let Some(x) = (sprite.x + pixel).checked_sub(8) else { continue };
            if usize::from(x) >= SCREEN_WIDTH {
                continue;
            }

            let col = if sprite.horizontal_flip { 7 - pixel } else { pixel };
            let color_id = tile_pixel(vram, tile_addr, tile_row, col);
            if color_id == 0 && !draw_color0 {
                continue;
            }

            let intensity = shade_intensity(palette[usize::from(color_id)]);
            target.draw(z, x, line, shade_color(tint, intensity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Color;
    use crate::layers::LayerStore;
    use crate::metadata::MetadataUpdate;
    use crate::ppu::registers::Registers;
    use crate::ppu::{OAM_LEN, Oam, ScanlineRenderer, VRAM_LEN, Vram};
    use crate::tile::TileHash;
    use test_log::test;

    fn write_sprite(oam: &mut Oam, index: usize, y: u8, x: u8, tile: u8, attributes: u8) {
        oam[4 * index..4 * index + 4].copy_from_slice(&[y, x, tile, attributes]);
    }

    fn setup() -> (Registers, Box<Vram>, Box<Oam>) {
        let mut registers = Registers::new();
        // LCD on, sprites on, BG off
        registers.write_lcdc(0x82);
        registers.write_obp0(0xE4);
        registers.write_obp1(0xE4);

        let mut vram = Box::new([0; VRAM_LEN]);
        // Tile 1: every row is a solid color 3 line
        vram[0x10..0x20].fill(0xFF);

        (registers, vram, Box::new([0; OAM_LEN]))
    }

    fn render(
        registers: &Registers,
        vram: &Vram,
        oam: &Oam,
        metadata: &MetadataStore,
        accuracy: SpriteAccuracy,
        line: u8,
    ) -> LayerStore {
        let mut layers = LayerStore::new(4);
        let ctx = LineContext::new(line, registers, vram, oam);
        ScanlineRenderer::new(accuracy).render_line(&ctx, metadata, &mut layers);
        layers
    }

    #[test]
    fn x_boundaries() {
        let (registers, vram, mut oam) = setup();
        write_sprite(&mut oam, 0, 16, 0, 1, 0);
        write_sprite(&mut oam, 1, 16, 167, 1, 0);
        write_sprite(&mut oam, 2, 16, 168, 1, 0);

        let layers =
            render(&registers, &vram, &oam, &MetadataStore::new(), SpriteAccuracy::Accurate, 0);

        assert_eq!(layers.pixel(0, 159, 0), Color::BLACK);
        assert!(layers.pixel(0, 158, 0).is_transparent());
        assert!(layers.pixel(0, 0, 0).is_transparent());
    }

    #[test]
    fn ten_sprite_limit_keeps_lowest_x() {
        let (registers, vram, mut oam) = setup();
        // 12 sprites in reverse X order; the two highest X values are dropped in accurate mode
        for i in 0..12 {
            write_sprite(&mut oam, i, 16, 8 + 8 * (11 - i as u8), 1, 0);
        }

        let metadata = MetadataStore::new();
        let accurate = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 0);
        for sprite_x in 0..10 {
            assert_eq!(accurate.pixel(0, 8 * sprite_x, 0), Color::BLACK);
        }
        assert!(accurate.pixel(0, 80, 0).is_transparent());
        assert!(accurate.pixel(0, 88, 0).is_transparent());

        let fast = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Fast, 0);
        assert_eq!(fast.pixel(0, 88, 0), Color::BLACK);
    }

    #[test]
    fn equal_x_keeps_lowest_oam_index() {
        let (registers, mut vram, mut oam) = setup();
        let mut metadata = MetadataStore::new();

        // Sprites 0-10 share X; tile i + 1 differs only in row 7 so each hashes uniquely
        for i in 0..11_u8 {
            let tile = usize::from(i) + 1;
            vram[16 * tile..16 * tile + 16].fill(0xFF);
            vram[16 * tile + 14] = !i;
            write_sprite(&mut oam, usize::from(i), 16, 8, i + 1, 0);

            let obj_z = match i {
                9 => 2,
                10 => 3,
                _ => 0,
            };
            metadata.upsert(
                TileHash::of_vram_tile(&vram, 16 * tile),
                &MetadataUpdate {
                    obj_color: Some(Color::rgb(10 * i + 5, 0, 0)),
                    obj_z: Some(obj_z),
                    ..MetadataUpdate::default()
                },
            );
        }

        let accurate = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 0);
        // Sprite 0 is drawn last and wins the overlap
        assert_eq!(accurate.pixel(0, 0, 0), Color::rgb(5, 0, 0));
        assert_eq!(accurate.pixel(2, 0, 0), Color::rgb(95, 0, 0));
        assert!(!accurate.is_used(3));

        let fast = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Fast, 0);
        assert_eq!(fast.pixel(0, 0, 0), Color::rgb(5, 0, 0));
        assert_eq!(fast.pixel(3, 0, 0), Color::rgb(105, 0, 0));
    }

    #[test]
    fn line_coverage_by_height() {
        let (mut registers, vram, mut oam) = setup();
        write_sprite(&mut oam, 0, 20, 8, 1, 0);
        let metadata = MetadataStore::new();

        for (line, visible) in [(3, false), (4, true), (11, true), (12, false)] {
            let layers =
                render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, line);
            assert_eq!(layers.is_used(0), visible, "line {line}");
        }

        registers.write_lcdc(0x86);
        let layers = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 19);
        assert!(layers.is_used(0));
        let layers = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 20);
        assert!(!layers.is_used(0));
    }

    #[test]
    fn flips_and_tall_sprites_hash_the_fetched_tile() {
        let (mut registers, mut vram, mut oam) = setup();
        registers.write_lcdc(0x86);
        // Tile 2 row 7: only the leftmost pixel set; tile 3 left empty
        vram[0x20 + 14] = 0x80;
        // Tile 3 row 0: only the rightmost pixel set
        vram[0x30] = 0x01;
        // Tall sprite using tiles 2/3 (bit 0 of tile number ignored), both flips
        write_sprite(&mut oam, 0, 16, 8, 3, 0x60);

        let mut metadata = MetadataStore::new();
        let lower = TileHash::of_vram_tile(&vram, 0x30);
        metadata.upsert(lower, &MetadataUpdate { obj_z: Some(2), ..MetadataUpdate::default() });

        // Screen row 7 with Y flip reads row 8 of the sprite, i.e. row 0 of tile 3
        let layers = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 7);
        // X flip moves the rightmost pixel to the left edge
        assert_eq!(layers.pixel(2, 0, 7).a, 255);
        assert!(!layers.is_used(0));

        // Screen row 8 reads row 7 of tile 2, which has no metadata
        let layers = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 8);
        assert_eq!(layers.pixel(0, 7, 8).a, 255);
        assert!(!layers.is_used(2));
    }

    #[test]
    fn color0_flag_and_behind_depth() {
        let (registers, vram, mut oam) = setup();
        // Tile 0 is blank, drawn behind BG
        write_sprite(&mut oam, 0, 16, 8, 0, 0x80);

        let mut metadata = MetadataStore::new();
        let blank = TileHash::of_vram_tile(&vram, 0);
        metadata.upsert(
            blank,
            &MetadataUpdate {
                obj_color: Some(Color::rgb(0, 0, 255)),
                obj_z: Some(1),
                obj_behind_z: Some(3),
                ..MetadataUpdate::default()
            },
        );

        let layers = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 0);
        assert!(!layers.is_used(3));

        metadata.add_flags(blank, MetadataFlags::DRAW_OBJ_ON_COLOR0);
        let layers = render(&registers, &vram, &oam, &metadata, SpriteAccuracy::Accurate, 0);
        assert!(layers.is_used(3));
        assert!(!layers.is_used(1));
        // OBP0 shade 0 is the lightest, so the tint washes out to white
        assert_eq!(layers.pixel(3, 0, 0), Color::WHITE);
    }
}
