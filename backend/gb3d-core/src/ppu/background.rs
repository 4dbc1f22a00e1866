use crate::graphics::{shade_color, shade_intensity};
use crate::layers::LayerTarget;
use crate::metadata::MetadataStore;
use crate::ppu::{LineContext, SCREEN_WIDTH, TileLookup, tile_pixel};

const TILE_MAP_WIDTH: usize = 32;

pub(super) fn render_bg_line<T: LayerTarget + ?Sized>(
    ctx: &LineContext<'_>,
    metadata: &MetadataStore,
    target: &mut T,
) {
    let registers = ctx.registers();
    let vram = ctx.vram();
    let line = ctx.line();

    let y = line.wrapping_add(registers.bg_y_scroll);
    let map_row_addr = registers.bg_tile_map_addr + TILE_MAP_WIDTH * usize::from(y / 8);
    let fine_y = y % 8;

    let back_intensity = shade_intensity(registers.bg_palette[0]);

    let mut lookup = TileLookup::new(metadata, vram);
    for x in 0..SCREEN_WIDTH as u8 {
        let bg_x = x.wrapping_add(registers.bg_x_scroll);
        let tile_number = vram[map_row_addr + usize::from(bg_x / 8)];
        let tile_addr = registers.bg_tile_data_area.tile_address(tile_number);
        let tile_metadata = lookup.get(tile_addr);
        let tint = tile_metadata.map(|metadata| metadata.bg_color);

        // Color 0 is always drawn on the back depth so the canvas never has holes
        let back_z = tile_metadata.map_or(0, |metadata| metadata.bg_back_z);
        target.draw(back_z, x, line, shade_color(tint, back_intensity));

        let color_id = tile_pixel(vram, tile_addr, fine_y, bg_x % 8);
        if color_id != 0 {
            let front_z = tile_metadata.map_or(0, |metadata| metadata.bg_front_z);
            let intensity = shade_intensity(registers.bg_palette[usize::from(color_id)]);
            target.draw(front_z, x, line, shade_color(tint, intensity));
        }
    }
}

pub(super) fn render_window_line<T: LayerTarget + ?Sized>(
    ctx: &LineContext<'_>,
    window_line: u8,
    metadata: &MetadataStore,
    target: &mut T,
) {
    let registers = ctx.registers();
    let vram = ctx.vram();
    let line = ctx.line();

    let map_row_addr =
        registers.window_tile_map_addr + TILE_MAP_WIDTH * usize::from(window_line / 8);
    let fine_y = window_line % 8;

    let start_x = registers.window_x.saturating_sub(7);

    let mut lookup = TileLookup::new(metadata, vram);
    for x in start_x..SCREEN_WIDTH as u8 {
        // WX is offset by 7; WX < 7 scrolls the window's left edge off screen
        let window_x = x + 7 - registers.window_x;
        let tile_number = vram[map_row_addr + usize::from(window_x / 8)];
        let tile_addr = registers.bg_tile_data_area.tile_address(tile_number);
        let tile_metadata = lookup.get(tile_addr);

        let color_id = tile_pixel(vram, tile_addr, fine_y, window_x % 8);
        let intensity = shade_intensity(registers.bg_palette[usize::from(color_id)]);
        let z = tile_metadata.map_or(0, |metadata| metadata.win_z);
        let color = shade_color(tile_metadata.map(|metadata| metadata.win_color), intensity);
        target.draw(z, x, line, color);
    }
}
