use log::trace;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const FRAME_PIXELS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

// Per-line dot budget: 80 (OAM scan) + 172 (pixel transfer) + 204 (hblank).
pub const LINE_DOTS: u16 = 456;
const OAM_SCAN_END: u16 = 80;
const PIXEL_TRANSFER_END: u16 = 80 + 172;

const VISIBLE_LINES: u8 = SCREEN_HEIGHT as u8;
const TOTAL_LINES: u8 = 154;

/// Dots in a complete frame: 154 lines of 456 dots each.
pub const FRAME_DOTS: u32 = TOTAL_LINES as u32 * LINE_DOTS as u32;

const VRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;
const OAM_ENTRY_LEN: usize = 4;
const TOTAL_SPRITES: usize = OAM_SIZE / OAM_ENTRY_LEN;
const MAX_LINE_SPRITES: usize = 10;

// LCDC bits
const LCDC_BG_ENABLE: u8 = 0x01;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_OBJ_SIZE: u8 = 0x04;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_WINDOW_ENABLE: u8 = 0x20;
const LCDC_WINDOW_MAP: u8 = 0x40;
const LCDC_LCD_ENABLE: u8 = 0x80;

// STAT bits
const STAT_LYC_INT: u8 = 0x40;
const STAT_OAM_INT: u8 = 0x20;
const STAT_VBLANK_INT: u8 = 0x10;
const STAT_HBLANK_INT: u8 = 0x08;
const STAT_LYC_EQUAL: u8 = 0x04;

// OAM attribute bits
const ATTR_PALETTE: u8 = 0x10;
const ATTR_X_FLIP: u8 = 0x20;
const ATTR_Y_FLIP: u8 = 0x40;
const ATTR_BEHIND_BG: u8 = 0x80;

const IF_VBLANK: u8 = 0x01;
const IF_STAT: u8 = 0x02;

/// Classic DMG green ramp, lightest (color 0) to darkest (color 3),
/// as 0x00RRGGBB.
pub const DMG_PALETTE: [u32; 4] = [0x009BBC0F, 0x008BAC0F, 0x00306230, 0x000F380F];

/// PPU mode, in the order of the STAT mode field encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    HBlank,
    VBlank,
    OamScan,
    PixelTransfer,
}

impl Mode {
    pub fn bits(self) -> u8 {
        match self {
            Mode::HBlank => 0,
            Mode::VBlank => 1,
            Mode::OamScan => 2,
            Mode::PixelTransfer => 3,
        }
    }
}

/// One OAM entry, decoded into screen coordinates during the line scan.
#[derive(Clone, Copy, Default)]
struct Sprite {
    /// Left edge on screen; may be negative for partially off-screen sprites.
    x: i16,
    /// Top edge on screen.
    y: i16,
    tile: u8,
    attrs: u8,
}

/// Scanline-based pixel processing unit.
///
/// Driven in CPU cycle units through [`Ppu::step`]; each cycle is one dot.
/// Lines advance through OAM scan, pixel transfer and hblank, rendering a
/// full scanline into the framebuffer at the transfer-to-hblank boundary.
pub struct Ppu {
    pub vram: [u8; VRAM_SIZE],
    pub oam: [u8; OAM_SIZE],

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    mode: Mode,
    /// Dot position within the current line, 0..LINE_DOTS.
    line_dot: u16,
    /// Lines of window actually drawn this frame; the window resumes from
    /// here rather than from LY when it is hidden for part of the frame.
    window_line: u8,

    /// Sprites selected for the line in OAM table order.
    line_sprites: [Sprite; MAX_LINE_SPRITES],
    sprite_count: usize,

    /// True where the background/window pixel was color 0; sprites with the
    /// behind-background attribute only show over these pixels.
    bg_transparent: [bool; SCREEN_WIDTH],

    framebuffer: [u32; FRAME_PIXELS],
    frame_ready: bool,
    frames: u64,

    /// Level of the combined STAT interrupt sources; an interrupt fires only
    /// on a rising edge of this line.
    stat_irq_line: bool,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0x91,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            wy: 0,
            wx: 0,
            mode: Mode::OamScan,
            line_dot: 0,
            window_line: 0,
            line_sprites: [Sprite::default(); MAX_LINE_SPRITES],
            sprite_count: 0,
            bg_transparent: [true; SCREEN_WIDTH],
            framebuffer: [DMG_PALETTE[0]; FRAME_PIXELS],
            frame_ready: false,
            frames: 0,
            stat_irq_line: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn line_dot(&self) -> u16 {
        self.line_dot
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn framebuffer(&self) -> &[u32; FRAME_PIXELS] {
        &self.framebuffer
    }

    /// True once per frame, from vblank entry until acknowledged.
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Consume the published frame: clears the ready flag and resets the
    /// framebuffer to the lightest shade for the next frame.
    pub fn acknowledge_frame(&mut self) {
        self.frame_ready = false;
        self.framebuffer = [DMG_PALETTE[0]; FRAME_PIXELS];
    }

    /// Advance the PPU by `cycles` dots, raising vblank/STAT requests in
    /// `if_reg` as boundaries are crossed.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        if self.lcdc & LCDC_LCD_ENABLE == 0 {
            // LCD off: hold the PPU at the top of the frame.
            self.ly = 0;
            self.line_dot = 0;
            self.window_line = 0;
            self.mode = Mode::HBlank;
            return;
        }

        let mut remaining = cycles;
        while remaining > 0 {
            // Instruction cycle counts are all multiples of 4, so stepping in
            // 4-dot slices lands exactly on every mode boundary.
            let slice = remaining.min(4) as u16;
            remaining -= slice as u32;
            self.line_dot += slice;

            match self.mode {
                Mode::OamScan => {
                    if self.line_dot >= OAM_SCAN_END {
                        self.scan_line_sprites();
                        self.mode = Mode::PixelTransfer;
                    }
                }
                Mode::PixelTransfer => {
                    if self.line_dot >= PIXEL_TRANSFER_END {
                        self.render_scanline();
                        self.mode = Mode::HBlank;
                    }
                }
                Mode::HBlank => {
                    if self.line_dot >= LINE_DOTS {
                        self.line_dot -= LINE_DOTS;
                        self.ly += 1;
                        if self.ly == VISIBLE_LINES {
                            self.mode = Mode::VBlank;
                            self.frame_ready = true;
                            *if_reg |= IF_VBLANK;
                            trace!("vblank entry, frame {}", self.frames);
                        } else {
                            self.mode = Mode::OamScan;
                        }
                    }
                }
                Mode::VBlank => {
                    if self.line_dot >= LINE_DOTS {
                        self.line_dot -= LINE_DOTS;
                        self.ly += 1;
                        if self.ly == TOTAL_LINES {
                            self.ly = 0;
                            self.window_line = 0;
                            self.frames += 1;
                            self.mode = Mode::OamScan;
                        }
                    }
                }
            }

            self.update_stat_irq(if_reg);
        }
    }

    /// Recompute the combined STAT interrupt level and fire on a rising edge.
    fn update_stat_irq(&mut self, if_reg: &mut u8) {
        let lyc_equal = self.ly == self.lyc;
        let mut line = false;
        if self.stat & STAT_LYC_INT != 0 && lyc_equal {
            line = true;
        }
        line |= match self.mode {
            Mode::HBlank => self.stat & STAT_HBLANK_INT != 0,
            Mode::VBlank => self.stat & STAT_VBLANK_INT != 0,
            Mode::OamScan => self.stat & STAT_OAM_INT != 0,
            Mode::PixelTransfer => false,
        };
        if line && !self.stat_irq_line {
            *if_reg |= IF_STAT;
        }
        self.stat_irq_line = line;
    }

    /// Memory-mapped register read for 0xFF40-0xFF4B.
    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let lyc_equal = if self.ly == self.lyc { STAT_LYC_EQUAL } else { 0 };
                0x80 | (self.stat & 0x78) | lyc_equal | self.mode.bits()
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    /// Memory-mapped register write for 0xFF40-0xFF4B. Writes to LY are
    /// ignored; the read-only bits of STAT are preserved.
    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcdc & LCDC_LCD_ENABLE != 0;
                self.lcdc = val;
                if was_on && self.lcdc & LCDC_LCD_ENABLE == 0 {
                    self.ly = 0;
                    self.line_dot = 0;
                    self.window_line = 0;
                    self.mode = Mode::HBlank;
                }
            }
            0xFF41 => self.stat = (self.stat & 0x07) | (val & 0x78),
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    /// OAM scan: walk the 40 table entries in order and keep the first 10
    /// that intersect the current line. Entries parked at the off-screen
    /// sentinel positions are discarded outright.
    fn scan_line_sprites(&mut self) {
        self.sprite_count = 0;
        let height: i16 = if self.lcdc & LCDC_OBJ_SIZE != 0 { 16 } else { 8 };
        let ly = self.ly as i16;

        for idx in 0..TOTAL_SPRITES {
            if self.sprite_count == MAX_LINE_SPRITES {
                break;
            }
            let base = idx * OAM_ENTRY_LEN;
            let raw_y = self.oam[base];
            let raw_x = self.oam[base + 1];
            if raw_y == 0 || raw_y >= 160 || raw_x == 0 || raw_x >= 168 {
                continue;
            }
            let y = raw_y as i16 - 16;
            if ly < y || ly >= y + height {
                continue;
            }
            self.line_sprites[self.sprite_count] = Sprite {
                x: raw_x as i16 - 8,
                y,
                tile: self.oam[base + 2],
                attrs: self.oam[base + 3],
            };
            self.sprite_count += 1;
        }
    }

    fn render_scanline(&mut self) {
        let row = self.ly as usize * SCREEN_WIDTH;

        // Start from shade 0 everywhere; a disabled background leaves it.
        let clear = DMG_PALETTE[(self.bgp & 0x03) as usize];
        self.framebuffer[row..row + SCREEN_WIDTH].fill(clear);
        self.bg_transparent = [true; SCREEN_WIDTH];

        if self.lcdc & LCDC_BG_ENABLE != 0 {
            self.render_background(row);
            if self.lcdc & LCDC_WINDOW_ENABLE != 0 {
                self.render_window(row);
            }
        }
        if self.lcdc & LCDC_OBJ_ENABLE != 0 {
            self.render_sprites(row);
        }
    }

    /// Fetch one background/window tile pixel. `map_base` is the VRAM offset
    /// of the 32x32 tile map; `x`/`y` are pixel coordinates within the
    /// 256x256 layer.
    fn layer_pixel(&self, map_base: usize, x: u8, y: u8) -> u8 {
        let tile_col = (x / 8) as usize;
        let tile_row = (y / 8) as usize;
        let tile_idx = self.vram[map_base + tile_row * 32 + tile_col];

        // LCDC bit 4 selects unsigned indexing from 0x0000 or signed
        // indexing around 0x1000.
        let tile_addr = if self.lcdc & LCDC_TILE_DATA != 0 {
            tile_idx as usize * 16
        } else {
            (0x1000i32 + (tile_idx as i8 as i32) * 16) as usize
        };

        let line = (y % 8) as usize * 2;
        let lo = self.vram[tile_addr + line];
        let hi = self.vram[tile_addr + line + 1];
        let bit = 7 - (x % 8);
        ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1)
    }

    fn render_background(&mut self, row: usize) {
        let map_base = if self.lcdc & LCDC_BG_MAP != 0 { 0x1C00 } else { 0x1800 };
        let y = self.ly.wrapping_add(self.scy);
        for px in 0..SCREEN_WIDTH {
            let x = (px as u8).wrapping_add(self.scx);
            let color = self.layer_pixel(map_base, x, y);
            self.framebuffer[row + px] = self.shade(self.bgp, color);
            self.bg_transparent[px] = color == 0;
        }
    }

    fn render_window(&mut self, row: usize) {
        // WX holds the window's left edge plus 7; WX=7, WY=0 covers the
        // whole screen.
        if self.ly < self.wy || self.wx > 166 {
            return;
        }
        let map_base = if self.lcdc & LCDC_WINDOW_MAP != 0 { 0x1C00 } else { 0x1800 };
        let start = (self.wx as i16 - 7).max(0) as usize;
        let y = self.window_line;
        for px in start..SCREEN_WIDTH {
            let x = (px as i16 - (self.wx as i16 - 7)) as u8;
            let color = self.layer_pixel(map_base, x, y);
            self.framebuffer[row + px] = self.shade(self.bgp, color);
            self.bg_transparent[px] = color == 0;
        }
        self.window_line += 1;
    }

    /// Composite the line's sprites in reverse selection order so that the
    /// lowest OAM index ends up on top.
    fn render_sprites(&mut self, row: usize) {
        let tall = self.lcdc & LCDC_OBJ_SIZE != 0;
        let height = if tall { 16 } else { 8 };

        for sprite in self.line_sprites[..self.sprite_count].iter().rev() {
            let mut line = (self.ly as i16 - sprite.y) as u8;
            if sprite.attrs & ATTR_Y_FLIP != 0 {
                line = height - 1 - line;
            }
            // In 8x16 mode the tile index's low bit is forced to zero and
            // the pair is addressed as one 16-line unit.
            let tile = if tall { sprite.tile & 0xFE } else { sprite.tile } as usize;
            let addr = tile * 16 + line as usize * 2;
            let lo = self.vram[addr];
            let hi = self.vram[addr + 1];
            let palette = if sprite.attrs & ATTR_PALETTE != 0 { self.obp1 } else { self.obp0 };

            for px in 0..8i16 {
                let sx = sprite.x + px;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) {
                    continue;
                }
                let bit = if sprite.attrs & ATTR_X_FLIP != 0 { px } else { 7 - px };
                let color = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                if color == 0 {
                    // Sprite color 0 is transparent.
                    continue;
                }
                if sprite.attrs & ATTR_BEHIND_BG != 0 && !self.bg_transparent[sx as usize] {
                    continue;
                }
                self.framebuffer[row + sx as usize] = self.shade(palette, color);
            }
        }
    }

    /// Map a 2-bit color through a palette register to an RGB value.
    fn shade(&self, palette: u8, color: u8) -> u32 {
        DMG_PALETTE[((palette >> (color * 2)) & 0x03) as usize]
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dots(ppu: &mut Ppu, dots: u32) -> u8 {
        let mut if_reg = 0;
        ppu.step(dots, &mut if_reg);
        if_reg
    }

    #[test]
    fn mode_boundaries_within_a_line() {
        let mut ppu = Ppu::new();
        assert_eq!(ppu.mode(), Mode::OamScan);

        run_dots(&mut ppu, 80);
        assert_eq!(ppu.mode(), Mode::PixelTransfer);

        run_dots(&mut ppu, 172);
        assert_eq!(ppu.mode(), Mode::HBlank);

        run_dots(&mut ppu, 204);
        assert_eq!(ppu.mode(), Mode::OamScan);
        assert_eq!(ppu.ly(), 1);
        assert_eq!(ppu.line_dot(), 0);
    }

    #[test]
    fn vblank_entry_raises_interrupt_and_publishes() {
        let mut ppu = Ppu::new();
        let mut if_reg = 0;
        ppu.step(LINE_DOTS as u32 * VISIBLE_LINES as u32, &mut if_reg);
        assert_eq!(ppu.mode(), Mode::VBlank);
        assert_eq!(ppu.ly(), 144);
        assert_eq!(if_reg & IF_VBLANK, IF_VBLANK);
        assert!(ppu.frame_ready());
    }

    #[test]
    fn frame_wraps_after_exact_dot_budget() {
        let mut ppu = Ppu::new();
        run_dots(&mut ppu, FRAME_DOTS);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.mode(), Mode::OamScan);
        assert_eq!(ppu.frames(), 1);
    }

    #[test]
    fn ly_is_read_only() {
        let mut ppu = Ppu::new();
        run_dots(&mut ppu, LINE_DOTS as u32 * 5);
        ppu.write_reg(0xFF44, 0x99);
        assert_eq!(ppu.read_reg(0xFF44), 5);
    }

    #[test]
    fn lyc_coincidence_bit_and_interrupt() {
        let mut ppu = Ppu::new();
        ppu.write_reg(0xFF45, 3);
        ppu.write_reg(0xFF41, STAT_LYC_INT);

        let mut if_reg = 0;
        ppu.step(LINE_DOTS as u32 * 2, &mut if_reg);
        assert_eq!(if_reg & IF_STAT, 0);
        assert_eq!(ppu.read_reg(0xFF41) & STAT_LYC_EQUAL, 0);

        ppu.step(LINE_DOTS as u32, &mut if_reg);
        assert_eq!(if_reg & IF_STAT, IF_STAT);
        assert_ne!(ppu.read_reg(0xFF41) & STAT_LYC_EQUAL, 0);
    }

    #[test]
    fn oam_scan_keeps_first_ten_in_table_order() {
        let mut ppu = Ppu::new();
        // Place 12 sprites on line 0 (raw Y 16), plus sentinels that must
        // not count against the limit.
        for idx in 0..12 {
            let base = idx * OAM_ENTRY_LEN;
            ppu.oam[base] = 16;
            ppu.oam[base + 1] = 8 + idx as u8;
            ppu.oam[base + 2] = idx as u8;
        }
        // Sentinel entries: Y=0 and X=0.
        ppu.oam[12 * OAM_ENTRY_LEN] = 0;
        ppu.oam[13 * OAM_ENTRY_LEN] = 16;
        ppu.oam[13 * OAM_ENTRY_LEN + 1] = 0;

        run_dots(&mut ppu, 80);
        assert_eq!(ppu.sprite_count, MAX_LINE_SPRITES);
        for (i, sprite) in ppu.line_sprites.iter().enumerate() {
            assert_eq!(sprite.tile, i as u8);
        }
    }

    #[test]
    fn lower_oam_index_wins_on_overlap() {
        let mut ppu = Ppu::new();
        // Two sprites at the same position; different tiles with distinct
        // solid colors.
        for (idx, tile) in [(0usize, 1u8), (1usize, 2u8)] {
            let base = idx * OAM_ENTRY_LEN;
            ppu.oam[base] = 16;
            ppu.oam[base + 1] = 8;
            ppu.oam[base + 2] = tile;
        }
        // Tile 1: all pixels color 1. Tile 2: all pixels color 2.
        for line in 0..8 {
            ppu.vram[16 + line * 2] = 0xFF;
            ppu.vram[32 + line * 2 + 1] = 0xFF;
        }
        // Sprites on, identity sprite palette.
        ppu.write_reg(0xFF40, 0x93);
        ppu.write_reg(0xFF48, 0b1110_0100);

        run_dots(&mut ppu, 80 + 172);
        // Sprite 0 (tile 1, color 1) must be on top.
        assert_eq!(ppu.framebuffer()[0], DMG_PALETTE[1]);
    }

    #[test]
    fn disabled_lcd_holds_line_zero() {
        let mut ppu = Ppu::new();
        ppu.write_reg(0xFF40, 0x11); // LCD off
        run_dots(&mut ppu, FRAME_DOTS);
        assert_eq!(ppu.ly(), 0);
        assert!(!ppu.frame_ready());
    }
}
