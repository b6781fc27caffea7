use log::{debug, warn};

use crate::joypad::Joypad;
use crate::ppu::Ppu;

const ROM_SIZE: usize = 0x8000;
const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;
const IO_SIZE: usize = 0x80;

/// Length of the power-on boot image overlaid at 0x0000.
pub const BOOT_IMAGE_SIZE: usize = 0x100;

const OAM_BASE: u16 = 0xFE00;
const OAM_DMA_LEN: u16 = 0xA0;

/// Value the DMA register holds whenever no transfer has been requested;
/// writing it back is a no-op.
pub const DMA_IDLE: u8 = 0xFF;

/// Problems surfaced while loading the cartridge or boot image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    RomEmpty,
    RomTooLarge { len: usize },
    BootImageSize { expected: usize, actual: usize },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::RomEmpty => write!(f, "ROM image is empty"),
            LoadError::RomTooLarge { len } => {
                write!(f, "ROM image is {len} bytes; at most {ROM_SIZE} fit without a mapper")
            }
            LoadError::BootImageSize { expected, actual } => {
                write!(f, "boot image must be exactly {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// The memory bus.
///
/// Owns every addressable region and the devices behind them, and routes
/// CPU reads and writes by address range. The PPU owns VRAM and OAM; the
/// bus forwards those ranges and the LCD register window to it.
pub struct Mmu {
    rom: [u8; ROM_SIZE],
    wram: [u8; WRAM_SIZE],
    hram: [u8; HRAM_SIZE],
    /// Backing store for I/O ports without a dedicated device (serial,
    /// timer, audio). Reads return the last written value.
    io: [u8; IO_SIZE],

    pub ppu: Ppu,
    pub joypad: Joypad,

    /// Interrupt request register (0xFF0F). Upper three bits read as 1.
    pub if_reg: u8,
    /// Interrupt enable register (0xFFFF).
    pub ie_reg: u8,

    dma: u8,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            rom: [0; ROM_SIZE],
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            io: [0; IO_SIZE],
            ppu: Ppu::new(),
            joypad: Joypad::new(),
            if_reg: 0xE1,
            ie_reg: 0,
            dma: DMA_IDLE,
        }
    }

    /// Copy a cartridge image into the fixed 32 KiB ROM window.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), LoadError> {
        if image.is_empty() {
            return Err(LoadError::RomEmpty);
        }
        if image.len() > ROM_SIZE {
            return Err(LoadError::RomTooLarge { len: image.len() });
        }
        self.rom[..image.len()].copy_from_slice(image);
        debug!("loaded {} byte ROM image", image.len());
        Ok(())
    }

    /// Overlay a 256-byte boot image over the start of ROM. Applied once at
    /// load time; the overlaid cartridge bytes are not restored later, so
    /// the boot code is expected to jump into the cartridge past 0x0100.
    pub fn load_boot(&mut self, image: &[u8]) -> Result<(), LoadError> {
        if image.len() != BOOT_IMAGE_SIZE {
            return Err(LoadError::BootImageSize {
                expected: BOOT_IMAGE_SIZE,
                actual: image.len(),
            });
        }
        self.rom[..BOOT_IMAGE_SIZE].copy_from_slice(image);
        Ok(())
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.rom[addr as usize],
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize],
            // No cartridge RAM without a mapper; open bus.
            0xA000..=0xBFFF => 0xFF,
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            // Echo RAM mirrors 0xC000-0xDDFF.
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read(),
            0xFF0F => 0xE0 | self.if_reg,
            0xFF46 => self.dma,
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFF00..=0xFF7F => self.io[(addr - 0xFF00) as usize],
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                // Mapper control writes on a mapper-less cartridge.
                warn!("ignored ROM write of {val:#04x} to {addr:#06x}");
            }
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize] = val,
            0xA000..=0xBFFF => {}
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.joypad.write(val),
            0xFF0F => self.if_reg = val,
            0xFF46 => self.oam_dma(val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF00..=0xFF7F => self.io[(addr - 0xFF00) as usize] = val,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
        }
    }

    pub fn read16(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | (self.read(addr.wrapping_add(1)) as u16) << 8
    }

    pub fn write16(&mut self, addr: u16, val: u16) {
        self.write(addr, val as u8);
        self.write(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// OAM DMA: copy 160 bytes from `page << 8` into OAM in one shot. The
    /// register immediately returns to its idle value, so a read-back never
    /// observes an in-flight transfer.
    fn oam_dma(&mut self, page: u8) {
        if page == DMA_IDLE {
            return;
        }
        let src = (page as u16) << 8;
        debug!("OAM DMA from {src:#06x}");
        for i in 0..OAM_DMA_LEN {
            let byte = self.read(src.wrapping_add(i));
            self.ppu.oam[i as usize] = byte;
        }
        self.dma = DMA_IDLE;
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
