use dotmatrix_core::mmu::{DMA_IDLE, Mmu};

#[test]
fn writable_regions_round_trip() {
    let mut mmu = Mmu::new();
    for (addr, val) in [
        (0x8000u16, 0x11u8), // VRAM start
        (0x9FFF, 0x22),      // VRAM end
        (0xC000, 0x33),      // WRAM start
        (0xDFFF, 0x44),      // WRAM end
        (0xFE00, 0x55),      // OAM start
        (0xFE9F, 0x66),      // OAM end
        (0xFF80, 0x77),      // HRAM start
        (0xFFFE, 0x88),      // HRAM end
    ] {
        mmu.write(addr, val);
        assert_eq!(mmu.read(addr), val, "round trip at {addr:#06x}");
    }
}

#[test]
fn unusable_region_reads_open_bus() {
    let mut mmu = Mmu::new();
    mmu.write(0xFEA0, 0x42);
    assert_eq!(mmu.read(0xFEA0), 0xFF);
    assert_eq!(mmu.read(0xA000), 0xFF);
}

#[test]
fn io_ports_without_devices_store_bytes() {
    let mut mmu = Mmu::new();
    // Serial data and timer counter have no device behind them.
    mmu.write(0xFF01, 0xAB);
    assert_eq!(mmu.read(0xFF01), 0xAB);
    mmu.write(0xFF05, 0x12);
    assert_eq!(mmu.read(0xFF05), 0x12);
}

#[test]
fn oam_dma_copies_a_full_page_slice() {
    let mut mmu = Mmu::new();
    for i in 0..0xA0u16 {
        mmu.write(0xC000 + i, 0x80u8.wrapping_add(i as u8));
    }
    mmu.write(0xFE00, 0x00);

    mmu.write(0xFF46, 0xC0);
    for i in 0..0xA0u16 {
        assert_eq!(mmu.read(0xFE00 + i), 0x80u8.wrapping_add(i as u8));
    }
    // The register reads back its idle value, never the page.
    assert_eq!(mmu.read(0xFF46), DMA_IDLE);
}

#[test]
fn dma_idle_write_is_a_no_op() {
    let mut mmu = Mmu::new();
    mmu.write(0xFE00, 0x42);
    mmu.write(0xFF46, DMA_IDLE);
    assert_eq!(mmu.read(0xFE00), 0x42);
}

#[test]
fn dma_from_vram_uses_bus_reads() {
    let mut mmu = Mmu::new();
    mmu.write(0x8000, 0x99);
    mmu.write(0xFF46, 0x80);
    assert_eq!(mmu.read(0xFE00), 0x99);
}

#[test]
fn lcd_registers_route_to_the_ppu() {
    let mut mmu = Mmu::new();
    mmu.write(0xFF42, 0x13); // SCY
    assert_eq!(mmu.read(0xFF42), 0x13);
    // LY is read-only through the bus.
    mmu.write(0xFF44, 0x99);
    assert_eq!(mmu.read(0xFF44), 0x00);
}

#[test]
fn interrupt_registers() {
    let mut mmu = Mmu::new();
    mmu.write(0xFFFF, 0x15);
    assert_eq!(mmu.read(0xFFFF), 0x15);
    mmu.write(0xFF0F, 0x02);
    assert_eq!(mmu.read(0xFF0F), 0xE2);
}
