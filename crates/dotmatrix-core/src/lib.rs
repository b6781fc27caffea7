//! Cycle-driven Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/MMU/PPU and
//! the interrupt/DMA glue between them). Frontends live in separate crates
//! and drive the core via the [`gameboy`] facade, injecting input through the
//! joypad interface and reading completed frames back out through a sink.

/// LR35902 CPU execute engine and interrupt dispatch.
pub mod cpu;

/// Pure opcode decoding: byte -> tagged instruction descriptor.
pub mod decode;

/// High-level facade that wires the CPU, MMU and PPU into a single machine.
pub mod gameboy;

/// Joypad input register and button-press interrupt behavior.
pub mod joypad;

/// Memory map and hardware plumbing, including OAM DMA.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// CPU register file: named 8-bit registers, 16-bit pair views, flags.
pub mod registers;
