use log::info;

use crate::cpu::{Cpu, StepError};
use crate::mmu::Mmu;
use crate::ppu::{FRAME_DOTS, FRAME_PIXELS};

pub use crate::mmu::LoadError;

/// One published frame: 160x144 pixels as 0x00RRGGBB, row-major.
pub type Frame = [u32; FRAME_PIXELS];

/// Snapshot of one executed instruction, handed to the trace sink.
#[derive(Debug, Clone, Copy)]
pub struct TraceRecord {
    /// PC of the instruction's first byte.
    pub pc: u16,
    /// The byte fetched at that PC (0xCB for the escape step itself).
    pub opcode: u8,
    pub a: u8,
    pub flags: u8,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub sp: u16,
    /// Cycles the step took, interrupt dispatch included.
    pub cycles: u32,
}

/// The assembled machine: CPU, memory bus and the devices behind it.
///
/// [`GameBoy::tick`] is the single unit of progress. It runs one CPU step,
/// advances the PPU by the same number of cycles, services interrupts (and
/// advances the PPU through the dispatch cost too), then delivers any
/// completed frame to the frame sink.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    frame_sink: Option<Box<dyn FnMut(&Frame)>>,
    trace_sink: Option<Box<dyn FnMut(&TraceRecord)>>,
    frames_published: u64,
}

impl GameBoy {
    /// Build a machine with the cartridge image loaded and, when given, a
    /// 256-byte boot image overlaid at 0x0000.
    pub fn new(rom: &[u8], boot: Option<&[u8]>) -> Result<Self, LoadError> {
        let mut mmu = Mmu::new();
        mmu.load_rom(rom)?;
        let mut cpu = Cpu::new();
        match boot {
            Some(image) => mmu.load_boot(image)?,
            // Without a boot image, start where the boot code would hand
            // over: cartridge entry at 0x0100 with post-boot registers.
            None => {
                cpu.regs.a = 0x01;
                cpu.regs.set_bc(0x0013);
                cpu.regs.set_de(0x00D8);
                cpu.regs.set_hl(0x014D);
                cpu.regs.f = crate::registers::Flags::from_bits(0xB0);
                cpu.regs.pc = 0x0100;
            }
        }
        info!(
            "machine ready, {} byte ROM, boot image {}",
            rom.len(),
            if boot.is_some() { "present" } else { "absent" }
        );
        Ok(Self {
            cpu,
            mmu,
            frame_sink: None,
            trace_sink: None,
            frames_published: 0,
        })
    }

    /// Register a callback invoked exactly once per completed frame, at
    /// vblank entry.
    pub fn set_frame_sink(&mut self, sink: Box<dyn FnMut(&Frame)>) {
        self.frame_sink = Some(sink);
    }

    /// Register a callback invoked after every tick with the executed
    /// instruction's location and the resulting register state.
    pub fn set_trace_sink(&mut self, sink: Box<dyn FnMut(&TraceRecord)>) {
        self.trace_sink = Some(sink);
    }

    /// Inject the current joypad state (low nibble directions, high nibble
    /// actions, active-low).
    pub fn set_joypad(&mut self, state: u8) {
        self.mmu.joypad.set_state(state, &mut self.mmu.if_reg);
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// Run one instruction plus its consequences. Returns the total cycles
    /// consumed.
    pub fn tick(&mut self) -> Result<u32, StepError> {
        let pc = self.cpu.regs.pc;
        let opcode = self.mmu.read(pc);

        let mut cycles = self.cpu.step(&mut self.mmu)?;
        self.mmu.ppu.step(cycles, &mut self.mmu.if_reg);

        let dispatch = self.cpu.service_interrupts(&mut self.mmu);
        if dispatch > 0 {
            self.mmu.ppu.step(dispatch, &mut self.mmu.if_reg);
            cycles += dispatch;
        }

        if let Some(sink) = self.trace_sink.as_mut() {
            let regs = &self.cpu.regs;
            sink(&TraceRecord {
                pc,
                opcode,
                a: regs.a,
                flags: regs.f.bits(),
                bc: regs.bc(),
                de: regs.de(),
                hl: regs.hl(),
                sp: regs.sp,
                cycles,
            });
        }

        if self.mmu.ppu.frame_ready() {
            if let Some(sink) = self.frame_sink.as_mut() {
                sink(self.mmu.ppu.framebuffer());
            }
            self.mmu.ppu.acknowledge_frame();
            self.frames_published += 1;
        }

        Ok(cycles)
    }

    /// Tick until one frame has been published. With the LCD disabled no
    /// frame ever completes; in that case this returns after two frames'
    /// worth of cycles.
    pub fn run_frame(&mut self) -> Result<(), StepError> {
        let start = self.frames_published;
        let mut budget: u64 = 2 * FRAME_DOTS as u64;
        while self.frames_published == start && budget > 0 {
            budget = budget.saturating_sub(self.tick()? as u64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_image_takes_priority_at_reset() {
        let rom = [0x00u8; 0x200];
        let boot = [0x3Cu8; 0x100]; // INC A everywhere
        let mut gb = GameBoy::new(&rom, Some(&boot)).unwrap();
        assert_eq!(gb.cpu.regs.pc, 0x0000);
        gb.tick().unwrap();
        assert_eq!(gb.cpu.regs.a, 1);
    }

    #[test]
    fn no_boot_image_starts_at_cartridge_entry() {
        let rom = [0x00u8; 0x200];
        let gb = GameBoy::new(&rom, None).unwrap();
        assert_eq!(gb.cpu.regs.pc, 0x0100);
        assert_eq!(gb.cpu.regs.a, 0x01);
    }
}
