use std::cell::RefCell;
use std::rc::Rc;

use dotmatrix_core::gameboy::GameBoy;
use dotmatrix_core::ppu::FRAME_DOTS;

fn rom_of(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x200];
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}

#[test]
fn frame_sink_fires_once_per_frame() {
    // JR -2: spin forever.
    let rom = rom_of(&[0x18, 0xFE]);
    let mut gb = GameBoy::new(&rom, None).unwrap();

    let frames = Rc::new(RefCell::new(0u32));
    let counter = frames.clone();
    gb.set_frame_sink(Box::new(move |_| *counter.borrow_mut() += 1));

    gb.run_frame().unwrap();
    assert_eq!(*frames.borrow(), 1);
    gb.run_frame().unwrap();
    assert_eq!(*frames.borrow(), 2);
}

#[test]
fn execution_is_deterministic() {
    // A little loop that hammers registers and memory.
    let program = [
        0x3E, 0x00, // LD A, 0
        0x06, 0x20, // LD B, 0x20
        0x21, 0x00, 0xC0, // LD HL, 0xC000
        0x3C, // INC A
        0x22, // LD (HL+), A
        0x05, // DEC B
        0x20, 0xFB, // JR NZ, -5
        0x18, 0xFE, // JR -2
    ];
    let rom = rom_of(&program);

    let run = || {
        let mut gb = GameBoy::new(&rom, None).unwrap();
        gb.run_frame().unwrap();
        let regs = &gb.cpu.regs;
        let mut wram = [0u8; 0x20];
        for (i, slot) in wram.iter_mut().enumerate() {
            *slot = gb.mmu.read(0xC000 + i as u16);
        }
        (regs.af(), regs.bc(), regs.hl(), gb.cpu.cycles, wram)
    };

    assert_eq!(run(), run());
}

#[test]
fn vblank_interrupt_dispatches_to_its_vector() {
    // Enable vblank interrupts, then halt. Vector 0x40 holds INC A; RETI.
    let mut rom = rom_of(&[
        0x3E, 0x01, // LD A, 1
        0xE0, 0xFF, // LDH (0xFF), A  -> IE = vblank
        0xFB, // EI
        0x76, // HALT
        0x18, 0xFE, // JR -2
    ]);
    rom[0x40] = 0x3C; // INC A
    rom[0x41] = 0xD9; // RETI
    let mut gb = GameBoy::new(&rom, None).unwrap();
    gb.mmu.if_reg = 0;

    // Dispatch happens on the vblank-entry tick; two more ticks run the
    // handler body and the RETI.
    gb.run_frame().unwrap();
    assert!(!gb.cpu.regs.halted);
    gb.tick().unwrap();
    gb.tick().unwrap();
    assert_eq!(gb.cpu.regs.a, 2);
    assert!(gb.cpu.regs.ime);
    // RETI returned to the instruction after the HALT.
    assert_eq!(gb.cpu.regs.pc, 0x0106);
}

#[test]
fn dispatch_cost_is_twenty_cycles() {
    let rom = rom_of(&[0x00, 0x18, 0xFE]);
    let mut gb = GameBoy::new(&rom, None).unwrap();
    gb.mmu.ie_reg = 0x04;
    gb.cpu.regs.ime = true;
    gb.mmu.if_reg = 0x04; // timer pending, nothing else
    let cycles = gb.tick().unwrap();
    // One NOP plus the dispatch.
    assert_eq!(cycles, 24);
    assert_eq!(gb.cpu.regs.pc, 0x0050);
}

#[test]
fn halt_wakes_without_dispatch_when_ime_clear() {
    let rom = rom_of(&[0x76, 0x04]); // HALT; INC B
    let mut gb = GameBoy::new(&rom, None).unwrap();
    gb.mmu.ie_reg = 0x01;
    gb.mmu.if_reg = 0;
    gb.tick().unwrap(); // HALT
    assert!(gb.cpu.regs.halted);

    gb.mmu.if_reg |= 0x01;
    gb.tick().unwrap(); // idle step, then wake in interrupt service
    assert!(!gb.cpu.regs.halted);
    let pc = gb.cpu.regs.pc;
    gb.tick().unwrap();
    // Execution resumed at the instruction after HALT, no vector jump.
    assert_eq!(gb.cpu.regs.pc, pc + 1);
    assert_eq!(gb.cpu.regs.b, 1);
}

#[test]
fn trace_sink_sees_every_instruction() {
    let rom = rom_of(&[0x3E, 0x07, 0x06, 0x09, 0x18, 0xFE]);
    let mut gb = GameBoy::new(&rom, None).unwrap();

    let trace = Rc::new(RefCell::new(Vec::new()));
    let records = trace.clone();
    gb.set_trace_sink(Box::new(move |rec| records.borrow_mut().push(*rec)));

    gb.tick().unwrap();
    gb.tick().unwrap();

    let trace = trace.borrow();
    assert_eq!(trace.len(), 2);
    assert_eq!((trace[0].pc, trace[0].opcode), (0x0100, 0x3E));
    assert_eq!(trace[0].a, 0x07);
    assert_eq!((trace[1].pc, trace[1].opcode), (0x0102, 0x06));
    // B loaded with 0x09; C keeps its post-boot value.
    assert_eq!(trace[1].bc, 0x0913);
}

#[test]
fn joypad_press_requests_interrupt() {
    let rom = rom_of(&[0x18, 0xFE]);
    let mut gb = GameBoy::new(&rom, None).unwrap();
    gb.mmu.if_reg = 0;
    gb.set_joypad(0xFE); // press Right
    assert_eq!(gb.mmu.if_reg & 0x10, 0x10);
}

#[test]
fn frame_cycle_budget() {
    let rom = rom_of(&[0x18, 0xFE]);
    let mut gb = GameBoy::new(&rom, None).unwrap();
    // Measure between two publications; the first comes early because the
    // machine starts at the top of the frame, not in vblank.
    gb.run_frame().unwrap();
    let start = gb.cpu.cycles;
    gb.run_frame().unwrap();
    let elapsed = gb.cpu.cycles - start;
    // Exactly one frame of dots, modulo the final instruction overshooting
    // the boundary.
    assert!(elapsed >= FRAME_DOTS as u64 - 12 && elapsed <= FRAME_DOTS as u64 + 12);
}
