use dotmatrix_core::cpu::Cpu;
use dotmatrix_core::mmu::Mmu;

fn machine_with(program: &[u8]) -> (Cpu, Mmu) {
    let mut mmu = Mmu::new();
    mmu.load_rom(program).unwrap();
    (Cpu::new(), mmu)
}

#[test]
fn load_then_halt_program() {
    // LD A, 0x42; HALT
    let (mut cpu, mut mmu) = machine_with(&[0x3E, 0x42, 0x76]);
    let first = cpu.step(&mut mmu).unwrap();
    let second = cpu.step(&mut mmu).unwrap();
    assert_eq!(first + second, 12);
    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(cpu.regs.pc, 3);
    assert!(cpu.regs.halted);
    assert_eq!(cpu.cycles, 12);
}

#[test]
fn register_to_register_moves() {
    // LD B, 0x11; LD C, B; LD A, C
    let (mut cpu, mut mmu) = machine_with(&[0x06, 0x11, 0x48, 0x79]);
    cpu.step(&mut mmu).unwrap();
    cpu.step(&mut mmu).unwrap();
    cpu.step(&mut mmu).unwrap();
    assert_eq!((cpu.regs.b, cpu.regs.c, cpu.regs.a), (0x11, 0x11, 0x11));
}

#[test]
fn hl_indirect_access_and_post_increment() {
    // LD HL, 0xC000; LD (HL+), A; LD (HL), A
    let (mut cpu, mut mmu) = machine_with(&[0x21, 0x00, 0xC0, 0x22, 0x77]);
    cpu.regs.a = 0x5A;
    assert_eq!(cpu.step(&mut mmu).unwrap(), 12);
    assert_eq!(cpu.step(&mut mmu).unwrap(), 8);
    assert_eq!(cpu.regs.hl(), 0xC001);
    assert_eq!(cpu.step(&mut mmu).unwrap(), 8);
    assert_eq!(mmu.read(0xC000), 0x5A);
    assert_eq!(mmu.read(0xC001), 0x5A);
}

#[test]
fn sixteen_bit_arithmetic_half_carry_is_bit_eleven() {
    // LD HL, 0x0FFF; LD BC, 0x0001; ADD HL, BC
    let (mut cpu, mut mmu) = machine_with(&[0x21, 0xFF, 0x0F, 0x01, 0x01, 0x00, 0x09]);
    cpu.regs.f.set_zero(true);
    cpu.step(&mut mmu).unwrap();
    cpu.step(&mut mmu).unwrap();
    assert_eq!(cpu.step(&mut mmu).unwrap(), 8);
    assert_eq!(cpu.regs.hl(), 0x1000);
    assert!(cpu.regs.f.half_carry());
    assert!(!cpu.regs.f.carry());
    // ADD HL leaves Z alone.
    assert!(cpu.regs.f.zero());
}

#[test]
fn store_sp_writes_both_bytes() {
    // LD (0xC100), SP
    let (mut cpu, mut mmu) = machine_with(&[0x08, 0x00, 0xC1]);
    cpu.regs.sp = 0xBEEF;
    assert_eq!(cpu.step(&mut mmu).unwrap(), 20);
    assert_eq!(mmu.read16(0xC100), 0xBEEF);
}

#[test]
fn compare_leaves_accumulator_untouched() {
    // CP 0x90 with A=0x90
    let (mut cpu, mut mmu) = machine_with(&[0xFE, 0x90]);
    cpu.regs.a = 0x90;
    cpu.step(&mut mmu).unwrap();
    assert_eq!(cpu.regs.a, 0x90);
    assert!(cpu.regs.f.zero());
    assert!(cpu.regs.f.subtract());
}

#[test]
fn extended_ops_on_memory_operand() {
    // LD HL, 0xC000; SET 3, (HL); BIT 3, (HL)
    let (mut cpu, mut mmu) = machine_with(&[0x21, 0x00, 0xC0, 0xCB, 0xDE, 0xCB, 0x5E]);
    cpu.step(&mut mmu).unwrap();
    cpu.step(&mut mmu).unwrap(); // CB fetch
    cpu.step(&mut mmu).unwrap(); // SET
    assert_eq!(mmu.read(0xC000), 0x08);
    cpu.step(&mut mmu).unwrap(); // CB fetch
    cpu.step(&mut mmu).unwrap(); // BIT
    assert!(!cpu.regs.f.zero());
}

#[test]
fn rst_jumps_to_fixed_vector() {
    let (mut cpu, mut mmu) = machine_with(&[0xEF]); // RST 0x28
    assert_eq!(cpu.step(&mut mmu).unwrap(), 16);
    assert_eq!(cpu.regs.pc, 0x0028);
    assert_eq!(mmu.read16(cpu.regs.sp), 0x0001);
}

#[test]
fn conditional_return_cycle_split() {
    // RET NC twice: first with carry set (not taken), then clear.
    let (mut cpu, mut mmu) = machine_with(&[0xD0, 0xD0]);
    cpu.regs.sp = 0xC000;
    mmu.write16(0xC000, 0x1234);
    cpu.regs.f.set_carry(true);
    assert_eq!(cpu.step(&mut mmu).unwrap(), 8);
    assert_eq!(cpu.regs.pc, 0x0001);
    cpu.regs.f.set_carry(false);
    assert_eq!(cpu.step(&mut mmu).unwrap(), 20);
    assert_eq!(cpu.regs.pc, 0x1234);
}

#[test]
fn carry_chain_through_adc() {
    // ADD 0xFF (sets carry); ADC 0x00 folds the carry back in.
    let (mut cpu, mut mmu) = machine_with(&[0xC6, 0xFF, 0xCE, 0x00]);
    cpu.regs.a = 0x01;
    cpu.step(&mut mmu).unwrap();
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.f.carry());
    cpu.step(&mut mmu).unwrap();
    assert_eq!(cpu.regs.a, 0x01);
    assert!(!cpu.regs.f.carry());
}

#[test]
fn relative_jump_backwards() {
    // NOP; NOP; JR -3 lands on the second NOP.
    let (mut cpu, mut mmu) = machine_with(&[0x00, 0x00, 0x18, 0xFD]);
    cpu.step(&mut mmu).unwrap();
    cpu.step(&mut mmu).unwrap();
    assert_eq!(cpu.step(&mut mmu).unwrap(), 12);
    assert_eq!(cpu.regs.pc, 0x0001);
}
