mod blit;

use std::cell::RefCell;
use std::error::Error;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use log::{error, info};
use minifb::{Key, Window, WindowOptions};

use dotmatrix_core::gameboy::{Frame, GameBoy};
use dotmatrix_core::ppu::{DMG_PALETTE, SCREEN_HEIGHT, SCREEN_WIDTH};

#[derive(Parser)]
#[command(name = "dotmatrix", version, about = "Game Boy (DMG) emulator")]
struct Args {
    /// Cartridge ROM image (mapper-less, at most 32 KiB)
    rom: PathBuf,

    /// 256-byte boot image overlaid at 0x0000
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Integer window scale factor
    #[arg(long, default_value_t = 3)]
    scale: usize,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames (0 = until the window closes; headless
    /// mode treats 0 as a single frame)
    #[arg(long, default_value_t = 0)]
    frames: u64,

    /// Write a per-instruction execution trace to this file
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let rom = fs::read(&args.rom).map_err(|err| format!("reading {}: {err}", args.rom.display()))?;
    let boot = match &args.bootrom {
        Some(path) => {
            Some(fs::read(path).map_err(|err| format!("reading {}: {err}", path.display()))?)
        }
        None => None,
    };
    let mut gb = GameBoy::new(&rom, boot.as_deref())?;

    if let Some(path) = &args.trace {
        let mut out = std::io::BufWriter::new(
            fs::File::create(path).map_err(|err| format!("creating {}: {err}", path.display()))?,
        );
        gb.set_trace_sink(Box::new(move |rec| {
            let _ = writeln!(
                out,
                "{:04X} {:02X} A:{:02X} F:{:02X} BC:{:04X} DE:{:04X} HL:{:04X} SP:{:04X} cy:{}",
                rec.pc, rec.opcode, rec.a, rec.flags, rec.bc, rec.de, rec.hl, rec.sp, rec.cycles
            );
        }));
    }

    if args.headless {
        run_headless(&mut gb, args.frames)
    } else {
        run_window(&mut gb, args)
    }
}

fn run_headless(gb: &mut GameBoy, frames: u64) -> Result<(), Box<dyn Error>> {
    let frames = frames.max(1);
    for _ in 0..frames {
        gb.run_frame()?;
    }
    info!(
        "ran {} frame(s), {} cycles",
        gb.frames_published(),
        gb.cpu.cycles
    );
    Ok(())
}

fn run_window(gb: &mut GameBoy, args: &Args) -> Result<(), Box<dyn Error>> {
    let scale = args.scale.max(1);
    let width = SCREEN_WIDTH * scale;
    let height = SCREEN_HEIGHT * scale;

    let frame = Rc::new(RefCell::new([DMG_PALETTE[0]; SCREEN_WIDTH * SCREEN_HEIGHT]));
    let latest = frame.clone();
    gb.set_frame_sink(Box::new(move |fb: &Frame| *latest.borrow_mut() = *fb));

    let mut window = Window::new("dotmatrix", width, height, WindowOptions::default())?;
    window.set_target_fps(60);

    let mut scaled = vec![0u32; width * height];
    while window.is_open() && !window.is_key_down(Key::Escape) {
        gb.set_joypad(joypad_state(&window));
        gb.run_frame()?;
        blit::blit_scaled(&frame.borrow()[..], &mut scaled, SCREEN_WIDTH, scale);
        window.update_with_buffer(&scaled, width, height)?;
        if args.frames != 0 && gb.frames_published() >= args.frames {
            break;
        }
    }
    Ok(())
}

/// Sample the keyboard into the joypad wire format: low nibble directions,
/// high nibble actions, active-low.
fn joypad_state(window: &Window) -> u8 {
    let mut state = 0xFF;
    let mut press = |key: Key, bit: u8| {
        if window.is_key_down(key) {
            state &= !bit;
        }
    };
    press(Key::Right, 0x01);
    press(Key::Left, 0x02);
    press(Key::Up, 0x04);
    press(Key::Down, 0x08);
    press(Key::Z, 0x10); // A
    press(Key::X, 0x20); // B
    press(Key::Backspace, 0x40); // Select
    press(Key::Enter, 0x80); // Start
    state
}
