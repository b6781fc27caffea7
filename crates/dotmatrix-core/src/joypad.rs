// JOYP select bits: a cleared bit routes that button group onto the low
// nibble (gbdev.io/pandocs/Joypad_Input.html).
const SELECT_DIRECTIONS: u8 = 0x10;
const SELECT_ACTIONS: u8 = 0x20;

const IF_JOYPAD: u8 = 0x10;

/// The joypad register at 0xFF00.
///
/// Button state is active-low throughout: a 0 bit means pressed, matching
/// both the hardware register and the raw state byte injected by the
/// frontend (low nibble directions, high nibble actions).
pub struct Joypad {
    /// Select bits 4-5 as last written by the CPU.
    select: u8,
    /// Right/Left/Up/Down in bits 0-3, active-low.
    directions: u8,
    /// A/B/Select/Start in bits 0-3, active-low.
    actions: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: SELECT_DIRECTIONS | SELECT_ACTIONS,
            directions: 0x0F,
            actions: 0x0F,
        }
    }

    /// Read JOYP: unused bits 6-7 read 1, select bits read back, and the low
    /// nibble reflects the selected button group(s). Selecting both groups
    /// ANDs them, as on hardware.
    pub fn read(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & SELECT_DIRECTIONS == 0 {
            low &= self.directions;
        }
        if self.select & SELECT_ACTIONS == 0 {
            low &= self.actions;
        }
        0xC0 | self.select | low
    }

    /// CPU write to JOYP: only the select bits are writable.
    pub fn write(&mut self, val: u8) {
        self.select = val & (SELECT_DIRECTIONS | SELECT_ACTIONS);
    }

    /// Inject a full joypad state from the frontend: low nibble directions,
    /// high nibble actions, active-low. Any button edge from released to
    /// pressed raises the joypad interrupt request.
    pub fn set_state(&mut self, raw: u8, if_reg: &mut u8) {
        let directions = raw & 0x0F;
        let actions = (raw >> 4) & 0x0F;

        // A 1 -> 0 transition on any line is a new press.
        let pressed = (self.directions & !directions) | (self.actions & !actions);
        if pressed != 0 {
            *if_reg |= IF_JOYPAD;
        }

        self.directions = directions;
        self.actions = actions;
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
