//! Protocol for Microchip 93C86, a 16-kbit EEPROM (organized as 2048 x 8bit,
//! ORG pin low)
//!
//! Microwire-style bus: separate DATA IN and DATA OUT pins plus CHIP SELECT
//! and CLOCK. The chip latches DATA IN on the rising CLK edge and shifts out
//! data on it as well.
//!
//! Instructions:
//! - Startbit: "1" (clocked in right after raising CS)
//! - 2-bit Opcode
//! - 11-bit Address
//!
//! READ and WRITE have a DATA phase following (recv or send) for 8 bits.
//!
//! Opcodes: (@ address)
//! - 0b10: READ 8-bits from address, recv DATA (after a dummy "0" bit)
//! - 0b01: WRITE 8-bits to address, send DATA
//! - 0b11: ERASE at address (set all bits to "1")
//! - 0b00 @ 0b00?????????: EWDS (erase/write disable)
//! - 0b00 @ 0b01?????????: WRAL (write all), send DATA
//! - 0b00 @ 0b10?????????: ERAL (erase all)
//! - 0b00 @ 0b11?????????: EWEN (erase/write enable)
//!
//! After ERASE/WRITE/ERAL/WRAL the chip holds DATA OUT low while its
//! self-timed programming cycle runs (BUSY) and releases it when READY.
//! The chip powers up with erase/write disabled.

mod error;
mod hardware;
mod low_level;
mod opcode;
mod operations;
#[cfg(test)]
pub(crate) mod probe;

pub use self::error::Error;

pub use self::hardware::{
	Direction,
	Hardware,
	Pin,
	Pins,
	reliable_sleep,
};

pub use self::low_level::{
	Bus,
	HOLD_MICROS,
	Ready,
	Transaction,
};

pub use self::opcode::{
	Command,
	Opcode,
};

pub use self::operations::{
	Eeprom,
	ProgrammingEnabled,
	READY_POLL_LIMIT,
	Reader,
	Settings,
	WORD_COUNT,
};
