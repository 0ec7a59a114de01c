use std::ops::{
	Deref,
	DerefMut,
};

use super::{
	Direction,
	Hardware,
	Pins,
};

/// Minimum time each clock level is held. The 93C86 is fully static, so this
/// is only a lower bound.
pub const HOLD_MICROS: u32 = 1;

/// Outcome of polling the READY/BUSY status on data-out.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ready {
	Ready {
		polls: u32,
	},
	TimedOut {
		polls: u32,
	},
}

impl Ready {
	pub fn is_ready(self) -> bool {
		match self {
			Ready::Ready { .. } => true,
			Ready::TimedOut { .. } => false,
		}
	}

	pub fn polls(self) -> u32 {
		match self {
			Ready::Ready { polls } => polls,
			Ready::TimedOut { polls } => polls,
		}
	}
}

/// The four bus lines and the hardware driving them.
pub struct Bus<H: Hardware> {
	hardware: H,
	pins: Pins,
	hold_micros: u32,
}

impl<H: Hardware> Bus<H> {
	pub fn new(hardware: H, pins: Pins) -> Self {
		Bus {
			hardware,
			pins,
			hold_micros: HOLD_MICROS,
		}
	}

	pub fn pins(&self) -> Pins {
		self.pins
	}

	pub fn set_pins(&mut self, pins: Pins) {
		self.pins = pins;
	}

	pub fn set_hold_micros(&mut self, micros: u32) {
		self.hold_micros = micros;
	}

	pub fn hardware(&self) -> &H {
		&self.hardware
	}

	pub fn hardware_mut(&mut self) -> &mut H {
		&mut self.hardware
	}

	fn hold(&mut self) {
		self.hardware.sleep_micros(self.hold_micros);
	}

	fn set_clock(&mut self, level: bool) {
		let clock = self.pins.clock;
		self.hardware.write_pin(clock, level);
	}

	pub fn pulse_clock(&mut self) {
		self.set_clock(true);
		self.hold();
		self.set_clock(false);
		self.hold();
	}

	// chip samples data-in on the rising CLK edge
	pub fn send_bit(&mut self, value: bool) {
		let data_in = self.pins.data_in;
		self.hardware.write_pin(data_in, value);
		self.pulse_clock();
	}

	// chip shifts out the next bit on the rising CLK edge; read it before
	// dropping CLK again
	pub fn receive_bit(&mut self) -> bool {
		self.set_clock(true);
		self.hold();
		let data_out = self.pins.data_out;
		let result = self.hardware.read_pin(data_out);
		self.set_clock(false);
		self.hold();
		result
	}

	// send `len` lowest bits from value, starting with highest bit
	pub fn send_bits(&mut self, value: u16, len: usize) {
		assert!(len <= 16);
		for bit in (0..len).rev() {
			self.send_bit(0 != (value >> bit) & 1);
		}
	}

	// receive `len` bits, first one is the highest
	pub fn receive_bits(&mut self, len: usize) -> u16 {
		assert!(len <= 16);
		let mut result = 0u16;
		for _ in 0..len {
			result <<= 1;
			if self.receive_bit() {
				result |= 1;
			}
		}
		result
	}

	fn configure_pins(&mut self) {
		for &pin in self.pins.outputs().iter() {
			self.hardware.set_pin_mode(pin, Direction::Output);
		}
		let data_out = self.pins.data_out;
		self.hardware.set_pin_mode(data_out, Direction::Input);
	}

	/// Raise CS and clock in the start bit; the returned transaction lowers
	/// CS again when dropped.
	pub fn select_chip(&mut self) -> Transaction<'_, H> {
		self.configure_pins();

		let chip_select = self.pins.chip_select;
		self.hardware.write_pin(chip_select, true);
		self.send_bit(true);

		Transaction(self)
	}

	fn deselect_chip(&mut self) {
		let chip_select = self.pins.chip_select;
		self.hardware.write_pin(chip_select, false);
	}
}

pub struct Transaction<'a, H: Hardware>(&'a mut Bus<H>);

impl<'a, H: Hardware> Transaction<'a, H> {
	// after a programming instruction the chip pulls data-out low while
	// BUSY and releases it once the self-timed cycle is done. CS has to
	// stay up while polling.
	pub fn await_ready(&mut self, limit: u32) -> Ready {
		let data_out = self.0.pins.data_out;
		for poll in 0..limit {
			if self.0.hardware.read_pin(data_out) {
				return Ready::Ready { polls: poll + 1 };
			}
			self.0.hold();
		}
		Ready::TimedOut { polls: limit }
	}

	pub fn finish(self) {
		// deselect happens in drop
	}
}

impl<'a, H: Hardware> Drop for Transaction<'a, H> {
	fn drop(&mut self) {
		self.0.deselect_chip();
	}
}

impl<'a, H: Hardware> Deref for Transaction<'a, H> {
	type Target = Bus<H>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, H: Hardware> DerefMut for Transaction<'a, H> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}
