use std::ops::{
	Deref,
	DerefMut,
};

use super::{
	Bus,
	Command,
	Error,
	Hardware,
	Pins,
	Transaction,
	low_level::HOLD_MICROS,
};

const ADDRESS_WIDTH: usize = 11;
pub const WORD_COUNT: usize = 1 << ADDRESS_WIDTH;

pub const READY_POLL_LIMIT: u32 = 5000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Settings {
	/// Minimum time each clock level is held.
	pub hold_micros: u32,
	/// Number of READY/BUSY samples before a programming instruction is
	/// considered failed.
	pub ready_poll_limit: u32,
	/// Reject addresses beyond the array instead of letting them alias.
	pub strict_addresses: bool,
}

impl Settings {
	/// The hold time is a floor the chip needs, and a programming
	/// instruction has to sample READY at least once.
	pub fn validate(&self) -> Result<(), Error> {
		let checks = [
			("hold_micros", self.hold_micros, HOLD_MICROS),
			("ready_poll_limit", self.ready_poll_limit, 1),
		];
		for &(name, value, minimum) in checks.iter() {
			if value < minimum {
				return Err(Error::InvalidSetting {
					name,
					value,
					minimum,
				});
			}
		}
		Ok(())
	}
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			hold_micros: HOLD_MICROS,
			ready_poll_limit: READY_POLL_LIMIT,
			strict_addresses: true,
		}
	}
}

pub struct Reader<'a, H: Hardware> {
	remaining: usize,
	transaction: Transaction<'a, H>,
}

impl<'a, H: Hardware> Iterator for Reader<'a, H> {
	type Item = u8;

	fn next(&mut self) -> Option<Self::Item> {
		if 0 == self.remaining {
			return None;
		}
		self.remaining -= 1;
		Some(self.transaction.receive_bits(8) as u8)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

pub struct Eeprom<H: Hardware> {
	bus: Bus<H>,
	settings: Settings,
}

impl<H: Hardware> Eeprom<H> {
	pub fn new(hardware: H, pins: Pins) -> Self {
		Eeprom {
			bus: Bus::new(hardware, pins),
			settings: Settings::default(),
		}
	}

	pub fn with_settings(hardware: H, pins: Pins, settings: Settings) -> Result<Self, Error> {
		settings.validate()?;
		let mut bus = Bus::new(hardware, pins);
		bus.set_hold_micros(settings.hold_micros);
		Ok(Eeprom {
			bus,
			settings,
		})
	}

	/// (Re)bind the bus lines.
	pub fn initialize(&mut self, pins: Pins) {
		debug!("binding EEPROM to {:?}", pins);
		self.bus.set_pins(pins);
	}

	pub fn pins(&self) -> Pins {
		self.bus.pins()
	}

	pub fn hardware(&self) -> &H {
		self.bus.hardware()
	}

	pub fn hardware_mut(&mut self) -> &mut H {
		self.bus.hardware_mut()
	}

	/// Run one instruction.
	///
	/// `address` and `data` are cut down to the field widths of the
	/// instruction; only the lowest bits are sent. Returns the received data
	/// (zero for instructions without a data-out phase).
	///
	/// Programming instructions wait for the READY status before chip select
	/// is dropped; if the chip stays BUSY for `ready_poll_limit` samples the
	/// transaction is still closed but `Error::WriteTimedOut` is returned.
	pub fn execute(&mut self, command: Command, address: u16, data: u16) -> Result<u16, Error> {
		let op = command.opcode();
		let limit = self.settings.ready_poll_limit;
		trace!("{} @0x{:03x} data 0x{:02x}", op.name, address, data);

		let mut tx = self.bus.select_chip();
		tx.send_bits(op.code, op.code_len);
		tx.send_bits(address, op.address_len);
		tx.send_bits(data, op.data_in_len);
		let result = tx.receive_bits(op.data_out_len);
		let ready = if op.ready_poll {
			Some(tx.await_ready(limit))
		} else {
			None
		};
		tx.finish();

		match ready {
			Some(ready) if !ready.is_ready() => {
				warn!("{} @0x{:03x}: no READY after {} polls", op.name, address, ready.polls());
				Err(Error::WriteTimedOut {
					command,
					polls: ready.polls(),
				})
			},
			Some(ready) => {
				trace!("{} done after {} polls", op.name, ready.polls());
				Ok(result)
			},
			None => Ok(result),
		}
	}

	fn word_address(&self, address: usize) -> Result<u16, Error> {
		if address >= WORD_COUNT && self.settings.strict_addresses {
			return Err(Error::AddressOutOfRange {
				address,
				limit: WORD_COUNT,
			});
		}
		// lowest bits are sent only, higher addresses alias
		Ok(address as u16)
	}

	pub fn enable_writes(&mut self) -> Result<(), Error> {
		self.execute(Command::Ewen, 0, 0).map(|_| ())
	}

	pub fn disable_writes(&mut self) -> Result<(), Error> {
		self.execute(Command::Ewds, 0, 0).map(|_| ())
	}

	pub fn read_word(&mut self, address: usize) -> Result<u8, Error> {
		let address = self.word_address(address)?;
		self.execute(Command::Read, address, 0).map(|word| word as u8)
	}

	pub fn write_word(&mut self, address: usize, data: u8) -> Result<(), Error> {
		let address = self.word_address(address)?;
		self.execute(Command::Write, address, data.into()).map(|_| ())
	}

	// set all bits of the word to "1"
	pub fn erase_word(&mut self, address: usize) -> Result<(), Error> {
		let address = self.word_address(address)?;
		self.execute(Command::Erase, address, 0).map(|_| ())
	}

	pub fn erase_all(&mut self) -> Result<(), Error> {
		self.execute(Command::Eral, 0, 0).map(|_| ())
	}

	pub fn write_all(&mut self, data: u8) -> Result<(), Error> {
		self.execute(Command::Wral, 0, data.into()).map(|_| ())
	}

	/// Read `count` words starting at `start` in a single READ instruction;
	/// the chip continues with the next address (wrapping around at the end
	/// of the array) as long as it gets clocked.
	pub fn read_sequential(&mut self, start: usize, count: usize) -> Result<Reader<'_, H>, Error> {
		let address = self.word_address(start)?;
		let op = Command::Read.opcode();
		trace!("{} @0x{:03x} sequential, {} words", op.name, address, count);

		let mut transaction = self.bus.select_chip();
		transaction.send_bits(op.code, op.code_len);
		transaction.send_bits(address, op.address_len);

		Ok(Reader {
			remaining: count,
			transaction,
		})
	}

	pub fn read_all(&mut self) -> Result<Reader<'_, H>, Error> {
		self.read_sequential(0, WORD_COUNT)
	}

	/// Enable erase/write until the returned guard is dropped.
	pub fn start_programming(&mut self) -> Result<ProgrammingEnabled<'_, H>, Error> {
		self.enable_writes()?;
		Ok(ProgrammingEnabled(self, true))
	}
}

pub struct ProgrammingEnabled<'a, H: Hardware>(&'a mut Eeprom<H>, bool);

impl<'a, H: Hardware> ProgrammingEnabled<'a, H> {
	// already enabled; the nested guard leaves disabling to the outer one
	pub fn start_programming(&mut self) -> ProgrammingEnabled<'_, H> {
		ProgrammingEnabled(&mut *self.0, false)
	}
}

impl<'a, H: Hardware> Drop for ProgrammingEnabled<'a, H> {
	fn drop(&mut self) {
		if self.1 {
			if let Err(e) = self.0.disable_writes() {
				warn!("Couldn't disable Erase/Write mode: {}", e);
			}
		}
	}
}

impl<'a, H: Hardware> Deref for ProgrammingEnabled<'a, H> {
	type Target = Eeprom<H>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, H: Hardware> DerefMut for ProgrammingEnabled<'a, H> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::serial::Direction;
	use crate::serial::probe::{
		Probe,
		probe_pins,
	};
	use crate::sim::Chip;

	fn bits(value: u16, len: usize) -> Vec<bool> {
		(0..len).rev().map(|b| 0 != (value >> b) & 1).collect()
	}

	fn frame(parts: &[(u16, usize)]) -> Vec<bool> {
		let mut frame = vec![true];
		for &(value, len) in parts {
			frame.extend(bits(value, len));
		}
		frame
	}

	fn probed(probe: Probe) -> Eeprom<Probe> {
		Eeprom::new(probe, probe_pins())
	}

	fn simulated() -> Eeprom<Chip> {
		Eeprom::new(Chip::new(probe_pins()), probe_pins())
	}

	#[test]
	fn read_word_clocks_opcode_address_and_data() {
		let mut ee = probed(Probe::scripted(bits(0x3c, 8)));
		assert_eq!(ee.read_word(0x5a3).unwrap(), 0x3c);

		let probe = ee.hardware();
		// start bit + 21
		assert_eq!(probe.rising_edges(), 22);
		assert_eq!(probe.reads(), 8);
		assert_eq!(&probe.frames()[0][..14], &frame(&[(0b10, 2), (0x5a3, 11)])[..]);
		assert!(!probe.chip_selected());
	}

	#[test]
	fn write_word_polls_until_ready() {
		let mut ee = probed(Probe::scripted(vec![false, false, false, true]));
		ee.write_word(0x012, 0xa5).unwrap();

		let probe = ee.hardware();
		assert_eq!(probe.rising_edges(), 22);
		assert_eq!(probe.reads(), 4);
		assert_eq!(probe.frames(), &[frame(&[(0b01, 2), (0x012, 11), (0xa5, 8)])][..]);
		assert!(!probe.chip_selected());
	}

	#[test]
	fn write_word_ready_at_first_poll() {
		let mut ee = probed(Probe::new());
		ee.write_word(0, 0).unwrap();
		assert_eq!(ee.hardware().reads(), 1);
	}

	#[test]
	fn write_timeout_is_reported_after_deselect() {
		let mut ee = probed(Probe::new().idle_level(false));
		assert_eq!(ee.write_word(3, 4), Err(Error::WriteTimedOut {
			command: Command::Write,
			polls: READY_POLL_LIMIT,
		}));

		let probe = ee.hardware();
		assert_eq!(probe.reads(), 5000);
		assert_eq!(probe.rising_edges(), 22);
		assert!(!probe.chip_selected());
	}

	#[test]
	fn poll_limit_follows_settings() {
		let settings = Settings {
			ready_poll_limit: 10,
			..Settings::default()
		};
		let mut ee = Eeprom::with_settings(Probe::new().idle_level(false), probe_pins(), settings).unwrap();
		assert_eq!(ee.erase_word(0), Err(Error::WriteTimedOut {
			command: Command::Erase,
			polls: 10,
		}));
		assert_eq!(ee.hardware().reads(), 10);
	}

	#[test]
	fn enable_writes_sends_thirteen_bits() {
		let mut ee = probed(Probe::new());
		ee.enable_writes().unwrap();

		let probe = ee.hardware();
		assert_eq!(probe.rising_edges(), 14);
		assert_eq!(probe.reads(), 0);
		assert_eq!(probe.frames(), &[frame(&[(0b0011, 4), (0, 9)])][..]);
	}

	#[test]
	fn disable_writes_twice_gives_identical_frames() {
		let mut ee = probed(Probe::new());
		ee.disable_writes().unwrap();
		ee.disable_writes().unwrap();

		let probe = ee.hardware();
		let expected = frame(&[(0b0000, 4), (0, 9)]);
		assert_eq!(probe.frames(), &[expected.clone(), expected][..]);
		assert_eq!(probe.rising_edges(), 28);
		assert_eq!(probe.reads(), 0);
	}

	#[test]
	fn execute_truncates_fields() {
		let mut ee = probed(Probe::new());
		ee.execute(Command::Write, 0xf805, 0x1ff).unwrap();
		assert_eq!(ee.hardware().frames(), &[frame(&[(0b01, 2), (0x005, 11), (0xff, 8)])][..]);
	}

	#[test]
	fn strict_addresses_are_rejected() {
		let mut ee = probed(Probe::new());
		assert_eq!(ee.read_word(WORD_COUNT), Err(Error::AddressOutOfRange {
			address: WORD_COUNT,
			limit: WORD_COUNT,
		}));
		assert_eq!(ee.hardware().rising_edges(), 0);
	}

	#[test]
	fn lenient_addresses_alias() {
		let settings = Settings {
			strict_addresses: false,
			..Settings::default()
		};
		let mut ee = Eeprom::with_settings(Probe::new(), probe_pins(), settings).unwrap();
		ee.erase_word(WORD_COUNT + 5).unwrap();
		assert_eq!(ee.hardware().frames(), &[frame(&[(0b11, 2), (5, 11)])][..]);
	}

	#[test]
	fn rebinding_pins_moves_the_bus() {
		let mut ee = probed(Probe::new());
		let pins = ee.pins();
		ee.initialize(Pins::new(1, 2, 3, 4));
		ee.disable_writes().unwrap();
		assert_eq!(ee.hardware().rising_edges(), 0);
		ee.initialize(pins);
		ee.disable_writes().unwrap();
		assert_eq!(ee.hardware().rising_edges(), 14);
	}

	#[test]
	fn programming_guard_disables_on_drop() {
		let mut ee = probed(Probe::new());
		{
			let mut programming = ee.start_programming().unwrap();
			programming.write_word(1, 2).unwrap();
			{
				let mut nested = programming.start_programming();
				nested.erase_word(3).unwrap();
			}
		}
		assert_eq!(ee.hardware().frames(), &[
			frame(&[(0b0011, 4), (0, 9)]),
			frame(&[(0b01, 2), (1, 11), (2, 8)]),
			frame(&[(0b11, 2), (3, 11)]),
			frame(&[(0b0000, 4), (0, 9)]),
		][..]);
	}

	#[test]
	fn simulated_write_read_back() {
		let mut ee = simulated();
		{
			let mut programming = ee.start_programming().unwrap();
			programming.write_word(0x7ff, 0x42).unwrap();
			programming.write_word(0x000, 0x81).unwrap();
		}
		assert!(!ee.hardware().write_enabled());
		assert_eq!(ee.read_word(0x7ff).unwrap(), 0x42);
		assert_eq!(ee.read_word(0x000).unwrap(), 0x81);
		assert_eq!(ee.read_word(0x001).unwrap(), 0xff);
		assert!(ee.hardware().polls() >= 2);
		assert_eq!(ee.hardware().mode(probe_pins().data_out), Some(Direction::Input));
		assert_eq!(ee.hardware().mode(probe_pins().clock), Some(Direction::Output));
	}

	#[test]
	fn simulated_write_without_enable_is_ignored() {
		let mut ee = simulated();
		ee.write_word(10, 0x00).unwrap();
		assert_eq!(ee.read_word(10).unwrap(), 0xff);
	}

	#[test]
	fn simulated_erase_and_chip_wide_instructions() {
		let mut ee = simulated();
		let mut programming = ee.start_programming().unwrap();
		programming.write_all(0x5a).unwrap();
		assert!(programming.hardware().memory().iter().all(|&w| w == 0x5a));
		programming.erase_word(100).unwrap();
		assert_eq!(programming.read_word(100).unwrap(), 0xff);
		assert_eq!(programming.read_word(101).unwrap(), 0x5a);
		programming.erase_all().unwrap();
		assert!(programming.hardware().memory().iter().all(|&w| w == 0xff));
	}

	#[test]
	fn simulated_write_waits_for_write_cycle() {
		let mut ee = simulated();
		ee.enable_writes().unwrap();
		let before = ee.hardware().now_micros();
		ee.write_word(1, 1).unwrap();
		let chip = ee.hardware();
		assert!(!chip.busy());
		assert!(chip.now_micros() - before >= crate::sim::WRITE_CYCLE_MICROS);
	}

	#[test]
	fn simulated_slow_write_times_out() {
		let chip = Chip::new(probe_pins()).with_write_cycle_micros(20_000);
		let mut ee = Eeprom::new(chip, probe_pins());
		ee.enable_writes().unwrap();
		assert_eq!(ee.write_word(1, 1), Err(Error::WriteTimedOut {
			command: Command::Write,
			polls: READY_POLL_LIMIT,
		}));
		assert!(ee.hardware().busy());

		// the word is already latched, but the chip ignores new instructions
		// until the cycle is over: data-out keeps reporting BUSY
		assert_eq!(ee.hardware().memory()[1], 1);
		let polls = ee.hardware().polls();
		assert_eq!(ee.read_word(1).unwrap(), 0x00);
		assert_eq!(ee.hardware().polls(), polls + 8);
		assert!(ee.hardware().busy());

		ee.hardware_mut().sleep_micros(20_000);
		assert!(!ee.hardware().busy());
		assert_eq!(ee.read_word(1).unwrap(), 1);
	}

	#[test]
	fn settings_below_hardware_floor_are_rejected() {
		let settings = Settings {
			hold_micros: 0,
			..Settings::default()
		};
		assert_eq!(Eeprom::with_settings(Probe::new(), probe_pins(), settings).err(), Some(Error::InvalidSetting {
			name: "hold_micros",
			value: 0,
			minimum: HOLD_MICROS,
		}));

		let settings = Settings {
			ready_poll_limit: 0,
			..Settings::default()
		};
		assert_eq!(Eeprom::with_settings(Probe::new(), probe_pins(), settings).err(), Some(Error::InvalidSetting {
			name: "ready_poll_limit",
			value: 0,
			minimum: 1,
		}));
	}

	#[test]
	fn longer_hold_applies_to_every_clock_level() {
		let settings = Settings {
			hold_micros: 3,
			ready_poll_limit: 1,
			..Settings::default()
		};
		let mut ee = Eeprom::with_settings(Probe::new(), probe_pins(), settings).unwrap();
		ee.read_word(0).unwrap();
		// 22 pulses, two hold periods each
		assert_eq!(ee.hardware().slept_micros(), 22 * 2 * 3);
	}

	#[test]
	fn sequential_read_wraps_around() {
		let mut memory = vec![0u8; WORD_COUNT];
		for (address, word) in memory.iter_mut().enumerate() {
			*word = address as u8;
		}
		let chip = Chip::new(probe_pins()).with_memory(&memory);
		let mut ee = Eeprom::new(chip, probe_pins());

		let words: Vec<u8> = ee.read_sequential(WORD_COUNT - 2, 4).unwrap().collect();
		assert_eq!(words, vec![0xfe, 0xff, 0x00, 0x01]);

		let all: Vec<u8> = ee.read_all().unwrap().collect();
		assert_eq!(all, memory);
		assert_eq!(ee.hardware().clock_pulses(), 14 + 4 * 8 + 14 + WORD_COUNT * 8);
		assert_eq!(ee.hardware().frames().len(), 2);
		assert_eq!(&ee.hardware().frames()[0][..14], &frame(&[(0b10, 2), (0x7fe, 11)])[..]);
	}
}
