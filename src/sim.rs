//! Behavioural model of a 93C86 in x8 organisation (2048 x 8 bit).
//!
//! The model watches the pins like the real chip does: instructions are
//! latched on rising clock edges while chip select is high, READ drives a
//! dummy zero followed by the data bits (and keeps going with the next
//! address as long as it gets clocked), programming instructions start a
//! self-timed cycle during which data-out reports BUSY (low).
//!
//! Time only passes through `Hardware::sleep_micros`, so a transaction never
//! actually waits.

use std::collections::HashMap;

use crate::serial::{
	Direction,
	Hardware,
	Pin,
	Pins,
	WORD_COUNT,
};

const ADDRESS_BITS: usize = 11;
const ADDRESS_MASK: usize = WORD_COUNT - 1;
// start bit excluded
const INSTRUCTION_BITS: usize = 2 + ADDRESS_BITS;

/// Duration of the self-timed erase/write cycle.
pub const WRITE_CYCLE_MICROS: u64 = 2000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Program {
	Write(usize),
	WriteAll,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
	// waiting for the start bit
	Standby,
	Instruction {
		bits: u16,
		count: usize,
	},
	DataIn {
		program: Program,
		bits: u8,
		count: usize,
	},
	Reading {
		address: usize,
		bit: usize,
	},
	// instruction complete, further clocks are ignored until CS drops
	Complete,
}

pub struct Chip {
	pins: Pins,
	levels: HashMap<Pin, bool>,
	modes: HashMap<Pin, Direction>,
	memory: Vec<u8>,
	write_enabled: bool,
	state: State,
	output: bool,
	now: u64,
	busy_until: u64,
	write_cycle: u64,
	clock_pulses: usize,
	polls: usize,
	frames: Vec<Vec<bool>>,
}

impl Chip {
	/// A chip as shipped: erased and write protected.
	pub fn new(pins: Pins) -> Self {
		Chip {
			pins,
			levels: HashMap::new(),
			modes: HashMap::new(),
			memory: vec![0xff; WORD_COUNT],
			write_enabled: false,
			state: State::Standby,
			output: true,
			now: 0,
			busy_until: 0,
			write_cycle: WRITE_CYCLE_MICROS,
			clock_pulses: 0,
			polls: 0,
			frames: Vec::new(),
		}
	}

	pub fn with_memory(mut self, memory: &[u8]) -> Self {
		assert_eq!(memory.len(), WORD_COUNT);
		self.memory.copy_from_slice(memory);
		self
	}

	pub fn with_write_cycle_micros(mut self, micros: u64) -> Self {
		self.write_cycle = micros;
		self
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn write_enabled(&self) -> bool {
		self.write_enabled
	}

	pub fn busy(&self) -> bool {
		self.now < self.busy_until
	}

	pub fn now_micros(&self) -> u64 {
		self.now
	}

	pub fn mode(&self, pin: Pin) -> Option<Direction> {
		self.modes.get(&pin).cloned()
	}

	/// Rising clock edges seen while selected.
	pub fn clock_pulses(&self) -> usize {
		self.clock_pulses
	}

	/// Status samples of data-out, i.e. reads outside of a READ data phase.
	pub fn polls(&self) -> usize {
		self.polls
	}

	/// Data-in level at every rising clock edge, one entry per CS period.
	pub fn frames(&self) -> &[Vec<bool>] {
		&self.frames
	}

	fn level(&self, pin: Pin) -> bool {
		self.levels.get(&pin).cloned().unwrap_or(false)
	}

	fn selected(&self) -> bool {
		self.level(self.pins.chip_select)
	}

	fn start_program(&mut self, program: Program, data: u8) {
		if !self.write_enabled {
			debug!("sim: ignoring programming instruction, writes disabled");
			return;
		}
		match program {
			Program::Write(address) => {
				trace!("sim: write @0x{:03x} = 0x{:02x}", address, data);
				self.memory[address] = data;
			},
			Program::WriteAll => {
				trace!("sim: write all = 0x{:02x}", data);
				for word in self.memory.iter_mut() {
					*word = data;
				}
			},
		}
		self.busy_until = self.now + self.write_cycle;
	}

	fn decode(&mut self, instruction: u16) -> State {
		let address = instruction as usize & ADDRESS_MASK;
		match instruction >> ADDRESS_BITS {
			0b10 => {
				trace!("sim: READ @0x{:03x}", address);
				// dummy zero precedes the data
				self.output = false;
				State::Reading {
					address,
					bit: 0,
				}
			},
			0b01 => State::DataIn {
				program: Program::Write(address),
				bits: 0,
				count: 0,
			},
			0b11 => {
				self.start_program(Program::Write(address), 0xff);
				State::Complete
			},
			_ => match address >> (ADDRESS_BITS - 2) {
				0b00 => {
					trace!("sim: EWDS");
					self.write_enabled = false;
					State::Complete
				},
				0b01 => State::DataIn {
					program: Program::WriteAll,
					bits: 0,
					count: 0,
				},
				0b10 => {
					self.start_program(Program::WriteAll, 0xff);
					State::Complete
				},
				_ => {
					trace!("sim: EWEN");
					self.write_enabled = true;
					State::Complete
				},
			},
		}
	}

	fn clock_rising(&mut self) {
		let data_in = self.level(self.pins.data_in);
		self.clock_pulses += 1;
		if let Some(frame) = self.frames.last_mut() {
			frame.push(data_in);
		}

		let state = self.state;
		self.state = match state {
			State::Standby => {
				if data_in && !self.busy() {
					State::Instruction {
						bits: 0,
						count: 0,
					}
				} else {
					State::Standby
				}
			},
			State::Instruction { bits, count } => {
				let bits = (bits << 1) | (data_in as u16);
				let count = count + 1;
				if count == INSTRUCTION_BITS {
					self.decode(bits)
				} else {
					State::Instruction { bits, count }
				}
			},
			State::DataIn { program, bits, count } => {
				let bits = (bits << 1) | (data_in as u8);
				let count = count + 1;
				if count == 8 {
					self.start_program(program, bits);
					State::Complete
				} else {
					State::DataIn { program, bits, count }
				}
			},
			State::Reading { address, bit } => {
				self.output = 0 != (self.memory[address] >> (7 - bit)) & 1;
				if bit == 7 {
					State::Reading {
						address: (address + 1) & ADDRESS_MASK,
						bit: 0,
					}
				} else {
					State::Reading {
						address,
						bit: bit + 1,
					}
				}
			},
			State::Complete => State::Complete,
		};
	}

	fn data_out(&mut self) -> bool {
		if !self.selected() {
			// high impedance, pulled up
			return true;
		}
		match self.state {
			State::Reading { .. } => self.output,
			_ => {
				self.polls += 1;
				!self.busy()
			},
		}
	}
}

impl Hardware for Chip {
	fn set_pin_mode(&mut self, pin: Pin, direction: Direction) {
		self.modes.insert(pin, direction);
	}

	fn write_pin(&mut self, pin: Pin, level: bool) {
		let previous = self.level(pin);
		self.levels.insert(pin, level);
		if level == previous {
			return;
		}

		if pin == self.pins.chip_select {
			self.state = State::Standby;
			self.output = true;
			if level {
				self.frames.push(Vec::new());
			}
		} else if pin == self.pins.clock && level && self.selected() {
			self.clock_rising();
		}
	}

	fn read_pin(&mut self, pin: Pin) -> bool {
		if pin == self.pins.data_out {
			self.data_out()
		} else {
			self.level(pin)
		}
	}

	fn sleep_micros(&mut self, micros: u32) {
		self.now += u64::from(micros);
	}
}
