// GPIO double for tests: records everything and feeds data-out from a script.
use std::collections::{
	HashMap,
	VecDeque,
};

use super::{
	Direction,
	Hardware,
	Pin,
	Pins,
};

pub fn probe_pins() -> Pins {
	Pins::new(11, 12, 9, 8)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
	Mode(Pin, Direction),
	Write(Pin, bool),
	Read(Pin),
	Sleep(u32),
}

pub struct Probe {
	pins: Pins,
	levels: HashMap<Pin, bool>,
	modes: HashMap<Pin, Direction>,
	events: Vec<Event>,
	// data-in level at each rising clock edge, one entry per CS period
	frames: Vec<Vec<bool>>,
	rising_edges: usize,
	reads: usize,
	slept: u64,
	script: VecDeque<bool>,
	idle: bool,
	echo: Option<VecDeque<bool>>,
}

impl Probe {
	pub fn new() -> Self {
		Probe {
			pins: probe_pins(),
			levels: HashMap::new(),
			modes: HashMap::new(),
			events: Vec::new(),
			frames: Vec::new(),
			rising_edges: 0,
			reads: 0,
			slept: 0,
			script: VecDeque::new(),
			idle: true,
			echo: None,
		}
	}

	pub fn scripted(script: Vec<bool>) -> Self {
		Probe {
			script: script.into(),
			..Probe::new()
		}
	}

	// data-out replays the data-in levels latched on rising clock edges
	pub fn echo() -> Self {
		Probe {
			echo: Some(VecDeque::new()),
			..Probe::new()
		}
	}

	pub fn idle_level(mut self, level: bool) -> Self {
		self.idle = level;
		self
	}

	fn level(&self, pin: Pin) -> bool {
		self.levels.get(&pin).cloned().unwrap_or(false)
	}

	pub fn chip_selected(&self) -> bool {
		self.level(self.pins.chip_select)
	}

	pub fn mode(&self, pin: Pin) -> Option<Direction> {
		self.modes.get(&pin).cloned()
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn frames(&self) -> &[Vec<bool>] {
		&self.frames
	}

	pub fn rising_edges(&self) -> usize {
		self.rising_edges
	}

	pub fn reads(&self) -> usize {
		self.reads
	}

	pub fn slept_micros(&self) -> u64 {
		self.slept
	}
}

impl Hardware for Probe {
	fn set_pin_mode(&mut self, pin: Pin, direction: Direction) {
		self.events.push(Event::Mode(pin, direction));
		self.modes.insert(pin, direction);
	}

	fn write_pin(&mut self, pin: Pin, level: bool) {
		self.events.push(Event::Write(pin, level));
		let previous = self.level(pin);
		self.levels.insert(pin, level);

		if pin == self.pins.chip_select && level && !previous {
			self.frames.push(Vec::new());
		}
		if pin == self.pins.clock && level && !previous {
			self.rising_edges += 1;
			let data_in = self.level(self.pins.data_in);
			if self.chip_selected() {
				if let Some(frame) = self.frames.last_mut() {
					frame.push(data_in);
				}
			}
			if let Some(echo) = self.echo.as_mut() {
				echo.push_back(data_in);
			}
		}
	}

	fn read_pin(&mut self, pin: Pin) -> bool {
		self.events.push(Event::Read(pin));
		if pin != self.pins.data_out {
			return self.level(pin);
		}
		self.reads += 1;
		let idle = self.idle;
		match self.echo.as_mut() {
			Some(echo) => echo.pop_front().unwrap_or(idle),
			None => self.script.pop_front().unwrap_or(idle),
		}
	}

	fn sleep_micros(&mut self, micros: u32) {
		self.events.push(Event::Sleep(micros));
		self.slept += u64::from(micros);
	}
}
