use std::thread;
use std::time::{
	Duration,
	Instant,
};

pub type Pin = u32;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
	Input,
	Output,
}

/// GPIO numbers of the four bus lines, named from the EEPROM's point of view:
/// we drive `data_in` and sample `data_out`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pins {
	pub chip_select: Pin,
	pub clock: Pin,
	pub data_in: Pin,
	pub data_out: Pin,
}

impl Pins {
	pub fn new(chip_select: Pin, clock: Pin, data_in: Pin, data_out: Pin) -> Self {
		Pins {
			chip_select,
			clock,
			data_in,
			data_out,
		}
	}

	pub fn outputs(&self) -> [Pin; 3] {
		[self.chip_select, self.clock, self.data_in]
	}
}

pub trait Hardware {
	fn set_pin_mode(&mut self, pin: Pin, direction: Direction);
	fn write_pin(&mut self, pin: Pin, level: bool);
	fn read_pin(&mut self, pin: Pin) -> bool;

	// sleep for (at least) `micros` microseconds
	fn sleep_micros(&mut self, micros: u32) {
		reliable_sleep(Duration::from_micros(micros.into()));
	}
}
