//! Linux GPIO access through the character device (`/dev/gpiochipN`).
//!
//! All four bus lines are held in a single line request; direction changes
//! reconfigure that request.

use std::collections::HashMap;

use gpiocdev::line::Value;
use gpiocdev::request::{
	Config,
	Request,
};

use crate::serial::{
	Direction,
	Hardware,
	Pin,
	Pins,
};
use crate::AResult;

pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

const CONSUMER: &str = "eeprom-93c86";

fn line_value(level: bool) -> Value {
	if level {
		Value::Active
	} else {
		Value::Inactive
	}
}

fn check_pins(pins: Pins) -> AResult<()> {
	let all = [pins.chip_select, pins.clock, pins.data_in, pins.data_out];
	for (i, pin) in all.iter().enumerate() {
		ensure!(!all[..i].contains(pin), "GPIO {} assigned to more than one bus line", pin);
	}
	Ok(())
}

// chip deselected, clock and data-in low, data-out sampled
fn line_config(pins: Pins) -> Config {
	let mut config = Config::default();
	for &pin in pins.outputs().iter() {
		config.with_line(pin).as_output(Value::Inactive);
	}
	config.with_line(pins.data_out).as_input();
	config
}

pub struct LinuxGpio {
	request: Request,
	config: Config,
	directions: HashMap<Pin, Direction>,
	// last driven level, restored when a line turns into an output again
	levels: HashMap<Pin, bool>,
	error: Option<failure::Error>,
}

impl LinuxGpio {
	pub fn open(chip: &str, pins: Pins) -> AResult<Self> {
		check_pins(pins)?;
		let config = line_config(pins);

		debug!("requesting {:?} on {}", pins, chip);
		let request = with_context!(("requesting GPIO lines on {}", chip), {
			Ok(Request::from_config(config.clone())
				.on_chip(chip)
				.with_consumer(CONSUMER)
				.request()?)
		})?;

		let mut directions = HashMap::new();
		for &pin in pins.outputs().iter() {
			directions.insert(pin, Direction::Output);
		}
		directions.insert(pins.data_out, Direction::Input);

		Ok(LinuxGpio {
			request,
			config,
			directions,
			levels: HashMap::new(),
			error: None,
		})
	}

	/// Report (and reset) the first error hit since the last check.
	///
	/// Pin access through `Hardware` can't fail, so errors are kept here.
	pub fn check(&mut self) -> AResult<()> {
		match self.error.take() {
			None => Ok(()),
			Some(e) => Err(e),
		}
	}

	fn latch<T>(&mut self, pin: Pin, what: &str, result: AResult<T>) -> Option<T> {
		match result {
			Ok(v) => Some(v),
			Err(e) => {
				error!("GPIO {}: {} failed: {}", pin, what, e);
				if self.error.is_none() {
					self.error = Some(e);
				}
				None
			},
		}
	}

	fn requested(&self, pin: Pin) -> AResult<()> {
		ensure!(self.directions.contains_key(&pin), "GPIO {} wasn't requested", pin);
		Ok(())
	}
}

impl Hardware for LinuxGpio {
	fn set_pin_mode(&mut self, pin: Pin, direction: Direction) {
		if self.directions.get(&pin) == Some(&direction) {
			return;
		}
		if self.latch(pin, "setting direction", self.requested(pin)).is_none() {
			return;
		}

		let level = self.levels.get(&pin).cloned().unwrap_or(false);
		match direction {
			Direction::Input => {
				self.config.with_line(pin).as_input();
			},
			Direction::Output => {
				self.config.with_line(pin).as_output(line_value(level));
			},
		}
		let result = self.request.reconfigure(&self.config).map(|_| ()).map_err(failure::Error::from);
		if self.latch(pin, "setting direction", result).is_some() {
			self.directions.insert(pin, direction);
		}
	}

	fn write_pin(&mut self, pin: Pin, level: bool) {
		let result = self.requested(pin).and_then(|_| {
			self.request.set_value(pin, line_value(level))?;
			Ok(())
		});
		if self.latch(pin, "writing value", result).is_some() {
			self.levels.insert(pin, level);
		}
	}

	fn read_pin(&mut self, pin: Pin) -> bool {
		let result = self.requested(pin).and_then(|_| Ok(self.request.value(pin)?));
		self.latch(pin, "reading value", result) == Some(Value::Active)
	}
}
