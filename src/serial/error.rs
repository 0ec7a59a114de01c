use failure::Fail;

use super::Command;

#[derive(Debug, Fail, PartialEq, Eq)]
pub enum Error {
	#[fail(display = "{} did not finish: device still busy after {} polls", command, polls)]
	WriteTimedOut {
		command: Command,
		polls: u32,
	},
	#[fail(display = "address 0x{:x} out of range (device has {} words)", address, limit)]
	AddressOutOfRange {
		address: usize,
		limit: usize,
	},
	#[fail(display = "{} = {} is below the minimum of {}", name, value, minimum)]
	InvalidSetting {
		name: &'static str,
		value: u32,
		minimum: u32,
	},
}
