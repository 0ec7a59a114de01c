use std::fmt;

/// Field layout of one instruction.
///
/// Chip-wide instructions share the `0b00` opcode with the first two address
/// bits selecting the instruction; these are modelled as a 4-bit code
/// followed by the remaining 9 (don't care) address bits.
#[derive(Debug, PartialEq, Eq)]
pub struct Opcode {
	pub name: &'static str,
	pub code: u16,
	pub code_len: usize,
	pub address_len: usize,
	pub data_in_len: usize,
	pub data_out_len: usize,
	pub ready_poll: bool,
}

impl Opcode {
	/// Clock pulses of a complete transaction, start bit included.
	pub fn clock_cycles(&self) -> usize {
		1 + self.code_len + self.address_len + self.data_in_len + self.data_out_len
	}
}

const READ: Opcode = Opcode {
	name: "READ",
	code: 0b10,
	code_len: 2,
	address_len: 11,
	data_in_len: 0,
	data_out_len: 8,
	ready_poll: false,
};

const EWEN: Opcode = Opcode {
	name: "EWEN",
	code: 0b0011,
	code_len: 4,
	address_len: 9,
	data_in_len: 0,
	data_out_len: 0,
	ready_poll: false,
};

const ERASE: Opcode = Opcode {
	name: "ERASE",
	code: 0b11,
	code_len: 2,
	address_len: 11,
	data_in_len: 0,
	data_out_len: 0,
	ready_poll: true,
};

const ERAL: Opcode = Opcode {
	name: "ERAL",
	code: 0b0010,
	code_len: 4,
	address_len: 9,
	data_in_len: 0,
	data_out_len: 0,
	ready_poll: true,
};

const WRITE: Opcode = Opcode {
	name: "WRITE",
	code: 0b01,
	code_len: 2,
	address_len: 11,
	data_in_len: 8,
	data_out_len: 0,
	ready_poll: true,
};

const WRAL: Opcode = Opcode {
	name: "WRAL",
	code: 0b0001,
	code_len: 4,
	address_len: 9,
	data_in_len: 8,
	data_out_len: 0,
	ready_poll: true,
};

const EWDS: Opcode = Opcode {
	name: "EWDS",
	code: 0b0000,
	code_len: 4,
	address_len: 9,
	data_in_len: 0,
	data_out_len: 0,
	ready_poll: false,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Command {
	Read,
	Ewen,
	Erase,
	Eral,
	Write,
	Wral,
	Ewds,
}

impl Command {
	pub const ALL: [Command; 7] = [
		Command::Read,
		Command::Ewen,
		Command::Erase,
		Command::Eral,
		Command::Write,
		Command::Wral,
		Command::Ewds,
	];

	pub fn opcode(self) -> &'static Opcode {
		match self {
			Command::Read => &READ,
			Command::Ewen => &EWEN,
			Command::Erase => &ERASE,
			Command::Eral => &ERAL,
			Command::Write => &WRITE,
			Command::Wral => &WRAL,
			Command::Ewds => &EWDS,
		}
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.opcode().name)
	}
}
