#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod gpio;
pub mod serial;
pub mod sim;

/// Parse a number in decimal or (with `0x` prefix) hexadecimal notation.
pub fn parse_number(s: &str) -> AResult<usize> {
	let s = s.trim();
	let value = if s.starts_with("0x") || s.starts_with("0X") {
		usize::from_str_radix(&s[2..], 16)
	} else {
		s.parse::<usize>()
	};
	value.map_err(|e| format_err!("invalid number {:?}: {}", s, e))
}
