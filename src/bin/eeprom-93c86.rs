#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate eeprom_93c86;
use eeprom_93c86::*;

use std::convert::TryFrom;
use std::process::exit;

use eeprom_93c86::serial::{
	Eeprom,
	Hardware,
	Pin,
	Pins,
	Settings,
	WORD_COUNT,
};

// reference wiring
const DEFAULT_CS: &str = "11";
const DEFAULT_CLK: &str = "12";
const DEFAULT_DI: &str = "9";
const DEFAULT_DO: &str = "8";

fn get_number(matches: &clap::ArgMatches, name: &str, default: Option<&str>) -> AResult<usize> {
	let param = match matches.value_of(name).or(default) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param_context(name, parse_number(param))
}

fn param_context<T>(name: &str, r: AResult<T>) -> AResult<T> {
	r.map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_byte(matches: &clap::ArgMatches, name: &str) -> AResult<u8> {
	let value = get_number(matches, name, None)?;
	ensure!(value <= 0xff, "invalid parameter {}: 0x{:x} doesn't fit in a word", name, value);
	Ok(value as u8)
}

fn get_u32(matches: &clap::ArgMatches, name: &str) -> AResult<u32> {
	let value = get_number(matches, name, None)?;
	param_context(name, u32::try_from(value).map_err(|_| format_err!("{} is too large", value)))
}

fn get_pin(matches: &clap::ArgMatches, name: &str, default: &str) -> AResult<Pin> {
	let value = get_number(matches, name, Some(default))?;
	ensure!(value <= Pin::max_value() as usize, "invalid parameter {}: GPIO {} out of range", name, value);
	Ok(value as Pin)
}

fn get_pins(matches: &clap::ArgMatches) -> AResult<Pins> {
	Ok(Pins::new(
		get_pin(matches, "cs", DEFAULT_CS)?,
		get_pin(matches, "clk", DEFAULT_CLK)?,
		get_pin(matches, "di", DEFAULT_DI)?,
		get_pin(matches, "dout", DEFAULT_DO)?,
	))
}

fn get_settings(matches: &clap::ArgMatches) -> AResult<Settings> {
	let mut settings = Settings::default();
	if matches.is_present("hold") {
		settings.hold_micros = get_u32(matches, "hold")?;
	}
	if matches.is_present("poll_limit") {
		settings.ready_poll_limit = get_u32(matches, "poll_limit")?;
	}
	settings.strict_addresses = !matches.is_present("alias");
	settings.validate()?;
	Ok(settings)
}

fn dump<H: Hardware>(ee: &mut Eeprom<H>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let start = get_number(sub_m, "start", Some("0"))?;
	let count = if sub_m.is_present("count") {
		get_number(sub_m, "count", None)?
	} else {
		WORD_COUNT
	};

	for (i, word) in ee.read_sequential(start, count)?.enumerate() {
		if 0 == i % 16 {
			print!("{:03x} ", (start + i) % WORD_COUNT);
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", word);
		if 15 == i % 16 {
			println!();
		}
	}
	if 0 != count % 16 {
		println!();
	}

	Ok(())
}

fn run<H: Hardware>(ee: &mut Eeprom<H>, matches: &clap::ArgMatches) -> AResult<()> {
	match matches.subcommand() {
		("read", Some(sub_m)) => {
			let address = get_number(sub_m, "ADDRESS", None)?;
			let word = ee.read_word(address)?;
			println!("@{:03x}: {:02x}", address, word);
		},
		("write", Some(sub_m)) => {
			let address = get_number(sub_m, "ADDRESS", None)?;
			let data = get_byte(sub_m, "DATA")?;
			let mut programming = ee.start_programming()?;
			programming.write_word(address, data)?;
			let flash = programming.read_word(address)?;
			ensure!(flash == data,
				"Verify failed at {:03x}: expected {:02x}, EEPROM has {:02x}", address, data, flash
			);
		},
		("erase", Some(sub_m)) => {
			let address = get_number(sub_m, "ADDRESS", None)?;
			ee.start_programming()?.erase_word(address)?;
		},
		("erase_all", _) => {
			ee.start_programming()?.erase_all()?;
		},
		("write_all", Some(sub_m)) => {
			let data = get_byte(sub_m, "DATA")?;
			ee.start_programming()?.write_all(data)?;
		},
		("enable_writes", _) => {
			ee.enable_writes()?;
			info!("Erase/Write enabled");
		},
		("disable_writes", _) => {
			ee.disable_writes()?;
			info!("Erase/Write disabled");
		},
		("dump", Some(sub_m)) => {
			dump(ee, sub_m)?;
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}

	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg chip: --chip +takes_value "GPIO character device (default /dev/gpiochip0)")
		(@arg cs: --cs +takes_value "chip select line offset (default 11)")
		(@arg clk: --clk +takes_value "clock line offset (default 12)")
		(@arg di: --di +takes_value "line offset driving the EEPROM data input (default 9)")
		(@arg dout: --dout +takes_value "line offset sampling the EEPROM data output (default 8)")
		(@arg hold: --hold +takes_value "minimum clock level hold time in microseconds (default 1)")
		(@arg poll_limit: --poll_limit +takes_value "READY polls before a write counts as failed (default 5000)")
		(@arg alias: --alias "let addresses beyond the array wrap around instead of failing")
		(@arg simulate: --simulate "talk to a simulated (erased) chip instead of GPIOs")
		(@subcommand read =>
			(about: "read one word")
			(@arg ADDRESS: +required "word address (0..2047, 0x prefix for hex)")
		)
		(@subcommand write =>
			(about: "write (and verify) one word")
			(@arg ADDRESS: +required "word address (0..2047, 0x prefix for hex)")
			(@arg DATA: +required "word value (0..255)")
		)
		(@subcommand erase =>
			(about: "erase one word (set to 0xff)")
			(@arg ADDRESS: +required "word address (0..2047, 0x prefix for hex)")
		)
		(@subcommand erase_all =>
			(about: "erase the whole chip")
		)
		(@subcommand write_all =>
			(about: "write the same value into every word")
			(@arg DATA: +required "word value (0..255)")
		)
		(@subcommand enable_writes =>
			(about: "enable erase/write (EWEN)")
		)
		(@subcommand disable_writes =>
			(about: "disable erase/write (EWDS)")
		)
		(@subcommand dump =>
			(about: "dump EEPROM contents as hex")
			(@arg start: --start +takes_value "first address (default 0)")
			(@arg count: --count +takes_value "number of words (default: all)")
		)
	).get_matches();

	let pins = get_pins(&matches)?;
	let settings = get_settings(&matches)?;

	if matches.is_present("simulate") {
		let mut ee = Eeprom::with_settings(sim::Chip::new(pins), pins, settings)?;
		return run(&mut ee, &matches);
	}

	let chip = matches.value_of("chip").unwrap_or(gpio::DEFAULT_CHIP);
	let lines = gpio::LinuxGpio::open(chip, pins)?;
	let mut ee = Eeprom::with_settings(lines, pins, settings)?;
	let result = run(&mut ee, &matches);
	// a failed GPIO access makes whatever we got meaningless
	ee.hardware_mut().check()?;
	result
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
