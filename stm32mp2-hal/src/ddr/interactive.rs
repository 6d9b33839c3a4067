//! Interactive DDR debug console.
//!
//! Line based commands on any [embedded_io] byte stream, typically the boot UART:
//!
//! - `help`: list of the commands.
//! - `info`: memory name, type, speed and size.
//! - `print [name]`: one or all registers and parameters, as `name= 0x0000abcd`.
//! - `edit <name> <value>`: changes the configured value. Controller registers are also written
//!   to the hardware once the DDR is initialized.
//! - `save`: `#define` lines of the complete configuration, ready for a board header.
//! - `go`: leaves the console.
//!
//! After init, controller registers and PHY CSRs are read back from the hardware, driver
//! parameters always come from the configuration.
use core::fmt;

use embedded_io::{Read, Write};

use super::{
    DdrController, DdrPlatform, Error,
    regs::{RegGroup, RegRef, RegTarget, find_reg, table_len},
};
use crate::{bus::RegisterBus, timeout::Clock};

const LINE_LEN: usize = 80;
const PROMPT: &str = "DDR> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Info,
    Print(Option<&'a str>),
    Edit { name: &'a str, value: u32 },
    Save,
    Go,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command")]
    Unknown,
    #[error("missing argument")]
    MissingArgument,
    #[error("invalid value")]
    InvalidValue,
    #[error("unknown register")]
    UnknownRegister,
}

/// Parses a decimal or `0x` prefixed hexadecimal value.
pub fn parse_value(text: &str) -> Result<u32, CommandError> {
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| CommandError::InvalidValue)
}

pub fn parse_command(line: &str) -> Result<Command<'_>, CommandError> {
    let mut words = line.split_ascii_whitespace();
    let cmd = match words.next().ok_or(CommandError::Unknown)? {
        "help" | "?" => Command::Help,
        "info" => Command::Info,
        "print" | "p" => Command::Print(words.next()),
        "edit" | "e" => {
            let name = words.next().ok_or(CommandError::MissingArgument)?;
            let value = parse_value(words.next().ok_or(CommandError::MissingArgument)?)?;
            Command::Edit { name, value }
        }
        "save" => Command::Save,
        "go" => Command::Go,
        _ => return Err(CommandError::Unknown),
    };
    if words.next().is_some() {
        return Err(CommandError::Unknown);
    }
    Ok(cmd)
}

/// Displays a name in upper case.
struct Upper<'a>(&'a str);

impl fmt::Display for Upper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .chars()
            .try_for_each(|c| fmt::Write::write_char(f, c.to_ascii_uppercase()))
    }
}

macro_rules! out {
    ($io:expr, $($arg:tt)*) => {
        write!($io, $($arg)*).map_err(|_| Error::Console)
    };
}

/// Reads one line with echo. Returns `None` at the end of the stream.
fn read_line<'b, IO: Read + Write>(
    io: &mut IO,
    buf: &'b mut heapless::Vec<u8, LINE_LEN>,
) -> Result<Option<&'b str>, Error> {
    buf.clear();
    loop {
        let mut byte = [0u8; 1];
        if io.read(&mut byte).map_err(|_| Error::Console)? == 0 {
            return Ok(None);
        }
        match byte[0] {
            b'\r' | b'\n' => {
                io.write_all(b"\r\n").map_err(|_| Error::Console)?;
                break;
            }
            0x08 | 0x7f => {
                if buf.pop().is_some() {
                    io.write_all(b"\x08 \x08").map_err(|_| Error::Console)?;
                }
            }
            c if c.is_ascii_graphic() || c == b' ' => {
                // Characters beyond the line length are dropped.
                if buf.push(c).is_ok() {
                    io.write_all(&[c]).map_err(|_| Error::Console)?;
                }
            }
            _ => (),
        }
    }
    Ok(Some(core::str::from_utf8(buf).unwrap_or("")))
}

impl<B: RegisterBus, C: Clock, P: DdrPlatform> DdrController<'_, B, C, P> {
    /// Runs the console until `go` or the end of the stream.
    pub fn run_console<IO: Read + Write>(&mut self, io: &mut IO) -> Result<(), Error> {
        let mut buf = heapless::Vec::new();
        loop {
            out!(io, "{}", PROMPT)?;
            io.flush().map_err(|_| Error::Console)?;
            let Some(line) = read_line(io, &mut buf)? else {
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(line) {
                Ok(Command::Go) => return Ok(()),
                Ok(cmd) => self.execute(io, cmd)?,
                Err(e) => out!(io, "{}\r\n", e)?,
            }
        }
    }

    fn execute<IO: Write>(&mut self, io: &mut IO, cmd: Command<'_>) -> Result<(), Error> {
        match cmd {
            Command::Help => out!(
                io,
                "help | info | print [name] | edit <name> <value> | save | go\r\n"
            ),
            Command::Info => {
                let info = self.cfg.info;
                out!(
                    io,
                    "name: {}\r\ntype: {}\r\nspeed: {} kHz\r\nsize: {:#x}\r\n",
                    info.name,
                    self.cfg.dram_type.name(),
                    info.speed.raw(),
                    info.size
                )
            }
            Command::Print(Some(name)) => match find_reg(name) {
                Some(reg) => self.print_reg(io, reg),
                None => out!(io, "{}\r\n", CommandError::UnknownRegister),
            },
            Command::Print(None) => {
                for group in RegGroup::ALL {
                    out!(io, "{}:\r\n", group.name())?;
                    for index in 0..table_len(group) {
                        self.print_reg(io, RegRef { group, index })?;
                    }
                }
                Ok(())
            }
            Command::Edit { name, value } => {
                let Some(reg) = find_reg(name) else {
                    return out!(io, "{}\r\n", CommandError::UnknownRegister);
                };
                reg.set(&mut self.cfg, value)?;
                if let (true, RegTarget::Ddrc(offset)) = (self.initialized, reg.target()) {
                    self.ctl.write_reg(offset, value, reg.qd())?;
                }
                self.print_reg(io, reg)
            }
            Command::Save => {
                for group in RegGroup::ALL {
                    for index in 0..table_len(group) {
                        let reg = RegRef { group, index };
                        let value = self.value(reg)?;
                        out!(
                            io,
                            "#define DDR_{}{} {:#010x}\r\n",
                            group.define_prefix(),
                            Upper(reg.name()),
                            value
                        )?;
                    }
                }
                Ok(())
            }
            Command::Go => Ok(()),
        }
    }

    /// Live value after init, configured value otherwise.
    fn value(&mut self, reg: RegRef) -> Result<u32, Error> {
        if self.initialized {
            if let Some(value) = self.ctl.read_reg(reg.target()) {
                return Ok(value);
            }
        }
        reg.get(&self.cfg)
    }

    fn print_reg<IO: Write>(&mut self, io: &mut IO, reg: RegRef) -> Result<(), Error> {
        let value = self.value(reg)?;
        out!(io, "{}= {:#010x}\r\n", reg.name(), value)
    }
}
