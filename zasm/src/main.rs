#[macro_use]
extern crate clap;

use std::fmt;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::Arg;
use log::debug;

use zasm::{Assembler, Assembly, Diagnostic};

#[derive(Debug)]
enum IOErrorContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Assembly(Vec<Diagnostic>),
    Io(std::io::Error, IOErrorContext, PathBuf),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err, context, path) => writeln!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::ReadInput => "Reading input",
                    IOErrorContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Assembly(diagnostics) => {
                for diagnostic in diagnostics {
                    writeln!(f, "{}", diagnostic)?;
                }
                Ok(())
            }
        }
    }
}

fn main() {
    // Parse command line arguments
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to assemble")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Sets the Intel HEX file to write (default: INPUT with .hex)"),
        )
        .arg(
            Arg::with_name("bin")
                .short("b")
                .long("bin")
                .takes_value(true)
                .value_name("BINARY")
                .help("Also writes the raw binary image"),
        )
        .arg(
            Arg::with_name("listing")
                .short("l")
                .long("listing")
                .takes_value(true)
                .value_name("LISTING")
                .help("Writes the assembly listing"),
        )
        .arg(
            Arg::with_name("symbols")
                .short("s")
                .long("symbols")
                .takes_value(true)
                .value_name("SYMBOLS")
                .help("Writes the symbol table"),
        )
        .arg(
            Arg::with_name("include")
                .short("I")
                .long("include")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .value_name("DIR")
                .help("Adds a directory to the include search path"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Increases logging verbosity"),
        )
        .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // stderr logging; the HEX stream may be piped
    let _logger = flexi_logger::Logger::try_with_str(level)
        .and_then(|logger| logger.start())
        .map_err(|err| eprintln!("Logger init failed: {}", err))
        .ok();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("output");
    let binary = matches.value_of("bin");
    let listing = matches.value_of("listing");
    let symbols = matches.value_of("symbols");
    let includes: Vec<&str> = matches
        .values_of("include")
        .map(Iterator::collect)
        .unwrap_or_default();

    if let Err(err) = zasm(input, output, binary, listing, symbols, &includes) {
        eprint!("{}", err);
        std::process::exit(1);
    }
}

fn zasm(
    input: &str,
    output: Option<&str>,
    binary: Option<&str>,
    listing: Option<&str>,
    symbols: Option<&str>,
    includes: &[&str],
) -> Result<(), Error> {
    let input_path = Path::new(input);

    let mut assembler = Assembler::new();
    for dir in includes {
        assembler.add_include_path(*dir);
    }

    let result: Assembly = assembler
        .assemble_file(input_path)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, input_path.to_owned()))?;

    for warning in &result.warnings {
        eprintln!("{}", warning);
    }

    // side outputs are useful even for a failed run
    if let Some(listing_path) = listing {
        let path = PathBuf::from(listing_path);
        write_text(&path, &(result.listing.join("\n") + "\n"))
            .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, path))?;
    }
    if let Some(symbols_path) = symbols {
        let path = PathBuf::from(symbols_path);
        write_text(&path, &zasm::format_symbols(&result.symbols))
            .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, path))?;
    }

    if !result.success() {
        return Err(Error::Assembly(result.errors));
    }

    let output_path: PathBuf = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension("hex"));
    debug!(
        "writing {} bytes at {:04X} to {}",
        result.bytes.len(),
        result.load_address,
        output_path.display()
    );
    write_text(&output_path, &result.hex)
        .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path))?;

    if let Some(binary_path) = binary {
        let path = PathBuf::from(binary_path);
        BufWriter::new(File::create(&path).map_err(io_write(&path))?)
            .write_all(&result.bytes)
            .map_err(io_write(&path))?;
    }

    Ok(())
}

fn io_write(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |err| Error::Io(err, IOErrorContext::WriteOutput, path.to_owned())
}

fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
    BufWriter::new(File::create(path)?).write_all(text.as_bytes())
}
