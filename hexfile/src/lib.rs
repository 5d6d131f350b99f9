//! Intel HEX serialisation for 16-bit address spaces.
//!
//! Only the two record types 8-bit loaders care about are produced:
//! `00` (data) and the fixed `01` end-of-file record `:00000001FF`.
//! All hex digits are upper case and lines end with CRLF, which is what
//! CP/M-era tooling expects.

use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

#[cfg(test)]
mod test;

/// Number of data bytes per emitted record.
pub const RECORD_SIZE: usize = 16;

const EOF_RECORD: &str = ":00000001FF\r\n";

const TYPE_DATA: u8 = 0x00;
const TYPE_EOF: u8 = 0x01;

/// A loadable memory image: a base address and the bytes placed there.
#[derive(Debug, PartialEq)]
pub struct Image {
    origin: u16,
    data: Vec<u8>,
}

impl Image {
    pub fn from(origin: u16, data: Vec<u8>) -> Image {
        Image { origin, data }
    }

    pub fn copy_from(origin: u16, data: &[u8]) -> Image {
        Image {
            origin,
            data: Vec::from(data),
        }
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Render the image as Intel HEX text.
    pub fn to_hex(&self) -> String {
        let mut out = String::new();
        for (i, chunk) in self.data.chunks(RECORD_SIZE).enumerate() {
            let address = self.origin.wrapping_add((i * RECORD_SIZE) as u16);
            push_record(&mut out, address, chunk);
        }
        out.push_str(EOF_RECORD);
        out
    }
}

fn push_record(out: &mut String, address: u16, data: &[u8]) {
    let mut sum = (data.len() as u8)
        .wrapping_add((address >> 8) as u8)
        .wrapping_add(address as u8)
        .wrapping_add(TYPE_DATA);
    let _ = write!(out, ":{:02X}{:04X}{:02X}", data.len(), address, TYPE_DATA);
    for &byte in data {
        sum = sum.wrapping_add(byte);
        let _ = write!(out, "{:02X}", byte);
    }
    // Two's-complement checksum: every record sums to 0 mod 256.
    let _ = write!(out, "{:02X}\r\n", 0u8.wrapping_sub(sum));
}

fn bad(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

fn decode_record(line: &str) -> io::Result<Vec<u8>> {
    let body = match line.strip_prefix(':') {
        Some(body) => body,
        None => return Err(bad("record does not start with ':'")),
    };
    if !body.is_ascii() || body.len() % 2 != 0 {
        return Err(bad("record is not an even run of hex digits"));
    }

    let mut bytes = Vec::with_capacity(body.len() / 2);
    for i in (0..body.len()).step_by(2) {
        let byte = u8::from_str_radix(&body[i..i + 2], 16)
            .map_err(|_| bad("record contains a non-hex digit"))?;
        bytes.push(byte);
    }

    if bytes.len() < 5 {
        return Err(bad("record too short"));
    }
    if bytes[0] as usize != bytes.len() - 5 {
        return Err(bad("record length field does not match the data"));
    }
    if bytes.iter().fold(0u8, |a, &b| a.wrapping_add(b)) != 0 {
        return Err(bad("record checksum mismatch"));
    }

    Ok(bytes)
}

/// Parse Intel HEX text back into an image. The first data record fixes
/// the origin; later records are placed by address relative to it.
pub fn parse(text: &str) -> io::Result<Image> {
    let mut origin = None;
    let mut data: Vec<u8> = Vec::new();

    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let record = decode_record(line)?;
        let address = u16::from(record[1]) << 8 | u16::from(record[2]);
        match record[3] {
            TYPE_DATA => {
                let base = *origin.get_or_insert(address);
                let offset = address.wrapping_sub(base) as usize;
                let end = offset + record[0] as usize;
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset..end].copy_from_slice(&record[4..record.len() - 1]);
            }
            TYPE_EOF => break,
            _ => return Err(bad("unsupported record type")),
        }
    }

    Ok(Image::from(origin.unwrap_or(0), data))
}

pub fn read<R: Read>(reader: &mut R) -> io::Result<Image> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse(&text)
}

pub fn write<W: Write>(writer: &mut W, image: &Image) -> io::Result<()> {
    writer.write_all(image.to_hex().as_bytes())
}

pub trait ReadHexExt: Read + Sized {
    fn read_hex(&mut self) -> io::Result<Image> {
        read(self)
    }
}

impl<R: Read + Sized> ReadHexExt for R {}

pub trait WriteHexExt: Write + Sized {
    fn write_hex(&mut self, image: &Image) -> io::Result<()> {
        write(self, image)
    }
}

impl<W: Write + Sized> WriteHexExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Image> {
    BufReader::new(File::open(path)?).read_hex()
}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image) -> io::Result<()> {
    BufWriter::new(File::create(path)?).write_hex(image)
}
