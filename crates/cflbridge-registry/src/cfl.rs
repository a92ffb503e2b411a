// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! On-disk CFL files
//!
//! A CFL array is a pair of files:
//! ```text
//! <name>.hdr   "# Dimensions\n128 128 1 8\n"   (extents, whitespace separated)
//! <name>.cfl   raw interleaved f32 (re, im) pairs, column-major
//! ```
//! The registry falls back to these when a name is not held in memory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::dims::Dims;
use crate::element::ComplexF32;
use crate::{RegistryError, Result};

const DIMENSIONS_MARKER: &str = "# Dimensions";

pub fn header_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.hdr", name))
}

pub fn data_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.cfl", name))
}

/// True when `<name>.cfl` exists under `dir`
pub fn exists(dir: &Path, name: &str) -> bool {
    data_path(dir, name).is_file()
}

/// Read the extents recorded in `<name>.hdr`
pub fn read_header(dir: &Path, name: &str) -> Result<Dims> {
    let path = header_path(dir, name);
    let content = fs::read_to_string(&path)?;
    parse_header(&content).map_err(|reason| RegistryError::InvalidHeader { path, reason })
}

fn parse_header(content: &str) -> std::result::Result<Dims, String> {
    let mut lines = content.lines().map(str::trim);
    if !lines.any(|line| line == DIMENSIONS_MARKER) {
        return Err(format!("missing '{}' section", DIMENSIONS_MARKER));
    }
    let extents_line = lines
        .find(|line| !line.is_empty())
        .ok_or_else(|| "no extents after the dimensions marker".to_string())?;

    extents_line
        .split_whitespace()
        .map(|token| {
            token
                .parse::<usize>()
                .map_err(|e| format!("bad extent '{}': {}", token, e))
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(Dims::from)
}

/// Map `<name>.cfl` read-only, requiring at least `byte_size` bytes
pub fn map_data(dir: &Path, name: &str, byte_size: usize) -> Result<Mmap> {
    let path = data_path(dir, name);
    let file = File::open(&path)?;
    let actual = file.metadata()?.len();
    if actual < byte_size as u64 {
        return Err(RegistryError::FileTooSmall {
            path,
            expected: byte_size,
            actual,
        });
    }
    // SAFETY: read-only mapping; the file is not modified by this process
    // while the view is alive.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Write `<name>.hdr` and `<name>.cfl` under `dir`
pub fn write(dir: &Path, name: &str, dims: &Dims, data: &[ComplexF32]) -> Result<()> {
    let expected = dims.element_count()?;
    if data.len() != expected {
        return Err(RegistryError::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    let extents = dims
        .as_slice()
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let mut header = File::create(header_path(dir, name))?;
    writeln!(header, "{}", DIMENSIONS_MARKER)?;
    writeln!(header, "{}", extents)?;

    fs::write(data_path(dir, name), bytemuck::cast_slice::<ComplexF32, u8>(data))?;
    Ok(())
}
