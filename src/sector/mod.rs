// The MIT License (MIT)
//
// Copyright (c) 2020, National Cybersecurity Agency of France (ANSSI)
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Sector header codec and lifecycle transitions.
//!
//! Each sector begins with two 32-bit little-endian words: a status word
//! and the caller-supplied schema version. The status words are chosen so
//! that every lifecycle step only clears bits:
//!
//! ```none
//! ERASED   0xFFFFFFFF   every bit still erased
//! FREE     0xFFFFFF00   formatted, version word programmed
//! IN_USE   0xFFFF0000   holding the slot array
//! OBSOLETE 0xFF000000   retired, awaiting the physical erase
//! ```
//!
//! A status program interrupted by a power cut can therefore be retried
//! verbatim: reprogramming the same word only clears bits that were already
//! meant to be cleared. Any other word, or a version word that does not
//! match the caller's, decodes as [`SectorState::Unknown`] and means the
//! partition needs a format.
//!
//! [`SectorState::Unknown`]: enum.SectorState.html#variant.Unknown


use flash::{Flash, FlashError};
use layout::{Geometry, SECTOR_HEADER_SIZE};

/// Status word of a sector with every bit still erased.
const ERASED: u32 = 0xFFFF_FFFF;
/// Status word of a formatted, still empty sector.
const FREE: u32 = 0xFFFF_FF00;
/// Status word of a sector holding the slot array.
const IN_USE: u32 = 0xFFFF_0000;
/// Status word of a retired sector awaiting erasure.
const OBSOLETE: u32 = 0xFF00_0000;

/// Lifecycle state of a sector, as decoded from its header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SectorState {
    /// Every bit erased; not part of the ring yet.
    Erased,

    /// Formatted with the ring version, no slot programmed yet.
    Free,

    /// Holding the slot array.
    InUse,

    /// Retired, waiting for the physical erase.
    Obsolete,

    /// Unrecognized status word or foreign version; a format is required.
    Unknown,
}

/// Reads the header of sector `sector` and decodes it against `version`.
///
/// Returns the decoded state together with the raw version word. Non-erased
/// sectors whose version word differs from `version` decode as
/// [`SectorState::Unknown`]: the version fences off on-flash schemas this
/// caller does not understand.
///
/// [`SectorState::Unknown`]: enum.SectorState.html#variant.Unknown
pub fn read_header<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    sector: usize,
    version: u32,
) -> Result<(SectorState, u32), FlashError> {
    let mut header = [0_u8; SECTOR_HEADER_SIZE];
    flash.read(geo.sector_address(sector), &mut header)?;
    let status = word(&header[0..4]);
    let found = word(&header[4..8]);
    let state = match status {
        ERASED => SectorState::Erased,
        FREE => SectorState::Free,
        IN_USE => SectorState::InUse,
        OBSOLETE => SectorState::Obsolete,
        _ => SectorState::Unknown,
    };
    if state != SectorState::Erased && state != SectorState::Unknown && found != version {
        Ok((SectorState::Unknown, found))
    } else {
        Ok((state, found))
    }
}

/// Decodes a 32-bit little-endian word.
fn word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Programs the status word of sector `sector`.
fn program_status<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    sector: usize,
    status: u32,
) -> Result<(), FlashError> {
    flash.program(geo.sector_address(sector), &status.to_le_bytes())
}

/// Formats an ERASED sector: programs the version word, then the FREE
/// status word, in that order, so that a power cut in between leaves a
/// sector that still decodes as erased.
pub fn format_as_free<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    sector: usize,
    version: u32,
) -> Result<(), FlashError> {
    flash.program(geo.sector_address(sector) + 4, &version.to_le_bytes())?;
    program_status(flash, geo, sector, FREE)
}

/// Claims a FREE sector for the slot array.
pub fn promote_to_in_use<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    sector: usize,
) -> Result<(), FlashError> {
    program_status(flash, geo, sector, IN_USE)
}

/// Retires an IN_USE sector ahead of its physical erase.
pub fn mark_obsolete<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    sector: usize,
) -> Result<(), FlashError> {
    program_status(flash, geo, sector, OBSOLETE)
}

/// Physically erases sector `sector`, taking it back to ERASED.
pub fn erase<F: Flash>(flash: &mut F, geo: &Geometry, sector: usize) -> Result<(), FlashError> {
    flash.sector_erase(geo.sector_address(sector))
}
