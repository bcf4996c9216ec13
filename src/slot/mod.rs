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

//! Slot codec.
//!
//! A slot is a 32-bit little-endian status word followed by exactly
//! `object_size` payload bytes:
//!
//! ```none
//! ERASED  0xFFFFFFFF   nothing stored yet
//! VALID   0xFFFFFF00   holds an object
//! GARBAGE 0x00000000   object discarded
//! ```
//!
//! An object is programmed payload first and marked valid last, so a power
//! cut mid-write leaves a slot whose status word still reads as erased: the
//! half-programmed payload is never exposed. A status word torn by a power
//! cut (neither erased nor valid) decodes as garbage and is skipped until
//! its sector is reclaimed.

mod tests;

use flash::{Flash, FlashError};
use layout::{Geometry, Loc};

/// Status word of a slot with nothing stored yet.
const ERASED: u32 = 0xFFFF_FFFF;
/// Status word of a slot holding an object.
const VALID: u32 = 0xFFFF_FF00;
/// Status word of a discarded slot.
const GARBAGE: u32 = 0x0000_0000;

/// State of a slot, as decoded from its status word.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SlotState {
    /// Nothing stored yet.
    Erased,

    /// Holds an object.
    Valid,

    /// Discarded, or the status program was torn by a power cut; the
    /// payload must not be trusted either way.
    Garbage,
}

/// Reads the status word of the slot at `loc`.
pub fn read_status<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    loc: Loc,
) -> Result<SlotState, FlashError> {
    let mut status = [0_u8; 4];
    flash.read(geo.slot_address(loc), &mut status)?;
    Ok(
        match u32::from_le_bytes([status[0], status[1], status[2], status[3]]) {
            ERASED => SlotState::Erased,
            VALID => SlotState::Valid,
            _ => SlotState::Garbage,
        },
    )
}

/// Programs an object into the ERASED slot at `loc`: the payload bytes
/// first, the VALID status word last.
///
/// A payload shorter than the slot width leaves the tail of the payload
/// area erased (`0xFF`); the original length is not recorded.
pub fn program_valid<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    loc: Loc,
    payload: &[u8],
) -> Result<(), FlashError> {
    flash.program(geo.payload_address(loc), payload)?;
    flash.program(geo.slot_address(loc), &VALID.to_le_bytes())
}

/// Reads `buf.len()` leading payload bytes of the slot at `loc`, only if
/// the slot currently holds a valid object.
///
/// Returns `false`, leaving `buf` untouched, when it does not.
pub fn read_valid<F: Flash>(
    flash: &mut F,
    geo: &Geometry,
    loc: Loc,
    buf: &mut [u8],
) -> Result<bool, FlashError> {
    match read_status(flash, geo, loc)? {
        SlotState::Valid => {
            flash.read(geo.payload_address(loc), buf)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Discards the slot at `loc`.
pub fn mark_garbage<F: Flash>(flash: &mut F, geo: &Geometry, loc: Loc) -> Result<(), FlashError> {
    flash.program(geo.slot_address(loc), &GARBAGE.to_le_bytes())
}
