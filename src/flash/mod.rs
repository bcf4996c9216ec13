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

//! Low-level flash access.
//!
//! The flash is cut into sectors, by hardware design. Memory can be written
//! from 1 to 0 at any bit level, but writing from 0 to 1 requires to erase
//! an entire sector. The log reaches the device through the small [`Flash`]
//! capability below, bound once at initialization; the partition it
//! describes is exclusively owned by one log instance for its lifetime.
//!
//! [`Flash`]: trait.Flash.html

#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod tests;

/// Errors that can happen when driving the flash primitives.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FlashError {
    /// The requested address range falls outside the partition.
    OutOfBounds,

    /// The device reported a failure.
    Device,
}

/// A byte-addressable partition of a NOR-style flash device.
///
/// Addresses are in bytes, measured from the device origin, not from the
/// partition: the first byte of the partition lives at
/// `sector_offset() * sector_size()`. The three primitives are synchronous
/// and blocking; a primitive that fails makes the enclosing log operation
/// fail without retries.
pub trait Flash {
    /// Sector size, in bytes.
    fn sector_size(&self) -> usize;

    /// Partition offset, in sectors, from the device origin.
    fn sector_offset(&self) -> usize;

    /// Partition size, in sectors.
    fn sector_count(&self) -> usize;

    /// Erases the sector containing `addr`, taking every bit back to 1.
    ///
    /// `addr` may be any address inside the sector.
    fn sector_erase(&mut self, addr: usize) -> Result<(), FlashError>;

    /// Programs flash memory bits by toggling them from 1 to 0.
    fn program(&mut self, addr: usize, data: &[u8]) -> Result<(), FlashError>;

    /// Reads `data.len()` bytes of flash memory starting at `addr`.
    fn read(&mut self, addr: usize, data: &mut [u8]) -> Result<(), FlashError>;
}
