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

//! In-memory NOR flash emulation.
//!
//! [`SimFlash`] behaves like the real medium: programming ANDs bytes into
//! place (bits only go from 1 to 0) and erasing refills a whole sector with
//! `0xFF`. Every primitive call is recorded, and a power cut can be
//! scheduled after any number of primitives, after which every call fails
//! until power is restored. This is what the power-loss tests replay
//! operations against, one cut point at a time.
//!
//! [`SimFlash`]: struct.SimFlash.html

use alloc::vec;
use alloc::vec::Vec;
use flash::{Flash, FlashError};

/// A primitive call observed by the simulator.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Op {
    /// `sector_erase(addr)`.
    Erase(usize),

    /// `program(addr, len)`.
    Program(usize, usize),

    /// `read(addr, len)`.
    Read(usize, usize),
}

/// An in-memory flash device with a partition carved out of it.
///
/// The device spans `sector_offset + sector_count` sectors so that the
/// partition addressing (which is relative to the device origin) is
/// exercised for real; accesses below the partition are rejected like
/// accesses past its end.
#[derive(Debug)]
pub struct SimFlash {
    /// Sector size, in bytes.
    sector_size: usize,

    /// First sector of the partition.
    sector_offset: usize,

    /// Number of sectors in the partition.
    sector_count: usize,

    /// Backing memory for the whole device.
    mem: Vec<u8>,

    /// Every primitive call that reached the device so far.
    ops: Vec<Op>,

    /// Number of primitives still allowed before the scheduled power cut.
    power_budget: Option<usize>,
}

impl SimFlash {
    /// Creates a device with every bit erased.
    pub fn new(sector_size: usize, sector_offset: usize, sector_count: usize) -> SimFlash {
        SimFlash {
            sector_size: sector_size,
            sector_offset: sector_offset,
            sector_count: sector_count,
            mem: vec![0xFF; (sector_offset + sector_count) * sector_size],
            ops: Vec::new(),
            power_budget: None,
        }
    }

    /// Schedules a power cut: the next `ops` primitives go through, every
    /// later one fails until [`power_restore`] is called.
    ///
    /// [`power_restore`]: #method.power_restore
    pub fn power_cut_after(&mut self, ops: usize) {
        self.power_budget = Some(ops);
    }

    /// Restores power after a scheduled cut.
    pub fn power_restore(&mut self) {
        self.power_budget = None;
    }

    /// The primitive calls that reached the device so far.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Forgets the recorded primitive calls.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Checks `[addr; len]` against the partition bounds.
    fn check(&self, addr: usize, len: usize) -> Result<(), FlashError> {
        let start = self.sector_offset * self.sector_size;
        let end = (self.sector_offset + self.sector_count) * self.sector_size;
        if addr < start || addr + len > end {
            Err(FlashError::OutOfBounds)
        } else {
            Ok(())
        }
    }

    /// Burns one primitive out of the power budget, if a cut is scheduled.
    fn power(&mut self) -> Result<(), FlashError> {
        match self.power_budget {
            Some(0) => Err(FlashError::Device),
            Some(n) => {
                self.power_budget = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Flash for SimFlash {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn sector_offset(&self) -> usize {
        self.sector_offset
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }

    fn sector_erase(&mut self, addr: usize) -> Result<(), FlashError> {
        self.check(addr, 1)?;
        self.power()?;
        self.ops.push(Op::Erase(addr));
        let begin = addr / self.sector_size * self.sector_size;
        for b in &mut self.mem[begin..begin + self.sector_size] {
            *b = 0xFF;
        }
        Ok(())
    }

    fn program(&mut self, addr: usize, data: &[u8]) -> Result<(), FlashError> {
        self.check(addr, data.len())?;
        self.power()?;
        self.ops.push(Op::Program(addr, data.len()));
        for (i, b) in data.iter().enumerate() {
            self.mem[addr + i] &= b;
        }
        Ok(())
    }

    fn read(&mut self, addr: usize, data: &mut [u8]) -> Result<(), FlashError> {
        self.check(addr, data.len())?;
        self.power()?;
        self.ops.push(Op::Read(addr, data.len()));
        data.copy_from_slice(&self.mem[addr..addr + data.len()]);
        Ok(())
    }
}
