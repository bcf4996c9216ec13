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

//! Partition geometry and ring locations.
//!
//! All the wrap arithmetic of the ring lives here: [`Geometry`] turns
//! sector and slot indices into device byte addresses, and [`Loc`] walks
//! the ring slot by slot, wrapping from the last slot of a sector to the
//! first slot of the next one, and from the last sector back to sector 0.
//!
//! [`Geometry`]: struct.Geometry.html
//! [`Loc`]: struct.Loc.html

mod tests;

use flash::Flash;

/// Size of a sector header: a status word followed by a version word.
pub const SECTOR_HEADER_SIZE: usize = 8;

/// Size of a slot header: a status word.
pub const SLOT_HEADER_SIZE: usize = 4;

/// Cached geometry of the partition, fixed at initialization.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Geometry {
    /// Sector size, in bytes.
    pub sector_size: usize,

    /// Partition offset, in sectors, from the device origin.
    pub sector_offset: usize,

    /// Number of sectors in the partition.
    pub sector_count: usize,

    /// Size of one stored object, in bytes.
    pub object_size: usize,

    /// Number of slots each sector holds.
    pub slots_per_sector: usize,
}

impl Geometry {
    /// Reads the geometry of `flash` and derives the slot layout for
    /// `object_size`-byte objects.
    ///
    /// Returns `None` when no ring can live on the partition: a zero object
    /// size, a sector too small to hold a single slot, or fewer than two
    /// sectors (the write head always keeps one sector free to advance
    /// into, so a one-sector partition has no usable capacity).
    pub fn new<F: Flash>(flash: &F, object_size: usize) -> Option<Geometry> {
        let sector_size = flash.sector_size();
        let sector_count = flash.sector_count();
        if object_size == 0
            || sector_count < 2
            || sector_size < SECTOR_HEADER_SIZE + SLOT_HEADER_SIZE + object_size
        {
            return None;
        }
        Some(Geometry {
            sector_size: sector_size,
            sector_offset: flash.sector_offset(),
            sector_count: sector_count,
            object_size: object_size,
            slots_per_sector: (sector_size - SECTOR_HEADER_SIZE)
                / (SLOT_HEADER_SIZE + object_size),
        })
    }

    /// Device byte address of the first byte of sector `sector`.
    pub fn sector_address(&self, sector: usize) -> usize {
        (self.sector_offset + sector) * self.sector_size
    }

    /// Device byte address of the status word of the slot at `loc`.
    pub fn slot_address(&self, loc: Loc) -> usize {
        self.sector_address(loc.sector)
            + SECTOR_HEADER_SIZE
            + loc.slot * (SLOT_HEADER_SIZE + self.object_size)
    }

    /// Device byte address of the payload of the slot at `loc`.
    pub fn payload_address(&self, loc: Loc) -> usize {
        self.slot_address(loc) + SLOT_HEADER_SIZE
    }

    /// Maximum number of objects the ring can hold at once.
    ///
    /// One sector's worth of slots is missing from the total: the sector
    /// after the write head is kept free so that the head can advance
    /// without colliding with the read head, which also disambiguates a
    /// full ring from an empty one.
    pub fn capacity(&self) -> usize {
        (self.sector_count - 1) * self.slots_per_sector
    }
}

/// A position in the ring, as a (sector, slot) pair.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Loc {
    /// Sector index inside the partition.
    pub sector: usize,

    /// Slot index inside the sector.
    pub slot: usize,
}

impl Loc {
    /// The origin of the ring.
    pub fn zero() -> Loc {
        Loc { sector: 0, slot: 0 }
    }

    /// The location one slot further, wrapping to the next sector past the
    /// last slot and to sector 0 past the last sector.
    pub fn next(self, geo: &Geometry) -> Loc {
        if self.slot + 1 >= geo.slots_per_sector {
            Loc {
                sector: (self.sector + 1) % geo.sector_count,
                slot: 0,
            }
        } else {
            Loc {
                sector: self.sector,
                slot: self.slot + 1,
            }
        }
    }

    /// The location `n` slots further.
    pub fn advance(self, n: usize, geo: &Geometry) -> Loc {
        let slot = self.slot + n;
        Loc {
            sector: (self.sector + slot / geo.slots_per_sector) % geo.sector_count,
            slot: slot % geo.slots_per_sector,
        }
    }

    /// Number of slots from `self` to `to`, walking the ring forward.
    ///
    /// `to` must not precede `self` inside the same sector: locations are
    /// compared within a single lap of the ring.
    pub fn ring_distance(self, to: Loc, geo: &Geometry) -> usize {
        let sectors = (to.sector + geo.sector_count - self.sector) % geo.sector_count;
        sectors * geo.slots_per_sector + to.slot - self.slot
    }
}
