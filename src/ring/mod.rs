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

//! Persistent ring log on top of the flash interface.
//!
//! # High-level overview of the ring
//!
//! The partition is used as a ring of sectors. Each sector starts with a
//! small header carrying its lifecycle state and the schema version; the
//! rest of the sector is an array of fixed-size slots, one object per slot:
//!
//! ```none
//! +--------+---------+------+---------+------+-----
//! | status | version | slot | payload | slot | ...
//! +--------+---------+------+---------+------+-----
//!  <--- 8 bytes ----> <-- 4 + object_size --->
//! ```
//!
//! Three cursors move over the ring, and only ever forward:
//!
//!  * `write`, the next slot to be programmed
//!  * `read`, the oldest undiscarded object
//!  * `cursor`, the next slot [`fetch`] will return, between the two
//!
//! Fetching only moves the in-memory `cursor`; [`discard`] commits it by
//! marking everything between `read` and `cursor` as garbage on flash, and
//! [`rewind`] takes it back to `read`. None of the cursors is stored
//! anywhere: [`scan`] rebuilds all three from the sector and slot headers
//! alone.
//!
//! ## Atomicity and timeline
//!
//! NOR flash programs bits from 1 to 0 only; going back costs a sector
//! erase. Every state change of the ring is therefore a single word
//! rewrite whose target differs from its source only in cleared bits, and
//! an object is programmed payload first, status word last. Whatever the
//! instant power is lost, the partition holds a decodable configuration: at
//! worst one slot has a half-programmed payload behind a still-erased
//! status word, and that slot is simply not part of the log.
//!
//! ## Reclaiming space
//!
//! The sector following the write sector is kept free at all times: it is
//! the room the write head needs to advance without running into the read
//! head. On every append the log checks that sector and, when something
//! else is found there, walks it through the reclaim sequence
//! `IN_USE -> OBSOLETE -> erase -> FREE`. An in-use sector whose objects
//! were all discarded is reclaimed for free this way; one still holding
//! undiscarded objects is evicted with them, unless the instance is
//! configured to reject the append instead.
//!
//! [`discard`]: struct.RingLog.html#method.discard
//! [`fetch`]: struct.RingLog.html#method.fetch
//! [`rewind`]: struct.RingLog.html#method.rewind
//! [`scan`]: struct.RingLog.html#method.scan


use alloc::vec::Vec;
use flash::{Flash, FlashError};
use layout::{Geometry, Loc};
use sector::{self, SectorState};
use slog::{Discard, Logger};
use slot::{self, SlotState};

/// An error that can happen during a ring log operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The flash geometry cannot hold a ring of the configured objects.
    BadGeometry,

    /// Object or buffer length is zero or exceeds the slot payload width.
    InvalidLength,

    /// No undiscarded object is available.
    Empty,

    /// The ring is full and the instance rejects writes when full.
    Full,

    /// The given sector carries a status this instance does not recognize,
    /// or a foreign version; the partition needs a format.
    UnknownSector(usize),

    /// The sector states do not form a single span of in-use sectors.
    Corrupted,

    /// A flash IO error occurred during the requested operation.
    Io(FlashError),
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Error {
        Error::Io(e)
    }
}

/// User controlled configuration.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Config {
    /// When set, a full ring rejects new objects instead of evicting the
    /// sector holding the oldest ones.
    pub reject_write_when_full: bool,
}

/// A persistent ring log over one flash partition.
///
/// The instance borrows its flash descriptor exclusively: one partition is
/// owned by at most one log at a time, and nothing is shared between
/// instances. [`new`] performs no flash IO; call [`format`] on a blank
/// partition or [`scan`] on a previously used one before anything else.
///
/// [`format`]: #method.format
/// [`new`]: #method.new
/// [`scan`]: #method.scan
#[derive(Debug)]
pub struct RingLog<'f, F: Flash + 'f> {
    /// Flash descriptor bound at initialization.
    flash: &'f mut F,

    /// Caller-supplied object schema version, fencing the on-flash format.
    version: u32,

    /// Cached partition geometry.
    geo: Geometry,

    /// Oldest undiscarded object.
    read: Loc,

    /// Next slot to be programmed.
    write: Loc,

    /// Next slot to be returned by a fetch.
    cursor: Loc,

    /// User controlled configuration.
    config: Config,

    /// Instance log sink.
    log: Logger,
}

impl<'f, F: Flash> RingLog<'f, F> {
    /// Initializes a ring log over `flash` for `object_size`-byte objects.
    ///
    /// `version` should be incremented whenever the object's semantics or
    /// size change in a backwards-incompatible way: a scan finding another
    /// version fails instead of misreading old data.
    ///
    /// # Errors
    ///
    /// Errors with [`Error::BadGeometry`] when the partition cannot hold a
    /// ring of such objects (see [`Geometry::new`]).
    ///
    /// [`Error::BadGeometry`]: enum.Error.html#variant.BadGeometry
    /// [`Geometry::new`]: ../layout/struct.Geometry.html#method.new
    pub fn new(flash: &'f mut F, version: u32, object_size: usize) -> Result<RingLog<'f, F>, Error> {
        RingLog::with_logger(flash, version, object_size, Logger::root(Discard, o!()))
    }

    /// Same as [`new`], with a sink for human-readable diagnostics.
    ///
    /// [`new`]: #method.new
    pub fn with_logger(
        flash: &'f mut F,
        version: u32,
        object_size: usize,
        log: Logger,
    ) -> Result<RingLog<'f, F>, Error> {
        let geo = match Geometry::new(flash, object_size) {
            Some(geo) => geo,
            None => return err!(log, Error::BadGeometry),
        };
        Ok(RingLog {
            flash: flash,
            version: version,
            geo: geo,
            read: Loc::zero(),
            write: Loc::zero(),
            cursor: Loc::zero(),
            config: Config::default(),
            log: log,
        })
    }

    /// Replaces the user controlled configuration.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Gives back access to the flash descriptor bound at initialization.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut *self.flash
    }

    /// Maximum number of objects the ring can hold at once.
    pub fn capacity(&self) -> usize {
        self.geo.capacity()
    }

    /// Approximate object count, in O(1).
    ///
    /// Counts every slot between the read and write heads, including slots
    /// whose status program was torn by a power cut, so it can over-count
    /// [`count_exact`] by up to one sector's worth of slots.
    ///
    /// [`count_exact`]: #method.count_exact
    pub fn count_estimate(&self) -> usize {
        self.read.ring_distance(self.write, &self.geo)
    }

    /// Exact object count, in O(n): walks the slots between the read and
    /// write heads and counts the valid ones.
    pub fn count_exact(&mut self) -> Result<usize, Error> {
        let mut count = 0;
        let mut loc = self.read;
        while loc != self.write {
            let status = get!(self.log, slot::read_status(self.flash, &self.geo, loc));
            if status == SlotState::Valid {
                count += 1;
            }
            loc = loc.next(&self.geo);
        }
        Ok(count)
    }

    /// Formats the partition: erases every sector, then formats sector 0 as
    /// the first free sector of an empty ring.
    ///
    /// # Errors
    ///
    /// If this fails there is no way to recover at this layer; it will
    /// require a lower-level storage erase.
    pub fn format(&mut self) -> Result<(), Error> {
        info!(self.log, "formatting partition";
              "sectors" => self.geo.sector_count, "version" => self.version);
        for i in 0..self.geo.sector_count {
            get!(self.log, sector::erase(self.flash, &self.geo, i));
        }
        get!(
            self.log,
            sector::format_as_free(self.flash, &self.geo, 0, self.version)
        );
        self.read = Loc::zero();
        self.write = Loc::zero();
        self.cursor = Loc::zero();
        Ok(())
    }

    /// Scans the partition for a valid ring and rebuilds the cursors.
    ///
    /// # Errors
    ///
    /// Errors with [`Error::UnknownSector`] on an unreadable or
    /// version-fenced header and with [`Error::Corrupted`] when the in-use
    /// sectors do not form a single span; in both cases the instance is
    /// unusable until [`format`] is called.
    ///
    /// [`Error::Corrupted`]: enum.Error.html#variant.Corrupted
    /// [`Error::UnknownSector`]: enum.Error.html#variant.UnknownSector
    /// [`format`]: #method.format
    pub fn scan(&mut self) -> Result<(), Error> {
        let n = self.geo.sector_count;
        let mut states = Vec::with_capacity(n);
        for i in 0..n {
            let (state, found) =
                get!(self.log, sector::read_header(self.flash, &self.geo, i, self.version));
            if state == SectorState::Unknown {
                debug!(self.log, "unknown sector header"; "sector" => i, "version" => found);
                return err!(self.log, Error::UnknownSector(i));
            }
            states.push(state);
        }

        let in_use = states
            .iter()
            .filter(|&&s| s == SectorState::InUse)
            .count();
        if in_use == 0 {
            // A reclaim interrupted by a power cut can leave obsolete
            // sectors behind; they hold nothing of value any more.
            for i in 0..n {
                if states[i] == SectorState::Obsolete {
                    get!(self.log, sector::erase(self.flash, &self.geo, i));
                }
            }
            self.read = Loc::zero();
            self.write = Loc::zero();
            self.cursor = Loc::zero();
            info!(self.log, "scan found an empty ring");
            return Ok(());
        }

        // The in-use sectors must form a single arc of the ring; its two
        // ends hold the oldest and the newest data.
        let mut oldest = None;
        let mut newest = None;
        for i in 0..n {
            if states[i] != SectorState::InUse {
                continue;
            }
            if states[(i + n - 1) % n] != SectorState::InUse {
                if oldest.is_some() {
                    return err!(self.log, Error::Corrupted);
                }
                oldest = Some(i);
            }
            if states[(i + 1) % n] != SectorState::InUse {
                newest = Some(i);
            }
        }
        let (oldest, newest) = match (oldest, newest) {
            (Some(oldest), Some(newest)) => (oldest, newest),
            // Every sector in use: the free sector the write head relies
            // on is gone, this was not written by us.
            _ => return err!(self.log, Error::Corrupted),
        };

        // The write head sits on the first erased slot of the newest
        // sector, or at the start of the next sector when it is full.
        self.write = Loc {
            sector: (newest + 1) % n,
            slot: 0,
        };
        for s in 0..self.geo.slots_per_sector {
            let loc = Loc {
                sector: newest,
                slot: s,
            };
            let status = get!(self.log, slot::read_status(self.flash, &self.geo, loc));
            if status == SlotState::Erased {
                self.write = loc;
                break;
            }
        }

        // The read head sits on the first valid slot at or after the start
        // of the oldest sector; sectors whose objects were all discarded
        // but that were not reclaimed yet are walked over.
        let mut read = Loc {
            sector: oldest,
            slot: 0,
        };
        while read != self.write {
            let status = get!(self.log, slot::read_status(self.flash, &self.geo, read));
            if status == SlotState::Valid {
                break;
            }
            read = read.next(&self.geo);
        }
        self.read = read;
        self.cursor = read;
        info!(self.log, "scan found a ring";
              "oldest" => oldest, "newest" => newest,
              "read" => ?self.read, "write" => ?self.write);
        Ok(())
    }

    /// Appends an object at the end of the ring. Deletes the sector holding
    /// the oldest objects if the ring is full, unless
    /// [`Config::reject_write_when_full`] is set.
    ///
    /// `object` must be exactly the configured object size; see
    /// [`append_ex`] for shorter writes.
    ///
    /// [`Config::reject_write_when_full`]:
    /// struct.Config.html#structfield.reject_write_when_full
    /// [`append_ex`]: #method.append_ex
    pub fn append(&mut self, object: &[u8]) -> Result<(), Error> {
        if object.len() != self.geo.object_size {
            return err!(self.log, Error::InvalidLength);
        }
        self.append_impl(object)
    }

    /// Appends an object of `1..=object_size` bytes.
    ///
    /// The slot keeps its full width: the tail of the payload area stays
    /// erased (`0xFF`) and the original length is not recorded, so a later
    /// fetch of the full width returns the written bytes followed by
    /// `0xFF` padding.
    pub fn append_ex(&mut self, object: &[u8]) -> Result<(), Error> {
        if object.is_empty() || object.len() > self.geo.object_size {
            return err!(self.log, Error::InvalidLength);
        }
        self.append_impl(object)
    }

    fn append_impl(&mut self, object: &[u8]) -> Result<(), Error> {
        if self.config.reject_write_when_full && self.count_estimate() >= self.capacity() {
            return err!(self.log, Error::Full);
        }

        // The sector after the write sector is kept free at all times: it
        // is the room the write head needs to advance without colliding
        // with the read head.
        let next = (self.write.sector + 1) % self.geo.sector_count;
        let (state, _) =
            get!(self.log, sector::read_header(self.flash, &self.geo, next, self.version));
        if state != SectorState::Free {
            if state == SectorState::InUse && self.read.sector == next {
                // The ring wrapped onto undiscarded data: the oldest
                // sector is evicted together with its objects.
                warn!(self.log, "evicting the oldest sector"; "sector" => next);
                self.read = Loc {
                    sector: (next + 1) % self.geo.sector_count,
                    slot: 0,
                };
            }
            if self.cursor.sector == next {
                self.cursor = Loc {
                    sector: (next + 1) % self.geo.sector_count,
                    slot: 0,
                };
            }
            get!(self.log, self.free_sector(next, state));
        }

        // Make sure the write sector itself is ready to take the slot.
        let (state, _) = get!(
            self.log,
            sector::read_header(self.flash, &self.geo, self.write.sector, self.version)
        );
        match state {
            SectorState::InUse => {}
            SectorState::Free => {
                get!(
                    self.log,
                    sector::promote_to_in_use(self.flash, &self.geo, self.write.sector)
                );
            }
            // Erased right after scanning a blank partition, obsolete
            // after an interrupted reclaim.
            other => {
                get!(self.log, self.free_sector(self.write.sector, other));
                get!(
                    self.log,
                    sector::promote_to_in_use(self.flash, &self.geo, self.write.sector)
                );
            }
        }

        get!(
            self.log,
            slot::program_valid(self.flash, &self.geo, self.write, object)
        );
        debug!(self.log, "object appended";
               "sector" => self.write.sector, "slot" => self.write.slot,
               "size" => object.len());
        self.write = self.write.next(&self.geo);
        Ok(())
    }

    /// Brings `sector` to the FREE state, resuming the reclaim sequence
    /// from wherever `state` says it stands.
    fn free_sector(&mut self, sector: usize, state: SectorState) -> Result<(), Error> {
        debug!(self.log, "reclaiming sector"; "sector" => sector, "state" => ?state);
        if state == SectorState::InUse {
            get!(self.log, sector::mark_obsolete(self.flash, &self.geo, sector));
        }
        if state != SectorState::Erased {
            get!(self.log, sector::erase(self.flash, &self.geo, sector));
        }
        get!(
            self.log,
            sector::format_as_free(self.flash, &self.geo, sector, self.version)
        );
        Ok(())
    }

    /// Fetches the next object, oldest first, advancing the fetch cursor.
    ///
    /// The cursor only moves in memory: fetching the same objects again
    /// after a [`rewind`] (or a reboot) is possible until [`discard`]
    /// commits the cursor. `object` must be exactly the configured object
    /// size; see [`fetch_ex`] for partial reads.
    ///
    /// [`discard`]: #method.discard
    /// [`fetch_ex`]: #method.fetch_ex
    /// [`rewind`]: #method.rewind
    pub fn fetch(&mut self, object: &mut [u8]) -> Result<(), Error> {
        if object.len() != self.geo.object_size {
            return err!(self.log, Error::InvalidLength);
        }
        self.fetch_impl(object)
    }

    /// Fetches the `1..=object_size` leading bytes of the next object.
    ///
    /// The slot width being fixed, an object written short by
    /// [`append_ex`] comes back `0xFF`-padded when more bytes than were
    /// written are requested.
    ///
    /// [`append_ex`]: #method.append_ex
    pub fn fetch_ex(&mut self, object: &mut [u8]) -> Result<(), Error> {
        if object.is_empty() || object.len() > self.geo.object_size {
            return err!(self.log, Error::InvalidLength);
        }
        self.fetch_impl(object)
    }

    fn fetch_impl(&mut self, object: &mut [u8]) -> Result<(), Error> {
        while self.cursor != self.write {
            let loc = self.cursor;
            let valid = get!(self.log, slot::read_valid(self.flash, &self.geo, loc, object));
            // Discarded slots, and slots whose status program was torn by
            // a power cut, are walked over.
            self.cursor = loc.next(&self.geo);
            if valid {
                return Ok(());
            }
        }
        err!(self.log, Error::Empty)
    }

    /// Discards all fetched objects: every slot between the read head and
    /// the fetch cursor is marked garbage on flash, and the read head
    /// catches up with the cursor.
    ///
    /// The emptied sectors are reclaimed lazily, when the write head next
    /// needs the room.
    pub fn discard(&mut self) -> Result<(), Error> {
        if self.read == self.write {
            return err!(self.log, Error::Empty);
        }
        while self.read != self.cursor {
            get!(self.log, slot::mark_garbage(self.flash, &self.geo, self.read));
            self.read = self.read.next(&self.geo);
        }
        Ok(())
    }

    /// Discards exactly the oldest object, without reading it.
    pub fn item_discard(&mut self) -> Result<(), Error> {
        while self.read != self.write {
            let loc = self.read;
            let status = get!(self.log, slot::read_status(self.flash, &self.geo, loc));
            if status == SlotState::Valid {
                get!(self.log, slot::mark_garbage(self.flash, &self.geo, loc));
                self.read = loc.next(&self.geo);
                // The fetch cursor may not trail behind the read head.
                if self.cursor.ring_distance(self.write, &self.geo)
                    > self.read.ring_distance(self.write, &self.geo)
                {
                    self.cursor = self.read;
                }
                return Ok(());
            }
            self.read = loc.next(&self.geo);
        }
        self.cursor = self.read;
        err!(self.log, Error::Empty)
    }

    /// Rewinds the fetch cursor back to the oldest undiscarded object.
    pub fn rewind(&mut self) {
        self.cursor = self.read;
    }

    /// Dumps the ring metadata to the instance log. For debugging purposes.
    pub fn dump(&mut self) -> Result<(), Error> {
        info!(self.log, "ring log state";
              "version" => self.version,
              "object_size" => self.geo.object_size,
              "slots_per_sector" => self.geo.slots_per_sector,
              "capacity" => self.capacity(),
              "read" => ?self.read, "write" => ?self.write, "cursor" => ?self.cursor);
        for i in 0..self.geo.sector_count {
            let (state, version) =
                get!(self.log, sector::read_header(self.flash, &self.geo, i, self.version));
            info!(self.log, "sector"; "index" => i, "state" => ?state, "version" => version);
        }
        Ok(())
    }
}
