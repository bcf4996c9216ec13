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

//! # Crate
//!
//! `ringlog` is a persistent ring log of fixed-size objects living on a raw
//! NOR-style flash partition. Objects are appended at a write head, read
//! back oldest-first through a fetch cursor, and dropped by committing the
//! cursor; when the partition fills up the oldest sector is either
//! reclaimed or new writes are rejected, depending on configuration. The
//! on-flash format only ever clears bits from 1 to 0, so the log survives a
//! power cut at any instant and a scan rebuilds it afterwards.
//!
//! The flash itself is reached through the [`Flash`] trait, which is the
//! only platform-specific piece. See the [`ring`] module documentation for
//! the on-flash format and the recovery rules.
//!
//! The crate can be configured using the following features:
//!  * `std` (default) for plugging the standard library into the `slog`
//!    logging backend; without it the crate is `no_std` (plus `alloc`)
//!  * `sim` for exposing the in-memory flash simulator used by the test
//!    suite to downstream crates
//!
//! [`Flash`]: flash/trait.Flash.html
//! [`ring`]: ring/index.html

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;
#[macro_use]
extern crate slog;

#[cfg(test)]
extern crate slog_term;
#[cfg(test)]
extern crate speculate;

#[macro_use]
mod macros;

pub mod flash;
pub mod layout;
pub mod ring;
pub mod sector;
pub mod slot;

pub use flash::{Flash, FlashError};
pub use layout::{Geometry, Loc};
pub use ring::{Config, Error, RingLog};
