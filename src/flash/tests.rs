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

#![cfg(test)]
#![allow(unused_variables, unused_mut)]

use super::*;
#[cfg(test)]
use speculate::speculate; // Must be imported into the current scope.

use flash::sim::{Op, SimFlash};

speculate! {
    describe "sim" {
        before {
            // A 6-sector device whose last 4 sectors are the partition.
            let mut flash = SimFlash::new(64, 2, 4);
            let start = 2 * 64;
        }

        it "describes its geometry" {
            assert_eq!(flash.sector_size(), 64);
            assert_eq!(flash.sector_offset(), 2);
            assert_eq!(flash.sector_count(), 4);
        }

        it "starts fully erased" {
            let mut buf = [0; 16];
            flash.read(start, &mut buf).unwrap();
            assert_eq!(buf, [0xFF; 16]);
        }

        it "programs bits from 1 to 0 only" {
            flash.program(start, &[0b1111_0000]).unwrap();
            flash.program(start, &[0b1010_1111]).unwrap();
            let mut buf = [0; 1];
            flash.read(start, &mut buf).unwrap();
            assert_eq!(buf, [0b1010_0000]);
        }

        it "erases a whole sector from any inner address" {
            flash.program(start, &[0, 1, 2, 3]).unwrap();
            flash.program(start + 60, &[4, 5, 6, 7]).unwrap();
            flash.program(start + 64, &[8]).unwrap();
            flash.sector_erase(start + 33).unwrap();
            let mut buf = [0; 4];
            flash.read(start, &mut buf).unwrap();
            assert_eq!(buf, [0xFF; 4]);
            flash.read(start + 60, &mut buf).unwrap();
            assert_eq!(buf, [0xFF; 4]);
            // The next sector is untouched.
            let mut one = [0; 1];
            flash.read(start + 64, &mut one).unwrap();
            assert_eq!(one, [8]);
        }

        it "rejects accesses outside the partition" {
            let mut buf = [0; 4];
            assert_eq!(flash.read(0, &mut buf), Err(FlashError::OutOfBounds));
            assert_eq!(flash.read(start - 1, &mut buf), Err(FlashError::OutOfBounds));
            assert_eq!(flash.program(start + 4 * 64 - 2, &[0; 4]), Err(FlashError::OutOfBounds));
            assert_eq!(flash.sector_erase(start + 4 * 64), Err(FlashError::OutOfBounds));
        }

        it "records every primitive call" {
            flash.program(start, &[0; 4]).unwrap();
            let mut buf = [0; 2];
            flash.read(start + 2, &mut buf).unwrap();
            flash.sector_erase(start).unwrap();
            assert_eq!(
                flash.ops(),
                &[Op::Program(start, 4), Op::Read(start + 2, 2), Op::Erase(start)]
            );
            flash.clear_ops();
            assert!(flash.ops().is_empty());
        }

        it "fails every primitive after a power cut" {
            flash.power_cut_after(1);
            flash.program(start, &[0x42]).unwrap();
            assert_eq!(flash.program(start + 1, &[0x42]), Err(FlashError::Device));
            let mut buf = [0; 1];
            assert_eq!(flash.read(start, &mut buf), Err(FlashError::Device));
            assert_eq!(flash.sector_erase(start), Err(FlashError::Device));
            flash.power_restore();
            flash.read(start, &mut buf).unwrap();
            assert_eq!(buf, [0x42]);
        }

        it "applies nothing past the cut point" {
            flash.power_cut_after(1);
            flash.program(start, &[0x0F]).unwrap();
            let _ = flash.program(start + 1, &[0x0F]);
            flash.power_restore();
            let mut buf = [0; 2];
            flash.read(start, &mut buf).unwrap();
            assert_eq!(buf, [0x0F, 0xFF]);
        }
    }
}
