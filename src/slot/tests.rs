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

use flash::sim::SimFlash;
use flash::Flash;
use layout::Geometry;

speculate! {
    describe "slot" {
        before {
            let mut flash = SimFlash::new(64, 0, 4);
            let geo = Geometry::new(&flash, 4).unwrap();
            let loc = Loc { sector: 1, slot: 3 };
        }

        it "reads an erased slot as erased" {
            assert_eq!(read_status(&mut flash, &geo, loc).unwrap(), SlotState::Erased);
            let mut buf = [7; 4];
            assert!(!read_valid(&mut flash, &geo, loc, &mut buf).unwrap());
            assert_eq!(buf, [7; 4]);
        }

        it "programs and reads an object back" {
            program_valid(&mut flash, &geo, loc, b"abcd").unwrap();
            assert_eq!(read_status(&mut flash, &geo, loc).unwrap(), SlotState::Valid);
            let mut buf = [0; 4];
            assert!(read_valid(&mut flash, &geo, loc, &mut buf).unwrap());
            assert_eq!(&buf, b"abcd");
        }

        it "leaves the neighbouring slots alone" {
            program_valid(&mut flash, &geo, loc, b"abcd").unwrap();
            let before = Loc { sector: 1, slot: 2 };
            let after = Loc { sector: 1, slot: 4 };
            assert_eq!(read_status(&mut flash, &geo, before).unwrap(), SlotState::Erased);
            assert_eq!(read_status(&mut flash, &geo, after).unwrap(), SlotState::Erased);
        }

        it "pads short objects with erased bytes" {
            program_valid(&mut flash, &geo, loc, b"ab").unwrap();
            let mut buf = [0; 4];
            assert!(read_valid(&mut flash, &geo, loc, &mut buf).unwrap());
            assert_eq!(&buf, &[b'a', b'b', 0xFF, 0xFF]);
        }

        it "reads back fewer bytes than the slot width" {
            program_valid(&mut flash, &geo, loc, b"abcd").unwrap();
            let mut buf = [0; 2];
            assert!(read_valid(&mut flash, &geo, loc, &mut buf).unwrap());
            assert_eq!(&buf, b"ab");
        }

        it "discards an object" {
            program_valid(&mut flash, &geo, loc, b"abcd").unwrap();
            mark_garbage(&mut flash, &geo, loc).unwrap();
            assert_eq!(read_status(&mut flash, &geo, loc).unwrap(), SlotState::Garbage);
            let mut buf = [0; 4];
            assert!(!read_valid(&mut flash, &geo, loc, &mut buf).unwrap());
        }

        it "hides a payload whose status program never happened" {
            // Power cut between the payload and the status word.
            flash.program(geo.payload_address(loc), b"ab").unwrap();
            assert_eq!(read_status(&mut flash, &geo, loc).unwrap(), SlotState::Erased);
            let mut buf = [0; 4];
            assert!(!read_valid(&mut flash, &geo, loc, &mut buf).unwrap());
        }

        it "reads a torn status word as garbage" {
            // Only part of the VALID word made it to the flash.
            flash.program(geo.slot_address(loc), &[0xF0, 0xFF, 0xFF, 0xFF]).unwrap();
            assert_eq!(read_status(&mut flash, &geo, loc).unwrap(), SlotState::Garbage);
            // Discarding it for good is still a pure bit-clear.
            mark_garbage(&mut flash, &geo, loc).unwrap();
            assert_eq!(read_status(&mut flash, &geo, loc).unwrap(), SlotState::Garbage);
        }
    }
}
