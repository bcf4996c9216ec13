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

speculate! {
    describe "geometry" {
        before {
            let flash = SimFlash::new(64, 4, 4);
            let geo = Geometry::new(&flash, 4).unwrap();
        }

        it "derives the slot layout" {
            // 64 - 8 header bytes leave room for 7 slots of 4 + 4 bytes.
            assert_eq!(geo.slots_per_sector, 7);
            assert_eq!(geo.object_size, 4);
        }

        it "uses the remainder of a sector as dead space" {
            let geo = Geometry::new(&flash, 5).unwrap();
            assert_eq!(geo.slots_per_sector, (64 - 8) / 9);
        }

        it "computes device addresses from the partition offset" {
            assert_eq!(geo.sector_address(0), 4 * 64);
            assert_eq!(geo.sector_address(3), 7 * 64);
            assert_eq!(geo.slot_address(Loc { sector: 0, slot: 0 }), 4 * 64 + 8);
            assert_eq!(geo.payload_address(Loc { sector: 0, slot: 0 }), 4 * 64 + 12);
            assert_eq!(geo.slot_address(Loc { sector: 2, slot: 3 }), 6 * 64 + 8 + 3 * 8);
        }

        it "reserves one sector of capacity" {
            assert_eq!(geo.capacity(), 3 * 7);
        }

        it "rejects geometries without room for a ring" {
            assert_eq!(Geometry::new(&flash, 0), None);
            assert_eq!(Geometry::new(&flash, 64), None);
            let single = SimFlash::new(64, 0, 1);
            assert_eq!(Geometry::new(&single, 4), None);
            let tiny = SimFlash::new(15, 0, 4);
            assert_eq!(Geometry::new(&tiny, 4), None);
        }
    }

    describe "loc" {
        before {
            let flash = SimFlash::new(64, 0, 4);
            let geo = Geometry::new(&flash, 4).unwrap();
        }

        it "advances slot by slot" {
            assert_eq!(
                Loc::zero().next(&geo),
                Loc { sector: 0, slot: 1 }
            );
        }

        it "wraps at the end of a sector" {
            assert_eq!(
                Loc { sector: 0, slot: 6 }.next(&geo),
                Loc { sector: 1, slot: 0 }
            );
        }

        it "wraps at the end of the ring" {
            assert_eq!(
                Loc { sector: 3, slot: 6 }.next(&geo),
                Loc { sector: 0, slot: 0 }
            );
        }

        it "advances by several slots at once" {
            assert_eq!(Loc::zero().advance(7, &geo), Loc { sector: 1, slot: 0 });
            assert_eq!(Loc::zero().advance(9, &geo), Loc { sector: 1, slot: 2 });
            assert_eq!(
                Loc { sector: 3, slot: 5 }.advance(2, &geo),
                Loc { sector: 0, slot: 0 }
            );
            // A whole lap comes back to the start.
            assert_eq!(Loc::zero().advance(28, &geo), Loc::zero());
        }

        it "agrees with next on single steps" {
            let mut loc = Loc::zero();
            for n in 1..30 {
                loc = loc.next(&geo);
                assert_eq!(Loc::zero().advance(n, &geo), loc);
            }
        }

        it "measures ring distances" {
            assert_eq!(Loc::zero().ring_distance(Loc::zero(), &geo), 0);
            assert_eq!(
                Loc { sector: 0, slot: 3 }.ring_distance(Loc { sector: 2, slot: 1 }, &geo),
                2 * 7 + 1 - 3
            );
            assert_eq!(
                Loc { sector: 2, slot: 5 }.ring_distance(Loc { sector: 0, slot: 2 }, &geo),
                2 * 7 + 2 - 5
            );
        }

        it "inverts advance" {
            let from = Loc { sector: 1, slot: 4 };
            for n in 0..20 {
                assert_eq!(from.ring_distance(from.advance(n, &geo), &geo), n % 28);
            }
        }
    }
}
