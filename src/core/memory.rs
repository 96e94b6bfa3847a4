// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut, Range};

const PAGE_BITS: u32 = 9;
const PAGE_MASK: u64 = (1 << PAGE_BITS) - 1;

/// Number of words in one memory page.
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;

static ZERO_PAGE: [i64; PAGE_SIZE] = [0; PAGE_SIZE];

type Page = Box<[i64; PAGE_SIZE]>;

/// Sparse, unbounded word-addressed memory.
///
/// Storage is split into pages of [`PAGE_SIZE`] words which are allocated on
/// the first write that touches them. Reading an address that was never
/// written yields `0`.
#[derive(Clone, Default)]
pub struct Memory {
    pages: HashMap<u64, Page>,
    /// One past the highest address ever written.
    high_water: u64,
}

const fn split(addr: u64) -> (u64, usize) {
    (addr >> PAGE_BITS, (addr & PAGE_MASK) as usize)
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the word at `addr`
    pub fn read(&self, addr: u64) -> i64 {
        self[addr]
    }

    /// Write `value` to `addr`, allocating its page if needed
    pub fn write(&mut self, addr: u64, value: i64) {
        self[addr] = value;
    }

    /// One past the highest address that has ever been written, including
    /// the initial program image.
    pub fn len_hint(&self) -> u64 {
        self.high_water
    }

    /// Copy out a contiguous block of memory.
    pub fn snapshot(&self, range: Range<u64>) -> Vec<i64> {
        range.map(|addr| self[addr]).collect()
    }

    /// Number of pages currently backed by an allocation.
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, number: u64) -> &[i64; PAGE_SIZE] {
        self.pages.get(&number).map_or(&ZERO_PAGE, |page| &**page)
    }

    fn live_pages(&self) -> impl Iterator<Item = (&u64, &Page)> {
        self.pages
            .iter()
            .filter(|(_, page)| page[..] != ZERO_PAGE[..])
    }
}

impl Index<u64> for Memory {
    type Output = i64;

    fn index(&self, addr: u64) -> &i64 {
        let (page, offset) = split(addr);
        &self.page(page)[offset]
    }
}

impl IndexMut<u64> for Memory {
    fn index_mut(&mut self, addr: u64) -> &mut i64 {
        let (page, offset) = split(addr);
        self.high_water = self.high_water.max(addr.saturating_add(1));
        &mut self
            .pages
            .entry(page)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]))[offset]
    }
}

impl FromIterator<i64> for Memory {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut memory = Self::new();
        for (addr, value) in (0u64..).zip(iter) {
            memory[addr] = value;
        }
        memory
    }
}

// Pages that were allocated but hold only zeroes compare equal to absent ones.
impl PartialEq for Memory {
    fn eq(&self, other: &Self) -> bool {
        self.live_pages()
            .all(|(number, page)| other.page(*number)[..] == page[..])
            && other
                .live_pages()
                .all(|(number, page)| self.page(*number)[..] == page[..])
    }
}

impl Eq for Memory {}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut numbers: Vec<u64> = self.live_pages().map(|(number, _)| *number).collect();
        numbers.sort_unstable();

        let mut map = f.debug_map();
        for number in numbers {
            let base = number << PAGE_BITS;
            let page = self.page(number);
            let used = page.iter().rposition(|&word| word != 0).map_or(0, |i| i + 1);
            map.entry(&format_args!("0x{base:06x}"), &&page[..used]);
        }
        map.finish()
    }
}
