//! Bit-packed monochrome bitmaps.
//!
//! Pixels are stored one bit each inside 32-bit words, row-major,
//! least-significant bit first:
//!
//! ```text
//! pixel i = y * width + x
//! word    = i / 32
//! bit     = i % 32        (bit 0 is the first pixel of the word)
//! ```
//!
//! # Example
//!
//! ```
//! use leadwire::codec::BitMatrix;
//!
//! let matrix = BitMatrix::unpack(4, 2, &[0b1111_0101]).unwrap();
//! assert!(matrix.get(0, 0));
//! assert!(!matrix.get(1, 0));
//! assert_eq!(matrix.to_text(), "1010\n1111\n");
//! assert_eq!(matrix.pack(), vec![0b1111_0101]);
//! ```

use std::fmt;

use crate::protocol::{words_for, BITS_PER_WORD};

/// Height x width grid of pixels, `true` meaning set / foreground.
///
/// Pixels stay packed in LSB-first words, one bit each, exactly as they
/// arrive on the wire. Unused tail bits of the last word are always zero.
#[derive(Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    words: Vec<u32>,
}

impl BitMatrix {
    /// All-clear matrix.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            words: vec![0; (width * height).div_ceil(BITS_PER_WORD)],
        }
    }

    /// Build from row-major booleans.
    ///
    /// Returns `None` if `bits.len() != width * height`.
    pub fn from_bits(width: usize, height: usize, bits: Vec<bool>) -> Option<Self> {
        if width.checked_mul(height)? != bits.len() {
            return None;
        }
        let mut words = vec![0u32; bits.len().div_ceil(BITS_PER_WORD)];
        for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            words[i / BITS_PER_WORD] |= 1 << (i % BITS_PER_WORD);
        }
        Some(Self {
            width,
            height,
            words,
        })
    }

    /// Unpack `width * height` pixels from LSB-first words.
    ///
    /// Returns `None` if `words` holds fewer bits than needed. Extra words
    /// and the unused tail bits of the last word are ignored.
    pub fn unpack(width: usize, height: usize, words: &[u32]) -> Option<Self> {
        let needed = words_for(u32::try_from(width).ok()?, u32::try_from(height).ok()?)?;
        if words.len() < needed {
            return None;
        }

        let mut words = words[..needed].to_vec();
        let tail = (width * height) % BITS_PER_WORD;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u32 << tail) - 1;
            }
        }

        Some(Self {
            width,
            height,
            words,
        })
    }

    /// Pack into `ceil(width * height / 32)` LSB-first words.
    ///
    /// Unused tail bits of the last word are zero.
    pub fn pack(&self) -> Vec<u32> {
        self.words.clone()
    }

    /// Packed words without copying.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        y * self.width + x
    }

    /// Pixel at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        let i = self.index(x, y);
        (self.words[i / BITS_PER_WORD] >> (i % BITS_PER_WORD)) & 1 == 1
    }

    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        let i = self.index(x, y);
        let mask = 1u32 << (i % BITS_PER_WORD);
        if value {
            self.words[i / BITS_PER_WORD] |= mask;
        } else {
            self.words[i / BITS_PER_WORD] &= !mask;
        }
    }

    /// Pixels of row `y`, left to right.
    pub fn row(&self, y: usize) -> impl Iterator<Item = bool> + '_ {
        (0..self.width).map(move |x| self.get(x, y))
    }

    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Text dump: one line per row, `1` for set and `0` for clear,
    /// every row terminated by `\n`.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            out.extend(self.row(y).map(|b| if b { '1' } else { '0' }));
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for BitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitMatrix")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("set", &self.count_set())
            .finish()
    }
}
