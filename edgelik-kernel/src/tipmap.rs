//! Tip character maps: alignment symbols to compact codes to state bitmasks.
//!
//! A tip never carries a dense likelihood vector. Each site stores a compact
//! `u8` code, and the map resolves that code to a bitmask of the states the
//! observed symbol is compatible with. Symbols with identical bitmasks share a
//! code, so upper and lower case (or `N`, `-` and `?`) collapse to one entry.

use edgelik_core::{EdgelikError, Result, MAX_STATES};

/// Nucleotide order used by [`TipCharacterMap::nucleotide`].
pub const NUCLEOTIDE_ORDER: &[u8; 4] = b"ACGT";

/// Amino acid order used by [`TipCharacterMap::amino_acid`].
pub const AMINO_ACID_ORDER: &[u8; 20] = b"ARNDCQEGHILKMFPSTWYV";

const UNMAPPED: u16 = u16::MAX;

/// Maps alignment symbols to compact codes and codes to state bitmasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TipCharacterMap {
    states: usize,
    /// symbol byte -> code, or `UNMAPPED`
    codes: [u16; 256],
    /// code -> bitmask over states
    masks: Vec<u64>,
}

impl TipCharacterMap {
    /// Build a map from `(symbol, bitmask)` pairs.
    ///
    /// Codes are assigned in order of first appearance of each distinct
    /// bitmask. A symbol listed twice keeps its last bitmask.
    ///
    /// # Errors
    ///
    /// Returns an error if `states` is 0 or above [`MAX_STATES`], a bitmask is
    /// empty or names a state `>= states`, or more than 256 distinct bitmasks
    /// are supplied.
    pub fn from_pairs<I>(states: usize, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u8, u64)>,
    {
        if states == 0 || states > MAX_STATES {
            return Err(EdgelikError::InvalidInput(format!(
                "tip maps support 1..={} states, got {}",
                MAX_STATES, states
            )));
        }
        let valid = if states == 64 { u64::MAX } else { (1u64 << states) - 1 };

        let pairs: Vec<(u8, u64)> = pairs.into_iter().collect();
        let mut distinct: Vec<u64> = Vec::new();
        for &(symbol, mask) in &pairs {
            if mask == 0 || mask & !valid != 0 {
                return Err(EdgelikError::InvalidInput(format!(
                    "bitmask {:#x} for symbol {:?} is empty or exceeds {} states",
                    mask, symbol as char, states
                )));
            }
            if !distinct.contains(&mask) {
                distinct.push(mask);
            }
        }
        if distinct.len() > 256 {
            return Err(EdgelikError::InvalidInput(
                "more than 256 distinct tip bitmasks".into(),
            ));
        }

        Ok(Self::assign(states, pairs))
    }

    /// Assign codes to already validated pairs.
    fn assign(states: usize, pairs: impl IntoIterator<Item = (u8, u64)>) -> Self {
        let mut codes = [UNMAPPED; 256];
        let mut masks: Vec<u64> = Vec::new();
        for (symbol, mask) in pairs {
            let code = match masks.iter().position(|&m| m == mask) {
                Some(code) => code,
                None => {
                    masks.push(mask);
                    masks.len() - 1
                }
            };
            codes[symbol as usize] = code as u16;
        }
        Self {
            states,
            codes,
            masks,
        }
    }

    /// IUPAC nucleotide map (A, C, G, T/U plus ambiguity codes).
    ///
    /// `N`, `-`, `?`, `O` and `X` are fully ambiguous. Lower case is accepted.
    pub fn nucleotide() -> Self {
        const A: u64 = 1;
        const C: u64 = 2;
        const G: u64 = 4;
        const T: u64 = 8;
        let table: [(u8, u64); 20] = [
            (b'A', A),
            (b'C', C),
            (b'G', G),
            (b'T', T),
            (b'U', T),
            (b'R', A | G),
            (b'Y', C | T),
            (b'S', C | G),
            (b'W', A | T),
            (b'K', G | T),
            (b'M', A | C),
            (b'B', C | G | T),
            (b'D', A | G | T),
            (b'H', A | C | T),
            (b'V', A | C | G),
            (b'N', A | C | G | T),
            (b'O', A | C | G | T),
            (b'X', A | C | G | T),
            (b'-', A | C | G | T),
            (b'?', A | C | G | T),
        ];
        Self::with_lowercase(4, &table)
    }

    /// Amino acid map over the 20 canonical residues.
    ///
    /// `B` = D|N, `Z` = E|Q, `J` = I|L; `X`, `-`, `?` and `*` are fully
    /// ambiguous. Lower case is accepted.
    pub fn amino_acid() -> Self {
        let bit = |aa: u8| -> u64 {
            AMINO_ACID_ORDER
                .iter()
                .position(|&c| c == aa)
                .map_or(0, |i| 1u64 << i)
        };
        let all = (1u64 << AMINO_ACID_ORDER.len()) - 1;

        let mut table: Vec<(u8, u64)> = AMINO_ACID_ORDER.iter().map(|&aa| (aa, bit(aa))).collect();
        table.push((b'B', bit(b'D') | bit(b'N')));
        table.push((b'Z', bit(b'E') | bit(b'Q')));
        table.push((b'J', bit(b'I') | bit(b'L')));
        for gap in [b'X', b'-', b'?', b'*'] {
            table.push((gap, all));
        }
        Self::with_lowercase(AMINO_ACID_ORDER.len(), &table)
    }

    /// Identity map for pre-encoded bitmask tips: code `c` is its own
    /// bitmask, and symbol `c` encodes to code `c`, for every `c` in
    /// `1..2^states`.
    ///
    /// Code 0 has the empty mask and is never accepted as a tip code. Only
    /// defined for `states <= 8` so every bitmask fits in a byte.
    pub fn bitmask_identity(states: usize) -> Result<Self> {
        if states == 0 || states > 8 {
            return Err(EdgelikError::InvalidInput(format!(
                "bitmask identity maps need 1..=8 states, got {}",
                states
            )));
        }
        let top = 1usize << states;
        let mut codes = [UNMAPPED; 256];
        for (c, slot) in codes.iter_mut().enumerate().take(top).skip(1) {
            *slot = c as u16;
        }
        Ok(Self {
            states,
            codes,
            masks: (0..top as u64).collect(),
        })
    }

    fn with_lowercase(states: usize, table: &[(u8, u64)]) -> Self {
        let pairs = table
            .iter()
            .flat_map(|&(sym, mask)| [(sym, mask), (sym.to_ascii_lowercase(), mask)]);
        Self::assign(states, pairs)
    }

    /// Number of model states the bitmasks range over.
    pub fn states(&self) -> usize {
        self.states
    }

    /// Number of code slots; codes at or above this are unknown.
    pub fn code_count(&self) -> usize {
        self.masks.len()
    }

    /// The compact code for an alignment symbol, if mapped.
    pub fn code_of(&self, symbol: u8) -> Option<u8> {
        match self.codes[symbol as usize] {
            UNMAPPED => None,
            code => Some(code as u8),
        }
    }

    /// The state bitmask for `code`; unknown codes map to `0`.
    #[inline]
    pub fn mask(&self, code: u8) -> u64 {
        self.masks.get(code as usize).copied().unwrap_or(0)
    }

    /// True if `code` is mapped to a non-empty bitmask.
    pub fn contains_code(&self, code: u8) -> bool {
        self.mask(code) != 0
    }

    /// True if `state` is compatible with the symbol encoded by `code`.
    pub fn is_compatible(&self, code: u8, state: usize) -> bool {
        state < self.states && (self.mask(code) >> state) & 1 == 1
    }

    /// Encode an aligned sequence into compact codes.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unmapped symbol.
    pub fn encode(&self, sequence: &[u8]) -> Result<Vec<u8>> {
        sequence
            .iter()
            .enumerate()
            .map(|(pos, &sym)| {
                self.code_of(sym).ok_or_else(|| {
                    EdgelikError::InvalidInput(format!(
                        "unmapped symbol {:?} at position {}",
                        sym as char, pos
                    ))
                })
            })
            .collect()
    }
}
