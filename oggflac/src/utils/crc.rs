//! CRC validation utilities for Ogg pages.
//!
//! Ogg uses a CRC-32 with polynomial `0x04C11DB7`, zero initial value, no
//! bit reflection and no final XOR, computed over the whole page with the
//! checksum field set to zero.

/// CRC algorithm specification with polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-32 algorithm for Ogg page validation.
pub const CRC_OGG_PAGE_ALG: Algorithm<u32> = Algorithm {
    poly: 0x04C1_1DB7,
    init: 0x0000_0000,
};

/// Computes CRC-32 of a single leading byte using specified polynomial.
#[inline(always)]
pub const fn crc32(poly: u32, value: u32, len: usize) -> u32 {
    let mut value = value << 24;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 31) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc32_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc32(poly, i as u32, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc32 {
    pub poly: u32,
    pub init: u32,
    table: [u32; 256],
}

impl Crc32 {
    pub const fn new(algorithm: &Algorithm<u32>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc32_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u32) -> u32 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u32, bytes: &[u8]) -> u32 {
        let mut i = 0;

        while i < bytes.len() {
            crc = (crc << 8) ^ self.table_entry((crc >> 24) ^ bytes[i] as u32);
            i += 1;
        }

        crc
    }
}

/// Page checksum over a header (checksum field already zeroed) and body.
pub fn ogg_page_crc(header: &[u8], body: &[u8]) -> u32 {
    static CRC: Crc32 = Crc32::new(&CRC_OGG_PAGE_ALG);

    let crc = CRC.update(CRC.init, header);
    CRC.update(crc, body)
}
