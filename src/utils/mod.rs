pub mod parallel;

use geo_types::Coord;

/// Morton (Z-order) code of a coordinate. Nearby points tend to get nearby
/// codes, which makes it a cheap spatial sort key.
pub fn z_order_index(c: Coord<f64>) -> u64 {
    let x = sortable_float(c.x) >> 32;
    let y = sortable_float(c.y) >> 32;
    part1by1(x) | (part1by1(y) << 1)
}

// Maps f64 to u64 so that unsigned order matches numeric order.
fn sortable_float(f: f64) -> u64 {
    let bits = f.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000_0000_0000
    }
}

// Spreads the low 32 bits of n over the even bit positions.
fn part1by1(mut n: u64) -> u64 {
    n &= 0x0000_0000_FFFF_FFFF;
    n = (n | (n << 16)) & 0x0000_FFFF_0000_FFFF;
    n = (n | (n << 8)) & 0x00FF_00FF_00FF_00FF;
    n = (n | (n << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    n = (n | (n << 2)) & 0x3333_3333_3333_3333;
    n = (n | (n << 1)) & 0x5555_5555_5555_5555;
    n
}
