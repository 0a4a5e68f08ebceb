//! Raw 32-bit register access for the blocks this crate drives directly.

#[inline(always)]
pub(crate) unsafe fn read32(addr: u32) -> u32 {
    core::ptr::read_volatile(addr as *const u32)
}

#[inline(always)]
pub(crate) unsafe fn write32(addr: u32, val: u32) {
    core::ptr::write_volatile(addr as *mut u32, val);
}

#[inline(always)]
pub(crate) unsafe fn modify32(addr: u32, f: impl FnOnce(u32) -> u32) {
    write32(addr, f(read32(addr)));
}

/// Replace the `width`-bit field at `shift` in `reg` with `value`.
#[inline(always)]
pub(crate) const fn with_field(reg: u32, shift: u32, width: u32, value: u32) -> u32 {
    let mask = ((1u32 << width) - 1) << shift;
    (reg & !mask) | ((value << shift) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_replacement_masks_neighbours() {
        assert_eq!(with_field(0xFFFF_FFFF, 4, 4, 0x0), 0xFFFF_FF0F);
        assert_eq!(with_field(0, 30, 2, 0x7), 0xC000_0000);
        assert_eq!(with_field(0x0000_0A00, 8, 4, 0x5), 0x0000_0500);
    }
}
