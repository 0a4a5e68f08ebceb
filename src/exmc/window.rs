//! Offset-addressed access to an SDRAM device window.

use core::marker::PhantomData;
use core::ptr;

use super::Error;

/// Flat view of one initialized SDRAM device.
///
/// Accesses are volatile, element by element, in ascending address order.
/// The checked methods reject ranges that leave the window and half-word
/// accesses at odd offsets.
pub struct SdramWindow<'a> {
    base: *mut u8,
    len: usize,
    _phantom: PhantomData<&'a mut [u8]>,
}

impl<'a> SdramWindow<'a> {
    /// # Safety
    ///
    /// `base` must be valid for volatile reads and writes of `len` bytes for
    /// `'a`, and 2-byte aligned.
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Self {
        Self {
            base,
            len,
            _phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, offset: usize, bytes: usize) -> Result<(), Error> {
        match offset.checked_add(bytes) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::OutOfBounds { offset, len: bytes }),
        }
    }

    fn check_u16(&self, offset: usize, count: usize) -> Result<(), Error> {
        if offset % 2 != 0 {
            return Err(Error::Misaligned { offset });
        }
        let bytes = count.checked_mul(2).ok_or(Error::OutOfBounds { offset, len: usize::MAX })?;
        self.check(offset, bytes)
    }

    pub fn write_u8(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        self.check(offset, data.len())?;
        unsafe { self.write_u8_unchecked(offset, data) };
        Ok(())
    }

    pub fn read_u8(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.check(offset, buf.len())?;
        unsafe { self.read_u8_unchecked(offset, buf) };
        Ok(())
    }

    pub fn write_u16(&mut self, offset: usize, data: &[u16]) -> Result<(), Error> {
        self.check_u16(offset, data.len())?;
        unsafe { self.write_u16_unchecked(offset, data) };
        Ok(())
    }

    pub fn read_u16(&self, offset: usize, buf: &mut [u16]) -> Result<(), Error> {
        self.check_u16(offset, buf.len())?;
        unsafe { self.read_u16_unchecked(offset, buf) };
        Ok(())
    }

    /// # Safety
    ///
    /// `offset..offset + data.len()` must lie inside the window.
    pub unsafe fn write_u8_unchecked(&mut self, offset: usize, data: &[u8]) {
        let dst = self.base.add(offset);
        for (i, &b) in data.iter().enumerate() {
            ptr::write_volatile(dst.add(i), b);
        }
    }

    /// # Safety
    ///
    /// `offset..offset + buf.len()` must lie inside the window.
    pub unsafe fn read_u8_unchecked(&self, offset: usize, buf: &mut [u8]) {
        let src = self.base.add(offset) as *const u8;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = ptr::read_volatile(src.add(i));
        }
    }

    /// # Safety
    ///
    /// `offset` must be even and `offset..offset + 2 * data.len()` must lie
    /// inside the window.
    pub unsafe fn write_u16_unchecked(&mut self, offset: usize, data: &[u16]) {
        let dst = self.base.add(offset) as *mut u16;
        for (i, &w) in data.iter().enumerate() {
            ptr::write_volatile(dst.add(i), w);
        }
    }

    /// # Safety
    ///
    /// `offset` must be even and `offset..offset + 2 * buf.len()` must lie
    /// inside the window.
    pub unsafe fn read_u16_unchecked(&self, offset: usize, buf: &mut [u16]) {
        let src = self.base.add(offset) as *const u16;
        for (i, w) in buf.iter_mut().enumerate() {
            *w = ptr::read_volatile(src.add(i));
        }
    }
}

/// Fill `buf` with an ascending byte pattern starting at `start`.
pub fn fill_buffer(buf: &mut [u8], start: u8) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = start.wrapping_add(i as u8);
    }
}
