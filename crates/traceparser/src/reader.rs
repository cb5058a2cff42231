use std::io::{self, Read};

use crate::types::ParseError;

/// Type tag of the separator element that closes a scope run.
pub(crate) const SEPARATOR: u16 = 0;

/// Decoded element header (control word + length field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ElementHeader {
    pub type_tag: u16,
    pub len: u32,
}

impl ElementHeader {
    pub fn is_separator(&self) -> bool {
        self.type_tag == SEPARATOR
    }
}

/// Big-endian reader over the trace byte source.
///
/// A read that hits EOF before its first byte returns
/// `ParseError::EndOfStream`. A read that hits EOF after consuming some of
/// its bytes returns `ParseError::Truncated`. Callers decide whether a clean
/// EOF is acceptable at their position.
pub(crate) struct TraceReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Number of bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ParseError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Err(ParseError::EndOfStream),
                Ok(0) => return Err(ParseError::Truncated),
                Ok(n) => {
                    filled += n;
                    self.offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ParseError::Io(e)),
            }
        }
        Ok(())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, ParseError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, ParseError> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    /// Read exactly `n` bytes into a new Vec.
    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(n)
            .map_err(|_| ParseError::OutOfMemory)?;
        buf.resize(n, 0);
        if n > 0 {
            self.fill(&mut buf)?;
        }
        Ok(buf)
    }

    /// Skip `n` bytes without interpreting them.
    pub fn skip(&mut self, n: u64) -> Result<(), ParseError> {
        let copied = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.offset += copied;
        if copied < n {
            return Err(ParseError::Truncated);
        }
        Ok(())
    }

    /// Read an element header.
    ///
    /// Bit 0 of the control word selects a 1-byte (0) or 4-byte (1) length
    /// field, the remaining bits are the type tag. The separator has no
    /// length field at all. EOF before the control word is reported as
    /// `EndOfStream`, anywhere after it as `Truncated`.
    pub fn element_header(&mut self) -> Result<ElementHeader, ParseError> {
        let control = self.u16()?;
        let type_tag = control >> 1;

        if type_tag == SEPARATOR {
            return Ok(ElementHeader { type_tag, len: 0 });
        }

        let len = if control & 1 == 1 {
            self.u32()
        } else {
            self.u8().map(u32::from)
        }
        .map_err(ParseError::eof_is_truncation)?;

        Ok(ElementHeader { type_tag, len })
    }
}
