use std::fmt;
use std::num::NonZeroU8;
use std::ops;

// These must be unique.
const READABLE: u8 = 0b01;
const WRITABLE: u8 = 0b10;

/// Interest to register with the [`Runtime`] for a given endpoint.
///
/// The interest mask is a subset of {readable, writable}; a registration
/// must request at least one of the two.
///
/// [`Runtime`]: crate::Runtime
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct Interest(NonZeroU8);

impl Interest {
    /// Interested in read readiness.
    pub const READABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(READABLE) });
    /// Interested in write readiness.
    pub const WRITABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(WRITABLE) });

    /// Combines two interests. Same as the `BitOr` impl but usable in a
    /// `const` context.
    pub const fn add(self, other: Interest) -> Interest {
        Interest(unsafe { NonZeroU8::new_unchecked(self.0.get() | other.0.get()) })
    }

    /// True if this interest includes readability.
    pub const fn is_readable(self) -> bool {
        self.0.get() & READABLE != 0
    }

    /// True if this interest includes writability.
    pub const fn is_writable(self) -> bool {
        self.0.get() & WRITABLE != 0
    }

    pub(crate) const fn bits(self) -> u8 {
        self.0.get()
    }
}

impl ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        self.add(rhs)
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.is_readable() {
            write!(f, "READABLE")?;
            first = false;
        }
        if self.is_writable() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "WRITABLE")?;
        }
        Ok(())
    }
}
