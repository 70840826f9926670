use std::fmt;
use std::ops;

const READABLE: u8 = 0b0001;
const WRITABLE: u8 = 0b0010;
const ERROR: u8 = 0b0100;
const CLOSED: u8 = 0b1000;

/// The four independent bits an [`Event`] can carry.
///
/// [`Event`]: crate::event::Event
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const READABLE: EventFlags = EventFlags(READABLE);
    pub const WRITABLE: EventFlags = EventFlags(WRITABLE);
    pub const ERROR: EventFlags = EventFlags(ERROR);
    pub const CLOSED: EventFlags = EventFlags(CLOSED);
    pub const EMPTY: EventFlags = EventFlags(0);

    pub const fn is_readable(self) -> bool {
        self.0 & READABLE != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub const fn is_error(self) -> bool {
        self.0 & ERROR != 0
    }

    pub const fn is_closed(self) -> bool {
        self.0 & CLOSED != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl ops::BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: EventFlags) -> EventFlags {
        EventFlags(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: EventFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        macro_rules! put {
            ($name:expr, $pred:expr) => {
                if $pred {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, $name)?;
                    first = false;
                }
            };
        }
        put!("READABLE", self.is_readable());
        put!("WRITABLE", self.is_writable());
        put!("ERROR", self.is_error());
        put!("CLOSED", self.is_closed());
        if first {
            write!(f, "EMPTY")?;
        }
        Ok(())
    }
}
