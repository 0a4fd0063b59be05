//! The two account slots and per-slot containers.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use anyhow::bail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    /// 1 or 2, as used in storage keys and messages.
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for Slot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "left" => Ok(Slot::One),
            "2" | "right" => Ok(Slot::Two),
            other => bail!("invalid account slot '{}', expected 1 or 2", other),
        }
    }
}

/// One value per slot. Slots never share state; each is reached only
/// through its own index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerSlot<T> {
    one: T,
    two: T,
}

impl<T> PerSlot<T> {
    pub fn new(one: T, two: T) -> Self {
        Self { one, two }
    }

    pub fn from_fn(mut f: impl FnMut(Slot) -> T) -> Self {
        Self {
            one: f(Slot::One),
            two: f(Slot::Two),
        }
    }
}

impl<T> Index<Slot> for PerSlot<T> {
    type Output = T;

    fn index(&self, slot: Slot) -> &T {
        match slot {
            Slot::One => &self.one,
            Slot::Two => &self.two,
        }
    }
}

impl<T> IndexMut<Slot> for PerSlot<T> {
    fn index_mut(&mut self, slot: Slot) -> &mut T {
        match slot {
            Slot::One => &mut self.one,
            Slot::Two => &mut self.two,
        }
    }
}

/// Which way a sync copies fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Slot 1's fields onto slot 2's contact.
    LeftToRight,
    /// Slot 2's fields onto slot 1's contact.
    RightToLeft,
}

impl SyncDirection {
    pub fn source_slot(self) -> Slot {
        self.target_slot().other()
    }

    pub fn target_slot(self) -> Slot {
        match self {
            SyncDirection::LeftToRight => Slot::Two,
            SyncDirection::RightToLeft => Slot::One,
        }
    }
}

impl FromStr for SyncDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left-to-right" | "ltr" => Ok(SyncDirection::LeftToRight),
            "right-to-left" | "rtl" => Ok(SyncDirection::RightToLeft),
            other => bail!(
                "invalid direction '{}', expected left-to-right or right-to-left",
                other
            ),
        }
    }
}
