//! Synchronization kinds.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// The synchronization state of a resource.
///
/// A bitset combining a direction (`IN_SYNC`, `OUTGOING`, `INCOMING`,
/// `CONFLICTING`) with a change type (`ADDITION`, `DELETION`, `CHANGE`)
/// and the orthogonal conflict flags.
///
/// ```rust
/// use cvsync_core::SyncKind;
///
/// let kind = SyncKind::CONFLICTING | SyncKind::CHANGE | SyncKind::MANUAL_CONFLICT;
/// assert_eq!(kind.direction(), SyncKind::CONFLICTING);
/// assert_eq!(kind.change(), SyncKind::CHANGE);
/// assert!(kind.contains(SyncKind::MANUAL_CONFLICT));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SyncKind(u32);

impl SyncKind {
    /// Local, base and remote agree.
    pub const IN_SYNC: SyncKind = SyncKind(0);

    /// The resource was added.
    pub const ADDITION: SyncKind = SyncKind(1);
    /// The resource was deleted.
    pub const DELETION: SyncKind = SyncKind(2);
    /// The resource was changed.
    pub const CHANGE: SyncKind = SyncKind(3);
    /// Mask selecting the change type.
    pub const CHANGE_MASK: u32 = 3;

    /// The local side is ahead.
    pub const OUTGOING: SyncKind = SyncKind(4);
    /// The remote side is ahead.
    pub const INCOMING: SyncKind = SyncKind(8);
    /// Both sides changed.
    pub const CONFLICTING: SyncKind = SyncKind(12);
    /// Mask selecting the direction.
    pub const DIRECTION_MASK: u32 = 12;

    /// The server reported a conflict that cannot be merged automatically.
    pub const MANUAL_CONFLICT: SyncKind = SyncKind(16);
    /// The server reported a conflict that merges automatically.
    pub const AUTOMERGE_CONFLICT: SyncKind = SyncKind(32);
    /// A conflict that disappears on inspection, such as a delete on both sides.
    pub const PSEUDO_CONFLICT: SyncKind = SyncKind(64);

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a kind from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The direction part.
    #[must_use]
    pub const fn direction(self) -> SyncKind {
        SyncKind(self.0 & Self::DIRECTION_MASK)
    }

    /// The change type part.
    #[must_use]
    pub const fn change(self) -> SyncKind {
        SyncKind(self.0 & Self::CHANGE_MASK)
    }

    /// Returns true if every bit of `flag` is set.
    ///
    /// Use [`direction`](Self::direction) or [`change`](Self::change) to
    /// test multi-bit values such as `CONFLICTING` exactly.
    #[must_use]
    pub const fn contains(self, flag: SyncKind) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Returns true for [`SyncKind::IN_SYNC`].
    #[must_use]
    pub const fn is_in_sync(self) -> bool {
        self.0 == 0
    }

    /// Returns a copy without the bits of `flag`.
    #[must_use]
    pub const fn without(self, flag: SyncKind) -> SyncKind {
        SyncKind(self.0 & !flag.0)
    }
}

impl BitOr for SyncKind {
    type Output = SyncKind;

    fn bitor(self, rhs: SyncKind) -> SyncKind {
        SyncKind(self.0 | rhs.0)
    }
}

impl BitOrAssign for SyncKind {
    fn bitor_assign(&mut self, rhs: SyncKind) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_in_sync() {
            return f.write_str("IN_SYNC");
        }

        let mut parts = Vec::new();
        match self.direction() {
            SyncKind::OUTGOING => parts.push("OUTGOING"),
            SyncKind::INCOMING => parts.push("INCOMING"),
            SyncKind::CONFLICTING => parts.push("CONFLICTING"),
            _ => {}
        }
        match self.change() {
            SyncKind::ADDITION => parts.push("ADDITION"),
            SyncKind::DELETION => parts.push("DELETION"),
            SyncKind::CHANGE => parts.push("CHANGE"),
            _ => {}
        }
        for (flag, name) in [
            (SyncKind::MANUAL_CONFLICT, "MANUAL_CONFLICT"),
            (SyncKind::AUTOMERGE_CONFLICT, "AUTOMERGE_CONFLICT"),
            (SyncKind::PSEUDO_CONFLICT, "PSEUDO_CONFLICT"),
        ] {
            if self.contains(flag) {
                parts.push(name);
            }
        }
        f.write_str(&parts.join("|"))
    }
}
