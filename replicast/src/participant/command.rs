use std::ops::BitOr;

/// Pending wire actions for one replica toward one participant.
///
/// A participant's command list holds at most one mask per replica; issuing a
/// new command merges into the existing mask via [`CommandMask::merge`]. The
/// dispatch core drains the flags in dependency order: construction before
/// scope change before serialize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandMask(u8);

impl CommandMask {
    /// Announce the object via its `send_construction` hook
    pub const EXPLICIT_CONSTRUCT: Self = Self(1 << 0);
    /// Record the object as constructed remotely with a bare wire header and
    /// no hook call. Overridden by `EXPLICIT_CONSTRUCT`.
    pub const IMPLICIT_CONSTRUCT: Self = Self(1 << 1);
    /// Mutually exclusive with `SCOPE_FALSE`
    pub const SCOPE_TRUE: Self = Self(1 << 2);
    /// Mutually exclusive with `SCOPE_TRUE`
    pub const SCOPE_FALSE: Self = Self(1 << 3);
    pub const SERIALIZE: Self = Self(1 << 4);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn contains_any(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Merge a newly issued command into this mask: explicit construction
    /// dominates implicit, the two scope commands replace each other (last
    /// write wins), serialize accumulates.
    pub fn merge(&mut self, incoming: Self) {
        if incoming.contains(Self::EXPLICIT_CONSTRUCT) {
            self.remove(Self::IMPLICIT_CONSTRUCT);
            self.insert(Self::EXPLICIT_CONSTRUCT);
        }
        if incoming.contains(Self::IMPLICIT_CONSTRUCT) && !self.contains(Self::EXPLICIT_CONSTRUCT)
        {
            self.insert(Self::IMPLICIT_CONSTRUCT);
        }
        if incoming.contains(Self::SCOPE_TRUE) {
            self.remove(Self::SCOPE_FALSE);
            self.insert(Self::SCOPE_TRUE);
        }
        if incoming.contains(Self::SCOPE_FALSE) {
            self.remove(Self::SCOPE_TRUE);
            self.insert(Self::SCOPE_FALSE);
        }
        if incoming.contains(Self::SERIALIZE) {
            self.insert(Self::SERIALIZE);
        }
    }

    pub fn constructions() -> Self {
        Self::EXPLICIT_CONSTRUCT | Self::IMPLICIT_CONSTRUCT
    }

    pub fn scopes() -> Self {
        Self::SCOPE_TRUE | Self::SCOPE_FALSE
    }

    pub fn has_construction(&self) -> bool {
        self.contains_any(Self::constructions())
    }

    /// The commanded scope value, if a scope command is pending
    pub fn scope_command(&self) -> Option<bool> {
        if self.contains(Self::SCOPE_TRUE) {
            Some(true)
        } else if self.contains(Self::SCOPE_FALSE) {
            Some(false)
        } else {
            None
        }
    }
}

impl BitOr for CommandMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
