//! Per-message routing flags
//!
//! Flags live only as long as the message. Setting a flag that is already
//! set is a no-op: the set is a bitset, never a counter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named flags used by the routing script
///
/// Numeric ids follow the stock proxy configuration so that a host that
/// exchanges raw flag numbers sees the same bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteFlag {
    /// Account this transaction
    Acc,
    /// Account missed calls
    AccMissed,
    /// Account failed transactions
    AccFailed,
    /// Source of the request is behind NAT
    Nats,
    /// Contact / branch is behind NAT
    Natb,
    /// Keep the NAT binding open with SIP OPTIONS pings
    NatSipping,
}

impl RouteFlag {
    pub const ALL: [RouteFlag; 6] = [
        RouteFlag::Acc,
        RouteFlag::AccMissed,
        RouteFlag::AccFailed,
        RouteFlag::Nats,
        RouteFlag::Natb,
        RouteFlag::NatSipping,
    ];

    /// Numeric flag id
    pub const fn id(self) -> u32 {
        match self {
            RouteFlag::Acc => 1,
            RouteFlag::AccMissed => 2,
            RouteFlag::AccFailed => 3,
            RouteFlag::Nats => 5,
            RouteFlag::Natb => 6,
            RouteFlag::NatSipping => 7,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            RouteFlag::Acc => "ACC",
            RouteFlag::AccMissed => "ACCMISSED",
            RouteFlag::AccFailed => "ACCFAILED",
            RouteFlag::Nats => "NATS",
            RouteFlag::Natb => "NATB",
            RouteFlag::NatSipping => "NATSIPPING",
        }
    }

    const fn mask(self) -> u32 {
        1 << self.id()
    }
}

impl fmt::Display for RouteFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitset of [`RouteFlag`]s scoped to one message
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageFlags(u32);

impl MessageFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, flag: RouteFlag) {
        self.0 |= flag.mask();
    }

    pub fn reset(&mut self, flag: RouteFlag) {
        self.0 &= !flag.mask();
    }

    pub fn is_set(&self, flag: RouteFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bits, as exchanged with the host core
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Flags currently set, in id order
    pub fn iter(&self) -> impl Iterator<Item = RouteFlag> + '_ {
        RouteFlag::ALL.into_iter().filter(|flag| self.is_set(*flag))
    }
}

impl FromIterator<RouteFlag> for MessageFlags {
    fn from_iter<I: IntoIterator<Item = RouteFlag>>(iter: I) -> Self {
        let mut flags = MessageFlags::new();
        for flag in iter {
            flags.set(flag);
        }
        flags
    }
}
