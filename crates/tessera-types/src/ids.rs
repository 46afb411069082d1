//! Identity for things that live on tiles.
//!
//! Actors are compared by identity, never by value: two actors with the
//! same name and position are still different actors. Each id is a UUID
//! v7, so ordered maps keyed by id iterate roughly in creation order.
//!
//! Ids serialize as the bare UUID. Their [`Display`](core::fmt::Display)
//! form carries a kind tag (`actor:0190...`) so log lines that mention
//! both an actor and an item stay unambiguous; [`FromStr`] accepts either
//! form.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure to parse an id from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {input:?}")]
pub struct ParseIdError {
    /// Which id kind was expected.
    pub kind: &'static str,
    /// The rejected text.
    pub input: String,
}

macro_rules! tile_entity_id {
    ($(#[$meta:meta])* $name:ident => $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Tag used in the display form.
            pub const TAG: &'static str = $tag;

            /// Mint a fresh, time-ordered id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}:{}", Self::TAG, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .strip_prefix(Self::TAG)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .unwrap_or(s);
                Uuid::parse_str(raw).map(Self).map_err(|_err| ParseIdError {
                    kind: Self::TAG,
                    input: s.to_owned(),
                })
            }
        }
    };
}

tile_entity_id! {
    /// Identity of an actor (player, boss, NPC).
    ActorId => "actor"
}

tile_entity_id! {
    /// Identity of an item lying on a tile.
    ItemId => "item"
}
