//! A persistent, copy-on-write radix trie over IPv4 prefixes.
//!
//! The trie core (`node`, `trie`) never mutates a node once it's reachable
//! from a published root; every insert, delete, or aggregation is a pure
//! function from one root to another, sharing whatever subtrees didn't
//! change. Five façades sit on top of that core: a mutable map, an
//! immutable map snapshot, a mutable address set, and an immutable set
//! snapshot — plus the map itself doubling as the "typed generic wrapper"
//! the design calls for, since a statically typed payload needs no
//! separate wrapper in Rust.
//!
//! ```
//! use patricia_store::PrefixMap;
//! use std::net::Ipv4Addr;
//!
//! let map = PrefixMap::new();
//! map.insert(Ipv4Addr::new(10, 0, 0, 0), "gateway").unwrap();
//! assert_eq!(map.get(Ipv4Addr::new(10, 0, 0, 0)), Some("gateway"));
//! ```

mod map;
mod node;
mod set;
mod set_snapshot;
mod snapshot;
mod trie;
pub mod types;

pub use map::PrefixMap;
pub use set::{PrefixInput, PrefixSet, SetLike};
pub use set_snapshot::PrefixSetSnapshot;
pub use snapshot::PrefixMapSnapshot;
pub use trie::diff::DiffEvent;
pub use types::errors::{FatalError, PrefixStoreError};
pub use types::match_options::Match;
pub use types::prefix::{IntoPrefix, Ipv4Net};
pub use types::range::Range;
