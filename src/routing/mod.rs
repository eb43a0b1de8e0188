pub mod router;
pub mod trie;

pub use router::{RouteMatch, Router};
pub use trie::{RouteInfo, TrieRouter};
