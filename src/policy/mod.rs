//! Static access policy: which paths are public and which path prefixes each
//! role may reach. Built once at startup and shared read-only.

mod access;
mod path;

pub use access::{PathClass, PublicPaths, RoleAccessTable};
pub use path::{has_encoded_separator, matches_prefix, normalize_path};
