//! Region affinity routing.
//!
//! The [`CacheAffinityRouter`] resolves a sticky [`RegionIdentifier`] for each
//! client session. The identifier travels as a signed token in a cookie and
//! selects the partition actor that serializes the session's profile
//! mutations.
//!
//! Sessions pinned to different regions are not coordinated with each
//! other. Two regions may therefore hold diverging views of one account's
//! profile until storage reconciles them; this core does not attempt to
//! resolve that.

pub mod router;
pub mod signer;

pub use router::{CacheAffinityRouter, RegionIdentifier, RegionRequest, RegionResolution};
pub use signer::{HmacSigner, Signer};

/// Cookie carrying the signed region identifier.
pub const REGION_COOKIE_NAME: &str = "cacheIdentifier";
