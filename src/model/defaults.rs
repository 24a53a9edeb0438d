//! Well-known platform identifiers.
//!
//! These ids ship with every viewer/library installation and are never
//! archived or substituted; they must match the platform byte-for-byte.

use std::collections::HashSet;

use uuid::{uuid, Uuid};

/// Default prim texture; also the substitute applied by the filter.
pub const PLYWOOD_TEXTURE: Uuid = uuid!("89556747-24cb-43ed-920b-47caed15465f");

/// Flat white texture.
pub const BLANK_TEXTURE: Uuid = uuid!("5748decc-f629-461c-9a36-a35a221fe21f");

/// Fully transparent texture.
pub const TRANSPARENT_TEXTURE: Uuid = uuid!("8dcd4a48-2d37-4909-9f78-f7a9eb4ef903");

/// Media placeholder texture.
pub const MEDIA_TEXTURE: Uuid = uuid!("8b5fec65-8d8d-9dc5-cda8-8fdf2716e361");

/// Identity that owns the built-in content library. Always permitted as
/// a creator.
pub const LIBRARY_OWNER: Uuid = uuid!("11111111-1111-0000-0000-000100bba000");

/// The fixed set of asset ids exempt from archiving and substitution.
pub fn well_known_assets() -> HashSet<Uuid> {
    [
        PLYWOOD_TEXTURE,
        BLANK_TEXTURE,
        TRANSPARENT_TEXTURE,
        MEDIA_TEXTURE,
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_contains_substitute() {
        let set = well_known_assets();
        assert!(set.contains(&PLYWOOD_TEXTURE));
        assert!(!set.contains(&LIBRARY_OWNER));
    }
}
