// Entity identifiers
//
// Graph entities live in arenas owned by the state graph. These ids are the
// handles used everywhere else, including inside `Value` for reference-style
// arguments.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Position of the entity in its arena
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Build an id from an arena position
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Handle to a machine parameter
    ParameterId,
    "parameter"
);

entity_id!(
    /// Handle to a state node
    StateId,
    "state"
);

entity_id!(
    /// Handle to a bound method call
    MethodId,
    "method"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let id = MethodId::from_index(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "method#7");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&StateId(3)).unwrap();
        assert_eq!(json, "3");
    }
}
