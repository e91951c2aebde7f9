//! Deterministic protocol hashing.

use std::collections::BTreeSet;

use blake3::Hasher;
use wire::WIRE_VERSION;

/// Computes the hash both peers exchange in the handshake.
///
/// Covers the wire version, the registered entity kinds, and the logical
/// action names. Order and duplicates in the inputs do not matter.
#[must_use]
pub fn protocol_hash<'a, K, A>(kinds: K, actions: A) -> u64
where
    K: IntoIterator<Item = &'a str>,
    A: IntoIterator<Item = &'a str>,
{
    let kinds: BTreeSet<&str> = kinds.into_iter().collect();
    let actions: BTreeSet<&str> = actions.into_iter().collect();

    let mut hasher = Hasher::new();
    write_u8(&mut hasher, WIRE_VERSION);
    write_names(&mut hasher, &kinds);
    write_names(&mut hasher, &actions);

    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn write_names(hasher: &mut Hasher, names: &BTreeSet<&str>) {
    write_u32(hasher, names.len() as u32);
    for name in names {
        write_u32(hasher, name.len() as u32);
        hasher.update(name.as_bytes());
    }
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_order_independent() {
        let a = protocol_hash(["player1", "bullet"], ["Shoot", "MoveUp"]);
        let b = protocol_hash(["bullet", "player1"], ["MoveUp", "Shoot", "Shoot"]);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_changes_with_kinds() {
        let a = protocol_hash(["player1"], ["Shoot"]);
        let b = protocol_hash(["player1", "enemy"], ["Shoot"]);
        assert_ne!(a, b);
    }

    #[test]
    fn kinds_and_actions_are_separate() {
        let a = protocol_hash(["Shoot"], []);
        let b = protocol_hash([], ["Shoot"]);
        assert_ne!(a, b);
    }

    #[test]
    fn name_boundaries_matter() {
        let a = protocol_hash(["ab", "c"], []);
        let b = protocol_hash(["a", "bc"], []);
        assert_ne!(a, b);
    }
}
