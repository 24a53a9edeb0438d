//! Wearable asset record parsing.
//!
//! Bodypart and clothing assets are line-oriented text records. The
//! archive engine only cares about the texture block; everything else
//! is skipped leniently so viewer-version drift never breaks a gather.
//!
//! ```text
//! LLWearable version 22
//! New Shirt
//!
//!     permissions 0
//!     ...
//! parameters 2
//! 781 .5
//! 150 0
//! textures 1
//! 1 a6d63d8f-b85c-4c5e-a2cb-a4df81bd0bbc
//! ```

use uuid::Uuid;

/// Texture ids referenced by a wearable record, in file order.
///
/// Returns an empty list for payloads that are not text or carry no
/// texture block; a wearable without textures is valid.
pub fn texture_ids(data: &[u8]) -> Vec<Uuid> {
    let Ok(text) = std::str::from_utf8(data) else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    let mut in_textures = false;
    for line in text.lines() {
        let line = line.trim();
        if in_textures {
            // Texture lines are "<index> <uuid>"; anything else ends the block.
            let mut fields = line.split_whitespace();
            let index = fields.next().map(|f| f.parse::<u32>());
            let id = fields.next().map(Uuid::parse_str);
            match (index, id) {
                (Some(Ok(_)), Some(Ok(id))) => ids.push(id),
                _ => break,
            }
        } else if let Some(rest) = line.strip_prefix("textures") {
            if rest.trim().parse::<u32>().is_ok() {
                in_textures = true;
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIRT: &str = "LLWearable version 22\nNew Shirt\n\n\tpermissions 0\n\t{\n\t\tbase_mask\t7fffffff\n\t}\nparameters 2\n781 .5\n150 0\ntextures 2\n1 a6d63d8f-b85c-4c5e-a2cb-a4df81bd0bbc\n5 89556747-24cb-43ed-920b-47caed15465f\n";

    #[test]
    fn test_parses_texture_block() {
        let ids = texture_ids(SHIRT.as_bytes());
        assert_eq!(ids.len(), 2);
        assert_eq!(
            ids[0],
            Uuid::parse_str("a6d63d8f-b85c-4c5e-a2cb-a4df81bd0bbc").unwrap()
        );
    }

    #[test]
    fn test_no_texture_block() {
        assert!(texture_ids(b"LLWearable version 22\nEyes\nparameters 0\n").is_empty());
    }

    #[test]
    fn test_non_utf8_payload() {
        assert!(texture_ids(&[0xFF, 0xFE, 0x00]).is_empty());
    }

    #[test]
    fn test_malformed_texture_line_ends_block() {
        let text = "textures 3\n1 a6d63d8f-b85c-4c5e-a2cb-a4df81bd0bbc\nnot a texture\n2 89556747-24cb-43ed-920b-47caed15465f\n";
        assert_eq!(texture_ids(text.as_bytes()).len(), 1);
    }
}
