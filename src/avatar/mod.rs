//! Deterministic avatar URIs.
//!
//! No images are stored for agents or unknown speakers; display images are
//! DiceBear URLs derived from a seed, so the same name always renders the
//! same avatar.

const DICEBEAR_BASE: &str = "https://api.dicebear.com/9.x";

/// Avatar style: initials for people, neutral robots for agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarVariant {
    Initials,
    BotttsNeutral,
}

impl AvatarVariant {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Initials => "initials",
            Self::BotttsNeutral => "bottts-neutral",
        }
    }
}

pub fn generate_avatar_uri(seed: &str, variant: AvatarVariant) -> String {
    format!(
        "{}/{}/svg?seed={}",
        DICEBEAR_BASE,
        variant.as_str(),
        urlencoding::encode(seed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_shape() {
        let uri = generate_avatar_uri("Ada", AvatarVariant::Initials);
        assert_eq!(uri, "https://api.dicebear.com/9.x/initials/svg?seed=Ada");
    }

    #[test]
    fn test_seed_is_encoded() {
        let uri = generate_avatar_uri("Math Tutor", AvatarVariant::BotttsNeutral);
        assert_eq!(
            uri,
            "https://api.dicebear.com/9.x/bottts-neutral/svg?seed=Math%20Tutor"
        );
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            generate_avatar_uri("x", AvatarVariant::Initials),
            generate_avatar_uri("x", AvatarVariant::Initials)
        );
    }
}
