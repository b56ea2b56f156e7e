//! Playlist item policy.
//!
//! [`check`] is pure: the caller fetches the facts (star rating, length)
//! and carries out whatever the verdict asks for. The pipeline stops at the
//! first failure:
//!
//! 1. length over the limit → reject
//! 2. unknown required mod → reject
//! 3. effective difficulty out of range → reject
//! 4. allowed mods missing something legal → repair

use lobbybot_protocol::{Mod, PlaylistItem, UserId};

use crate::config::{format_length, DifficultyRange};
use crate::mods;

/// The rules in force when an item is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    pub range: DifficultyRange,
    /// Seconds.
    pub max_length: u32,
    pub ruleset: String,
}

/// Catalog facts about an item's beatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemFacts {
    /// Base star rating, before mods.
    pub star_rating: f64,
    /// Seconds.
    pub total_length: u32,
}

/// Why an item can't stay in the playlist.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    TooLong { length: u32, max: u32 },
    ModNotAllowed { acronym: String },
    OutOfRange { stars: f64 },
}

impl Rejection {
    /// The notice posted to the room, addressed to the item's owner.
    pub fn message(&self, username: &str) -> String {
        match self {
            Self::TooLong { length, max } => format!(
                "Sorry, {username}, but the beatmap is too long ({} > {}). Check !max-length",
                format_length(*length),
                format_length(*max),
            ),
            Self::ModNotAllowed { acronym } => format!(
                "Sorry, {username}, but {acronym} is not allowed. Check the list of allowed mods by typing !mods."
            ),
            Self::OutOfRange { stars } => format!(
                "Sorry, {username}, but the beatmap (that is {stars:.2}* hard) is not in range of availabile difficulties. Check !diffs"
            ),
        }
    }
}

/// What to do with an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    /// Keep the item but restore its allowed-mod set to this.
    Repair { allowed: Vec<Mod> },
    Reject(Rejection),
}

/// Whether `item` goes through validation at all.
///
/// Played items are history and our own items are trusted.
pub fn needs_validation(item: &PlaylistItem, me: UserId) -> bool {
    !item.is_played() && item.owner_id != me
}

/// Runs the policy over `item`.
pub fn check(item: &PlaylistItem, facts: ItemFacts, rules: &ValidationRules) -> Verdict {
    if facts.total_length > rules.max_length {
        return Verdict::Reject(Rejection::TooLong {
            length: facts.total_length,
            max: rules.max_length,
        });
    }

    let stars = match mods::effective_difficulty(facts.star_rating, &item.required_mods) {
        Ok(stars) => stars,
        Err(acronym) => return Verdict::Reject(Rejection::ModNotAllowed { acronym }),
    };

    if !rules.range.contains(stars) {
        return Verdict::Reject(Rejection::OutOfRange { stars });
    }

    let legal = mods::legal_allowed_mods(&item.required_mods);
    if !mods::covers(&item.allowed_mods, &legal) {
        return Verdict::Repair { allowed: legal };
    }

    Verdict::Accept
}

#[cfg(test)]
mod tests {
    use lobbybot_protocol::{BeatmapId, PlaylistItemId};

    use super::*;

    fn rules() -> ValidationRules {
        ValidationRules {
            range: DifficultyRange::new(3.99, 7.99),
            max_length: 600,
            ruleset: "osu".into(),
        }
    }

    fn item(required: Vec<Mod>) -> PlaylistItem {
        PlaylistItem {
            id: PlaylistItemId(1),
            owner_id: UserId(10),
            beatmap_id: BeatmapId(55),
            beatmap_checksum: "abc".into(),
            ruleset_id: 0,
            allowed_mods: mods::legal_allowed_mods(&required),
            required_mods: required,
            playlist_order: 0,
            played_at: None,
            star_rating: 0.0,
        }
    }

    fn facts(stars: f64, length: u32) -> ItemFacts {
        ItemFacts {
            star_rating: stars,
            total_length: length,
        }
    }

    #[test]
    fn test_in_range_item_accepted() {
        assert_eq!(check(&item(vec![]), facts(5.0, 200), &rules()), Verdict::Accept);
    }

    #[test]
    fn test_double_time_pushes_out_of_range() {
        // 5.5 * 1.5 = 8.25 > 7.99
        let verdict = check(&item(vec![Mod::new("DT")]), facts(5.5, 200), &rules());
        assert!(matches!(verdict, Verdict::Reject(Rejection::OutOfRange { stars }) if (stars - 8.25).abs() < 1e-9));
    }

    #[test]
    fn test_too_long_rejected_before_anything_else() {
        // Unknown mod and out of range too, but length wins.
        let verdict = check(&item(vec![Mod::new("ZZ")]), facts(99.0, 700), &rules());
        assert_eq!(
            verdict,
            Verdict::Reject(Rejection::TooLong {
                length: 700,
                max: 600
            })
        );
    }

    #[test]
    fn test_unknown_mod_rejected_even_in_range() {
        let verdict = check(&item(vec![Mod::new("FL")]), facts(5.0, 200), &rules());
        assert_eq!(
            verdict,
            Verdict::Reject(Rejection::ModNotAllowed {
                acronym: "FL".into()
            })
        );
    }

    #[test]
    fn test_missing_allowed_mods_repaired() {
        let mut it = item(vec![Mod::new("HR")]);
        it.allowed_mods = vec![Mod::new("HD")];

        match check(&it, facts(5.0, 200), &rules()) {
            Verdict::Repair { allowed } => {
                assert_eq!(allowed, mods::legal_allowed_mods(&[Mod::new("HR")]));
            }
            other => panic!("expected repair, got {other:?}"),
        }
    }

    #[test]
    fn test_needs_validation_skips_played_and_own() {
        let me = UserId(1);
        let mut it = item(vec![]);
        assert!(needs_validation(&it, me));

        it.owner_id = me;
        assert!(!needs_validation(&it, me));

        it.owner_id = UserId(2);
        it.played_at = Some("2024-01-01T00:00:00Z".into());
        assert!(!needs_validation(&it, me));
    }

    #[test]
    fn test_rejection_messages() {
        let msg = Rejection::OutOfRange { stars: 8.254 }.message("alice");
        assert_eq!(
            msg,
            "Sorry, alice, but the beatmap (that is 8.25* hard) is not in range of availabile difficulties. Check !diffs"
        );

        let msg = Rejection::TooLong { length: 700, max: 600 }.message("bob");
        assert!(msg.contains("11:40 > 10:00"));
    }
}
