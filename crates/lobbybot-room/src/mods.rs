//! Modifier policy: difficulty multipliers and incompatibilities.
//!
//! A fixed lookup table. Speed modifiers scale difficulty by their playback
//! rate (the rate from the mod's settings when present); `HR` and `HD`
//! apply a fixed factor. Any acronym not in the table is unknown and an
//! item requiring it is rejected.

use lobbybot_protocol::Mod;

/// Every modifier players may pick freely, in display order.
pub const ALL_MODS: &[&str] = &[
    "EZ", "NF", "HR", "SD", "PF", "HD", "FL", "BL", "ST", "TP", "DA", "CL", "RD", "MR", "AL",
    "SG", "RX", "AP", "SO", "TR", "WG", "SI", "GR", "DF", "TC", "BR", "AD", "MU", "NS", "MG",
    "RP", "FR",
];

/// Modifiers an item may require; anything else is rejected.
pub const REQUIRED_MODS: &[&str] = &["DT", "NC", "DC", "HT", "HR", "HD"];

/// How one modifier scales difficulty.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scaling {
    /// Multiply by the mod's `speed_change`, or this default.
    Speed(f64),
    /// Multiply by this factor.
    Fixed(f64),
}

fn scaling(acronym: &str) -> Option<Scaling> {
    match acronym {
        "DT" | "NC" => Some(Scaling::Speed(1.5)),
        "DC" | "HT" => Some(Scaling::Speed(0.75)),
        "HR" => Some(Scaling::Fixed(1.10)),
        "HD" => Some(Scaling::Fixed(1.0)),
        _ => None,
    }
}

/// The difficulty multiplier for `m`, or `None` if the acronym is unknown.
///
/// ```
/// use lobbybot_protocol::Mod;
/// use lobbybot_room::mods::multiplier;
///
/// assert_eq!(multiplier(&Mod::new("DT")), Some(1.5));
/// assert_eq!(multiplier(&Mod::with_speed("DT", 1.2)), Some(1.2));
/// assert_eq!(multiplier(&Mod::new("XX")), None);
/// ```
pub fn multiplier(m: &Mod) -> Option<f64> {
    scaling(&m.acronym).map(|s| match s {
        Scaling::Speed(default) => m.settings.speed_change.unwrap_or(default),
        Scaling::Fixed(factor) => factor,
    })
}

/// Folds `required` over `base`, left to right.
///
/// # Errors
/// The first unknown acronym, so the caller can name it.
pub fn effective_difficulty(base: f64, required: &[Mod]) -> Result<f64, String> {
    required.iter().try_fold(base, |stars, m| match multiplier(m) {
        Some(factor) => Ok(stars * factor),
        None => Err(m.acronym.clone()),
    })
}

/// Modifiers that can't be combined with `acronym`.
pub fn incompatible_with(acronym: &str) -> &'static [&'static str] {
    match acronym {
        "HR" => &["EZ", "MR", "DA"],
        _ => &[],
    }
}

/// The full legal allowed-mod set for an item requiring `required`:
/// every mod, minus the required ones, minus anything incompatible with a
/// required one.
pub fn legal_allowed_mods(required: &[Mod]) -> Vec<Mod> {
    ALL_MODS
        .iter()
        .filter(|acronym| {
            !required.iter().any(|r| {
                r.acronym == **acronym || incompatible_with(&r.acronym).contains(*acronym)
            })
        })
        .map(|acronym| Mod::new(*acronym))
        .collect()
}

/// Whether `allowed` contains every mod in `legal`.
pub fn covers(allowed: &[Mod], legal: &[Mod]) -> bool {
    legal
        .iter()
        .all(|l| allowed.iter().any(|a| a.acronym == l.acronym))
}
