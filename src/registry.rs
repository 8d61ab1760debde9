//! Catalog of component kinds offered to the user.
//!
//! The catalog is the static [`ModelKind::ALL`] table minus [`DENYLIST`].

use std::collections::BTreeMap;

use crate::models::ModelKind;

/// Kinds the session cannot drive, with the reason shown in listings.
pub const DENYLIST: &[(ModelKind, &str)] = &[
    (
        ModelKind::Polynomial,
        "needs a polynomial degree at construction time",
    ),
    (
        ModelKind::SplitLorentzian,
        "combination with other components is not supported",
    ),
];

/// Display name → kind for every usable component kind.
pub fn list_available() -> BTreeMap<&'static str, ModelKind> {
    ModelKind::ALL
        .iter()
        .copied()
        .filter(|k| !is_denied(*k))
        .map(|k| (k.display_name(), k))
        .collect()
}

pub fn is_denied(kind: ModelKind) -> bool {
    DENYLIST.iter().any(|(k, _)| *k == kind)
}

/// Resolve a user-supplied name against the catalog.
///
/// Matches the display name (`Gaussian`), the canonical formula name
/// (`gaussian`, `parabolic`) or the display name with a `Model` suffix
/// (`GaussianModel`), case-insensitively. Denied kinds never resolve.
pub fn lookup(name: &str) -> Option<ModelKind> {
    let wanted = name.trim().to_ascii_lowercase();
    let wanted = wanted.strip_suffix("model").unwrap_or(&wanted);
    list_available().into_values().find(|k| {
        k.display_name().eq_ignore_ascii_case(wanted) || k.canonical_name() == wanted
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylisted_kinds_are_excluded() {
        let available = list_available();
        assert!(!available.values().any(|k| *k == ModelKind::Polynomial));
        assert!(!available.values().any(|k| *k == ModelKind::SplitLorentzian));
        assert_eq!(available.len(), ModelKind::ALL.len() - DENYLIST.len());
        assert_eq!(available.get("Gaussian"), Some(&ModelKind::Gaussian));
    }

    #[test]
    fn lookup_accepts_common_spellings() {
        assert_eq!(lookup("gaussian"), Some(ModelKind::Gaussian));
        assert_eq!(lookup("GaussianModel"), Some(ModelKind::Gaussian));
        assert_eq!(lookup("parabolic"), Some(ModelKind::Quadratic));
        assert_eq!(lookup(" PseudoVoigt "), Some(ModelKind::PseudoVoigt));
        assert_eq!(lookup("polynomial"), None);
        assert_eq!(lookup("nope"), None);
    }
}
