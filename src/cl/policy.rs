// cl/policy.rs — Ranked platform-selection policy.
//
// OpenCL installations routinely expose several platforms at once: a vendor
// GPU driver next to one or more software/emulated stacks (Clover, PoCL,
// Oclgrind). The software ones are functionally correct but defeat the
// purpose of a parallel benchmark, so selection is policy-driven:
//
//   1. An ordered allow-list is scanned first; the earliest prefer entry
//      that matches any platform wins (list order, not platform order).
//   2. Otherwise the first platform matching no deny-list entry is taken.
//   3. If every platform is deny-listed, the first one is taken anyway and
//      the selection is flagged degraded so the caller can warn.
//
// The policy is a pure function from a list of platform names to a
// `Selection` — no OpenCL calls, fully unit-testable. Matching is
// case-insensitive substring: vendor strings vary in casing across ICDs
// ("Intel(R) OpenCL", "intel gpu" ...).

/// Ordered platform preference and avoidance lists.
#[derive(Debug, Clone)]
pub struct PlatformPolicy {
    /// Substrings of platform names to prefer, highest priority first.
    pub prefer: Vec<String>,
    /// Substrings of platform names to avoid (software/emulated stacks).
    pub avoid: Vec<String>,
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        PlatformPolicy {
            prefer: vec!["NVIDIA".into(), "AMD".into(), "Intel".into()],
            avoid: vec![
                "Clover".into(),
                "Portable Computing Language".into(),
                "Oclgrind".into(),
            ],
        }
    }
}

/// How a platform ended up selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// Matched an allow-list entry.
    Preferred,
    /// No allow-list match; first platform not on the deny list.
    Fallback,
    /// Every platform was deny-listed; first one taken under protest.
    Degraded,
}

/// Outcome of applying a [`PlatformPolicy`] to a platform name list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Index into the platform list passed to [`PlatformPolicy::select`].
    pub index: usize,
    pub kind: SelectionKind,
}

impl Selection {
    /// True when only deny-listed platforms were available.
    pub fn is_degraded(&self) -> bool {
        self.kind == SelectionKind::Degraded
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

impl PlatformPolicy {
    /// Pick a platform index from `names`. Returns `None` only for an
    /// empty list (the caller maps that to `DeviceError::NoPlatform`).
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Option<Selection> {
        if names.is_empty() {
            return None;
        }

        // Allow-list, in priority order.
        for wanted in &self.prefer {
            if let Some(index) = names
                .iter()
                .position(|n| contains_ignore_case(n.as_ref(), wanted))
            {
                return Some(Selection {
                    index,
                    kind: SelectionKind::Preferred,
                });
            }
        }

        // First platform not on the deny list.
        if let Some(index) = names.iter().position(|n| {
            !self
                .avoid
                .iter()
                .any(|bad| contains_ignore_case(n.as_ref(), bad))
        }) {
            return Some(Selection {
                index,
                kind: SelectionKind::Fallback,
            });
        }

        // Everything is deny-listed. Take the first and let the caller warn.
        Some(Selection {
            index: 0,
            kind: SelectionKind::Degraded,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PlatformPolicy {
        PlatformPolicy::default()
    }

    #[test]
    fn empty_list_yields_none() {
        let names: Vec<&str> = vec![];
        assert_eq!(policy().select(&names), None);
    }

    #[test]
    fn preferred_vendor_beats_earlier_software_platform() {
        let names = ["Clover", "NVIDIA CUDA"];
        let sel = policy().select(&names).unwrap();
        assert_eq!(sel.index, 1);
        assert_eq!(sel.kind, SelectionKind::Preferred);
    }

    #[test]
    fn prefer_list_order_wins_over_platform_order() {
        // AMD appears first in the platform list, but NVIDIA is ranked
        // higher in the prefer list.
        let names = ["AMD Accelerated Parallel Processing", "NVIDIA CUDA"];
        let sel = policy().select(&names).unwrap();
        assert_eq!(sel.index, 1);
        assert_eq!(sel.kind, SelectionKind::Preferred);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let names = ["intel(r) opencl graphics"];
        let sel = policy().select(&names).unwrap();
        assert_eq!(sel.index, 0);
        assert_eq!(sel.kind, SelectionKind::Preferred);
    }

    #[test]
    fn fallback_skips_denied_platforms() {
        let names = ["Portable Computing Language", "Mesa Gallium Compute"];
        let sel = policy().select(&names).unwrap();
        assert_eq!(sel.index, 1);
        assert_eq!(sel.kind, SelectionKind::Fallback);
    }

    #[test]
    fn all_denied_degrades_to_first() {
        let names = ["Clover", "Oclgrind", "Portable Computing Language"];
        let sel = policy().select(&names).unwrap();
        assert_eq!(sel.index, 0);
        assert_eq!(sel.kind, SelectionKind::Degraded);
        assert!(sel.is_degraded());
    }

    #[test]
    fn custom_prefer_list_is_honored() {
        let p = PlatformPolicy {
            prefer: vec!["Portable Computing Language".into()],
            avoid: vec![],
        };
        // Allow-list takes precedence even over a platform the default
        // policy would deny.
        let names = ["NVIDIA CUDA", "Portable Computing Language"];
        let sel = p.select(&names).unwrap();
        assert_eq!(sel.index, 1);
        assert_eq!(sel.kind, SelectionKind::Preferred);
    }
}
