//! Pick the one method a sample is attributed to.
//!
//! A captured stack has many frames but each sample counts once, so a
//! tiered heuristic chooses the "responsible" frame:
//!
//! 1. Infrastructure frames (runtime namespaces, synthetic frames, helper
//!    names) are filtered out and never selected by any tier
//! 2. Frames whose method name ends in a numeral: the largest numeral wins
//! 3. Frames in a known compute framework or with a compute verb (opt-in)
//! 4. The first surviving frame, leaf to root
//!
//! If every frame is filtered, the raw leaf frame is used.

use crate::parser::StackFrame;
use crate::utils::config::{
    DOMAIN_METHOD_VERBS, DOMAIN_NAMESPACE_MARKERS, HELPER_CLASS_MARKERS, HELPER_METHOD_NAMES,
    INFRASTRUCTURE_PREFIXES, SYNTHETIC_METHOD_MARKERS,
};
use std::fmt;

/// Canonical attribution identity, `<type>.<method>`
pub type MethodKey = String;

/// Which tier produced a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    NumericSuffix,
    DomainMarker,
    FirstApplication,
    RawLeaf,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::NumericSuffix => "NUMERIC",
            Tier::DomainMarker => "DOMAIN",
            Tier::FirstApplication => "SAMPLE",
            Tier::RawLeaf => "LEAF",
        };
        f.write_str(label)
    }
}

/// Frame rule: a frame matching any filter is infrastructure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameFilter {
    NamespacePrefix(&'static str),
    SyntheticMarker(&'static str),
    HelperMethod(&'static str),
    HelperClass(&'static str),
}

impl FrameFilter {
    fn matches(&self, frame: &StackFrame) -> bool {
        match self {
            FrameFilter::NamespacePrefix(prefix) => frame.type_name.starts_with(prefix),
            FrameFilter::SyntheticMarker(marker) => frame.method.contains(marker),
            FrameFilter::HelperMethod(name) => frame.method == *name,
            FrameFilter::HelperClass(marker) => frame.type_name.contains(marker),
        }
    }
}

/// Marker of core compute work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainMarker {
    Namespace(&'static str),
    MethodVerb(&'static str),
}

impl DomainMarker {
    fn matches(&self, frame: &StackFrame) -> bool {
        match self {
            DomainMarker::Namespace(marker) => frame.type_name.contains(marker),
            DomainMarker::MethodVerb(verb) => frame.method.contains(verb),
        }
    }
}

/// Immutable selector configuration
///
/// **Public** - built once per run
#[derive(Debug, Clone)]
pub struct SelectorRules {
    filters: Vec<FrameFilter>,
    markers: Vec<DomainMarker>,
    tiers: Vec<Tier>,
}

impl SelectorRules {
    /// Build the rule set
    ///
    /// # Arguments
    /// * `numeric_suffix` - enable the highest-numeral tier
    /// * `domain_markers` - enable the compute-framework tier
    pub fn new(numeric_suffix: bool, domain_markers: bool) -> Self {
        let filters = INFRASTRUCTURE_PREFIXES
            .iter()
            .copied()
            .map(FrameFilter::NamespacePrefix)
            .chain(SYNTHETIC_METHOD_MARKERS.iter().copied().map(FrameFilter::SyntheticMarker))
            .chain(HELPER_METHOD_NAMES.iter().copied().map(FrameFilter::HelperMethod))
            .chain(HELPER_CLASS_MARKERS.iter().copied().map(FrameFilter::HelperClass))
            .collect();

        let markers = DOMAIN_NAMESPACE_MARKERS
            .iter()
            .copied()
            .map(DomainMarker::Namespace)
            .chain(DOMAIN_METHOD_VERBS.iter().copied().map(DomainMarker::MethodVerb))
            .collect();

        let mut tiers = Vec::with_capacity(4);
        if numeric_suffix {
            tiers.push(Tier::NumericSuffix);
        }
        if domain_markers {
            tiers.push(Tier::DomainMarker);
        }
        tiers.push(Tier::FirstApplication);
        tiers.push(Tier::RawLeaf);

        Self {
            filters,
            markers,
            tiers,
        }
    }

    /// Tiers in evaluation order; the raw leaf always comes last
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Whether a frame is excluded from attribution
    pub fn is_infrastructure(&self, frame: &StackFrame) -> bool {
        self.filters.iter().any(|f| f.matches(frame))
    }

    fn is_domain_frame(&self, frame: &StackFrame) -> bool {
        self.markers.iter().any(|m| m.matches(frame))
    }
}

impl Default for SelectorRules {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// Result of selecting a method for one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub key: MethodKey,
    pub tier: Tier,
    /// Position of the chosen frame, 0 = leaf
    pub frame_index: usize,
    pub line: i32,
}

impl Selection {
    fn new(tier: Tier, frame_index: usize, frame: &StackFrame) -> Self {
        Self {
            key: frame.key(),
            tier,
            frame_index,
            line: frame.line,
        }
    }
}

/// Stateless method selector
///
/// **Public** - used by ingestion once per sample
#[derive(Debug, Clone, Default)]
pub struct MethodSelector {
    rules: SelectorRules,
}

impl MethodSelector {
    pub fn new(rules: SelectorRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SelectorRules {
        &self.rules
    }

    /// Select the attributed method for a stack (frames leaf to root)
    ///
    /// Returns `None` only for an empty stack.
    pub fn select(&self, frames: &[StackFrame]) -> Option<Selection> {
        let leaf = frames.first()?;

        let candidates: Vec<(usize, &StackFrame)> = frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| !self.rules.is_infrastructure(frame))
            .collect();

        self.rules.tiers.iter().find_map(|tier| {
            let (index, frame) = match tier {
                Tier::NumericSuffix => highest_numeric_suffix(&candidates)?,
                Tier::DomainMarker => candidates
                    .iter()
                    .find(|(_, frame)| self.rules.is_domain_frame(frame))
                    .copied()?,
                Tier::FirstApplication => candidates.first().copied()?,
                Tier::RawLeaf => (0, leaf),
            };
            Some(Selection::new(*tier, index, frame))
        })
    }
}

/// Frame with the largest trailing numeral; ties keep the leaf-most frame
///
/// **Private** - numeric-suffix tier
fn highest_numeric_suffix<'a>(
    candidates: &[(usize, &'a StackFrame)],
) -> Option<(usize, &'a StackFrame)> {
    let mut best: Option<(u64, usize, &'a StackFrame)> = None;

    for (index, frame) in candidates {
        let Some(value) = numeric_suffix(&frame.method) else {
            continue;
        };
        if best.map_or(true, |(top, _, _)| value > top) {
            best = Some((value, *index, *frame));
        }
    }

    best.map(|(_, index, frame)| (index, frame))
}

/// Decimal numeral at the end of a method name ("work10" -> 10)
pub fn numeric_suffix(method: &str) -> Option<u64> {
    let stem = method.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &method[stem.len()..];
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
