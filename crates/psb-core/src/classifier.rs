//! Keyword heuristic that tags a profile with "suggested report" categories.
//!
//! This is not a detection. Matching is a plain substring test, and the
//! intensity attached to each category is random: it is presentation only and
//! says nothing about how many keywords matched. When nothing matches, a random
//! handful of categories is still returned so the report is never empty.

use std::sync::Mutex;

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

/// Closed set of report categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskCategory {
    Hate,
    SelfHarm,
    Bully,
    Violent,
    Illegal,
    Pretending,
    Nudity,
    Spam,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 8] = [
        Self::Hate,
        Self::SelfHarm,
        Self::Bully,
        Self::Violent,
        Self::Illegal,
        Self::Pretending,
        Self::Nudity,
        Self::Spam,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Hate => "HATE",
            Self::SelfHarm => "SELF",
            Self::Bully => "BULLY",
            Self::Violent => "VIOLENT",
            Self::Illegal => "ILLEGAL",
            Self::Pretending => "PRETENDING",
            Self::Nudity => "NUDITY",
            Self::Spam => "SPAM",
        }
    }

    /// Lowercase phrases; a category matches if any appears in any input field.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Hate => &[
                "devil", "666", "savage", "love", "hate", "followers", "selling", "sold",
                "seller", "dick", "ban", "banned", "free", "method", "paid",
            ],
            Self::SelfHarm => &["suicide", "blood", "death", "dead", "kill myself"],
            Self::Bully => &["@"],
            Self::Violent => &["hitler", "osama bin laden", "guns", "soldiers", "masks", "flags"],
            Self::Illegal => &["drugs", "cocaine", "plants", "trees", "medicines"],
            Self::Pretending => &["verified", "tick"],
            Self::Nudity => &["nude", "sex", "send nudes"],
            Self::Spam => &["phone number", "email", "contact", "buy followers"],
        }
    }
}

pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 5;

/// Ordered category → intensity pairs. Never empty when built by the classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskReport {
    entries: Vec<(RiskCategory, u8)>,
    matched: bool,
}

impl RiskReport {
    pub fn entries(&self) -> &[(RiskCategory, u8)] {
        &self.entries
    }

    pub fn intensity(&self, category: RiskCategory) -> Option<u8> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
    }

    pub fn contains(&self, category: RiskCategory) -> bool {
        self.intensity(category).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `false` when the categories are the random fallback rather than keyword hits.
    pub fn is_keyword_match(&self) -> bool {
        self.matched
    }
}

/// Heuristic scorer with an injectable random source.
pub struct ProfileRiskClassifier {
    rng: Mutex<StdRng>,
}

impl Default for ProfileRiskClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRiskClassifier {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic classifier for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn classify(&self, fields: &[&str]) -> RiskReport {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        classify_with(fields, &mut *rng)
    }
}

/// Classify `fields` (e.g. username, full name, biography) using `rng`.
pub fn classify_with<R: Rng>(fields: &[&str], rng: &mut R) -> RiskReport {
    let lowered: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();

    let matched: Vec<RiskCategory> = RiskCategory::ALL
        .into_iter()
        .filter(|cat| {
            cat.keywords()
                .iter()
                .any(|kw| lowered.iter().any(|text| text.contains(kw)))
        })
        .collect();

    if !matched.is_empty() {
        return RiskReport {
            entries: with_intensities(matched, rng),
            matched: true,
        };
    }

    let count = rng.gen_range(2..=5);
    let picked: Vec<RiskCategory> = RiskCategory::ALL
        .choose_multiple(rng, count)
        .copied()
        .collect();
    RiskReport {
        entries: with_intensities(picked, rng),
        matched: false,
    }
}

/// Attach intensities, distinct while the 1..=5 pool lasts.
fn with_intensities<R: Rng>(
    categories: Vec<RiskCategory>,
    rng: &mut R,
) -> Vec<(RiskCategory, u8)> {
    let mut pool: Vec<u8> = (MIN_INTENSITY..=MAX_INTENSITY).collect();
    pool.shuffle(rng);

    categories
        .into_iter()
        .map(|cat| {
            let n = pool
                .pop()
                .unwrap_or_else(|| rng.gen_range(MIN_INTENSITY..=MAX_INTENSITY));
            (cat, n)
        })
        .collect()
}
