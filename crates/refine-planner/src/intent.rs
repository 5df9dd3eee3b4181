//! Intent analysis
//!
//! Classifies a free-text refinement request by keyword matching. The result
//! only shapes instruction wording, so classification never fails.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Kind of change a refinement asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    /// Change an existing value
    Modify,
    /// Introduce something new
    Add,
    /// Take something out
    Remove,
    /// Reshape without changing meaning
    Restructure,
}

impl IntentType {
    /// Every intent type; earlier entries win ties
    pub const ALL: [IntentType; 4] = [Self::Modify, Self::Add, Self::Remove, Self::Restructure];

    /// Trigger words for this intent type
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Modify => &[
                "change", "update", "modify", "rename", "replace", "set", "edit", "adjust", "alter",
            ],
            Self::Add => &["add", "include", "insert", "create", "append", "introduce", "new"],
            Self::Remove => &["remove", "delete", "drop", "eliminate", "exclude", "strip"],
            Self::Restructure => &[
                "refactor",
                "restructure",
                "reorganize",
                "split",
                "merge",
                "move",
                "consolidate",
            ],
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Modify => "modify",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Restructure => "restructure",
        }
    }
}

impl Display for IntentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one refinement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    /// Winning intent type
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    /// Strength of the match in `[0, 1]`
    pub confidence: f64,
    /// Matched keywords of the winning type, in text order
    pub keywords: Vec<String>,
}

/// Confidence when no keyword matched
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Classify `text`
///
/// Distinct keywords are counted per intent type; the type with most matches
/// wins, ties going to the earlier entry of [`IntentType::ALL`]. Confidence is
/// `min(1, 0.4 + 0.2 * matches)`. Without any match the result is
/// [`IntentType::Modify`] at confidence 0.3.
#[must_use]
pub fn analyze_intent(text: &str) -> IntentAnalysis {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    let mut best: Option<(IntentType, Vec<String>)> = None;
    for intent_type in IntentType::ALL {
        let mut matched: Vec<String> = Vec::new();
        for token in &tokens {
            if intent_type.keywords().contains(token) && !matched.iter().any(|m| m == token) {
                matched.push((*token).to_string());
            }
        }
        let better = match &best {
            Some((_, current)) => matched.len() > current.len(),
            None => !matched.is_empty(),
        };
        if better {
            best = Some((intent_type, matched));
        }
    }

    match best {
        Some((intent_type, keywords)) => {
            #[allow(clippy::cast_precision_loss)]
            let confidence = (0.4 + 0.2 * keywords.len() as f64).min(1.0);
            IntentAnalysis {
                intent_type,
                confidence,
                keywords,
            }
        }
        None => IntentAnalysis {
            intent_type: IntentType::Modify,
            confidence: FALLBACK_CONFIDENCE,
            keywords: Vec::new(),
        },
    }
}
