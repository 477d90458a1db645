//! Declared disposition rules.
//!
//! Each anomaly class the validator can surface maps to exactly one action.
//! The normalizer looks the action up here instead of deciding ad hoc, and
//! the default table is pinned by tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A class of anomaly the normalizer must dispose of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyClass {
    /// A required field is null
    NullValue,
    /// A later row repeats an earlier row's canonical key
    DuplicateKey,
    /// User id carries quotes or whitespace
    UserIdStrayCharacters,
    /// Points carry quotes or question marks
    PointsStrayCharacters,
    /// Event date text matches no accepted layout or names no real day
    UnparseableDate,
    /// Event date parses but lies outside the validity window
    DateOutOfWindow,
    /// Integer field does not cast
    NonIntegerValue,
    /// Value casts but is outside its declared domain
    OutOfDomainValue,
    /// Event references a user id absent from the user table
    UnknownUserReference,
}

impl AnomalyClass {
    /// Every class, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::NullValue,
        Self::DuplicateKey,
        Self::UserIdStrayCharacters,
        Self::PointsStrayCharacters,
        Self::UnparseableDate,
        Self::DateOutOfWindow,
        Self::NonIntegerValue,
        Self::OutOfDomainValue,
        Self::UnknownUserReference,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullValue => "null_value",
            Self::DuplicateKey => "duplicate_key",
            Self::UserIdStrayCharacters => "userid_stray_characters",
            Self::PointsStrayCharacters => "points_stray_characters",
            Self::UnparseableDate => "unparseable_date",
            Self::DateOutOfWindow => "date_out_of_window",
            Self::NonIntegerValue => "non_integer_value",
            Self::OutOfDomainValue => "out_of_domain_value",
            Self::UnknownUserReference => "unknown_user_reference",
        }
    }
}

impl std::fmt::Display for AnomalyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a row exhibiting an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Exclude the row from canonical output
    Reject,
    /// Apply the class's fixed transformation, then continue
    Repair,
    /// Keep the value unchanged
    PassThrough,
}

/// The anomaly-to-action table applied by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    actions: BTreeMap<AnomalyClass, RuleAction>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let actions = AnomalyClass::ALL
            .into_iter()
            .map(|class| (class, Self::default_action(class)))
            .collect();
        Self { actions }
    }
}

impl RuleSet {
    /// The shipped action for each class.
    pub fn default_action(class: AnomalyClass) -> RuleAction {
        match class {
            AnomalyClass::NullValue
            | AnomalyClass::DuplicateKey
            | AnomalyClass::UnparseableDate
            | AnomalyClass::DateOutOfWindow
            | AnomalyClass::NonIntegerValue
            | AnomalyClass::OutOfDomainValue => RuleAction::Reject,
            AnomalyClass::UserIdStrayCharacters | AnomalyClass::PointsStrayCharacters => {
                RuleAction::Repair
            }
            AnomalyClass::UnknownUserReference => RuleAction::PassThrough,
        }
    }

    /// Actions that make sense for a class.
    ///
    /// Only the stray-character classes have a repair transformation. Classes
    /// that leave no canonical value to keep (nulls, unparseable or
    /// out-of-domain values) can only be rejected.
    pub fn permitted_actions(class: AnomalyClass) -> &'static [RuleAction] {
        match class {
            AnomalyClass::UserIdStrayCharacters | AnomalyClass::PointsStrayCharacters => {
                &[RuleAction::Repair, RuleAction::Reject, RuleAction::PassThrough]
            }
            AnomalyClass::DuplicateKey
            | AnomalyClass::DateOutOfWindow
            | AnomalyClass::UnknownUserReference => &[RuleAction::Reject, RuleAction::PassThrough],
            AnomalyClass::NullValue
            | AnomalyClass::UnparseableDate
            | AnomalyClass::NonIntegerValue
            | AnomalyClass::OutOfDomainValue => &[RuleAction::Reject],
        }
    }

    /// Overrides the action for one class.
    pub fn with_action(mut self, class: AnomalyClass, action: RuleAction) -> crate::Result<Self> {
        if !Self::permitted_actions(class).contains(&action) {
            return Err(crate::error::EventCleanError::configuration(format!(
                "action {:?} is not available for anomaly class '{}'",
                action, class
            )));
        }
        self.actions.insert(class, action);
        Ok(self)
    }

    /// Action for a class.
    pub fn action(&self, class: AnomalyClass) -> RuleAction {
        self.actions
            .get(&class)
            .copied()
            .unwrap_or_else(|| Self::default_action(class))
    }

    /// Iterates the table in class order.
    pub fn iter(&self) -> impl Iterator<Item = (AnomalyClass, RuleAction)> + '_ {
        self.actions.iter().map(|(class, action)| (*class, *action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_table() {
        let rules = RuleSet::default();

        assert_eq!(rules.action(AnomalyClass::NullValue), RuleAction::Reject);
        assert_eq!(rules.action(AnomalyClass::DuplicateKey), RuleAction::Reject);
        assert_eq!(rules.action(AnomalyClass::UserIdStrayCharacters), RuleAction::Repair);
        assert_eq!(rules.action(AnomalyClass::PointsStrayCharacters), RuleAction::Repair);
        assert_eq!(rules.action(AnomalyClass::UnparseableDate), RuleAction::Reject);
        assert_eq!(rules.action(AnomalyClass::DateOutOfWindow), RuleAction::Reject);
        assert_eq!(rules.action(AnomalyClass::NonIntegerValue), RuleAction::Reject);
        assert_eq!(rules.action(AnomalyClass::OutOfDomainValue), RuleAction::Reject);
        assert_eq!(
            rules.action(AnomalyClass::UnknownUserReference),
            RuleAction::PassThrough
        );
    }

    #[test]
    fn test_every_class_has_an_entry() {
        let rules = RuleSet::default();
        assert_eq!(rules.iter().count(), AnomalyClass::ALL.len());
    }

    #[test]
    fn test_override_action() {
        let rules = RuleSet::default()
            .with_action(AnomalyClass::PointsStrayCharacters, RuleAction::Reject)
            .unwrap();
        assert_eq!(rules.action(AnomalyClass::PointsStrayCharacters), RuleAction::Reject);
    }

    #[test]
    fn test_repair_only_for_repairable_classes() {
        let result = RuleSet::default().with_action(AnomalyClass::UnparseableDate, RuleAction::Repair);
        assert!(result.is_err());

        let result = RuleSet::default().with_action(AnomalyClass::NullValue, RuleAction::PassThrough);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_are_permitted() {
        for class in AnomalyClass::ALL {
            assert!(
                RuleSet::permitted_actions(class).contains(&RuleSet::default_action(class)),
                "default for {} is not permitted",
                class
            );
        }
    }
}
