//! Row-level normalization of a staging snapshot.
//!
//! Every staging row receives exactly one decision. Checks run in column
//! order and the first failing check decides the rejection reason, so the
//! same input always yields the same reason code.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ValidityWindow, WindowPosition};
use crate::models::{
    Category, EventRecord, Field, Hour, StagingEventRecord, StagingSnapshot, StagingUserRecord,
    UserId, UserRecord,
};

use super::coerce::{coerce_integer, parse_event_date, strip_points_noise, strip_userid_noise};
use super::decisions::{Disposition, DispositionSummary, FieldRepair, RejectReason, RowDecision};
use super::rules::{AnomalyClass, RuleAction, RuleSet};

/// Decisions for every staging row of both tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    /// One decision per staged user row, in staging order
    pub users: Vec<RowDecision<UserRecord>>,
    /// One decision per staged event row, in staging order
    pub events: Vec<RowDecision<EventRecord>>,
}

impl NormalizationOutcome {
    /// Disposition counts for the user table.
    pub fn user_summary(&self) -> DispositionSummary {
        DispositionSummary::from_decisions(&self.users)
    }

    /// Disposition counts for the event table.
    pub fn event_summary(&self) -> DispositionSummary {
        DispositionSummary::from_decisions(&self.events)
    }

    /// Accepted user records in source order.
    pub fn accepted_users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.iter().filter_map(|d| d.disposition.record())
    }

    /// Accepted event records in source order.
    pub fn accepted_events(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().filter_map(|d| d.disposition.record())
    }
}

type RowResult<T> = std::result::Result<T, RejectReason>;

/// Applies the rule table to staging rows.
///
/// # Example
///
/// ```rust
/// use eventclean_core::config::ValidityWindow;
/// use eventclean_core::models::{StagingSnapshot, StagingUserRecord};
/// use eventclean_core::normalize::{Normalizer, RuleSet};
///
/// let normalizer = Normalizer::new(ValidityWindow::default(), RuleSet::default());
/// let snapshot = StagingSnapshot {
///     users: vec![StagingUserRecord {
///         source_line: 1,
///         userid: Some("0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d ".to_string()),
///         subscriber: Some("1".to_string()),
///         category: Some("B".to_string()),
///     }],
///     events: Vec::new(),
/// };
///
/// let outcome = normalizer.normalize(&snapshot);
/// assert_eq!(outcome.user_summary().repaired, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Normalizer {
    window: ValidityWindow,
    rules: RuleSet,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ValidityWindow::default(), RuleSet::default())
    }
}

impl Normalizer {
    /// Creates a normalizer for a window and rule table.
    pub fn new(window: ValidityWindow, rules: RuleSet) -> Self {
        Self { window, rules }
    }

    /// The rule table in force.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Decides every row of both tables.
    ///
    /// Users are decided first: the accepted user ids are what the unknown
    /// user reference rule checks event rows against.
    pub fn normalize(&self, snapshot: &StagingSnapshot) -> NormalizationOutcome {
        let users = self.normalize_users(&snapshot.users);
        let known_users: HashSet<UserId> = users
            .iter()
            .filter_map(|d| d.disposition.record())
            .map(|user| user.userid.clone())
            .collect();
        let events = self.normalize_events(&snapshot.events, &known_users);

        let outcome = NormalizationOutcome { users, events };
        let user_summary = outcome.user_summary();
        let event_summary = outcome.event_summary();
        info!(
            "Normalized users: {} as-is, {} repaired, {} rejected",
            user_summary.accepted_as_is, user_summary.repaired, user_summary.rejected
        );
        info!(
            "Normalized events: {} as-is, {} repaired, {} rejected",
            event_summary.accepted_as_is, event_summary.repaired, event_summary.rejected
        );
        outcome
    }

    /// Decides user rows. Duplicate detection is first-seen-wins on the
    /// canonical (repaired) user id among rows that were otherwise accepted.
    pub fn normalize_users(&self, rows: &[StagingUserRecord]) -> Vec<RowDecision<UserRecord>> {
        let mut first_seen: HashMap<UserId, u64> = HashMap::new();

        rows.iter()
            .map(|row| {
                let disposition = match self.user_record(row) {
                    Ok((record, repairs)) => match first_seen.get(&record.userid) {
                        Some(first_line) => self.duplicate(*first_line, record, repairs),
                        None => {
                            first_seen.insert(record.userid.clone(), row.source_line);
                            Disposition::accept(record, repairs)
                        }
                    },
                    Err(reason) => Disposition::Reject { reason },
                };
                log_rejection("users", row.source_line, &disposition);
                RowDecision {
                    source_line: row.source_line,
                    disposition,
                }
            })
            .collect()
    }

    /// Decides event rows. Duplicates are keyed on the full canonical tuple.
    pub fn normalize_events(
        &self,
        rows: &[StagingEventRecord],
        known_users: &HashSet<UserId>,
    ) -> Vec<RowDecision<EventRecord>> {
        let mut first_seen: HashMap<EventRecord, u64> = HashMap::new();

        rows.iter()
            .map(|row| {
                let disposition = match self.event_record(row, known_users) {
                    Ok((record, repairs)) => match first_seen.get(&record) {
                        Some(first_line) => self.duplicate(*first_line, record, repairs),
                        None => {
                            first_seen.insert(record.clone(), row.source_line);
                            Disposition::accept(record, repairs)
                        }
                    },
                    Err(reason) => Disposition::Reject { reason },
                };
                log_rejection("event_performance", row.source_line, &disposition);
                RowDecision {
                    source_line: row.source_line,
                    disposition,
                }
            })
            .collect()
    }

    fn duplicate<T>(&self, first_line: u64, record: T, repairs: Vec<FieldRepair>) -> Disposition<T> {
        match self.rules.action(AnomalyClass::DuplicateKey) {
            RuleAction::Reject => Disposition::Reject {
                reason: RejectReason::DuplicateKey {
                    first_source_line: first_line,
                },
            },
            RuleAction::Repair | RuleAction::PassThrough => Disposition::accept(record, repairs),
        }
    }

    fn user_record(&self, row: &StagingUserRecord) -> RowResult<(UserRecord, Vec<FieldRepair>)> {
        let mut repairs = Vec::new();

        let userid = self.userid(required(row.userid.as_deref(), Field::UserId)?, &mut repairs)?;

        let subscriber_text = required(row.subscriber.as_deref(), Field::Subscriber)?;
        let subscriber = match integer(subscriber_text, Field::Subscriber)? {
            0 => false,
            1 => true,
            _ => return Err(self.out_of_domain(Field::Subscriber, subscriber_text)),
        };

        let category_text = required(row.category.as_deref(), Field::Category)?;
        let category = Category::parse(category_text)
            .ok_or_else(|| self.out_of_domain(Field::Category, category_text))?;

        Ok((
            UserRecord {
                userid,
                subscriber,
                category,
            },
            repairs,
        ))
    }

    fn event_record(
        &self,
        row: &StagingEventRecord,
        known_users: &HashSet<UserId>,
    ) -> RowResult<(EventRecord, Vec<FieldRepair>)> {
        let mut repairs = Vec::new();

        let userid = self.userid(required(row.userid.as_deref(), Field::UserId)?, &mut repairs)?;

        let date_text = required(row.event_date.as_deref(), Field::EventDate)?;
        let event_date = parse_event_date(date_text).map_err(|_| RejectReason::UnparseableDate {
            value: date_text.to_string(),
        })?;
        let out_of_window = match self.window.position(event_date) {
            WindowPosition::Within => None,
            WindowPosition::BeforeFounding => Some(RejectReason::DateBeforeFounding {
                date: event_date.to_string(),
            }),
            WindowPosition::AfterCutoff => Some(RejectReason::DateAfterCutoff {
                date: event_date.to_string(),
            }),
        };
        if let Some(reason) = out_of_window
            && self.rules.action(AnomalyClass::DateOutOfWindow) == RuleAction::Reject
        {
            return Err(reason);
        }

        let hour_text = required(row.hour.as_deref(), Field::Hour)?;
        let hour = i32::try_from(integer(hour_text, Field::Hour)?)
            .ok()
            .and_then(Hour::new)
            .ok_or_else(|| self.out_of_domain(Field::Hour, hour_text))?;

        let points_raw = required(row.points.as_deref(), Field::Points)?;
        let points_text = self.repair(
            AnomalyClass::PointsStrayCharacters,
            Field::Points,
            points_raw,
            strip_points_noise(points_raw).as_ref(),
            &mut repairs,
        )?;
        let points = integer(&points_text, Field::Points)?;

        if !known_users.contains(&userid)
            && self.rules.action(AnomalyClass::UnknownUserReference) == RuleAction::Reject
        {
            return Err(RejectReason::RuleRejected {
                class: AnomalyClass::UnknownUserReference.to_string(),
            });
        }

        Ok((
            EventRecord {
                userid,
                event_date,
                hour,
                points,
            },
            repairs,
        ))
    }

    /// Repairs and checks a raw user id.
    fn userid(&self, raw: &str, repairs: &mut Vec<FieldRepair>) -> RowResult<UserId> {
        let value = self.repair(
            AnomalyClass::UserIdStrayCharacters,
            Field::UserId,
            raw,
            strip_userid_noise(raw).as_ref(),
            repairs,
        )?;
        UserId::parse(&value).ok_or(RejectReason::MalformedUserId {
            length: value.chars().count(),
        })
    }

    /// Applies the rule for a stray-character class.
    ///
    /// `stripped` is the value with the class's characters removed; when it
    /// equals `raw` the class does not apply and the value passes unchanged.
    fn repair(
        &self,
        class: AnomalyClass,
        field: Field,
        raw: &str,
        stripped: &str,
        repairs: &mut Vec<FieldRepair>,
    ) -> RowResult<String> {
        if stripped == raw {
            return Ok(raw.to_string());
        }
        match self.rules.action(class) {
            RuleAction::Repair => {
                repairs.push(FieldRepair {
                    field,
                    original: raw.to_string(),
                    repaired: stripped.to_string(),
                });
                Ok(stripped.to_string())
            }
            RuleAction::PassThrough => Ok(raw.to_string()),
            RuleAction::Reject => Err(RejectReason::RuleRejected {
                class: class.to_string(),
            }),
        }
    }

    fn out_of_domain(&self, field: Field, value: &str) -> RejectReason {
        RejectReason::OutOfDomain {
            field,
            value: value.to_string(),
        }
    }
}

fn required(value: Option<&str>, field: Field) -> RowResult<&str> {
    value.ok_or(RejectReason::MissingValue { field })
}

fn integer(value: &str, field: Field) -> RowResult<i64> {
    coerce_integer(value).map_err(|_| RejectReason::NotAnInteger {
        field,
        value: value.to_string(),
    })
}

fn log_rejection<T>(table: &str, source_line: u64, disposition: &Disposition<T>) {
    if let Some(reason) = disposition.reject_reason() {
        debug!("Rejected {} row {}: {}", table, source_line, reason);
    }
}
