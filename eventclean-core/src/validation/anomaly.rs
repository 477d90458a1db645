//! Length/format anomaly detection on user ids.
//!
//! Computes the character length distribution of `userid` and lists every
//! value whose length differs from the modal length, with whitespace made
//! visible so a trailing space can be told apart from a trailing quote.

use std::collections::BTreeMap;

use crate::models::{Field, StagingRow};
use crate::normalize::coerce::make_whitespace_visible;

use super::models::{LengthAnomaly, LengthBucket, LengthFindings};

/// Analyzes user id lengths for one table.
///
/// The modal length is the most frequent length; ties go to
/// `expected_length` if it is among them, otherwise to the shorter length.
pub fn analyze_userid_lengths<R: StagingRow>(rows: &[R], expected_length: usize) -> LengthFindings {
    let mut distribution: BTreeMap<usize, u64> = BTreeMap::new();
    for row in rows {
        if let Some(userid) = row.value(Field::UserId) {
            *distribution.entry(userid.chars().count()).or_default() += 1;
        }
    }

    let modal_length = modal_length(&distribution, expected_length);

    let anomalies = match modal_length {
        Some(modal) => rows
            .iter()
            .filter_map(|row| {
                let userid = row.value(Field::UserId)?;
                let length = userid.chars().count();
                (length != modal).then(|| LengthAnomaly {
                    source_line: row.source_line(),
                    length,
                    visible_value: make_whitespace_visible(userid),
                })
            })
            .collect(),
        None => Vec::new(),
    };

    if let Some(modal) = modal_length
        && modal != expected_length
    {
        tracing::warn!(
            "Modal userid length in {} is {} rather than the expected {}",
            R::KIND,
            modal,
            expected_length
        );
    }

    LengthFindings {
        distribution: distribution
            .into_iter()
            .map(|(length, count)| LengthBucket { length, count })
            .collect(),
        modal_length,
        expected_length,
        anomalies,
    }
}

fn modal_length(distribution: &BTreeMap<usize, u64>, expected_length: usize) -> Option<usize> {
    let max_count = distribution.values().copied().max()?;
    if distribution.get(&expected_length) == Some(&max_count) {
        return Some(expected_length);
    }
    // BTreeMap iterates in ascending length order
    distribution
        .iter()
        .find(|(_, count)| **count == max_count)
        .map(|(length, _)| *length)
}
