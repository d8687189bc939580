//! Coupon date generation

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use crate::bond::AnchorRule;

/// Generate every coupon date in `[issue_date, redemption_date]`.
///
/// Each anchor contributes one date per calendar year; the union is returned
/// sorted and free of duplicates. No anchors means a zero coupon bond, which
/// has no coupon dates at all.
pub fn coupon_dates(
    issue_date: NaiveDate,
    redemption_date: NaiveDate,
    anchors: &[AnchorRule],
) -> Vec<NaiveDate> {
    let mut dates = BTreeSet::new();

    for anchor in anchors {
        for year in issue_date.year()..=redemption_date.year() {
            if let Some(date) = anchor.in_year(year) {
                if date >= issue_date && date <= redemption_date {
                    dates.insert(date);
                }
            }
        }
    }

    dates.into_iter().collect()
}
