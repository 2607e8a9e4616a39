//! Portfolio-wide statistics computed from the address list.
//!
//! Produces the same [`SummaryStatsRecord`] the backend's aggregate
//! endpoint returns, so either source can feed the summary view.

use std::collections::HashMap;

use chrono::Datelike as _;
use wow_portfolio_models::{
    AddressRecord, EvictionFilingsAddress, EvictionsAddress, HpdComplaintCount,
    HpdViolationsAddress, RentStabilizedAddress, SummaryStatsRecord,
};

/// How many owner contact names make the "top owners" list.
pub const NUM_TOP_OWNERS: usize = 5;

/// How many complaint types make the "top complaints" list.
pub const NUM_COMPLAINT_TYPES_TO_SHOW: usize = 3;

/// Computes portfolio statistics using the current calendar year for
/// building age.
#[must_use]
pub fn calculate_summary_now(addrs: &[AddressRecord]) -> Option<SummaryStatsRecord> {
    calculate_summary(addrs, chrono::Local::now().year())
}

/// Computes portfolio statistics over `addrs`.
///
/// Returns `None` for an empty list. Missing counts are treated as zero;
/// per-unit ratios are zero when the portfolio reports no units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_summary(addrs: &[AddressRecord], current_year: i32) -> Option<SummaryStatsRecord> {
    if addrs.is_empty() {
        return None;
    }

    let bldgs = addrs.len() as i64;
    let units: i64 = addrs.iter().map(|a| a.unitsres.unwrap_or(0)).sum();

    let totalopenviolations: i64 = addrs.iter().map(|a| a.openviolations).sum();
    let totalviolations: i64 = addrs.iter().map(|a| a.totalviolations).sum();

    let totalcomplaints: i64 = addrs.iter().map(|a| a.totalcomplaints.unwrap_or(0)).sum();
    let totalrecentcomplaints: i64 = addrs.iter().map(|a| a.recentcomplaints.unwrap_or(0)).sum();

    let totalevictions: i64 = addrs.iter().map(|a| a.evictions.unwrap_or(0)).sum();
    let totalevictionfilings: i64 = addrs.iter().map(|a| a.evictionfilings.unwrap_or(0)).sum();

    let totalrsgain: i64 = addrs
        .iter()
        .filter_map(|a| a.rsdiff)
        .filter(|d| *d > 0)
        .sum();
    let totalrsloss: i64 = addrs
        .iter()
        .filter_map(|a| a.rsdiff)
        .filter(|d| *d < 0)
        .sum();
    let totalrsdiff = totalrsgain + totalrsloss;

    let years: Vec<i64> = addrs.iter().filter_map(|a| a.yearbuilt).collect();
    let age = if years.is_empty() {
        None
    } else {
        let mean = years.iter().sum::<i64>() as f64 / years.len() as f64;
        Some(f64::from(current_year) - mean)
    };

    let per_unit = |total: i64| {
        if units == 0 {
            0.0
        } else {
            total as f64 / units as f64
        }
    };

    // Ties resolve to the later record, as in the backend query.
    let rs_loss_addr = addrs.iter().rev().min_by_key(|a| a.rsdiff.unwrap_or(0))?;
    let evictions_addr = addrs.iter().max_by_key(|a| a.evictions.unwrap_or(0))?;
    let filings_addr = addrs.iter().max_by_key(|a| a.evictionfilings.unwrap_or(0))?;
    let violations_addr = addrs.iter().max_by_key(|a| a.openviolations)?;

    let owner_names = addrs
        .iter()
        .flat_map(|a| a.ownernames.iter().map(|o| o.value.as_str()));
    let corp_names = addrs.iter().flat_map(|a| a.corpnames.iter().map(String::as_str));
    let business_addrs = addrs
        .iter()
        .flat_map(|a| a.businessaddrs.iter().map(String::as_str));

    log::debug!("calculated summary over {bldgs} buildings, {units} units");

    Some(SummaryStatsRecord {
        bldgs,
        units,
        age,
        topowners: most_common(owner_names, NUM_TOP_OWNERS),
        topcorp: most_common(corp_names, 1).into_iter().next(),
        topbusinessaddr: most_common(business_addrs, 1).into_iter().next(),
        totalopenviolations,
        totalviolations,
        openviolationsperbldg: totalopenviolations as f64 / bldgs as f64,
        openviolationsperresunit: per_unit(totalopenviolations),
        totalhpdcomplaints: Some(totalcomplaints),
        totalrecenthpdcomplaints: Some(totalrecentcomplaints),
        recenthpdcomplaintsbytype: top_complaint_types(addrs),
        totalevictions: Some(totalevictions),
        totalevictionfilings: Some(totalevictionfilings),
        avgevictions: Some(totalevictions as f64 / bldgs as f64),
        totalrsgain,
        totalrsloss,
        totalrsdiff: Some(totalrsdiff),
        rsproportion: (units != 0).then(|| per_unit(totalrsdiff.abs()) * 100.0),
        avgrspercent: None,
        violationsaddr: Some(HpdViolationsAddress {
            location: violations_addr.location(),
            openviolations: Some(violations_addr.openviolations),
        }),
        evictionsaddr: Some(EvictionsAddress {
            location: evictions_addr.location(),
            evictions: evictions_addr.evictions,
        }),
        evictionfilingsaddr: Some(EvictionFilingsAddress {
            location: filings_addr.location(),
            filings: filings_addr.evictionfilings,
        }),
        rslossaddr: Some(RentStabilizedAddress {
            location: rs_loss_addr.location(),
            rsdiff: rs_loss_addr.rsdiff,
        }),
    })
}

/// The most frequent recent complaint types across the portfolio,
/// largest count first.
#[must_use]
pub fn top_complaint_types(addrs: &[AddressRecord]) -> Vec<HpdComplaintCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, i64> = HashMap::new();

    for complaint in addrs.iter().flat_map(|a| a.recentcomplaintsbytype.iter()) {
        let key = complaint.complaint_type.as_str();
        let total = totals.entry(key).or_insert_with(|| {
            order.push(key);
            0
        });
        *total += complaint.count;
    }

    let mut grouped: Vec<HpdComplaintCount> = order
        .into_iter()
        .map(|key| HpdComplaintCount {
            complaint_type: key.to_string(),
            count: totals.get(key).copied().unwrap_or(0),
        })
        .collect();
    grouped.sort_by(|a, b| b.count.cmp(&a.count));
    grouped.truncate(NUM_COMPLAINT_TYPES_TO_SHOW);
    grouped
}

/// Up to `n` distinct values, most frequent first. Equal counts keep the
/// order in which values were first seen.
fn most_common<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(n)
        .map(|(v, _)| v.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_records::brooklyn_pair;

    #[test]
    fn sums_counts_and_units() {
        let summary = calculate_summary(&brooklyn_pair(), 2020).unwrap();
        assert_eq!(summary.bldgs, 2);
        assert_eq!(summary.units, 21);
        assert_eq!(summary.totalviolations, 30);
        assert_eq!(summary.totalevictions, Some(0));
        assert_eq!(summary.totalhpdcomplaints, Some(15));
    }

    #[test]
    fn splits_rent_stabilized_gain_and_loss() {
        let summary = calculate_summary(&brooklyn_pair(), 2020).unwrap();
        assert_eq!(summary.totalrsgain, 1);
        assert_eq!(summary.totalrsloss, -8);
        assert_eq!(summary.totalrsdiff, Some(-7));
        assert_eq!(
            summary
                .rslossaddr
                .as_ref()
                .map(|a| a.location.streetname.as_str()),
            Some("LEWIS AVENUE")
        );
    }

    #[test]
    fn computes_ratios_and_age() {
        let summary = calculate_summary(&brooklyn_pair(), 2020).unwrap();
        assert!((summary.openviolationsperresunit - 1.0 / 21.0).abs() < 1e-9);
        assert!((summary.openviolationsperbldg - 0.5).abs() < 1e-9);
        assert!((summary.age.unwrap() - 99.5).abs() < 1e-9);
    }

    #[test]
    fn finds_addresses_of_interest() {
        let summary = calculate_summary(&brooklyn_pair(), 2020).unwrap();
        let violations = summary.violationsaddr.unwrap();
        assert_eq!(violations.location.streetname, "LEWIS AVENUE");
        assert_eq!(violations.openviolations, Some(1));
    }

    #[test]
    fn ranks_names_by_frequency_then_first_seen() {
        let summary = calculate_summary(&brooklyn_pair(), 2020).unwrap();
        assert_eq!(summary.topowners.len(), 4);
        assert_eq!(summary.topowners[0], "MOSES GUTMAN");
        assert_eq!(
            summary.topbusinessaddr.as_deref(),
            Some("12 SPENCER STREET 4 11205")
        );
        assert_eq!(summary.topcorp.as_deref(), Some("654 PARK PLACE LLC"));
    }

    #[test]
    fn groups_complaint_types() {
        let top = top_complaint_types(&brooklyn_pair());
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].complaint_type, "HEAT/HOT WATER");
        assert_eq!(top[0].count, 4);
        assert_eq!(top[1].complaint_type, "PLUMBING");
    }

    #[test]
    fn empty_portfolio_has_no_summary() {
        assert!(calculate_summary(&[], 2020).is_none());
    }
}
