// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting pool-wide scaling bounds across zones

use worker_types::int_or_percent::IntOrPercent;

/// Splits pool-level scaling bounds into per-zone bounds.
///
/// Implementations must guarantee that, for any `total` and `zone_count > 0`,
/// `distribute_over_zones(i, total, zone_count)` summed over every
/// `i in 0..zone_count` equals `total`.
pub trait ZoneDistributor: Send + Sync {
    fn distribute_over_zones(
        &self,
        zone_index: usize,
        total: u32,
        zone_count: usize,
    ) -> u32;

    /// Split a surge/unavailability bound.  Percentages keep their meaning
    /// per zone and must come back as percentages.  `base` is the pool-level
    /// bound the value is relative to (maximum for surge, minimum for
    /// unavailability).
    fn distribute_int_or_percent(
        &self,
        zone_index: usize,
        value: IntOrPercent,
        zone_count: usize,
        base: u32,
    ) -> IntOrPercent;
}

/// Splits evenly, handing the remainder to the lowest zone indices one
/// machine at a time.  Percentages pass through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvenZoneDistributor;

impl ZoneDistributor for EvenZoneDistributor {
    fn distribute_over_zones(
        &self,
        zone_index: usize,
        total: u32,
        zone_count: usize,
    ) -> u32 {
        let Ok(zone_count) = u32::try_from(zone_count) else {
            return 0;
        };
        if zone_count == 0 {
            return 0;
        }
        let share = total / zone_count;
        let remainder = total % zone_count;
        if (zone_index as u64) < u64::from(remainder) {
            share + 1
        } else {
            share
        }
    }

    fn distribute_int_or_percent(
        &self,
        zone_index: usize,
        value: IntOrPercent,
        zone_count: usize,
        _base: u32,
    ) -> IntOrPercent {
        match value {
            IntOrPercent::Int(n) => IntOrPercent::Int(
                self.distribute_over_zones(zone_index, n, zone_count),
            ),
            IntOrPercent::Percent(_) => value,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_strategy::proptest;

    #[test]
    fn test_remainder_goes_to_first_zones() {
        let d = EvenZoneDistributor;
        let shares: Vec<u32> =
            (0..3).map(|i| d.distribute_over_zones(i, 5, 3)).collect();
        assert_eq!(shares, vec![2, 2, 1]);
        assert_eq!(d.distribute_over_zones(0, 7, 0), 0);
    }

    #[test]
    fn test_int_or_percent() {
        let d = EvenZoneDistributor;
        assert_eq!(
            d.distribute_int_or_percent(1, IntOrPercent::Int(3), 2, 4),
            IntOrPercent::Int(1)
        );
        assert_eq!(
            d.distribute_int_or_percent(1, IntOrPercent::Percent(25), 2, 4),
            IntOrPercent::Percent(25)
        );
    }

    #[proptest]
    fn proptest_shares_sum_to_total(
        total: u32,
        #[strategy(1_usize..16)] zone_count: usize,
    ) {
        let d = EvenZoneDistributor;
        let shares: Vec<u64> = (0..zone_count)
            .map(|i| u64::from(d.distribute_over_zones(i, total, zone_count)))
            .collect();
        assert_eq!(shares.iter().sum::<u64>(), u64::from(total));
        let (min, max) = (shares.iter().min(), shares.iter().max());
        assert!(max.unwrap() - min.unwrap() <= 1);
    }
}
