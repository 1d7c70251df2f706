use crate::competitor::Competitor;
use crate::time::Time;

// ============================================================================
// RANKS
// ============================================================================

/// Ranks a column of values: each known value gets 1 + the number of values
/// strictly smaller than it, so ties share a rank and the next rank skips.
/// Unknown values are unranked.
pub fn rank_values(values: &[Option<Time>]) -> Vec<Option<u32>> {
    let mut known: Vec<Time> = values.iter().flatten().copied().collect();
    known.sort();

    values
        .iter()
        .map(|value| value.map(|v| known.partition_point(|k| *k < v) as u32 + 1))
        .collect()
}

/// Overall positions for competitors already in result order. Only those
/// who completed are placed; equal total times share a position, and the
/// next position counts everyone listed ahead.
pub fn positions(competitors: &[&Competitor]) -> Vec<Option<u32>> {
    let mut position = 0;
    let mut previous_total = None;
    competitors
        .iter()
        .enumerate()
        .map(|(index, competitor)| {
            if !competitor.completed() {
                return None;
            }
            if competitor.total_time != previous_total {
                position = index as u32 + 1;
                previous_total = competitor.total_time;
            }
            Some(position)
        })
        .collect()
}

/// Split and cumulative ranks for one group of competitors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankTable {
    /// `split[competitor][control - 1]`
    pub split: Vec<Vec<Option<u32>>>,
    /// `cumulative[competitor][control - 1]`
    pub cumulative: Vec<Vec<Option<u32>>>,
}

/// Ranks every control for the given competitors, who must all have
/// `num_controls` controls. Once a competitor's cumulative rank is unknown,
/// their later cumulative times are left out of the ranking altogether, so
/// they neither get a rank nor push anyone else down. Split ranks are
/// independent per leg.
pub fn compute_rank_table(competitors: &[&Competitor], num_controls: usize) -> RankTable {
    let mut table = RankTable {
        split: vec![Vec::with_capacity(num_controls + 1); competitors.len()],
        cumulative: vec![Vec::with_capacity(num_controls + 1); competitors.len()],
    };

    for control in 1..=num_controls + 1 {
        let splits: Vec<Option<Time>> = competitors.iter().map(|c| c.split_time_to(control)).collect();
        for (index, rank) in rank_values(&splits).into_iter().enumerate() {
            table.split[index].push(rank);
        }

        // No rank at the previous control means a mispunch there or earlier
        let cums: Vec<Option<Time>> = competitors
            .iter()
            .enumerate()
            .map(|(index, c)| {
                let invalidated = control > 1 && table.cumulative[index][control - 2].is_none();
                if invalidated {
                    None
                } else {
                    c.cumulative_time_to(control)
                }
            })
            .collect();
        for (index, rank) in rank_values(&cums).into_iter().enumerate() {
            table.cumulative[index].push(rank);
        }
    }

    table
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::CompetitorName;

    fn times(values: &[Option<i64>]) -> Vec<Option<Time>> {
        values.iter().map(|v| v.map(Time::from_secs)).collect()
    }

    #[test]
    fn test_ties_share_rank_and_next_skips() {
        let ranks = rank_values(&times(&[Some(90), Some(90), Some(120), None, Some(60)]));
        assert_eq!(ranks, vec![Some(2), Some(2), Some(4), None, Some(1)]);
    }

    #[test]
    fn test_two_fastest_tied() {
        let ranks = rank_values(&times(&[Some(50), Some(50), Some(70)]));
        assert_eq!(ranks, vec![Some(1), Some(1), Some(3)]);
    }

    #[test]
    fn test_all_unknown() {
        assert_eq!(rank_values(&[None, None]), vec![None, None]);
        assert!(rank_values(&[]).is_empty());
    }

    #[test]
    fn test_mispunch_invalidates_later_cumulative_ranks() {
        let name = CompetitorName::new("A", "B");
        let clean = Competitor::from_original_cum_times(1, name.clone(), "", None, times(&[Some(0), Some(60), Some(150), Some(200)]));
        let mispunch = Competitor::from_original_cum_times(2, name, "", None, times(&[Some(0), None, Some(140), Some(210)]));

        let table = compute_rank_table(&[&clean, &mispunch], 2);
        assert_eq!(table.cumulative[0], vec![Some(1), Some(1), Some(1)]);
        assert_eq!(table.cumulative[1], vec![None, None, None]);
        // Split to the finish is still comparable: 50 vs 70
        assert_eq!(table.split[1], vec![None, None, Some(2)]);
        assert_eq!(table.split[0], vec![Some(1), Some(1), Some(1)]);
    }

    #[test]
    fn test_someone_leads_at_every_control() {
        let name = CompetitorName::new("A", "B");
        let competitors = vec![
            Competitor::from_original_cum_times(1, name.clone(), "", None, times(&[Some(0), Some(70), Some(160), Some(230)])),
            Competitor::from_original_cum_times(2, name.clone(), "", None, times(&[Some(0), Some(50), None, Some(190)])),
            Competitor::from_original_cum_times(3, name.clone(), "", None, times(&[Some(0), None, Some(120), Some(180)])),
            Competitor::from_original_cum_times(4, name, "", None, times(&[Some(0), Some(65), Some(170), Some(240)])),
        ];
        let refs: Vec<&Competitor> = competitors.iter().collect();
        let table = compute_rank_table(&refs, 2);

        for control in 0..3 {
            let column: Vec<Option<u32>> = table.cumulative.iter().map(|ranks| ranks[control]).collect();
            if column.iter().any(Option::is_some) {
                assert!(column.contains(&Some(1)), "nobody leads at column {}: {:?}", control, column);
            }
        }
        assert_eq!(table.cumulative[0], vec![Some(3), Some(1), Some(1)]);
        assert_eq!(table.cumulative[1], vec![Some(1), None, None]);
        assert_eq!(table.cumulative[3], vec![Some(2), Some(2), Some(2)]);
    }

    #[test]
    fn test_positions_only_for_completers() {
        let name = CompetitorName::new("A", "B");
        let first = Competitor::from_original_cum_times(1, name.clone(), "", None, times(&[Some(0), Some(60), Some(180)]));
        let tied = Competitor::from_original_cum_times(2, name.clone(), "", None, times(&[Some(0), Some(70), Some(180)]));
        let third = Competitor::from_original_cum_times(3, name.clone(), "", None, times(&[Some(0), Some(80), Some(200)]));
        let mut over_time = Competitor::from_original_cum_times(4, name.clone(), "", None, times(&[Some(0), Some(90), Some(210)]));
        over_time.set_over_max_time();
        let mut dsq = Competitor::from_original_cum_times(5, name, "", None, times(&[Some(0), Some(50), Some(150)]));
        dsq.disqualify();

        let ranked = positions(&[&first, &tied, &third, &over_time, &dsq]);
        assert_eq!(ranked, vec![Some(1), Some(1), Some(3), None, None]);
    }
}
