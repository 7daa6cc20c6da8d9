use crate::processor::{GroupKey, aggregate::GroupedSeries};

/// Up to `n` groups with the highest values, descending.
///
/// Ties are broken by ascending key. An `n` larger than the number of groups
/// returns every group.
pub fn rank_desc(series: &GroupedSeries, n: usize) -> Vec<(GroupKey, f64)> {
    let mut entries = ascending_by_key(series);
    // stable sort keeps the key order within ties
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.truncate(n);
    entries
}

/// Up to `n` groups with the lowest values, ascending. Ties by ascending key.
pub fn rank_asc(series: &GroupedSeries, n: usize) -> Vec<(GroupKey, f64)> {
    let mut entries = ascending_by_key(series);
    entries.sort_by(|a, b| a.1.total_cmp(&b.1));
    entries.truncate(n);
    entries
}

pub fn top(series: &GroupedSeries, n: usize) -> Vec<(GroupKey, f64)> {
    rank_desc(series, n)
}

pub fn bottom(series: &GroupedSeries, n: usize) -> Vec<(GroupKey, f64)> {
    rank_asc(series, n)
}

fn ascending_by_key(series: &GroupedSeries) -> Vec<(GroupKey, f64)> {
    series.iter().map(|(k, v)| (k.clone(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{
        aggregate::group_mean, column::Column, listings_table::ListingsTable,
        schema::{DISTRICT, PRICE},
    };

    fn series() -> GroupedSeries {
        let table = ListingsTable::from_columns(vec![
            (DISTRICT, Column::from_strs(vec!["C", "B", "A", "D", "E"])),
            (PRICE, Column::from_i64(vec![300, 500, 300, 100, 500])),
        ])
        .unwrap();
        group_mean(&table, DISTRICT, PRICE).unwrap()
    }

    fn keys(entries: &[(GroupKey, f64)]) -> Vec<String> {
        entries.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_rank_desc_ties_by_key() {
        let ranked = rank_desc(&series(), 3);
        assert_eq!(keys(&ranked), vec!["B", "E", "A"]);
    }

    #[test]
    fn test_rank_asc_ties_by_key() {
        let ranked = rank_asc(&series(), 3);
        assert_eq!(keys(&ranked), vec!["D", "A", "C"]);
    }

    #[test]
    fn test_n_larger_than_groups_returns_all() {
        let s = series();
        let ranked = top(&s, 100);
        assert_eq!(ranked.len(), s.len());
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(bottom(&s, 0).is_empty());
    }
}
