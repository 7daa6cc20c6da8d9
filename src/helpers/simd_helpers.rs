#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    __m256i, _CMP_EQ_OQ, _CMP_GE_OQ, _CMP_GT_OQ, _CMP_LE_OQ, _CMP_LT_OQ, _mm256_add_pd,
    _mm256_and_pd, _mm256_andnot_si256, _mm256_castsi256_pd, _mm256_cmp_pd, _mm256_cmpeq_epi64,
    _mm256_cmpgt_epi64, _mm256_loadu_pd, _mm256_loadu_si256, _mm256_max_pd, _mm256_min_pd,
    _mm256_movemask_pd, _mm256_set1_epi64x, _mm256_set1_pd, _mm256_setzero_pd, _mm256_storeu_pd,
};

use crate::processor::{AggregateOp, FilterPredicate, Value};

/// Aggregates a non-empty f64 slice using AVX2 when available, scalar otherwise.
///
/// `Count` returns the slice length. Callers pass only non-null values.
pub fn aggregate_f64(values: &[f64], op: AggregateOp) -> f64 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { aggregate_f64_avx2(values, op) };
        }
    }
    aggregate_f64_scalar(values, op)
}

fn aggregate_f64_scalar(values: &[f64], op: AggregateOp) -> f64 {
    match op {
        AggregateOp::Sum => values.iter().sum(),
        AggregateOp::Mean => values.iter().sum::<f64>() / values.len() as f64,
        AggregateOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateOp::Count => values.len() as f64,
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn aggregate_f64_avx2(values: &[f64], op: AggregateOp) -> f64 {
    const LANES: usize = 4; // __m256d holds 4 f64s
    let mut sum = _mm256_setzero_pd();
    let mut min = _mm256_set1_pd(f64::INFINITY);
    let mut max = _mm256_set1_pd(f64::NEG_INFINITY);

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        sum = _mm256_add_pd(sum, v);
        min = _mm256_min_pd(min, v);
        max = _mm256_max_pd(max, v);
    }

    let mut sum_arr = [0f64; LANES];
    let mut min_arr = [f64::INFINITY; LANES];
    let mut max_arr = [f64::NEG_INFINITY; LANES];
    unsafe { _mm256_storeu_pd(sum_arr.as_mut_ptr(), sum) };
    unsafe { _mm256_storeu_pd(min_arr.as_mut_ptr(), min) };
    unsafe { _mm256_storeu_pd(max_arr.as_mut_ptr(), max) };

    let mut total_sum: f64 = sum_arr.iter().sum();
    let mut total_min = min_arr.iter().copied().fold(f64::INFINITY, f64::min);
    let mut total_max = max_arr.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    for &v in remainder {
        total_sum += v;
        total_min = total_min.min(v);
        total_max = total_max.max(v);
    }

    match op {
        AggregateOp::Sum => total_sum,
        AggregateOp::Mean => total_sum / values.len() as f64,
        AggregateOp::Min => total_min,
        AggregateOp::Max => total_max,
        AggregateOp::Count => values.len() as f64,
    }
}

fn keep_f64(v: f64, op: &FilterPredicate) -> bool {
    match op {
        FilterPredicate::Equals(Value::Float(t)) => v == *t,
        FilterPredicate::GreaterThan(Value::Float(t)) => v > *t,
        FilterPredicate::LessThan(Value::Float(t)) => v < *t,
        FilterPredicate::Between(Value::Float(t1), Value::Float(t2)) => v >= *t1 && v <= *t2,
        _ => false,
    }
}

fn keep_i64(v: i64, op: &FilterPredicate) -> bool {
    match op {
        FilterPredicate::Equals(Value::Int(t)) => v == *t,
        FilterPredicate::GreaterThan(Value::Int(t)) => v > *t,
        FilterPredicate::LessThan(Value::Int(t)) => v < *t,
        FilterPredicate::Between(Value::Int(t1), Value::Int(t2)) => v >= *t1 && v <= *t2,
        _ => false,
    }
}

/// Indices (ascending) of the values matching a float predicate.
/// Predicates with non-float operands match nothing.
pub fn filter_f64(values: &[f64], op: &FilterPredicate) -> Vec<usize> {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { filter_f64_avx2(values, op) };
        }
    }
    filter_f64_scalar(values, op)
}

fn filter_f64_scalar(values: &[f64], op: &FilterPredicate) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| if keep_f64(v, op) { Some(i) } else { None })
        .collect()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn filter_f64_avx2(values: &[f64], op: &FilterPredicate) -> Vec<usize> {
    const LANES: usize = 4; // __m256d holds 4 f64
    let mut out = Vec::with_capacity(values.len());

    let (v1, v2) = match op {
        FilterPredicate::Equals(Value::Float(t))
        | FilterPredicate::GreaterThan(Value::Float(t))
        | FilterPredicate::LessThan(Value::Float(t)) => (_mm256_set1_pd(*t), _mm256_set1_pd(*t)),
        FilterPredicate::Between(Value::Float(t1), Value::Float(t2)) => {
            (_mm256_set1_pd(*t1), _mm256_set1_pd(*t2))
        }
        _ => return out, // unsupported
    };

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for (chunk_idx, chunk) in chunks.enumerate() {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        let mask = match op {
            FilterPredicate::Equals(_) => _mm256_cmp_pd(v, v1, _CMP_EQ_OQ),
            FilterPredicate::GreaterThan(_) => _mm256_cmp_pd(v, v1, _CMP_GT_OQ),
            FilterPredicate::LessThan(_) => _mm256_cmp_pd(v, v1, _CMP_LT_OQ),
            FilterPredicate::Between(_, _) => {
                let ge = _mm256_cmp_pd(v, v1, _CMP_GE_OQ);
                let le = _mm256_cmp_pd(v, v2, _CMP_LE_OQ);
                _mm256_and_pd(ge, le)
            }
        };

        let mask_bits = _mm256_movemask_pd(mask);
        for i in 0..LANES {
            if (mask_bits & (1 << i)) != 0 {
                out.push(chunk_idx * LANES + i);
            }
        }
    }

    let base = values.len() - remainder.len();
    for (i, &v) in remainder.iter().enumerate() {
        if keep_f64(v, op) {
            out.push(base + i);
        }
    }

    out
}

/// Indices (ascending) of the values matching an integer predicate.
/// Predicates with non-integer operands match nothing.
pub fn filter_i64(values: &[i64], op: &FilterPredicate) -> Vec<usize> {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { filter_i64_avx2(values, op) };
        }
    }
    filter_i64_scalar(values, op)
}

fn filter_i64_scalar(values: &[i64], op: &FilterPredicate) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| if keep_i64(v, op) { Some(i) } else { None })
        .collect()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn filter_i64_avx2(values: &[i64], op: &FilterPredicate) -> Vec<usize> {
    const LANES: usize = 4; // __m256i holds 4 i64
    let mut out = Vec::with_capacity(values.len());

    let (v1, v2) = match op {
        FilterPredicate::Equals(Value::Int(t))
        | FilterPredicate::GreaterThan(Value::Int(t))
        | FilterPredicate::LessThan(Value::Int(t)) => {
            (_mm256_set1_epi64x(*t), _mm256_set1_epi64x(*t))
        }
        FilterPredicate::Between(Value::Int(t1), Value::Int(t2)) => {
            (_mm256_set1_epi64x(*t1), _mm256_set1_epi64x(*t2))
        }
        _ => return out,
    };
    let ones = _mm256_set1_epi64x(-1);

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for (chunk_idx, chunk) in chunks.enumerate() {
        let v = unsafe { _mm256_loadu_si256(chunk.as_ptr() as *const __m256i) };
        let mask = match op {
            FilterPredicate::Equals(_) => _mm256_cmpeq_epi64(v, v1),
            FilterPredicate::GreaterThan(_) => _mm256_cmpgt_epi64(v, v1),
            FilterPredicate::LessThan(_) => _mm256_cmpgt_epi64(v1, v),
            FilterPredicate::Between(_, _) => {
                // v >= lo && v <= hi  ==  !(lo > v) && !(v > hi)
                let below = _mm256_cmpgt_epi64(v1, v);
                let above = _mm256_cmpgt_epi64(v, v2);
                _mm256_andnot_si256(below, _mm256_andnot_si256(above, ones))
            }
        };

        // treat as f64 lanes for movemask
        let mask_bits = _mm256_movemask_pd(_mm256_castsi256_pd(mask));
        for i in 0..LANES {
            if (mask_bits & (1 << i)) != 0 {
                out.push(chunk_idx * LANES + i);
            }
        }
    }

    let base = values.len() - remainder.len();
    for (i, &v) in remainder.iter().enumerate() {
        if keep_i64(v, op) {
            out.push(base + i);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_matches_scalar() {
        let values: Vec<f64> = (1..=11).map(|v| v as f64).collect();
        for op in [
            AggregateOp::Sum,
            AggregateOp::Mean,
            AggregateOp::Min,
            AggregateOp::Max,
            AggregateOp::Count,
        ] {
            assert_eq!(aggregate_f64(&values, op), aggregate_f64_scalar(&values, op));
        }
        assert_eq!(aggregate_f64(&values, AggregateOp::Mean), 6.0);
        assert_eq!(aggregate_f64(&values, AggregateOp::Max), 11.0);
    }

    #[test]
    fn test_filter_i64_between_is_inclusive() {
        let values = vec![0, 1, 2, 3, 4, 5, 6, 7, 8];
        let pred = FilterPredicate::Between(Value::Int(2), Value::Int(6));
        assert_eq!(filter_i64(&values, &pred), vec![2, 3, 4, 5, 6]);
        assert_eq!(filter_i64_scalar(&values, &pred), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_filter_i64_equals() {
        let values = vec![2, 3, 2, 1, 2, 0, 2];
        let pred = FilterPredicate::Equals(Value::Int(2));
        assert_eq!(filter_i64(&values, &pred), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_filter_f64_comparisons() {
        let values = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let gt = FilterPredicate::GreaterThan(Value::Float(25.0));
        assert_eq!(filter_f64(&values, &gt), vec![2, 3, 4]);
        let between = FilterPredicate::Between(Value::Float(20.0), Value::Float(40.0));
        assert_eq!(filter_f64(&values, &between), vec![1, 2, 3]);
    }

    #[test]
    fn test_mismatched_operand_matches_nothing() {
        let pred = FilterPredicate::Equals(Value::Int(1));
        assert!(filter_f64(&[1.0, 1.0, 1.0, 1.0, 1.0], &pred).is_empty());
    }
}
