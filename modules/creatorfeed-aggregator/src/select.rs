use creatorfeed_common::FeedItem;

/// Pick up to `n` items from `candidates` (already sorted newest first),
/// allowing at most `k` replies/reshares unless primary content runs out.
///
/// First pass takes items in order, skipping secondaries once `k` are in.
/// Second pass tops up from the skipped items, still in order. The result
/// keeps the input order.
pub fn select_balanced(candidates: Vec<FeedItem>, n: usize, k: usize) -> Vec<FeedItem> {
    let k = k.min(n);
    let mut selected = vec![false; candidates.len()];
    let mut taken = 0;
    let mut secondaries = 0;

    for (i, item) in candidates.iter().enumerate() {
        if taken == n {
            break;
        }
        if item.is_secondary() {
            if secondaries == k {
                continue;
            }
            secondaries += 1;
        }
        selected[i] = true;
        taken += 1;
    }

    for flag in selected.iter_mut() {
        if taken == n {
            break;
        }
        if !*flag {
            *flag = true;
            taken += 1;
        }
    }

    candidates
        .into_iter()
        .zip(selected)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}
