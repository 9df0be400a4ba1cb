use wordpipe_core::{Error, FrequencyTable, MinFreq, RankedList, Result, TermCount};

/// Entries with `count >= min_freq`, in first-occurrence order.
pub fn retain(table: &FrequencyTable, min_freq: MinFreq) -> Vec<TermCount> {
    let min = min_freq.get() as usize;
    table.iter().filter(|e| e.count >= min).cloned().collect()
}

/// Rank terms meeting `min_freq` by count, descending, keeping at most `top_n`.
///
/// Ties keep first-occurrence order: the table iterates in that order and the
/// sort is stable. An empty result is `Error::EmptyAfterFilter`; the table is
/// only borrowed, so callers can retry with a lower threshold.
pub fn rank(table: &FrequencyTable, min_freq: MinFreq, top_n: usize) -> Result<RankedList> {
    let mut items = retain(table, min_freq);
    if items.is_empty() {
        return Err(Error::EmptyAfterFilter {
            min_freq: min_freq.get(),
            max_count: table.max_count(),
        });
    }
    let retained = items.len();
    items.sort_by(|a, b| b.count.cmp(&a.count));
    items.truncate(top_n);
    Ok(RankedList {
        min_freq,
        retained,
        items,
    })
}
