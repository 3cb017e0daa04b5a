#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::prelude::*;

// Below this many items the thread pool costs more than it saves.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
const PARALLEL_THRESHOLD: usize = 64;

/// Maps `f` over `items`, on rayon when the `parallel` feature is on and the
/// input is large enough. Output order always matches input order.
pub fn map_ordered<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> U + Sync + Send,
{
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    {
        if items.len() > PARALLEL_THRESHOLD {
            return items.par_iter().enumerate().map(|(i, item)| f(i, item)).collect();
        }
    }
    items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_ordered_keeps_order_above_threshold() {
        let items: Vec<usize> = (0..1000).collect();
        let out = map_ordered(&items, |i, v| (i, v * 2));
        assert!(out.iter().enumerate().all(|(i, &(j, v))| i == j && v == i * 2));
    }
}
