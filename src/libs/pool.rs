use rayon::prelude::*;

/// Size the global worker pool. Safe to call once per process.
pub fn init(threads: usize) -> anyhow::Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;
    Ok(())
}

/// Run independent work units in parallel, collecting results in the
/// original input order (never completion order). A failed unit becomes
/// `None` after a warning; it must not take the batch down with it.
pub fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> anyhow::Result<R> + Sync,
{
    items
        .par_iter()
        .map(|item| match f(item) {
            Ok(r) => Some(r),
            Err(e) => {
                eprintln!("Warning: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_input_order_and_skips_failures() {
        let items: Vec<usize> = (0..100).collect();
        let results = map_ordered(&items, |&i| {
            if i % 7 == 0 {
                Err(anyhow::anyhow!("unit {} failed", i))
            } else {
                Ok(i * 2)
            }
        });

        assert_eq!(results.len(), 100);
        for (i, r) in results.iter().enumerate() {
            if i % 7 == 0 {
                assert!(r.is_none());
            } else {
                assert_eq!(*r, Some(i * 2));
            }
        }
    }
}
