use tokio::sync::{Mutex, MutexGuard};

/// Serializes every browser-path SERP navigation onto a single logical
/// tab (spec 4.5: "single-tab pool (max_tabs = 1)... to avoid any
/// concurrent Playwright-style command overlap on the same browser
/// context"). A bare `Mutex<()>` is enough: callers hold the guard for
/// the duration of one navigation and drop it when done.
#[derive(Default)]
pub struct SingleTabPool {
    tab: Mutex<()>,
}

impl SingleTabPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.tab.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn navigations_never_overlap() {
        let pool = Arc::new(SingleTabPool::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _guard = pool.acquire().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }
}
