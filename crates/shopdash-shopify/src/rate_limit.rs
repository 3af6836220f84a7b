//! Retry with exponential backoff and jitter for Admin API calls.

use std::future::Future;
use std::time::Duration;

use crate::error::ShopifyError;

const MAX_DELAY_MS: u64 = 60_000;

/// Rate limits, network failures and 5xx responses are transient. Everything
/// else (auth, 404, bad bodies) would fail the same way again.
pub(crate) fn is_retriable(err: &ShopifyError) -> bool {
    match err {
        ShopifyError::RateLimited { .. } | ShopifyError::Http(_) => true,
        ShopifyError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The n-th retry waits `backoff_base_secs * 2^(n-1)` seconds ±25 % jitter,
/// capped at 60 s. A 429 waits at least as long as its `Retry-After`.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ShopifyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShopifyError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay_ms = backoff_delay_ms(backoff_base_secs, attempt, &err);
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %err,
            "transient Shopify error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn backoff_delay_ms(backoff_base_secs: u64, attempt: u32, err: &ShopifyError) -> u64 {
    let base_ms = backoff_base_secs.saturating_mul(1_000);
    let capped = base_ms
        .saturating_mul(1u64 << attempt.min(20))
        .min(MAX_DELAY_MS);
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;

    let floor_ms = match err {
        ShopifyError::RateLimited {
            retry_after_secs, ..
        } => retry_after_secs.saturating_mul(1_000).min(MAX_DELAY_MS),
        _ => 0,
    };
    jittered.max(floor_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited(retry_after_secs: u64) -> ShopifyError {
        ShopifyError::RateLimited {
            shop_domain: "acme.myshopify.com".to_owned(),
            retry_after_secs,
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ShopifyError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited(0))
                } else {
                    Ok::<u32, ShopifyError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ShopifyError>(ShopifyError::UnexpectedStatus {
                    status: 503,
                    url: "https://acme.myshopify.com".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ShopifyError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn access_denied_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ShopifyError>(ShopifyError::AccessDenied {
                    shop_domain: "acme.myshopify.com".to_owned(),
                    status: 403,
                    url: "https://acme.myshopify.com/admin/api/2024-10/locations.json".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().is_access_denied());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        let unprocessable = ShopifyError::UnexpectedStatus {
            status: 422,
            url: String::new(),
        };
        assert!(!is_retriable(&unprocessable));
        assert!(is_retriable(&rate_limited(1)));
    }

    #[test]
    fn delay_is_capped_and_jittered() {
        let err = rate_limited(0);
        for attempt in 0..10 {
            let delay = backoff_delay_ms(2, attempt, &err);
            assert!(delay <= MAX_DELAY_MS + MAX_DELAY_MS / 4);
        }
        let first = backoff_delay_ms(2, 0, &err);
        assert!((1_500..=2_500).contains(&first), "got {first}");
    }

    #[test]
    fn retry_after_sets_a_floor() {
        assert!(backoff_delay_ms(0, 0, &rate_limited(3)) >= 3_000);
        assert_eq!(
            backoff_delay_ms(
                0,
                0,
                &ShopifyError::UnexpectedStatus {
                    status: 500,
                    url: String::new()
                }
            ),
            0
        );
    }
}
