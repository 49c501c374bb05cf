// src/common/db_utils.rs

use std::{future::Future, time::Duration};

use crate::common::error::AppError;

// ---
// Helper de timeout: toda chamada de storage feita pelos handlers passa por aqui.
// ---
pub async fn with_db_timeout<T, F>(limit: Duration, operation: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏱️ Operação de banco excedeu {:?}", limit);
            Err(AppError::DatabaseTimeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_fast_results() {
        let out = with_db_timeout(Duration::from_millis(200), async { Ok::<_, AppError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn slow_operation_becomes_db_timeout() {
        let out = with_db_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, AppError>(())
        })
        .await;
        assert!(matches!(out, Err(AppError::DatabaseTimeout)));
    }
}
