// Ctrl+C 取消当前传输
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Turns an interrupt signal into a cancelled token for the queue to observe.
pub struct CancelController {
    token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl CancelController {
    /// Controller that is only cancelled by calling [`CancelController::cancel`].
    pub fn manual() -> Self {
        Self {
            token: CancellationToken::new(),
            listener: None,
        }
    }

    /// Controller that also listens for Ctrl+C. Must be called inside a
    /// tokio runtime.
    pub fn listen() -> Self {
        let token = CancellationToken::new();
        let signal_token = token.clone();
        let listener = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                error!("Failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received, canceling the current transfer");
            signal_token.cancel();
        });

        Self {
            token,
            listener: Some(listener),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancelController {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_cancel_is_observed_by_clones() {
        let controller = CancelController::manual();
        let token = controller.token();
        assert!(!token.is_cancelled());

        controller.cancel();
        controller.cancel();
        token.cancelled().await;
        assert!(controller.is_cancelled());
    }

    #[tokio::test]
    async fn listener_is_stopped_on_drop() {
        let controller = CancelController::listen();
        let token = controller.token();
        drop(controller);
        assert!(!token.is_cancelled());
    }
}
