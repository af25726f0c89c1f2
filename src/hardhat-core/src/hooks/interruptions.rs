//! User interruptions: messages and prompts routed through hooks.
//!
//! Every interruption runs the `userInterruptions` handler chain so plugins
//! can redirect or answer prompts. The innermost implementation is the
//! injected [`InterruptionIo`].

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::manager::HookManager;
use super::{DISPLAY_MESSAGE, REQUEST_INPUT, REQUEST_SECRET_INPUT, USER_INTERRUPTIONS};
use crate::{HardhatError, Result};

/// Terminal side of the interruption boundary.
#[async_trait]
pub trait InterruptionIo: Send + Sync {
    /// Show `message` on behalf of `interruptor`.
    async fn display_message(&self, interruptor: &str, message: &str) -> Result<()>;

    /// Ask the user for a line of input.
    async fn request_input(&self, interruptor: &str, prompt: &str) -> Result<String>;

    /// Ask the user for a secret.
    async fn request_secret_input(&self, interruptor: &str, prompt: &str) -> Result<String>;
}

type InputReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Interruptions on the process stdin/stdout.
///
/// One reader is kept for the lifetime of the value so buffered lines are
/// not lost between prompts.
pub struct ConsoleIo {
    input: Mutex<InputReader>,
    terminal_secrets: bool,
}

impl ConsoleIo {
    /// Read answers from stdin and secrets from the terminal without echo.
    pub fn new() -> Self {
        Self {
            input: Mutex::new(Box::new(BufReader::new(tokio::io::stdin()))),
            terminal_secrets: true,
        }
    }

    /// Read every answer, secrets included, from `input`.
    pub fn with_input(input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
            terminal_secrets: false,
        }
    }

    async fn read_answer(&self, interruptor: &str, prompt: &str) -> Result<String> {
        let mut line = String::new();
        let read = self.input.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(HardhatError::Interaction(format!(
                "input closed while {} was waiting for '{}'",
                interruptor, prompt
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn prompt(&self, interruptor: &str, prompt: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format_prompt(interruptor, prompt).as_bytes())
            .await?;
        stdout.flush().await?;

        self.read_answer(interruptor, prompt).await
    }
}

impl Default for ConsoleIo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleIo")
            .field("terminal_secrets", &self.terminal_secrets)
            .finish_non_exhaustive()
    }
}

fn format_prompt(interruptor: &str, prompt: &str) -> String {
    format!("[{}] {}: ", interruptor, prompt)
}

#[async_trait]
impl InterruptionIo for ConsoleIo {
    async fn display_message(&self, interruptor: &str, message: &str) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("[{}] {}\n", interruptor, message).as_bytes())
            .await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn request_input(&self, interruptor: &str, prompt: &str) -> Result<String> {
        self.prompt(interruptor, prompt).await
    }

    async fn request_secret_input(&self, interruptor: &str, prompt: &str) -> Result<String> {
        if !self.terminal_secrets {
            return self.prompt(interruptor, prompt).await;
        }

        // Hold the input lock so no other prompt reads while echo is off.
        let _input = self.input.lock().await;
        let text = format_prompt(interruptor, prompt);
        let secret = tokio::task::spawn_blocking(move || rpassword::prompt_password(text))
            .await
            .map_err(|e| HardhatError::Interaction(format!("secret prompt failed: {}", e)))??;
        Ok(secret)
    }
}

/// Interruptions for unattended runs: messages go to the log, prompts fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractiveIo;

#[async_trait]
impl InterruptionIo for NonInteractiveIo {
    async fn display_message(&self, interruptor: &str, message: &str) -> Result<()> {
        tracing::info!("[{}] {}", interruptor, message);
        Ok(())
    }

    async fn request_input(&self, interruptor: &str, prompt: &str) -> Result<String> {
        Err(HardhatError::Interaction(format!(
            "{} requested input '{}' in a non-interactive session",
            interruptor, prompt
        )))
    }

    async fn request_secret_input(&self, interruptor: &str, prompt: &str) -> Result<String> {
        Err(HardhatError::Interaction(format!(
            "{} requested secret input '{}' in a non-interactive session",
            interruptor, prompt
        )))
    }
}

/// Serializes interruptions and routes them through the hook chain.
///
/// One interruption runs at a time; a handler must not start another
/// interruption while it handles one.
#[derive(Clone)]
pub struct UserInterruptionManager {
    io: Arc<dyn InterruptionIo>,
    lock: Arc<Mutex<()>>,
    hooks: Weak<HookManager>,
}

impl UserInterruptionManager {
    pub(crate) fn new(io: Arc<dyn InterruptionIo>) -> Self {
        Self {
            io,
            lock: Arc::new(Mutex::new(())),
            hooks: Weak::new(),
        }
    }

    pub(crate) fn bind(&mut self, hooks: Weak<HookManager>) {
        self.hooks = hooks;
    }

    fn hooks(&self) -> Result<Arc<HookManager>> {
        self.hooks
            .upgrade()
            .ok_or_else(|| HardhatError::invariant("user interruption before the context was set"))
    }

    pub async fn display_message(&self, interruptor: &str, message: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let io = self.io.clone();
        self.hooks()?
            .run_handler_chain(
                USER_INTERRUPTIONS,
                DISPLAY_MESSAGE,
                (interruptor.to_string(), message.to_string()),
                move |(interruptor, message): (String, String)| {
                    let io = io.clone();
                    async move { io.display_message(&interruptor, &message).await }
                },
            )
            .await
    }

    pub async fn request_input(&self, interruptor: &str, prompt: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let io = self.io.clone();
        self.hooks()?
            .run_handler_chain(
                USER_INTERRUPTIONS,
                REQUEST_INPUT,
                (interruptor.to_string(), prompt.to_string()),
                move |(interruptor, prompt): (String, String)| {
                    let io = io.clone();
                    async move { io.request_input(&interruptor, &prompt).await }
                },
            )
            .await
    }

    pub async fn request_secret_input(&self, interruptor: &str, prompt: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let io = self.io.clone();
        self.hooks()?
            .run_handler_chain(
                USER_INTERRUPTIONS,
                REQUEST_SECRET_INPUT,
                (interruptor.to_string(), prompt.to_string()),
                move |(interruptor, prompt): (String, String)| {
                    let io = io.clone();
                    async move { io.request_secret_input(&interruptor, &prompt).await }
                },
            )
            .await
    }
}

impl std::fmt::Debug for UserInterruptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInterruptionManager")
            .field("bound", &(self.hooks.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::global_options::GlobalOptions;
    use crate::hooks::{HookContext, HookHandlers, Next};
    use crate::loader::StaticModuleRegistry;
    use crate::resolver::ResolvedPluginList;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingIo {
        messages: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl InterruptionIo for RecordingIo {
        async fn display_message(&self, interruptor: &str, message: &str) -> Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push(format!("{}: {}", interruptor, message));
            Ok(())
        }

        async fn request_input(&self, _interruptor: &str, _prompt: &str) -> Result<String> {
            Ok("typed".to_string())
        }

        async fn request_secret_input(&self, _interruptor: &str, _prompt: &str) -> Result<String> {
            Ok("secret".to_string())
        }
    }

    fn manager(io: Arc<dyn InterruptionIo>) -> Arc<HookManager> {
        let manager = HookManager::new(ResolvedPluginList::empty(), Arc::new(StaticModuleRegistry::new()));
        manager
            .set_context(HookContext::new(
                Arc::new(ResolvedConfig::default()),
                Arc::new(GlobalOptions::default()),
                io,
            ))
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn test_default_reaches_io() {
        let io = Arc::new(RecordingIo::default());
        let manager = manager(io.clone());
        let interruptions = manager.context().unwrap().interruptions.clone();

        interruptions.display_message("ledger", "confirm on device").await.unwrap();
        assert_eq!(interruptions.request_input("ledger", "pin").await.unwrap(), "typed");
        assert_eq!(
            interruptions.request_secret_input("ledger", "pass").await.unwrap(),
            "secret"
        );
        assert_eq!(*io.messages.lock().unwrap(), vec!["ledger: confirm on device"]);
    }

    #[tokio::test]
    async fn test_handler_answers_prompt() {
        let manager = manager(Arc::new(NonInteractiveIo));
        manager
            .register_handlers(
                USER_INTERRUPTIONS,
                HookHandlers::new().on_chain(
                    REQUEST_INPUT,
                    |_ctx, _args: (String, String), _next: Next<(String, String), String>| async move {
                        Ok("from-handler".to_string())
                    },
                ),
            )
            .await;

        let interruptions = manager.context().unwrap().interruptions.clone();
        assert_eq!(
            interruptions.request_input("wallet", "account").await.unwrap(),
            "from-handler"
        );
        // Secret input has no handler and the non-interactive io refuses it
        assert!(matches!(
            interruptions.request_secret_input("wallet", "key").await,
            Err(HardhatError::Interaction(_))
        ));
    }

    #[tokio::test]
    async fn test_console_keeps_buffered_answers() {
        let io = ConsoleIo::with_input(std::io::Cursor::new(b"alice\r\nhunter2\nmainnet\n".to_vec()));

        assert_eq!(io.request_input("wallet", "account").await.unwrap(), "alice");
        assert_eq!(io.request_secret_input("wallet", "password").await.unwrap(), "hunter2");
        assert_eq!(io.request_input("wallet", "network").await.unwrap(), "mainnet");
        assert!(matches!(
            io.request_input("wallet", "confirm").await,
            Err(HardhatError::Interaction(_))
        ));
    }
}
