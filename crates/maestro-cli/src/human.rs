use async_trait::async_trait;
use maestro_core::{HumanInterface, MaestroError, MaestroResult, Subtask};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Human interface that prompts on stderr and takes answers one line at a
/// time from a shared reader.
///
/// Requests queue on the reader, so concurrent prompts never race for the
/// same line. A request that times out stops reading and leaves the next
/// line to whoever asks next.
pub struct LineHumanInterface<R> {
    lines: Mutex<Lines<R>>,
}

/// Reads answers from stdin, keeping stdout free for the JSON outcome.
pub type StdinHumanInterface = LineHumanInterface<BufReader<Stdin>>;

impl StdinHumanInterface {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> LineHumanInterface<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }
}

/// Format the prompt shown for a subtask.
pub fn format_input_prompt(subtask: &Subtask, timeout: Duration) -> String {
    let mut prompt = String::new();
    prompt.push_str("\n\x1b[1;37m╔══ INPUT REQUIRED ══╗\x1b[0m\n");
    prompt.push_str(&format!("  Subtask: {}\n", subtask.id));
    if !subtask.description.is_empty() {
        prompt.push_str(&format!("  Desc:    {}\n", subtask.description));
    }
    if !subtask.required.is_empty() {
        prompt.push_str(&format!("  Needs:   {}\n", subtask.required));
    }
    prompt.push_str(&format!("  Timeout: {}s\n", timeout.as_secs()));
    prompt.push_str("\x1b[1;37m╚════════════════════╝\x1b[0m\n");
    prompt.push_str("  Result: ");
    prompt
}

/// A blank answer counts as no answer.
pub fn parse_input(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl<R> HumanInterface for LineHumanInterface<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn request_input(&self, subtask: &Subtask, timeout: Duration) -> MaestroResult<String> {
        // `next_line` is cancel safe: a timed-out read consumes nothing.
        let read = tokio::time::timeout(timeout, async {
            let mut lines = self.lines.lock().await;
            eprint!("{}", format_input_prompt(subtask, timeout));
            lines.next_line().await
        })
        .await;

        match read {
            Ok(Ok(Some(input))) => match parse_input(&input) {
                Some(answer) => {
                    eprintln!("  → recorded\n");
                    Ok(answer)
                }
                None => Err(MaestroError::SubtaskExecution {
                    subtask: subtask.id.clone(),
                    message: "no input given".into(),
                }),
            },
            Ok(Ok(None)) => Err(MaestroError::SubtaskExecution {
                subtask: subtask.id.clone(),
                message: "input closed".into(),
            }),
            Ok(Err(e)) => Err(MaestroError::SubtaskExecution {
                subtask: subtask.id.clone(),
                message: format!("input read error: {e}"),
            }),
            Err(_) => {
                eprintln!("\n  → timed out after {}s\n", timeout.as_secs());
                Err(MaestroError::SubtaskTimeout {
                    subtask: subtask.id.clone(),
                    after: timeout,
                })
            }
        }
    }
}
