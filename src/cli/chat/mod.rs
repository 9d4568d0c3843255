pub mod conversation_state;
pub mod presets;
pub mod prompt;

use std::io::Write;
use std::process::ExitCode;

use color_print::cformat;
use conversation_state::{ConversationState, Message, Role};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use eyre::Result;
use presets::{TEAMS, Topic, find_team};
use prompt::generate_prompt;
use tracing::{debug, info, warn};

use crate::gemini_client::AnswerProvider;

const WELCOME_TEXT: &str = "
⚾ BaseBot ⚾
🏟️ KBO 리그 구단 정보부터 야구 룰까지, 무엇이든 물어보세요! 🎯

/teams              List the KBO teams
/stadium <team>     🏟️ 홈구장 정보
/history <team>     📜 팀 역사
/titles <team>      🏆 주요 우승 기록
/help               Show the help dialogue
/quit               Quit the application
";

const HELP_TEXT: &str = "
BaseBot

/teams              List the KBO teams
/stadium <team>     Ask about a team's home stadium
/history <team>     Ask about a team's history
/titles <team>      Ask about a team's Korean Series titles
/rules              Ask about baseball rules
/log                Show the conversation so far
/clear              Clear the conversation history
/help               Show this help dialogue
/quit               Quit the application

<team> is a number from /teams or a team name.
Anything else you type is sent as a question.
";

const WAITING_TEXT: &str = "⚾ 정보를 확인 중이에요...";
const RULES_HINT: &str = "⚾ 궁금한 야구 규칙이나 용어를 자유롭게 물어보세요!";
const TEAMS_HINT: &str = "🏟️ 오늘 궁금한 팀이 있으신가요? KBO 구단을 선택해보세요!";
const EMPTY_LOG_HINT: &str = "🎯 먼저 궁금한 팀을 선택하거나 질문을 입력해보세요!";
const PENDING_NOTICE: &str = "The previous question is still waiting for an answer.";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    conversation_state: ConversationState,
    answer_provider: Box<dyn AnswerProvider>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        answer_provider: Box<dyn AnswerProvider>,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            conversation_state: ConversationState::new(),
            answer_provider,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        info!(
            messages = self.conversation_state.snapshot().len(),
            "Chat session ended"
        );
        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let readline = rl.readline(&generate_prompt());

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if !self.handle_input(&line).await? {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Readline stopped: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handles one line of input. Returns `false` once the user asked to quit.
    async fn handle_input(&mut self, input: &str) -> Result<bool> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(true);
        }

        let (command, argument) = input
            .split_once(char::is_whitespace)
            .map(|(command, argument)| (command, argument.trim()))
            .unwrap_or((input, ""));

        match command {
            "/quit" => return Ok(false),
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.conversation_state = ConversationState::new();
                writeln!(self.output, "Conversation cleared.")?;
            }
            "/teams" => self.print_teams()?,
            "/rules" => {
                writeln!(self.output, "{}", RULES_HINT)?;
            }
            "/log" => self.print_log()?,
            _ => {
                if let Some(topic) = Topic::from_command(command) {
                    self.ask_about_team(topic, argument).await?;
                } else if command.starts_with('/') {
                    writeln!(
                        self.output,
                        "Unknown command: {}. Type /help for the list.",
                        command
                    )?;
                } else {
                    self.process_chat_input(input, false).await?;
                }
            }
        }

        Ok(true)
    }

    async fn ask_about_team(&mut self, topic: Topic, team: &str) -> Result<()> {
        let Some(team) = find_team(team) else {
            writeln!(
                self.output,
                "Unknown team: '{}'. Type /teams to see the KBO teams.",
                team
            )?;
            return Ok(());
        };

        let heading = cformat!("<bold>✨ {} · {}</bold>", team, topic.label());
        writeln!(self.output, "{}", heading)?;
        let prompt = topic.prompt(team);
        self.process_chat_input(&prompt, true).await
    }

    /// Submits `input` and, if the guard accepts it, fetches and records the answer.
    ///
    /// Nothing between an accepted `submit` and `resolve` may fail, or the
    /// session would stay pending and refuse every later question.
    async fn process_chat_input(&mut self, input: &str, echo: bool) -> Result<()> {
        if !self.conversation_state.submit(input) {
            debug!(
                state = ?self.conversation_state.state(),
                pending = ?self.conversation_state.last_submitted_prompt(),
                "Question not submitted"
            );
            writeln!(self.output, "{}", cformat!("<yellow>{}</yellow>", PENDING_NOTICE))?;
            return Ok(());
        }

        if echo {
            if let Err(e) = render_message(&mut self.output, &Message::new(Role::User, input)) {
                warn!("Failed to echo question: {}", e);
            }
        }

        if let Err(e) = execute!(self.output, Print(WAITING_TEXT)) {
            warn!("Failed to draw waiting indicator: {}", e);
        }
        let outcome = self.answer_provider.answer(input).await;
        self.conversation_state.resolve(outcome)?;

        if let Err(e) = execute!(self.output, MoveToColumn(0), Clear(ClearType::CurrentLine)) {
            warn!("Failed to clear waiting indicator: {}", e);
        }

        if let Some(answer) = self.conversation_state.last_answer() {
            render_message(&mut self.output, answer)?;
        }

        Ok(())
    }

    fn print_teams(&mut self) -> Result<()> {
        writeln!(self.output, "{}", TEAMS_HINT)?;
        for (i, team) in TEAMS.iter().enumerate() {
            writeln!(self.output, "{:>3}. {}", i + 1, team)?;
        }
        Ok(())
    }

    fn print_log(&mut self) -> Result<()> {
        let messages = self.conversation_state.snapshot();
        if messages.is_empty() {
            writeln!(self.output, "{}", cformat!("<yellow>{}</yellow>", EMPTY_LOG_HINT))?;
            return Ok(());
        }

        for message in messages {
            render_message(&mut self.output, message)?;
        }
        Ok(())
    }
}

fn render_message<W: Write + ?Sized>(output: &mut W, message: &Message) -> Result<()> {
    let label = match message.role() {
        Role::User => cformat!("<bold><blue>🙋 {}</blue></bold>", message.role()),
        Role::Assistant => cformat!("<bold><green>⚾ {}</green></bold>", message.role()),
    };
    writeln!(output, "{}\n{}\n", label, message.content())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use eyre::eyre;

    use super::conversation_state::{FALLBACK_ANSWER, GuardState};
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Refuses every write, like a closed terminal.
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
        }
    }

    /// Answers every prompt with a canned reply, or fails when `fail` is set.
    #[derive(Clone, Default)]
    struct StubProvider {
        prompts: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl AnswerProvider for StubProvider {
        async fn answer(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(eyre!("503 Service Unavailable"))
            } else {
                Ok(format!("answer to: {}", prompt))
            }
        }
    }

    fn context(provider: StubProvider) -> (ChatContext, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let context = ChatContext::new(Box::new(buffer.clone()), None, false, Box::new(provider));
        (context, buffer)
    }

    #[tokio::test]
    async fn test_free_text_question_is_answered() {
        let provider = StubProvider::default();
        let (mut chat, buffer) = context(provider.clone());

        chat.handle_input("What is a strike?").await.unwrap();

        assert_eq!(
            chat.conversation_state.snapshot(),
            &[
                Message::new(Role::User, "What is a strike?"),
                Message::new(Role::Assistant, "answer to: What is a strike?"),
            ]
        );
        assert_eq!(chat.conversation_state.state(), GuardState::Idle);
        assert_eq!(*provider.prompts.lock().unwrap(), vec!["What is a strike?"]);
        assert!(buffer.contents().contains("answer to: What is a strike?"));
    }

    #[tokio::test]
    async fn test_provider_failure_records_fallback() {
        let provider = StubProvider { fail: true, ..Default::default() };
        let (mut chat, buffer) = context(provider);

        chat.handle_input("X").await.unwrap();

        let log = chat.conversation_state.snapshot();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1], Message::new(Role::Assistant, FALLBACK_ANSWER));
        assert!(!chat.conversation_state.is_awaiting_answer());
        assert!(buffer.contents().contains(FALLBACK_ANSWER));
    }

    #[tokio::test]
    async fn test_preset_question_uses_team_prompt() {
        let provider = StubProvider::default();
        let (mut chat, _buffer) = context(provider.clone());

        chat.handle_input("/stadium 3").await.unwrap();

        let expected = Topic::Stadium.prompt("SSG 랜더스");
        assert_eq!(*provider.prompts.lock().unwrap(), vec![expected.clone()]);
        assert_eq!(chat.conversation_state.last_submitted_prompt(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_team_submits_nothing() {
        let provider = StubProvider::default();
        let (mut chat, buffer) = context(provider.clone());

        chat.handle_input("/titles yankees").await.unwrap();

        assert!(chat.conversation_state.snapshot().is_empty());
        assert!(provider.prompts.lock().unwrap().is_empty());
        assert!(buffer.contents().contains("Unknown team"));
    }

    #[tokio::test]
    async fn test_pending_question_blocks_new_submission() {
        let provider = StubProvider::default();
        let (mut chat, buffer) = context(provider.clone());
        assert!(chat.conversation_state.submit("X"));

        chat.handle_input("Y").await.unwrap();

        assert_eq!(chat.conversation_state.snapshot().len(), 1);
        assert_eq!(chat.conversation_state.last_submitted_prompt(), Some("X"));
        assert!(provider.prompts.lock().unwrap().is_empty());
        assert!(buffer.contents().contains(PENDING_NOTICE));
    }

    #[tokio::test]
    async fn test_same_question_twice_is_asked_twice() {
        let provider = StubProvider::default();
        let (mut chat, _buffer) = context(provider.clone());

        chat.handle_input("/history LG").await.unwrap();
        chat.handle_input("/history LG").await.unwrap();

        assert_eq!(provider.prompts.lock().unwrap().len(), 2);
        assert_eq!(chat.conversation_state.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn test_log_and_clear() {
        let (mut chat, buffer) = context(StubProvider::default());

        chat.handle_input("/log").await.unwrap();
        assert!(buffer.contents().contains(EMPTY_LOG_HINT));

        chat.handle_input("What is a balk?").await.unwrap();
        chat.handle_input("/clear").await.unwrap();
        assert!(chat.conversation_state.snapshot().is_empty());
        assert_eq!(chat.conversation_state.last_submitted_prompt(), None);
    }

    #[tokio::test]
    async fn test_commands_do_not_reach_guard() {
        let provider = StubProvider::default();
        let (mut chat, buffer) = context(provider.clone());

        for command in ["/help", "/teams", "/rules", "/nope", "   "] {
            chat.handle_input(command).await.unwrap();
        }

        assert!(chat.conversation_state.snapshot().is_empty());
        assert!(provider.prompts.lock().unwrap().is_empty());
        let output = buffer.contents();
        assert!(output.contains("NC 다이노스"));
        assert!(output.contains(RULES_HINT));
        assert!(output.contains("Unknown command: /nope"));
    }

    #[tokio::test]
    async fn test_single_input_run_exits_successfully() {
        let provider = StubProvider::default();
        let buffer = SharedBuffer::default();
        let mut chat = ChatContext::new(
            Box::new(buffer.clone()),
            Some("What is an RBI?".to_string()),
            true,
            Box::new(provider.clone()),
        );

        assert_eq!(chat.run().await.unwrap(), ExitCode::SUCCESS);
        assert_eq!(*provider.prompts.lock().unwrap(), vec!["What is an RBI?"]);
        assert!(!buffer.contents().contains(WELCOME_TEXT.trim()));
    }

    #[tokio::test]
    async fn test_output_failure_still_resolves_question() {
        let provider = StubProvider::default();
        let mut chat = ChatContext::new(
            Box::new(FailingWriter),
            None,
            false,
            Box::new(provider.clone()),
        );

        // Rendering the answer fails, but only after it has been recorded
        assert!(chat.handle_input("What is a strike?").await.is_err());

        assert_eq!(chat.conversation_state.state(), GuardState::Idle);
        assert_eq!(chat.conversation_state.snapshot().len(), 2);
        assert_eq!(*provider.prompts.lock().unwrap(), vec!["What is a strike?"]);
        assert!(chat.conversation_state.submit("What is a ball?"));
    }

    #[tokio::test]
    async fn test_quit_stops_without_output() {
        let (mut chat, buffer) = context(StubProvider::default());

        assert!(!chat.handle_input("/quit").await.unwrap());
        assert!(chat.handle_input("/help").await.unwrap());
        assert!(!buffer.contents().contains("Unknown command"));
    }

    #[tokio::test]
    async fn test_single_input_quit_is_not_unknown() {
        let buffer = SharedBuffer::default();
        let mut chat = ChatContext::new(
            Box::new(buffer.clone()),
            Some("/quit".to_string()),
            true,
            Box::new(StubProvider::default()),
        );

        assert_eq!(chat.run().await.unwrap(), ExitCode::SUCCESS);
        assert!(!buffer.contents().contains("Unknown command"));
    }
}
