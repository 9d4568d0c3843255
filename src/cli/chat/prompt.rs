use rustyline::{Config, Editor, Result};

const DEFAULT_PROMPT: &str = "⚾ > ";

pub fn generate_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .build();
    Editor::with_config(config)
}
