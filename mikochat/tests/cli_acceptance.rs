use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        for dir in [&home, &xdg_data, &xdg_config, &xdg_state] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("mikochat/data.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("mikochat");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("mikochat")));
        command
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env_remove("OPENAI_API_KEY")
            .env_remove("GEMINI_API_KEY")
            .env_remove("ELEVENLABS_API_KEY");
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to execute mikochat {args:?}: {e}"))
    }

    /// Run `mikochat chat` with the given lines on stdin.
    fn chat(&self, input: &str) -> Output {
        let mut child = self
            .command(&["chat"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn mikochat chat");
        child
            .stdin
            .take()
            .expect("missing stdin")
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
        child.wait_with_output().expect("failed to wait for mikochat")
    }
}

fn assert_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "mikochat {:?} failed\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn sessions_on_fresh_install_is_empty() {
    let env = CliTestEnv::new();
    let output = env.run(&["sessions"]);
    assert_success(&["sessions"], &output);
    assert!(stdout(&output).contains("No saved chats yet."));
    assert!(env.db_path().exists());
}

#[test]
fn plan_defaults_to_free_tier() {
    let env = CliTestEnv::new();
    let output = env.run(&["plan"]);
    assert_success(&["plan"], &output);
    let text = stdout(&output);
    assert!(text.contains("Free Plan"), "unexpected output: {text}");
    assert!(text.contains("0 images today, 5 remaining"));
}

#[test]
fn activation_persists_across_runs() {
    let env = CliTestEnv::new();
    let output = env.run(&["activate", "VIP-HMZ-004"]);
    assert_success(&["activate"], &output);
    assert!(stdout(&output).contains("Successfully activated VIP Plan!"));

    let output = env.run(&["plan"]);
    assert_success(&["plan"], &output);
    let text = stdout(&output);
    assert!(text.contains("VIP Plan"));
    assert!(text.contains("unlimited"));
}

#[test]
fn invalid_activation_code_fails() {
    let env = CliTestEnv::new();
    let output = env.run(&["activate", "VIP-HMZ-999"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid activation code"), "stderr: {stderr}");

    let text = stdout(&env.run(&["plan"]));
    assert!(text.contains("Free Plan"));
}

#[test]
fn chat_without_completion_records_error_reply() {
    let env = CliTestEnv::new();
    let output = env.chat("hello miko\n/quit\n");
    assert_success(&["chat"], &output);
    let text = stdout(&output);
    assert!(text.contains("Hi, I'm Miko!"));
    assert!(text.contains(
        "Miko: Sorry, I encountered an error: Chat service is not configured or available"
    ));

    let sessions = stdout(&env.run(&["sessions"]));
    assert!(sessions.contains("hello miko"), "sessions: {sessions}");
    assert!(sessions.contains("3 messages"));
}

#[test]
fn reopening_chat_restores_last_session() {
    let env = CliTestEnv::new();
    assert_success(&["chat"], &env.chat("first question\n"));

    let output = env.chat("/history\n/quit\n");
    assert_success(&["chat"], &output);
    let text = stdout(&output);
    assert!(text.contains("You: first question"));
}

#[test]
fn slash_commands_report_usage_and_state() {
    let env = CliTestEnv::new();
    let output = env.chat("/think\n/image\n/load 5\n/dance\n/plan\n/quit\n");
    assert_success(&["chat"], &output);
    let text = stdout(&output);
    assert!(text.contains("Thinking Mode activated."));
    assert!(text.contains("Usage: /image"));
    assert!(text.contains("no chat numbered 5"));
    assert!(text.contains("Unknown command: /dance"));
    assert!(text.contains("Free Plan"));
}

#[test]
fn image_generation_without_provider_is_reported() {
    let env = CliTestEnv::new();
    let output = env.chat("/image --style ghibli a quiet harbor\n/quit\n");
    assert_success(&["chat"], &output);
    let text = stdout(&output);
    assert!(text.contains("Generating 1 ghibli style images..."));
    assert!(text.contains(
        "Sorry, I encountered an error generating the images: Image generation service is not configured or available"
    ), "output: {text}");
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    env.write_config("[chat]\nhistory_window = 0\n");
    let output = env.run(&["sessions"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("history_window"), "stderr: {stderr}");
}
