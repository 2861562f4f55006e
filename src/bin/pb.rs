use std::io::{self, Read};

use clap::{Args, Parser, Subcommand};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use urlencoding::encode;

use pastebin::server::models::{CreatedPaste, Envelope, PasteView};

/// Talk to a pastebin server from the command line.
#[derive(Parser, Debug)]
#[command(author, version = env!("PASTEBIN_VERSION"), about)]
struct Cli {
    /// Base URL of the pastebin server.
    #[arg(long, global = true, env = "PASTEBIN_HOST", default_value = "http://127.0.0.1:8080")]
    host: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a paste, optionally protected, expiring or view-once.
    Create(CreateArgs),
    /// Create a plain paste from raw text.
    Quick(InputArgs),
    /// Print the content of a paste.
    Get {
        id: String,
        /// Password for protected pastes.
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Text to paste. When omitted, stdin is read instead.
    text: Option<String>,

    /// Read input from stdin.
    #[arg(long, conflicts_with = "text")]
    stdin: bool,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Require this password to read the paste.
    #[arg(long)]
    password: Option<String>,

    /// Expiry as UNIX seconds or RFC3339.
    #[arg(long)]
    expires_at: Option<String>,

    /// Make the paste unreadable after its first successful view.
    #[arg(long)]
    once: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    expire_after_viewing: bool,
}

#[derive(Serialize)]
struct UnlockPayload<'a> {
    password: &'a str,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = execute(Cli::parse())?;
    println!("{output}");
    Ok(())
}

fn execute(cli: Cli) -> io::Result<String> {
    let base_url = cli.host.trim_end_matches('/').to_owned();
    let client = Client::builder().build().map_err(io::Error::other)?;

    match cli.command {
        Command::Create(args) => {
            let content = read_input(&args.input)?;
            let payload = CreatePayload {
                content: &content,
                password: args.password.as_deref().filter(|p| !p.is_empty()),
                expires_at: args.expires_at.as_deref(),
                expire_after_viewing: args.once,
            };
            let response = client
                .post(format!("{base_url}/pastes"))
                .json(&payload)
                .send()
                .map_err(io::Error::other)?;
            let created: CreatedPaste = unwrap_envelope(response)?;
            Ok(paste_url(&base_url, &created.id))
        }
        Command::Quick(input) => {
            let content = read_input(&input)?;
            let response = client
                .post(format!("{base_url}/quick"))
                .header("Content-Type", "text/plain")
                .body(content)
                .send()
                .map_err(io::Error::other)?;
            let created: CreatedPaste = unwrap_envelope(response)?;
            Ok(paste_url(&base_url, &created.id))
        }
        Command::Get { id, password } => {
            let url = paste_url(&base_url, &id);
            let request = match password.as_deref() {
                Some(password) => client.post(&url).json(&UnlockPayload { password }),
                None => client.get(&url),
            };
            let response = request.send().map_err(io::Error::other)?;
            let view: PasteView = unwrap_envelope(response)?;
            Ok(view.content)
        }
    }
}

fn read_input(input: &InputArgs) -> io::Result<String> {
    let content = if input.stdin || input.text.is_none() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        input.text.clone().unwrap_or_default()
    };

    if content.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "No input provided.",
        ));
    }
    Ok(content)
}

fn paste_url(base_url: &str, id: &str) -> String {
    format!("{}/pastes/{}", base_url, encode(id))
}

fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> io::Result<T> {
    let status = response.status();
    let envelope: Envelope<T> = response.json().map_err(|e| {
        io::Error::other(format!("Request failed with status {status}: {e}"))
    })?;

    if envelope.error || !status.is_success() {
        return Err(io::Error::other(format!(
            "Request failed with status {}: {}",
            status, envelope.message
        )));
    }

    envelope.data.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Server returned no data.",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pb"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn create_sends_options_and_returns_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/pastes").json_body_partial(
                json!({ "content": "hello", "password": "secret", "expireAfterViewing": true })
                    .to_string(),
            );
            then.status(201).json_body(json!({
                "status": 201, "error": false, "message": "Paste created successfully",
                "data": { "id": "abc123" }
            }));
        });

        let base = server.base_url();
        let url = execute(cli(&[
            "--host",
            base.as_str(),
            "create",
            "hello",
            "--password",
            "secret",
            "--once",
        ]))
        .expect("url");
        assert_eq!(url, format!("{base}/pastes/abc123"));
        mock.assert();
    }

    #[test]
    fn quick_posts_raw_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/quick").body("raw body");
            then.status(201).json_body(json!({
                "status": 201, "error": false, "message": "ok", "data": { "id": "q1" }
            }));
        });

        let base = server.base_url();
        let url = execute(cli(&["--host", base.as_str(), "quick", "raw body"])).expect("url");
        assert_eq!(url, format!("{base}/pastes/q1"));
        mock.assert();
    }

    #[test]
    fn get_with_password_uses_post() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/pastes/abc")
                .json_body(json!({ "password": "pw" }));
            then.status(200).json_body(json!({
                "status": 200, "error": false, "message": "Paste retrieved successfully",
                "data": {
                    "id": "abc", "content": "secret text",
                    "createdAt": "2024-01-01T00:00:00Z", "expireAfterViewing": false
                }
            }));
        });

        let base = server.base_url();
        let content = execute(cli(&["--host", base.as_str(), "get", "abc", "--password", "pw"]))
            .expect("content");
        assert_eq!(content, "secret text");
        mock.assert();
    }

    #[test]
    fn error_envelope_surfaces_message() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/pastes/gone");
            then.status(410).json_body(json!({
                "status": 410, "error": true, "message": "This paste has expired."
            }));
        });

        let base = server.base_url();
        let err = execute(cli(&["--host", base.as_str(), "get", "gone"])).expect_err("gone");
        assert!(err.to_string().contains("This paste has expired."));
        mock.assert();
    }

    #[test]
    fn rejects_empty_input() {
        let err = execute(cli(&["quick", " "])).expect_err("empty input should fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
