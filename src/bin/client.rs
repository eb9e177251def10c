//! Unified client shell for the Protocol Assist API
//!
//! One query loop over pluggable strategies: queries come from a keyboard
//! prompt or an external speech-to-text command, answers go to the
//! console and optionally to an external text-to-speech command. Audio
//! capture and synthesis stay entirely outside this binary.

use std::io::{self, Write as _};
use std::process::{Command, Stdio};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use protocol_assist::models::{QueryRequest, QueryResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "protocol-client", about = "Text and voice client for the Protocol Assist API")]
struct Args {
    /// Where queries come from
    #[arg(long, value_enum, default_value_t = InputKind::Text)]
    input: InputKind,

    /// Also speak responses through the TTS_COMMAND pipeline
    #[arg(long)]
    speak: bool,

    /// API base URL (defaults to CLOUD_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Device identifier sent with each query (defaults to DEVICE_ID)
    #[arg(long)]
    device_id: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputKind {
    Text,
    Voice,
}

/// Strategy producing the next query; `None` ends the session
trait InputSource {
    fn next_query(&mut self) -> anyhow::Result<Option<String>>;
}

/// Keyboard prompt on stdin
struct TextPrompt;

impl InputSource for TextPrompt {
    fn next_query(&mut self) -> anyhow::Result<Option<String>> {
        print!("\n🔍 Query: ");
        io::stdout().flush()?;

        let Some(line) = read_line()? else {
            return Ok(None);
        };
        let line = line.trim().to_string();

        if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "q") {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// External speech-to-text command; its stdout is the transcript
struct TranscriberInput {
    command: String,
}

impl InputSource for TranscriberInput {
    fn next_query(&mut self) -> anyhow::Result<Option<String>> {
        println!("\nSpeak now:");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output();

        let transcript = match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Ok(output) => {
                println!("Transcription failed: {}", String::from_utf8_lossy(&output.stderr).trim());
                return Ok(Some(String::new()));
            }
            Err(e) => {
                println!("Transcription command failed: {}", e);
                return Ok(Some(String::new()));
            }
        };

        if transcript.is_empty() {
            println!("Heard nothing");
            return Ok(Some(String::new()));
        }

        println!("Heard: '{}'", transcript);
        print!("Send? [y/n]: ");
        io::stdout().flush()?;

        match read_line()? {
            None => Ok(None),
            Some(answer) => match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => Ok(Some(transcript)),
                "q" | "quit" => Ok(None),
                _ => Ok(Some(String::new())),
            },
        }
    }
}

/// Strategy rendering a structured answer
trait OutputSink {
    fn render(&mut self, response: &QueryResponse) -> anyhow::Result<()>;
}

/// Formatted console output
struct Display;

impl OutputSink for Display {
    fn render(&mut self, response: &QueryResponse) -> anyhow::Result<()> {
        print!("{}", format_response(response));
        Ok(())
    }
}

/// Pipes the answer text into an external text-to-speech command
struct Speech {
    command: String,
}

impl OutputSink for Speech {
    fn render(&mut self, response: &QueryResponse) -> anyhow::Result<()> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .spawn()?;

        // Take and drop stdin so the pipe closes before waiting
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(response.response_text.as_bytes())?;
        }
        child.wait()?;
        Ok(())
    }
}

struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    device_id: String,
}

impl ApiClient {
    fn new(base_url: String, device_id: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url, device_id })
    }

    async fn send_query(&self, query: &str) -> anyhow::Result<QueryResponse> {
        let request = QueryRequest {
            query: query.to_string(),
            device_id: self.device_id.clone(),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        };

        let response = self.client
            .post(format!("{}/query", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} - {}", status, body);
        }

        Ok(response.json().await?)
    }
}

fn format_response(response: &QueryResponse) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let thin = "-".repeat(60);

    out.push_str(&format!("\n{}\n📋 RESPONSE:\n{}\n", rule, thin));
    out.push_str(&response.response_text);
    out.push_str(&format!("\n{}\n", thin));

    if !response.sources.is_empty() {
        out.push_str("\n📚 SOURCES:\n");
        for (i, source) in response.sources.iter().enumerate() {
            let page = source
                .page
                .map(|p| format!(" (page {})", p))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {}. {}{} - {}% confidence\n",
                i + 1,
                source.title,
                page,
                (source.confidence * 100.0).round() as u32
            ));
        }
    }

    out.push_str(&format!(
        "\n⏱️  Processing time: {}ms\n{}\n",
        response.processing_time_ms, rule
    ));
    out
}

fn read_line() -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    let read = io::stdin().read_line(&mut line)?;
    if read == 0 {
        Ok(None)
    } else {
        Ok(Some(line))
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let api_url = args
        .api_url
        .unwrap_or_else(|| env_or("CLOUD_API_URL", "http://localhost:8000"));
    let device_id = args
        .device_id
        .unwrap_or_else(|| env_or("DEVICE_ID", "handheld-001"));

    let mut input: Box<dyn InputSource> = match args.input {
        InputKind::Text => Box::new(TextPrompt),
        InputKind::Voice => {
            let command = std::env::var("STT_COMMAND").map_err(|_| {
                anyhow::anyhow!("voice input needs STT_COMMAND (a command printing the transcript to stdout)")
            })?;
            Box::new(TranscriberInput { command })
        }
    };

    let mut sinks: Vec<Box<dyn OutputSink>> = vec![Box::new(Display)];
    if args.speak {
        let command = std::env::var("TTS_COMMAND").map_err(|_| {
            anyhow::anyhow!("--speak needs TTS_COMMAND (a command reading text on stdin)")
        })?;
        sinks.push(Box::new(Speech { command }));
    }

    println!("{}", "=".repeat(60));
    println!("Protocol Assist Client");
    println!("Cloud API: {}", api_url);
    println!("Device ID: {}", device_id);
    println!("{}", "=".repeat(60));
    println!("\nType your queries below. Type 'quit' to exit.");

    let api = ApiClient::new(api_url, device_id)?;

    while let Some(query) = input.next_query()? {
        let query = query.trim();
        if query.is_empty() {
            continue;
        }

        println!("\n📤 Sending query...");
        match api.send_query(query).await {
            Ok(response) => {
                for sink in sinks.iter_mut() {
                    sink.render(&response)?;
                }
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_assist::models::{QueryType, SourceAttribution};

    #[test]
    fn test_format_response_lists_sources_with_percent() {
        let response = QueryResponse {
            response_text: "Perform needle decompression.".to_string(),
            sources: vec![
                SourceAttribution {
                    title: "tension_pneumothorax_cpg".to_string(),
                    page: Some(4),
                    confidence: 0.87,
                },
                SourceAttribution {
                    title: "airway_cpg".to_string(),
                    page: None,
                    confidence: 0.42,
                },
            ],
            query_type: QueryType::ChromadbBacked,
            processing_time_ms: 1530,
        };

        let rendered = format_response(&response);

        assert!(rendered.contains("Perform needle decompression."));
        assert!(rendered.contains("1. tension_pneumothorax_cpg (page 4) - 87% confidence"));
        assert!(rendered.contains("2. airway_cpg - 42% confidence"));
        assert!(rendered.contains("1530ms"));
    }

    #[test]
    fn test_format_response_omits_empty_sources_section() {
        let response = QueryResponse {
            response_text: "No relevant protocols found in the database.".to_string(),
            sources: Vec::new(),
            query_type: QueryType::NoResults,
            processing_time_ms: 0,
        };

        let rendered = format_response(&response);

        assert!(!rendered.contains("SOURCES"));
    }
}
