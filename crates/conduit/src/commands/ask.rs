//! Ask command - run one request in-process.

use std::time::Duration;

use anyhow::Result;
use clap::Args;

use conduit_agent::{Attachment, SessionId, TurnRequest};

use super::Context;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send
    #[arg(required = true)]
    pub prompt: String,

    /// Session id to tag the request with
    #[arg(short, long)]
    pub session: Option<String>,

    /// Request timeout in seconds (can only shorten the configured one)
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let mut request = TurnRequest::new(args.prompt);
    if let Some(session) = &args.session {
        request = request.with_session(session.parse::<SessionId>()?);
    }
    if let Some(secs) = args.timeout {
        if secs == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let orchestrator = ctx.build_orchestrator().await?;
    let answer = orchestrator
        .answer(request)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;

    if ctx.json_output {
        let body = serde_json::json!({
            "session_id": answer.session_id.to_string(),
            "answer": answer.text,
            "rounds": answer.rounds,
            "model_calls": answer.model_calls,
            "tool_calls": answer.tool_calls,
            "attachments": answer.attachments,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", answer.text);
        if !answer.attachments.is_empty() {
            println!();
            println!("Attachments:");
            for attachment in &answer.attachments {
                println!("  {}", describe(attachment));
            }
        }
        if ctx.verbose {
            eprintln!(
                "[session {} | {} tool round(s), {} model call(s), {} tool call(s)]",
                answer.session_id, answer.rounds, answer.model_calls, answer.tool_calls
            );
        }
    }

    Ok(())
}

/// One line per attachment: title, type, and where the content is.
fn describe(attachment: &Attachment) -> String {
    let title = if attachment.title.is_empty() {
        "(untitled)"
    } else {
        attachment.title.as_str()
    };
    let kind = attachment.mime_type.as_deref().unwrap_or("unknown type");
    let location = match (&attachment.url, &attachment.data, &attachment.base64) {
        (Some(url), _, _) => url.clone(),
        (None, Some(text), _) => format!("inline text, {} bytes", text.len()),
        (None, None, Some(blob)) => format!("inline base64, {} chars", blob.len()),
        (None, None, None) => "no content".to_string(),
    };
    format!("{} [{}] {}", title, kind, location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_attachments() {
        let linked = Attachment {
            title: "cat.png".into(),
            mime_type: Some("image/png".into()),
            url: Some("files/cat.png".into()),
            ..Default::default()
        };
        assert_eq!(describe(&linked), "cat.png [image/png] files/cat.png");

        let inline = Attachment::text("notes.txt", None, "hello");
        assert_eq!(describe(&inline), "notes.txt [unknown type] inline text, 5 bytes");

        let blob = Attachment::blob("", Some("image/png".into()), "iVBO");
        assert_eq!(describe(&blob), "(untitled) [image/png] inline base64, 4 chars");
    }
}
