use crate::config::Config;
use crate::conversation::{ConversationStore, MessageLogEntry};
use crate::error::{ChatError, Result};
use crate::gateway::{drain_stream, Completion, Gateway, GatewayRequest};
use crate::storage::KeyValueStore;
use colored::Colorize;
use std::io::Write;

/// Send `text` to the selected conversation and print the streamed reply
pub async fn run_send(
    config: &Config,
    text: String,
    model: Option<String>,
    roles: Vec<String>,
) -> Result<()> {
    let mut store = super::open_store(config)?;
    let gateway = super::build_gateway(config)?;
    let conversation_id = store.selected_conversation_id().ok_or_else(|| {
        ChatError::NotFound("no conversation is selected".to_string())
    })?;

    let mut stdout = std::io::stdout();
    let completion = exchange(
        &mut store,
        &gateway,
        &conversation_id,
        &text,
        model.as_deref().unwrap_or_default(),
        &roles,
        &mut stdout,
    )
    .await?;

    writeln!(stdout)?;
    if let Some(usage) = completion.usage {
        tracing::info!(
            "Tokens: prompt={}, completion={}, total={}",
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );
    }
    Ok(())
}

/// Run one user turn against a conversation
///
/// The user entry is saved before the request so it survives a failed
/// reply. Fragments are written to `out` as they arrive; the assistant
/// entry is saved once the stream finishes. Empty input does nothing.
///
/// # Errors
///
/// Returns storage errors and gateway failures
pub async fn exchange<S, G, W>(
    store: &mut ConversationStore<S>,
    gateway: &G,
    conversation_id: &str,
    text: &str,
    model: &str,
    roles: &[String],
    out: &mut W,
) -> Result<Completion>
where
    S: KeyValueStore,
    G: Gateway + ?Sized,
    W: Write,
{
    let text = text.trim();
    if text.is_empty() {
        return Ok(Completion {
            message: String::new(),
            usage: None,
        });
    }

    store.append_message(conversation_id, MessageLogEntry::user(text))?;

    let log = store.get_messages(conversation_id);
    let request = GatewayRequest::from_log(&log, model, roles.to_vec());
    let events = gateway.stream_chat(request).await?;

    let mut write_error = None;
    let completion = drain_stream(events, |delta| {
        if write_error.is_none() {
            if let Err(e) = out.write_all(delta.as_bytes()).and_then(|_| out.flush()) {
                write_error = Some(e);
            }
        }
    })
    .await?;
    if let Some(e) = write_error {
        return Err(ChatError::Io(e).into());
    }

    if completion.message.is_empty() {
        tracing::warn!("Model returned an empty reply");
        eprintln!("{}", "The model returned an empty reply.".yellow());
    } else {
        store.append_message(
            conversation_id,
            MessageLogEntry::assistant(completion.message.clone()),
        )?;
    }

    Ok(completion)
}
